//! Pinned CSV rendering for report rows.
//!
//! Format: `,` separator, `\n` between lines, no trailing terminator. Values
//! containing the separator, a quote or a line break are wrapped in double
//! quotes with inner quotes doubled; everything else is written verbatim.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub const CSV_SEPARATOR: &str = ",";
pub const CSV_LINE_TERMINATOR: &str = "\n";

/// Export guard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportError {
    /// No rows to export; callers should disable the export action instead.
    EmptyDataset,
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDataset => write!(f, "nothing to export"),
        }
    }
}

impl Error for ExportError {}

/// One report record: ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRow {
    fields: Vec<(String, String)>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position if already present.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Column names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(key, _)| key.as_str())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for ReportRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (key, value) in iter {
            row.set(key, value);
        }
        row
    }
}

/// Renders rows as CSV.
///
/// The header is the first row's keys in that row's order. Every row is
/// rendered in header order; keys a row lacks render as empty, keys not in
/// the header are ignored.
///
/// # Errors
/// - `EmptyDataset` when `rows` is empty.
pub fn to_csv(rows: &[ReportRow]) -> Result<String, ExportError> {
    let first = rows.first().ok_or(ExportError::EmptyDataset)?;
    let headers: Vec<&str> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_line(headers.iter().copied()));
    for row in rows {
        lines.push(render_line(
            headers.iter().map(|header| row.get(header).unwrap_or("")),
        ));
    }

    Ok(lines.join(CSV_LINE_TERMINATOR))
}

fn render_line<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(CSV_SEPARATOR)
}

fn escape_field(value: &str) -> String {
    let needs_quotes = value.contains(CSV_SEPARATOR)
        || value.contains(['"', '\n', '\r']);
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
