//! Capture sources that yield decoded barcode text.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::BufRead;

/// Unrecoverable capture failure (camera lost, input closed with error).
#[derive(Debug)]
pub struct CaptureError {
    message: String,
}

impl CaptureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for CaptureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "capture failed: {}", self.message)
    }
}

impl Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(value: std::io::Error) -> Self {
        Self::new(value.to_string())
    }
}

/// Source of barcode text as detected by a scanner.
pub trait ScanSource {
    /// Samples the source once.
    ///
    /// `Ok(None)` means no code is visible right now.
    fn sample(&mut self) -> Result<Option<String>, CaptureError>;

    /// Whether the source can produce further samples.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Line-oriented source for manual or piped test input.
///
/// Each non-blank line is one detected payload; blank lines count as "no
/// code visible". End of input exhausts the source.
pub struct LineScanSource<R: BufRead> {
    reader: R,
    exhausted: bool,
}

impl<R: BufRead> LineScanSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            exhausted: false,
        }
    }
}

impl<R: BufRead> ScanSource for LineScanSource<R> {
    fn sample(&mut self) -> Result<Option<String>, CaptureError> {
        if self.exhausted {
            return Ok(None);
        }
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
