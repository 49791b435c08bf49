//! QR payload decoder.
//!
//! Payloads are JSON objects such as
//! `{"memberId":"IC-2025-0001","eventId":3}`. The legacy `activityId` key is
//! accepted as an alias for `eventId`.

use crate::model::event::EventId;
use crate::model::member::MemberId;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MEMBER_ID_KEY: &str = "memberId";
const EVENT_ID_KEYS: &[&str] = &["eventId", "activityId"];

/// Successfully decoded scan content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    /// Trimmed, non-empty member id.
    pub member_id: MemberId,
    /// Event reference carried by the payload, if any.
    pub event_id: Option<EventId>,
}

/// Typed decode failures. All are operator-recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Text is not a JSON object.
    MalformedPayload,
    /// Member identifier absent, empty, or not a scalar.
    MissingMemberId,
    /// Event reference present but not integer-coercible (or required but absent).
    InvalidEventReference,
}

impl DecodeError {
    /// Operator-facing status line.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::MalformedPayload => "Unrecognized QR content",
            Self::MissingMemberId => "QR missing memberId",
            Self::InvalidEventReference => "QR has no valid event reference",
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload => write!(f, "scan payload is not a JSON object"),
            Self::MissingMemberId => write!(f, "scan payload has no member id"),
            Self::InvalidEventReference => write!(f, "scan payload has an invalid event id"),
        }
    }
}

impl Error for DecodeError {}

/// Decodes raw scanned text into a [`ScanPayload`].
///
/// # Errors
/// - `MalformedPayload` when `raw` is not a JSON object.
/// - `MissingMemberId` when `memberId` is absent, blank or not a string/number.
/// - `InvalidEventReference` when an event key is present with a value that
///   is not an integer (numbers with a fractional part, non-numeric strings,
///   booleans, arrays, objects).
pub fn decode_scan_payload(raw: &str) -> Result<ScanPayload, DecodeError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|_| DecodeError::MalformedPayload)?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::MalformedPayload);
    };

    let member_id = member_id_field(&fields).ok_or(DecodeError::MissingMemberId)?;
    let event_id = event_id_field(&fields)?;

    Ok(ScanPayload {
        member_id,
        event_id,
    })
}

fn member_id_field(fields: &Map<String, Value>) -> Option<MemberId> {
    let text = match fields.get(MEMBER_ID_KEY)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Some(text)
}

fn event_id_field(fields: &Map<String, Value>) -> Result<Option<EventId>, DecodeError> {
    // A null under one key does not hide a value under the other.
    let Some(value) = EVENT_ID_KEYS
        .iter()
        .find_map(|key| fields.get(*key).filter(|value| !value.is_null()))
    else {
        return Ok(None);
    };

    match value {
        Value::Number(number) => coerce_number(number)
            .map(Some)
            .ok_or(DecodeError::InvalidEventReference),
        Value::String(text) => text
            .trim()
            .parse::<EventId>()
            .map(Some)
            .map_err(|_| DecodeError::InvalidEventReference),
        _ => Err(DecodeError::InvalidEventReference),
    }
}

fn coerce_number(number: &serde_json::Number) -> Option<EventId> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    let value = number.as_f64()?;
    if value.fract() != 0.0 || value < EventId::MIN as f64 || value > EventId::MAX as f64 {
        return None;
    }
    Some(value as EventId)
}
