//! Scanner state machine and polling loop.

use super::source::{CaptureError, ScanSource};
use crate::decode::payload::{decode_scan_payload, DecodeError};
use crate::directory::EventDirectory;
use crate::ledger::{AttendanceLedger, CheckInOutcome, LedgerError};
use crate::model::event::EventId;
use crate::model::member::MemberId;
use crate::store::AttendanceStore;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Scan loop tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum time between two samples of the capture source.
    pub sample_interval_ms: u64,
    /// Operator-selected event used when a payload carries no event id.
    ///
    /// `None` (the default) rejects such payloads with
    /// `InvalidEventReference` instead of guessing.
    pub event_fallback: Option<EventId>,
    /// Number of recent check-ins kept for display.
    pub activity_log_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            event_fallback: None,
            activity_log_capacity: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Active,
}

/// What happened to one newly observed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    DecodeFailed(DecodeError),
    CheckIn {
        event_id: EventId,
        member_id: MemberId,
        outcome: CheckInOutcome,
    },
}

impl ScanOutcome {
    /// Operator-facing status line.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::DecodeFailed(err) => err.status_text(),
            Self::CheckIn { outcome, .. } => outcome.status_text(),
        }
    }
}

/// Report for one processed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub raw: String,
    pub outcome: ScanOutcome,
}

/// One line of the recent-activity list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    /// Unix epoch milliseconds.
    pub recorded_at_ms: i64,
    pub event_id: EventId,
    pub member_id: MemberId,
    pub outcome: CheckInOutcome,
}

/// Counters for one `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub granted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub decode_failures: usize,
}

impl RunSummary {
    fn tally(&mut self, outcome: &ScanOutcome) {
        self.processed += 1;
        match outcome {
            ScanOutcome::DecodeFailed(_) => self.decode_failures += 1,
            ScanOutcome::CheckIn { outcome, .. } => match outcome {
                CheckInOutcome::Granted => self.granted += 1,
                CheckInOutcome::Duplicate => self.duplicates += 1,
                CheckInOutcome::Rejected(_) => self.rejected += 1,
            },
        }
    }
}

/// Scan loop failures. Decode and rejection outcomes are not errors.
#[derive(Debug)]
pub enum ScanLoopError {
    /// Polled while `Idle`.
    NotActive,
    Capture(CaptureError),
    Ledger(LedgerError),
}

impl Display for ScanLoopError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotActive => write!(f, "scanner is not active"),
            Self::Capture(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScanLoopError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotActive => None,
            Self::Capture(err) => Some(err),
            Self::Ledger(err) => Some(err),
        }
    }
}

/// Shared enable/disable signal for a running loop.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    enabled: Arc<AtomicBool>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Single-threaded scanner bound to one ledger.
pub struct ScanDriver<'l, S: AttendanceStore, E: EventDirectory> {
    ledger: &'l AttendanceLedger<S, E>,
    config: ScanConfig,
    state: ScanState,
    session_id: Option<Uuid>,
    last_payload: Option<String>,
    activity: VecDeque<ActivityEntry>,
}

impl<'l, S: AttendanceStore, E: EventDirectory> ScanDriver<'l, S, E> {
    pub fn new(ledger: &'l AttendanceLedger<S, E>, config: ScanConfig) -> Self {
        Self {
            ledger,
            config,
            state: ScanState::Idle,
            session_id: None,
            last_payload: None,
            activity: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Id of the current `Active` session.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Recent check-ins, newest first.
    pub fn recent_activity(&self) -> impl Iterator<Item = &ActivityEntry> + '_ {
        self.activity.iter()
    }

    /// `Idle -> Active`. No-op when already active.
    pub fn enable(&mut self) {
        if self.state == ScanState::Active {
            return;
        }
        let session_id = Uuid::new_v4();
        self.state = ScanState::Active;
        self.session_id = Some(session_id);
        self.last_payload = None;
        info!("event=scan_session module=scan status=active session_id={session_id}");
    }

    /// `Active -> Idle`. No-op when already idle.
    pub fn disable(&mut self) {
        self.stop("disabled");
    }

    /// Samples the source once and processes a newly observed payload.
    ///
    /// Returns `Ok(None)` when nothing new was seen.
    ///
    /// # Errors
    /// - `NotActive` when called while idle.
    /// - `Capture` / `Ledger` on unrecoverable failures; the driver is idle
    ///   afterwards and all previously granted records remain.
    pub fn poll_once(
        &mut self,
        source: &mut impl ScanSource,
    ) -> Result<Option<ScanReport>, ScanLoopError> {
        if self.state != ScanState::Active {
            return Err(ScanLoopError::NotActive);
        }

        let raw = match source.sample() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                error!(
                    "event=scan_capture module=scan status=error session_id={} error={}",
                    self.session_label(),
                    err
                );
                self.stop("capture_failed");
                return Err(ScanLoopError::Capture(err));
            }
        };

        if self.last_payload.as_deref() == Some(raw.as_str()) {
            return Ok(None);
        }
        self.last_payload = Some(raw.clone());

        let outcome = self.process(&raw)?;
        Ok(Some(ScanReport { raw, outcome }))
    }

    /// Runs until `control` is disabled, the source is exhausted, or a fatal
    /// error occurs. Each processed payload is passed to `on_report`.
    ///
    /// `control` must be enabled by the caller; a disabled control returns
    /// immediately with an empty summary.
    pub fn run(
        &mut self,
        source: &mut impl ScanSource,
        control: &ScanControl,
        mut on_report: impl FnMut(&ScanReport),
    ) -> Result<RunSummary, ScanLoopError> {
        let interval = Duration::from_millis(self.config.sample_interval_ms);
        let mut summary = RunSummary::default();
        self.enable();

        loop {
            if !control.is_enabled() {
                self.stop("disabled");
                break;
            }
            if source.is_exhausted() {
                self.stop("source_exhausted");
                break;
            }

            let sampled_at = Instant::now();
            if let Some(report) = self.poll_once(source)? {
                summary.tally(&report.outcome);
                on_report(&report);
            }

            if let Some(remaining) = interval.checked_sub(sampled_at.elapsed()) {
                if !remaining.is_zero() && !source.is_exhausted() {
                    std::thread::sleep(remaining);
                }
            }
        }

        Ok(summary)
    }

    fn process(&mut self, raw: &str) -> Result<ScanOutcome, ScanLoopError> {
        let payload = match decode_scan_payload(raw) {
            Ok(payload) => payload,
            Err(err) => return Ok(self.decode_failed(err)),
        };
        let Some(event_id) = payload.event_id.or(self.config.event_fallback) else {
            return Ok(self.decode_failed(DecodeError::InvalidEventReference));
        };

        let outcome = match self.ledger.record_attendance(event_id, &payload.member_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "event=scan_checkin module=scan status=error session_id={} event_id={} error={}",
                    self.session_label(),
                    event_id,
                    err
                );
                self.stop("storage_failed");
                return Err(ScanLoopError::Ledger(err));
            }
        };

        self.push_activity(ActivityEntry {
            recorded_at_ms: now_epoch_ms(),
            event_id,
            member_id: payload.member_id.clone(),
            outcome,
        });

        Ok(ScanOutcome::CheckIn {
            event_id,
            member_id: payload.member_id,
            outcome,
        })
    }

    fn decode_failed(&self, err: DecodeError) -> ScanOutcome {
        warn!(
            "event=scan_decode module=scan status=error session_id={} error={:?}",
            self.session_label(),
            err
        );
        ScanOutcome::DecodeFailed(err)
    }

    fn push_activity(&mut self, entry: ActivityEntry) {
        self.activity.push_front(entry);
        self.activity.truncate(self.config.activity_log_capacity);
    }

    fn stop(&mut self, reason: &str) {
        if self.state == ScanState::Idle {
            return;
        }
        info!(
            "event=scan_session module=scan status=idle session_id={} reason={}",
            self.session_label(),
            reason
        );
        self.state = ScanState::Idle;
        self.session_id = None;
        self.last_payload = None;
    }

    fn session_label(&self) -> String {
        self.session_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string())
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
