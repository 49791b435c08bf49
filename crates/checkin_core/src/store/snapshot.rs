//! JSON ledger snapshot: `{"<eventId>": ["<memberId>", ...]}`.

use super::{StoreError, StoreResult};
use crate::model::event::EventId;
use crate::model::member::MemberId;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LEASE_POLL: Duration = Duration::from_millis(20);
const LEASE_TIMEOUT: Duration = Duration::from_secs(5);

type RawSnapshot = BTreeMap<EventId, Vec<MemberId>>;

/// Point-in-time copy of the ledger.
///
/// Member lists are duplicate-free and keep arrival order. Blank member ids
/// are dropped on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSnapshot", into = "RawSnapshot")]
pub struct LedgerSnapshot {
    entries: RawSnapshot,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one pair. Returns `false` if it was already present.
    pub fn insert(&mut self, event_id: EventId, member_id: impl Into<MemberId>) -> bool {
        let member_id = member_id.into();
        let member_id = member_id.trim();
        if member_id.is_empty() {
            return false;
        }
        let members = self.entries.entry(event_id).or_default();
        if members.iter().any(|existing| existing == member_id) {
            return false;
        }
        members.push(member_id.to_string());
        true
    }

    /// Unions `other` into `self`, appending unseen members in `other`'s order.
    ///
    /// Returns the number of pairs added.
    pub fn union(&mut self, other: &LedgerSnapshot) -> usize {
        other
            .iter()
            .map(|(event_id, members)| {
                members
                    .iter()
                    .filter(|member| self.insert(event_id, member.as_str()))
                    .count()
            })
            .sum()
    }

    /// Members for one event (empty when unknown).
    pub fn members(&self, event_id: EventId) -> &[MemberId] {
        self.entries
            .get(&event_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, event_id: EventId, member_id: &str) -> bool {
        self.members(event_id).iter().any(|member| member == member_id)
    }

    /// Event ids with at least one attendee, ascending.
    pub fn event_ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.entries
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(event_id, _)| *event_id)
    }

    /// `(event_id, members)` pairs ordered by event id.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &[MemberId])> + '_ {
        self.entries
            .iter()
            .map(|(event_id, members)| (*event_id, members.as_slice()))
    }

    /// Total number of `(event, member)` pairs.
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<RawSnapshot> for LedgerSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let mut snapshot = Self::new();
        for (event_id, members) in raw {
            for member_id in members {
                snapshot.insert(event_id, member_id);
            }
        }
        snapshot
    }
}

impl From<LedgerSnapshot> for RawSnapshot {
    fn from(snapshot: LedgerSnapshot) -> Self {
        snapshot.entries
    }
}

/// Reads a snapshot file.
pub fn load_snapshot(path: impl AsRef<Path>) -> StoreResult<LedgerSnapshot> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = LedgerSnapshot::from_json(&json)?;
    info!(
        "event=snapshot_load module=store status=ok pairs={}",
        snapshot.pair_count()
    );
    Ok(snapshot)
}

/// Reads a snapshot file, or returns `None` when it does not exist.
pub fn load_snapshot_if_exists(path: impl AsRef<Path>) -> StoreResult<Option<LedgerSnapshot>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    load_snapshot(path).map(Some)
}

/// Writes a snapshot file via temp file + rename.
///
/// A failed write leaves any previous file at `path` intact.
pub fn save_snapshot(path: impl AsRef<Path>, snapshot: &LedgerSnapshot) -> StoreResult<()> {
    let path = path.as_ref();
    let json = snapshot.to_json()?;
    let tmp_name = sibling_name(path, ".tmp");
    let tmp_path = Path::new(&tmp_name);

    let result = std::fs::write(tmp_path, json.as_bytes())
        .and_then(|()| std::fs::rename(tmp_path, path))
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        });

    match &result {
        Ok(()) => info!(
            "event=snapshot_save module=store status=ok pairs={}",
            snapshot.pair_count()
        ),
        Err(err) => {
            let _ = std::fs::remove_file(tmp_path);
            error!(
                "event=snapshot_save module=store status=error error_code=snapshot_write_failed error={err}"
            );
        }
    }
    result
}

/// Unions `snapshot` with the file's current content and writes the result.
///
/// Entries other scanner instances saved after this process loaded the file
/// are kept. The reload and write run under a `<path>.lock` lease so two
/// instances cannot interleave them. Returns the snapshot that was written.
///
/// # Errors
/// - `Unavailable` when another instance holds the lease past the timeout.
/// - `Io` / `Snapshot` when the current file cannot be read or the merged
///   file cannot be written; the previous file stays intact.
pub fn save_snapshot_merged(
    path: impl AsRef<Path>,
    snapshot: &LedgerSnapshot,
) -> StoreResult<LedgerSnapshot> {
    let path = path.as_ref();
    let _lease = SnapshotLease::acquire(path, LEASE_TIMEOUT)?;

    let mut merged = load_snapshot_if_exists(path)?.unwrap_or_default();
    let added = merged.union(snapshot);
    save_snapshot(path, &merged)?;
    info!(
        "event=snapshot_merge_save module=store status=ok added_pairs={} pairs={}",
        added,
        merged.pair_count()
    );
    Ok(merged)
}

/// Exclusive lock file next to a snapshot; removed on drop.
struct SnapshotLease {
    path: PathBuf,
}

impl SnapshotLease {
    fn acquire(snapshot_path: &Path, timeout: Duration) -> StoreResult<Self> {
        let path = PathBuf::from(sibling_name(snapshot_path, ".lock"));
        let started_at = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if started_at.elapsed() >= timeout {
                        warn!(
                            "event=snapshot_lease module=store status=timeout waited_ms={}",
                            started_at.elapsed().as_millis()
                        );
                        return Err(StoreError::Unavailable(format!(
                            "snapshot `{}` is locked by another scanner",
                            snapshot_path.display()
                        )));
                    }
                    std::thread::sleep(LEASE_POLL);
                }
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
    }
}

impl Drop for SnapshotLease {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn sibling_name(path: &Path, suffix: &str) -> OsString {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    name
}
