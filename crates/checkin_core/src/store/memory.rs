//! Mutex-guarded in-memory attendance store.

use super::{AttendanceStore, LedgerSnapshot, StoreResult};
use crate::model::event::EventId;
use crate::model::member::MemberId;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct EventAttendance {
    arrival_order: Vec<MemberId>,
    present: HashSet<MemberId>,
}

impl EventAttendance {
    fn insert(&mut self, member_id: &str) -> bool {
        if self.present.contains(member_id) {
            return false;
        }
        self.present.insert(member_id.to_string());
        self.arrival_order.push(member_id.to_string());
        true
    }
}

/// In-process store shared by scanner threads.
///
/// One mutex covers the whole map, so check-and-insert is a single critical
/// section.
#[derive(Debug, Default)]
pub struct InMemoryAttendanceStore {
    events: Mutex<BTreeMap<EventId, EventAttendance>>,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Self {
        let store = Self::new();
        {
            let mut events = store.lock();
            for (event_id, members) in snapshot.iter() {
                let attendance = events.entry(event_id).or_default();
                for member_id in members {
                    attendance.insert(member_id);
                }
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<EventId, EventAttendance>> {
        // Every mutation is a single insert, so a poisoned map is still consistent.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttendanceStore for InMemoryAttendanceStore {
    fn get(&self, event_id: EventId) -> StoreResult<Vec<MemberId>> {
        Ok(self
            .lock()
            .get(&event_id)
            .map(|attendance| attendance.arrival_order.clone())
            .unwrap_or_default())
    }

    fn record_if_absent(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        Ok(self.lock().entry(event_id).or_default().insert(member_id))
    }

    fn snapshot(&self) -> StoreResult<LedgerSnapshot> {
        let events = self.lock();
        let mut snapshot = LedgerSnapshot::new();
        for (event_id, attendance) in events.iter() {
            for member_id in &attendance.arrival_order {
                snapshot.insert(*event_id, member_id.as_str());
            }
        }
        Ok(snapshot)
    }

    fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize> {
        let mut events = self.lock();
        let mut added = 0;
        for (event_id, members) in snapshot.iter() {
            let attendance = events.entry(event_id).or_default();
            for member_id in members {
                if attendance.insert(member_id) {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    fn contains(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        Ok(self
            .lock()
            .get(&event_id)
            .is_some_and(|attendance| attendance.present.contains(member_id)))
    }

    fn count(&self, event_id: EventId) -> StoreResult<usize> {
        Ok(self
            .lock()
            .get(&event_id)
            .map_or(0, |attendance| attendance.arrival_order.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryAttendanceStore;
    use crate::store::{AttendanceStore, LedgerSnapshot};

    #[test]
    fn record_if_absent_reports_first_insert_only() {
        let store = InMemoryAttendanceStore::new();
        assert!(store.record_if_absent(1, "M1").unwrap());
        assert!(!store.record_if_absent(1, "M1").unwrap());
        assert!(store.record_if_absent(2, "M1").unwrap());
        assert_eq!(store.get(1).unwrap(), vec!["M1".to_string()]);
        assert_eq!(store.count(2).unwrap(), 1);
    }

    #[test]
    fn merge_unions_with_existing_state() {
        let store = InMemoryAttendanceStore::new();
        store.record_if_absent(1, "A").unwrap();

        let incoming = LedgerSnapshot::from_json(r#"{"1":["B","A"],"5":["C"]}"#).unwrap();
        assert_eq!(store.merge_snapshot(&incoming).unwrap(), 2);

        assert_eq!(store.get(1).unwrap(), vec!["A".to_string(), "B".to_string()]);
        assert!(store.contains(5, "C").unwrap());
    }

    #[test]
    fn snapshot_round_trips_into_new_store() {
        let store = InMemoryAttendanceStore::new();
        store.record_if_absent(3, "Z").unwrap();
        store.record_if_absent(3, "A").unwrap();

        let copy = InMemoryAttendanceStore::from_snapshot(&store.snapshot().unwrap());
        assert_eq!(copy.get(3).unwrap(), vec!["Z".to_string(), "A".to_string()]);
    }
}
