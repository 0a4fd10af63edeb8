use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::Participant;

#[derive(Debug, Clone)]
struct PresenceEntry {
    room_id: String,
    participant: Participant,
}

/// Single source of truth for which room each connection currently occupies.
/// A connection belongs to at most one room; absent lookups are `None`/empty,
/// never errors. Kept consistent with the room participant maps by the
/// registry, which updates both under the room's lock.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: Mutex<HashMap<String, PresenceEntry>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection as present in `room_id`. Returns the room the
    /// connection previously occupied, if any; the caller is responsible for
    /// the implicit leave (and its `user-left` notification) there.
    pub fn register(&self, connection_id: &str, participant: Participant, room_id: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .insert(
                connection_id.to_string(),
                PresenceEntry {
                    room_id: room_id.to_string(),
                    participant,
                },
            )
            .map(|prior| prior.room_id)
    }

    /// Drop a connection's presence. Returns the room it was in, if any.
    pub fn unregister(&self, connection_id: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(connection_id).map(|e| e.room_id)
    }

    pub fn lookup(&self, connection_id: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries.get(connection_id).map(|e| e.room_id.clone())
    }

    pub fn participant(&self, connection_id: &str) -> Option<Participant> {
        let entries = self.entries.lock().unwrap();
        entries.get(connection_id).map(|e| e.participant.clone())
    }

    pub fn members_of(&self, room_id: &str) -> Vec<Participant> {
        let entries = self.entries.lock().unwrap();
        entries
            .values()
            .filter(|e| e.room_id == room_id)
            .map(|e| e.participant.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> Participant {
        Participant::new(id, "ada", None)
    }

    #[test]
    fn register_and_lookup() {
        let tracker = PresenceTracker::new();
        assert!(tracker.register("c1", participant("c1"), "r1").is_none());
        assert_eq!(tracker.lookup("c1").as_deref(), Some("r1"));
        assert_eq!(tracker.members_of("r1").len(), 1);
    }

    #[test]
    fn register_elsewhere_reports_prior_room() {
        let tracker = PresenceTracker::new();
        tracker.register("c1", participant("c1"), "r1");
        let prior = tracker.register("c1", participant("c1"), "r2");
        assert_eq!(prior.as_deref(), Some("r1"));
        assert_eq!(tracker.lookup("c1").as_deref(), Some("r2"));
        assert!(tracker.members_of("r1").is_empty());
    }

    #[test]
    fn absent_lookups_are_none_or_empty() {
        let tracker = PresenceTracker::new();
        assert!(tracker.lookup("ghost").is_none());
        assert!(tracker.participant("ghost").is_none());
        assert!(tracker.members_of("nowhere").is_empty());
        assert!(tracker.unregister("ghost").is_none());
    }
}
