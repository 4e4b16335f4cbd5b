//! Rolling per-session event store.
//!
//! Each session keeps at most `capacity` events; appending to a full session
//! evicts the oldest event first. Everything lives in process memory. The
//! [`SessionSnapshot`] export/restore pair is the hook for carrying sessions
//! across restarts.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use ragent_core::session::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of events kept per session.
pub const DEFAULT_CAPACITY: usize = 10;

/// Process-wide map of session id to its event window.
///
/// All operations take one short, non-async lock, so an append is never
/// observed half-done and concurrent appends are never lost.
pub struct SessionStore {
    capacity: usize,
    sessions: Mutex<HashMap<String, VecDeque<Event>>>,
}

impl SessionStore {
    /// Create a store keeping `capacity` events per session (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Event>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an event at the tail, evicting from the head when full.
    /// Creates the session on first use.
    pub fn append(&self, session_id: &str, event: Event) {
        let mut sessions = self.lock();
        let events = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// A copy of the session's events, oldest first. Unknown sessions are empty.
    pub fn events(&self, session_id: &str) -> Vec<Event> {
        self.lock()
            .get(session_id)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of events currently held for a session.
    pub fn len(&self, session_id: &str) -> usize {
        self.lock().get(session_id).map_or(0, VecDeque::len)
    }

    /// Remove a session entirely. Clearing an unknown session is a no-op.
    pub fn clear(&self, session_id: &str) {
        if self.lock().remove(session_id).is_some() {
            debug!(session_id, "Session cleared");
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Copy every session out of the store.
    pub fn export(&self) -> SessionSnapshot {
        let sessions = self
            .lock()
            .iter()
            .map(|(id, events)| (id.clone(), events.iter().cloned().collect()))
            .collect();
        SessionSnapshot { sessions }
    }

    /// Build a store from a snapshot. Sessions longer than `capacity` keep
    /// only their newest events.
    pub fn restore(capacity: usize, snapshot: SessionSnapshot) -> Self {
        let store = Self::new(capacity);
        for (id, events) in snapshot.sessions {
            for event in events {
                store.append(&id, event);
            }
        }
        store
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Serializable copy of all sessions, keyed by session id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub sessions: BTreeMap<String, Vec<Event>>,
}

impl SessionSnapshot {
    /// Write the snapshot as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Read a snapshot written by [`SessionSnapshot::save`].
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn event_count(&self) -> usize {
        self.sessions.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragent_core::session::Role;
    use std::sync::Arc;

    #[test]
    fn append_creates_session_lazily() {
        let store = SessionStore::new(3);
        assert!(store.events("s1").is_empty());
        store.append("s1", Event::user("hello"));
        assert_eq!(store.len("s1"), 1);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn window_keeps_most_recent_events_in_order() {
        for capacity in 1..=5 {
            for total in 0..=12usize {
                let store = SessionStore::new(capacity);
                for i in 0..total {
                    store.append("s", Event::user(format!("m{i}")));
                }

                let contents: Vec<String> =
                    store.events("s").into_iter().map(|e| e.content).collect();
                let expected: Vec<String> = (total.saturating_sub(capacity)..total)
                    .map(|i| format!("m{i}"))
                    .collect();
                assert_eq!(contents, expected, "capacity={capacity} total={total}");
            }
        }
    }

    #[test]
    fn default_capacity_is_ten() {
        let store = SessionStore::default();
        for i in 0..15 {
            store.append("s", Event::user(format!("m{i}")));
        }
        let events = store.events("s");
        assert_eq!(events.len(), 10);
        assert_eq!(events[0].content, "m5");
        assert_eq!(events[9].content, "m14");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = SessionStore::new(5);
        store.append("s", Event::user("original"));

        let mut events = store.events("s");
        events[0].content = "tampered".into();
        events.push(Event::assistant("injected"));

        let fresh = store.events("s");
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].content, "original");
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new(2);
        store.append("a", Event::user("a1"));
        store.append("b", Event::user("b1"));
        store.append("a", Event::assistant("a2"));
        store.append("a", Event::user("a3"));

        assert_eq!(store.len("a"), 2);
        assert_eq!(store.events("b")[0].content, "b1");
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::new(5);
        store.append("s", Event::user("x"));
        store.clear("s");
        store.clear("s");
        store.clear("never-existed");
        assert!(store.events("s").is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = Arc::new(SessionStore::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store.append("shared", Event::user(format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut contents: Vec<String> =
            store.events("shared").into_iter().map(|e| e.content).collect();
        assert_eq!(contents.len(), 80);
        contents.sort();
        contents.dedup();
        assert_eq!(contents.len(), 80);
    }

    #[test]
    fn concurrent_appends_respect_capacity() {
        let store = Arc::new(SessionStore::new(10));
        let handles: Vec<_> = (0..20)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || store.append("shared", Event::user(t.to_string())))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len("shared"), 10);
    }

    #[test]
    fn export_and_restore() {
        let store = SessionStore::new(4);
        for i in 0..4 {
            store.append("s", Event::user(format!("m{i}")));
        }
        store.append("t", Event::assistant("hi"));

        let snapshot = store.export();
        assert_eq!(snapshot.event_count(), 5);

        // Restoring into a smaller window keeps the newest events.
        let restored = SessionStore::restore(2, snapshot);
        let contents: Vec<String> = restored.events("s").into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
        assert_eq!(restored.events("t")[0].role, Role::Assistant);
    }

    #[test]
    fn snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.json");

        let store = SessionStore::new(3);
        store.append("s", Event::user("persist me"));
        store.export().save(&path).unwrap();

        let loaded = SessionSnapshot::load(&path).unwrap();
        let restored = SessionStore::restore(3, loaded);
        assert_eq!(restored.events("s"), store.events("s"));
    }

    #[test]
    fn missing_snapshot_file_is_an_error() {
        assert!(SessionSnapshot::load(Path::new("/nonexistent/sessions.json")).is_err());
    }
}
