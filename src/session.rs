//! # Sessions — Per-Visitor State
//!
//! A session-scoped key/value store with explicit create/replace/destroy.
//! The site keeps one [`SessionData`] per visitor: the logged-in acronym (set
//! by the login flow, which lives outside this crate) and the visitor's
//! current dice game.

use crate::dice::DiceGame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Idle time after which a session is forgotten.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60);

/// Most sessions kept at once; the least recently used one makes room.
pub const MAX_SESSIONS: usize = 10_000;

/// Lock a mutex, recovering from poisoning.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub trait SessionStore<T>: Send + Sync {
    fn get(&self, id: &str) -> Option<T>;
    fn put(&self, id: &str, value: T);
    fn delete(&self, id: &str) -> Option<T>;
}

struct Entry<T> {
    value: T,
    last_seen: Instant,
}

/// In-process store; sessions vanish on restart.
///
/// Every `get` and `put` refreshes a session's last-seen time. Sessions idle
/// for longer than the TTL are dropped on access and by [`prune_stale`];
/// the store never holds more than `capacity` sessions.
///
/// [`prune_stale`]: MemorySessionStore::prune_stale
pub struct MemorySessionStore<T> {
    sessions: Mutex<HashMap<String, Entry<T>>>,
    ttl: Duration,
    capacity: usize,
}

impl<T> MemorySessionStore<T> {
    pub fn new() -> Self {
        Self::with_limits(SESSION_TTL, MAX_SESSIONS)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session idle for longer than the TTL. Returns how many went.
    pub fn prune_stale(&self) -> usize {
        let now = Instant::now();
        let mut sessions = lock_or_recover(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_seen) < self.ttl);
        before - sessions.len()
    }

    fn is_stale(&self, entry: &Entry<T>, now: Instant) -> bool {
        now.duration_since(entry.last_seen) >= self.ttl
    }
}

impl<T> Default for MemorySessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> SessionStore<T> for MemorySessionStore<T> {
    fn get(&self, id: &str) -> Option<T> {
        let now = Instant::now();
        let mut sessions = lock_or_recover(&self.sessions);
        let entry = sessions.get_mut(id)?;
        if self.is_stale(entry, now) {
            sessions.remove(id);
            return None;
        }
        entry.last_seen = now;
        Some(entry.value.clone())
    }

    fn put(&self, id: &str, value: T) {
        let now = Instant::now();
        let mut sessions = lock_or_recover(&self.sessions);
        if !sessions.contains_key(id) && sessions.len() >= self.capacity {
            sessions.retain(|_, e| now.duration_since(e.last_seen) < self.ttl);
            if sessions.len() >= self.capacity {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, e)| e.last_seen)
                    .map(|(key, _)| key.clone());
                if let Some(key) = oldest {
                    sessions.remove(&key);
                }
            }
        }
        sessions.insert(
            id.to_string(),
            Entry {
                value,
                last_seen: now,
            },
        );
    }

    fn delete(&self, id: &str) -> Option<T> {
        lock_or_recover(&self.sessions).remove(id).map(|e| e.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Acronym of the logged-in user, if any.
    pub user: Option<String>,
    pub dice: Option<DiceGame>,
}

impl SessionData {
    pub fn for_user(acronym: &str) -> Self {
        Self {
            user: Some(acronym.to_string()),
            dice: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemorySessionStore::new();
        assert!(store.get("a").is_none());

        store.put("a", SessionData::for_user("doe"));
        assert_eq!(store.get("a").unwrap().user.as_deref(), Some("doe"));
        assert_eq!(store.len(), 1);

        let removed = store.delete("a").unwrap();
        assert_eq!(removed.user.as_deref(), Some("doe"));
        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_replaces_previous_value() {
        let store = MemorySessionStore::new();
        store.put("a", SessionData::default());
        let mut data = store.get("a").unwrap();
        data.dice = Some(DiceGame::new());
        store.put("a", data.clone());
        assert_eq!(store.get("a"), Some(data));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = MemorySessionStore::with_limits(Duration::from_millis(20), 100);
        store.put("a", SessionData::default());
        store.put("b", SessionData::default());
        std::thread::sleep(Duration::from_millis(40));

        assert!(store.get("a").is_none());
        assert_eq!(store.len(), 1, "expired session dropped on access");
        assert_eq!(store.prune_stale(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn prune_keeps_recent_sessions() {
        let store = MemorySessionStore::with_limits(Duration::from_secs(60), 100);
        store.put("a", SessionData::default());
        assert_eq!(store.prune_stale(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn full_store_evicts_least_recently_used() {
        let store = MemorySessionStore::with_limits(Duration::from_secs(60), 3);
        for id in ["a", "b", "c"] {
            store.put(id, SessionData::default());
            std::thread::sleep(Duration::from_millis(2));
        }
        // Touch "a" so "b" becomes the oldest.
        assert!(store.get("a").is_some());
        store.put("d", SessionData::default());

        assert_eq!(store.len(), 3);
        assert!(store.get("b").is_none());
        for id in ["a", "c", "d"] {
            assert!(store.get(id).is_some(), "{id} should survive");
        }
    }

    #[test]
    fn replacing_in_a_full_store_evicts_nothing() {
        let store = MemorySessionStore::with_limits(Duration::from_secs(60), 2);
        store.put("a", SessionData::default());
        store.put("b", SessionData::default());
        store.put("a", SessionData::for_user("doe"));
        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_some());
    }

    #[test]
    fn sessions_are_isolated() {
        let store = MemorySessionStore::new();
        store.put("a", SessionData::for_user("doe"));
        store.put("b", SessionData::default());
        assert!(store.get("b").unwrap().user.is_none());
    }
}
