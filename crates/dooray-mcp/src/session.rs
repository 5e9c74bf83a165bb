//! Session store.
//!
//! Sessions correlate a POST/GET pair and buffer outbound messages for the
//! client's event stream. The store is the only shared mutable resource in
//! the server; every access goes through one mutex with short critical
//! sections and no await points inside.
//!
//! Upstream kept sessions forever; abandoned connections leaked. The idle
//! sweep here evicts sessions whose last activity is older than a configured
//! threshold.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// An active MCP session.
#[derive(Debug)]
struct Session {
    id: String,
    created_at: Instant,
    last_activity: Instant,
    pending: VecDeque<Value>,
}

impl Session {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            pending: VecDeque::new(),
        }
    }
}

/// Read-only view of a session's bookkeeping fields.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub pending_len: usize,
}

/// Shared in-memory session table.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a session id: a known id is kept (activity refreshed), an
    /// unknown or absent one silently allocates a fresh session.
    pub fn get_or_create(&self, requested: Option<&str>) -> String {
        let mut sessions = self.inner.lock().expect("session store poisoned");

        if let Some(id) = requested {
            if let Some(session) = sessions.get_mut(id) {
                session.last_activity = Instant::now();
                return session.id.clone();
            }
        }

        let session = Session::new();
        let id = session.id.clone();
        sessions.insert(id.clone(), session);
        debug!(session_id = %id, "Created new session");
        id
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Option<SessionSnapshot> {
        let sessions = self.inner.lock().expect("session store poisoned");
        sessions.get(id).map(|s| SessionSnapshot {
            id: s.id.clone(),
            created_at: s.created_at,
            last_activity: s.last_activity,
            pending_len: s.pending.len(),
        })
    }

    /// Whether a session exists.
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("session store poisoned")
            .contains_key(id)
    }

    /// Refresh a session's activity timestamp.
    pub fn touch(&self, id: &str) {
        let mut sessions = self.inner.lock().expect("session store poisoned");
        if let Some(session) = sessions.get_mut(id) {
            session.last_activity = Instant::now();
        }
    }

    /// Remove a session, discarding its pending queue.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .inner
            .lock()
            .expect("session store poisoned")
            .remove(id)
            .is_some();
        if removed {
            debug!(session_id = %id, "Removed session");
        }
        removed
    }

    /// Append a message to a session's outbound queue.
    ///
    /// Returns false when the session is unknown.
    pub fn enqueue(&self, id: &str, message: Value) -> bool {
        let mut sessions = self.inner.lock().expect("session store poisoned");
        match sessions.get_mut(id) {
            Some(session) => {
                session.pending.push_back(message);
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Take all pending messages in enqueue (FIFO) order.
    pub fn drain_pending(&self, id: &str) -> Vec<Value> {
        let mut sessions = self.inner.lock().expect("session store poisoned");
        match sessions.get_mut(id) {
            Some(session) => session.pending.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session store poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// RAII guard that removes the session when dropped; used to tear a
    /// session down eagerly when its stream ends.
    pub fn guard(&self, id: impl Into<String>) -> SessionGuard {
        SessionGuard {
            store: self.clone(),
            id: id.into(),
        }
    }

    /// Evict sessions idle longer than `max_idle`. Returns the eviction count.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.inner.lock().expect("session store poisoned");
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.last_activity.elapsed() < max_idle;
            if !keep {
                info!(session_id = %id, "Evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }

    /// Spawn a background task that sweeps idle sessions periodically.
    pub fn spawn_idle_sweep(&self, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let evicted = store.sweep_idle(max_idle);
                if evicted > 0 {
                    debug!(evicted, "Idle sweep completed");
                }
            }
        })
    }
}

/// Removes its session from the store on drop.
pub struct SessionGuard {
    store: SessionStore,
    id: String,
}

impl SessionGuard {
    /// The guarded session id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.store.remove(&self.id) {
            debug!(session_id = %self.id, "Session closed with stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_id_allocates_fresh_session() {
        let store = SessionStore::new();
        let id = store.get_or_create(Some("nope"));
        assert_ne!(id, "nope");
        assert!(store.contains(&id));
    }

    #[test]
    fn known_id_is_reused_and_touched() {
        let store = SessionStore::new();
        let id = store.get_or_create(None);
        let before = store.get(&id).unwrap().last_activity;

        std::thread::sleep(Duration::from_millis(5));
        let resolved = store.get_or_create(Some(&id));
        assert_eq!(resolved, id);
        assert!(store.get(&id).unwrap().last_activity > before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn enqueue_and_drain_fifo() {
        let store = SessionStore::new();
        let id = store.get_or_create(None);

        for n in 0..3 {
            assert!(store.enqueue(&id, json!({"n": n})));
        }
        let drained = store.drain_pending(&id);
        let order: Vec<_> = drained.iter().map(|m| m["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(store.drain_pending(&id).is_empty());
    }

    #[test]
    fn enqueue_to_unknown_session_is_a_noop() {
        let store = SessionStore::new();
        assert!(!store.enqueue("ghost", json!({})));
    }

    #[test]
    fn remove_discards_pending_queue() {
        let store = SessionStore::new();
        let id = store.get_or_create(None);
        store.enqueue(&id, json!({}));

        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn guard_removes_session_on_drop() {
        let store = SessionStore::new();
        let id = store.get_or_create(None);
        {
            let _guard = store.guard(id.clone());
            assert!(store.contains(&id));
        }
        assert!(!store.contains(&id));
    }

    #[test]
    fn sweep_evicts_only_idle_sessions() {
        let store = SessionStore::new();
        let stale = store.get_or_create(None);
        std::thread::sleep(Duration::from_millis(30));
        let fresh = store.get_or_create(None);

        let evicted = store.sweep_idle(Duration::from_millis(20));
        assert_eq!(evicted, 1);
        assert!(!store.contains(&stale));
        assert!(store.contains(&fresh));
    }

    #[tokio::test]
    async fn idle_sweep_task_evicts_abandoned_sessions() {
        let store = SessionStore::new();
        let id = store.get_or_create(None);

        let handle =
            store.spawn_idle_sweep(Duration::from_millis(40), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!store.contains(&id));
        handle.abort();
    }
}
