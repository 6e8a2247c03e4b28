use crate::ViewState;
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const MAX_SESSION_COUNT: usize = 4096;
const SESSION_ID_LEN: usize = 24;

/// Browser sessions, each owning one [`ViewState`].
///
/// States are never shared between sessions; the table they point into is.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    capacity: usize,
}

struct SessionEntry {
    state: ViewState,
    last_seen: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }
}

impl SessionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a usable session id: the presented one if known, otherwise a fresh one.
    pub fn resolve(&self, presented: Option<&str>) -> (String, bool) {
        if let Some(id) = presented {
            if self.inner.read().contains_key(id) {
                return (id.to_string(), false);
            }
        }
        (generate_session_id(), true)
    }

    pub fn get(&self, session_id: &str) -> Option<ViewState> {
        self.inner
            .read()
            .get(session_id)
            .map(|entry| entry.state.clone())
    }

    /// Runs one transition for `session_id` and returns the resulting state.
    pub fn update<F>(&self, session_id: &str, transition: F) -> ViewState
    where
        F: FnOnce(ViewState) -> ViewState,
    {
        let now = now_ts();
        let mut guard = self.inner.write();
        if guard.len() >= self.capacity && !guard.contains_key(session_id) {
            if let Some(oldest) = oldest_session_key(&guard) {
                debug!(session = %oldest, "Evicting least recently seen session");
                guard.remove(&oldest);
            }
        }
        let entry = guard
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                state: ViewState::new(),
                last_seen: now,
            });
        let current = std::mem::take(&mut entry.state);
        entry.state = transition(current);
        entry.last_seen = now;
        entry.state.clone()
    }
}

fn oldest_session_key(sessions: &HashMap<String, SessionEntry>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, entry)| entry.last_seen)
        .map(|(key, _)| key.clone())
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
