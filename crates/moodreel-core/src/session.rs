use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::conversation::ConversationState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub state: ConversationState,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(state: ConversationState) -> Self {
        Self {
            state,
            last_active: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_active >= max_idle
    }
}

/// In-process conversation sessions keyed by conversation scope.
///
/// Each entry is only written while handling a message from that same
/// conversation, so a single map-wide lock is enough.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, scope: &str) -> Option<ConversationState> {
        self.sessions.read().await.get(scope).map(|s| s.state)
    }

    /// Set the state, creating the session if needed.
    pub async fn set_state(&self, scope: &str, state: ConversationState) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(scope.to_string())
            .and_modify(|s| {
                s.state = state;
                s.touch();
            })
            .or_insert_with(|| Session::new(state));
    }

    /// Drop and recreate the session in `AwaitingTerms`.
    pub async fn reset(&self, scope: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            scope.to_string(),
            Session::new(ConversationState::AwaitingTerms),
        );
    }

    /// Remove sessions untouched for at least `max_idle`. Returns how many
    /// were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(max_idle, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    async fn backdate(&self, scope: &str, by: Duration) {
        if let Some(session) = self.sessions.write().await.get_mut(scope) {
            session.last_active -= by;
        }
    }
}
