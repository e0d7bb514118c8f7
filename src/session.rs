//! Per-user conversation memory for chat replies.
//!
//! Each user gets an ordered list of prior turns that is replayed to the model
//! so replies stay consistent. The store is bounded in two directions:
//!
//! * at most `capacity` users; the least recently active one is evicted;
//! * at most `history_limit` turns per user; the oldest exchanges go first.
//!
//! A session is only created by [`SessionStore::record_exchange`], i.e. after a
//! successful reply, so an existing session always holds at least one exchange.
//! The lock is held for snapshot and append only, never across a model call.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

/// Chat-platform user identifier.
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    User,
    Model,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Drop the oldest turns in user/model pairs until within `limit`.
    fn trim_to(&mut self, limit: usize) {
        if self.turns.len() <= limit {
            return;
        }
        let excess = (self.turns.len() - limit).div_ceil(2) * 2;
        self.turns.drain(..excess.min(self.turns.len()));
    }
}

/// Bounded LRU map of user → conversation turns.
pub struct SessionStore {
    inner: Mutex<LruCache<UserId, Session>>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            history_limit: history_limit.max(2),
        }
    }

    /// Snapshot of a user's turns, oldest first. Marks the user as recently used.
    pub async fn history(&self, user: UserId) -> Vec<Turn> {
        let mut cache = self.inner.lock().await;
        cache
            .get(&user)
            .map(|s| s.turns.clone())
            .unwrap_or_default()
    }

    /// Append a completed exchange, creating the session if needed.
    pub async fn record_exchange(&self, user: UserId, message: &str, reply: &str) {
        let mut cache = self.inner.lock().await;
        if let Some(session) = cache.get_mut(&user) {
            session.turns.push(Turn::user(message));
            session.turns.push(Turn::model(reply));
            session.trim_to(self.history_limit);
            return;
        }

        let session = Session {
            turns: vec![Turn::user(message), Turn::model(reply)],
        };
        if let Some((evicted, _)) = cache.push(user, session) {
            if evicted != user {
                debug!("Session store full: evicted user {}", evicted);
            }
        }
    }

    /// Whether the user has a live session. Does not affect recency.
    #[cfg(test)]
    pub(crate) async fn contains(&self, user: UserId) -> bool {
        self.inner.lock().await.contains(&user)
    }

    /// Number of users with a live session.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
