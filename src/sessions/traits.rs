//! Session storage traits and types for chat transcripts.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One completed exchange: what the user said and what the model replied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub bot: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
        }
    }
}

/// Process-wide registry of conversation histories, keyed by caller-supplied session id.
///
/// Each method is atomic on its own, but nothing here spans a whole exchange:
/// two concurrent exchanges on the same id can both read the same history and
/// both append, in completion order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Ensure a session exists and return a snapshot of its turns.
    async fn get_or_create(&self, session_id: &str) -> Result<Vec<Turn>>;

    /// Install a fresh, empty history for the session, dropping any previous one.
    async fn reset(&self, session_id: &str) -> Result<()>;

    /// Append a turn to the end of the session history.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Snapshot of the session's turns, or `None` if the session is unknown.
    async fn get(&self, session_id: &str) -> Result<Option<Vec<Turn>>>;

    /// Remove the session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
