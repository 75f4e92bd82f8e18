//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{SessionStore, Turn};

/// An in-memory session store backed by a mutex-protected hash map.
///
/// Histories live for the lifetime of the process and grow without bound.
pub struct InMemorySessionStore {
    histories: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Result<Vec<Turn>> {
        let mut histories = self.histories.lock();
        Ok(histories
            .entry(session_id.to_string())
            .or_default()
            .clone())
    }

    async fn reset(&self, session_id: &str) -> Result<()> {
        self.histories
            .lock()
            .insert(session_id.to_string(), Vec::new());
        Ok(())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut histories = self.histories.lock();
        histories
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Vec<Turn>>> {
        let histories = self.histories.lock();
        Ok(histories.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.histories.lock().remove(session_id).is_some())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
