//! Session management: tracks per-session conversation turns.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{SessionStore, Turn};

use std::sync::Arc;

/// Create the default in-memory session store.
pub fn create_session_store() -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new())
}
