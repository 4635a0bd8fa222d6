//! Key-value session persistence.
//!
//! The [`SessionStore`] contract is deliberately tiny: whatever hosts the
//! chat (a terminal loop, a web handler) supplies a store scoped to one
//! interactive user, and the conversation manager writes its persona and
//! history there after every mutation so state survives re-renders.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::{Role, Session, Turn};

/// Store key holding the active persona text.
pub const PERSONA_KEY: &str = "pearl.persona";
/// Store key holding the JSON-encoded turn history.
pub const HISTORY_KEY: &str = "pearl.history";

/// Errors raised while persisting session state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The history could not be encoded.
    #[error("failed to encode session history: {0}")]
    Encode(#[from] serde_json::Error),
    /// The backing store rejected the write.
    #[error("session store write failed for '{key}': {detail}")]
    Write {
        /// Key being written.
        key: String,
        /// Backend-specific failure description.
        detail: String,
    },
}

/// Per-session key-value persistence.
pub trait SessionStore: Send {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the backend rejects the write.
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove every key.
    fn clear(&mut self);
}

/// `HashMap`-backed store living for the duration of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

/// Write the session's persona and history to the store.
///
/// An empty session clears the store instead.
///
/// # Errors
///
/// Returns [`StoreError`] if encoding or the write fails.
pub fn save(store: &mut dyn SessionStore, session: &Session) -> Result<(), StoreError> {
    let Some(persona) = session.persona() else {
        store.clear();
        return Ok(());
    };
    store.set(PERSONA_KEY, persona.to_owned())?;
    store.set(HISTORY_KEY, serde_json::to_string(session.history())?)?;
    debug!(
        session_id = %session.id(),
        turns = session.history().len(),
        "session saved"
    );
    Ok(())
}

/// Result of rebuilding a session from a store.
#[derive(Debug)]
pub struct Restored {
    /// The rebuilt session, or `None` when the store held no persona.
    pub session: Option<Session>,
    /// Number of stored items that were skipped as irregular.
    pub skipped: usize,
}

/// Rebuild a session from the store.
///
/// Items that do not decode as a turn, and persona turns that are not in
/// first position, are skipped with a warning rather than failing the load.
pub fn load(store: &dyn SessionStore) -> Restored {
    let persona = store.get(PERSONA_KEY).filter(|p| !p.trim().is_empty());
    let Some(persona) = persona else {
        return Restored {
            session: None,
            skipped: 0,
        };
    };

    let raw_items: Vec<Value> = match store.get(HISTORY_KEY) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "stored history is not a JSON array, starting fresh");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut history: Vec<Turn> = Vec::with_capacity(raw_items.len());
    let mut skipped = 0usize;
    for (index, item) in raw_items.into_iter().enumerate() {
        match serde_json::from_value::<Turn>(item) {
            Ok(turn) if turn.role == Role::Persona && index != 0 => {
                warn!(index, "skipping persona turn outside first position");
                skipped = skipped.saturating_add(1);
            }
            Ok(turn) => history.push(turn),
            Err(e) => {
                warn!(index, error = %e, "skipping irregular stored turn");
                skipped = skipped.saturating_add(1);
            }
        }
    }

    if history.first().map(|t| t.role) != Some(Role::Persona) {
        history.insert(0, Turn::persona(persona.clone()));
    }

    Restored {
        session: Some(Session::from_parts(Some(persona), history)),
        skipped,
    }
}
