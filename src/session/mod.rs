//! Conversation data model: roles, turns, and the per-user session.
//!
//! A [`Session`] owns the persona and the ordered turn history for one
//! interactive user. Turns are only ever appended; the history is replaced
//! wholesale on persona installation or reset, never reordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod store;

/// Most archived transcripts a session keeps; older ones are dropped first.
pub const MAX_ARCHIVED: usize = 32;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The persona description. At most one, always first.
    Persona,
    /// The researcher asking questions.
    Human,
    /// The model answering in character.
    Ai,
}

impl Role {
    /// Stable lowercase name used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }

    /// Speaker label used when rendering prompt history.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Persona => "Persona",
            Self::Human => "Human",
            Self::Ai => "AI",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-tagged message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,
    /// Verbatim text.
    pub content: String,
    /// When the turn was appended.
    pub at: DateTime<Utc>,
    /// Set on a human turn whose model call failed and was never answered.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
            failed: false,
        }
    }

    /// Persona turn.
    pub fn persona(content: impl Into<String>) -> Self {
        Self::new(Role::Persona, content)
    }

    /// Human turn.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    /// AI turn.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No persona installed; history is empty.
    Empty,
    /// A persona is installed and the history may grow.
    PersonaActive,
}

/// Persona plus history for one interactive user.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    persona: Option<String>,
    history: Vec<Turn>,
    archived: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            persona: None,
            history: Vec::new(),
            archived: Vec::new(),
        }
    }

    /// Session identifier. Changes on every reset.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The active persona text, if any.
    pub fn persona(&self) -> Option<&str> {
        self.persona.as_deref()
    }

    /// Ordered turn history.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Transcripts of conversations discarded by earlier resets, oldest
    /// first. At most [`MAX_ARCHIVED`] are kept.
    pub fn archived(&self) -> &[String] {
        &self.archived
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.persona.is_some() {
            SessionState::PersonaActive
        } else {
            SessionState::Empty
        }
    }

    /// Replace persona and history with a single persona turn.
    pub(crate) fn install_persona(&mut self, text: &str) {
        self.clear();
        self.persona = Some(text.to_owned());
        self.history.push(Turn::persona(text));
    }

    /// Drop persona and history, keeping only the archive.
    pub(crate) fn clear(&mut self) {
        self.id = Uuid::new_v4();
        self.persona = None;
        self.history.clear();
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Mark the most recent turn as failed. No-op on an empty history.
    pub(crate) fn mark_last_failed(&mut self) {
        if let Some(last) = self.history.last_mut() {
            last.failed = true;
        }
    }

    /// Remove the most recent turn.
    pub(crate) fn pop_last(&mut self) -> Option<Turn> {
        self.history.pop()
    }

    pub(crate) fn archive(&mut self, transcript: String) {
        if self.archived.len() >= MAX_ARCHIVED {
            self.archived.remove(0);
        }
        self.archived.push(transcript);
    }

    /// Rebuild a session from previously stored parts.
    ///
    /// The persona is taken from the leading persona turn when present,
    /// otherwise from `persona`.
    pub(crate) fn from_parts(persona: Option<String>, history: Vec<Turn>) -> Self {
        let persona = history
            .first()
            .filter(|t| t.role == Role::Persona)
            .map(|t| t.content.clone())
            .or(persona);
        Self {
            id: Uuid::new_v4(),
            persona,
            history,
            archived: Vec::new(),
        }
    }
}
