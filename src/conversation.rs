//! Persona-grounded conversation management.
//!
//! The [`ConversationManager`] owns one [`Session`] and is the only thing
//! that mutates it. Each operation runs to completion before the next one
//! starts: install a persona, submit a message (one model round-trip),
//! export the transcript, or reset.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::prompt::PromptTemplate;
use crate::providers::{ModelClient, ModelError};
use crate::session::store::{self, MemoryStore, SessionStore, StoreError};
use crate::session::{Session, SessionState, Turn};
use crate::transcript::{self, Transcript};

/// Shown when a message is sent before any persona is installed, or when
/// the persona text is blank.
pub const MISSING_PERSONA: &str = "please add a persona";
/// Shown when the user message is blank.
pub const MISSING_MESSAGE: &str = "please enter a message";

/// Errors surfaced by conversation operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Rejected input. Session state is unchanged.
    #[error("{0}")]
    Validation(&'static str),
    /// The model call failed. The question stays in history marked failed.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
    /// Session state could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns a session and drives it through the model.
pub struct ConversationManager<S: SessionStore = MemoryStore> {
    session: Session,
    template: PromptTemplate,
    model: Arc<dyn ModelClient>,
    store: S,
}

impl<S: SessionStore> std::fmt::Debug for ConversationManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("session_id", &self.session.id())
            .field("turns", &self.session.history().len())
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl ConversationManager<MemoryStore> {
    /// Create a manager with a fresh in-memory store.
    pub fn new(model: Arc<dyn ModelClient>, template: PromptTemplate) -> Self {
        Self::with_store(model, template, MemoryStore::new())
    }
}

impl<S: SessionStore> ConversationManager<S> {
    /// Create a manager over `store`, resuming any session it already holds.
    pub fn with_store(model: Arc<dyn ModelClient>, template: PromptTemplate, store: S) -> Self {
        let restored = store::load(&store);
        if restored.skipped > 0 {
            warn!(skipped = restored.skipped, "dropped irregular turns while restoring session");
        }
        let session = match restored.session {
            Some(session) => {
                info!(
                    session_id = %session.id(),
                    turns = session.history().len(),
                    "resumed session from store"
                );
                session
            }
            None => Session::new(),
        };
        Self {
            session,
            template,
            model,
            store,
        }
    }

    /// The managed session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ordered turn history.
    pub fn history(&self) -> &[Turn] {
        self.session.history()
    }

    /// Active persona text, if any.
    pub fn persona(&self) -> Option<&str> {
        self.session.persona()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Name of the model answering.
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Transcripts of conversations discarded by earlier resets.
    pub fn archived(&self) -> &[String] {
        self.session.archived()
    }

    /// The backing session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The prompt template in use.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Swap the answering model. History is kept.
    pub fn set_model(&mut self, model: Arc<dyn ModelClient>) {
        info!(
            session_id = %self.session.id(),
            from = %self.model.model_id(),
            to = %model.model_id(),
            "switching model"
        );
        self.model = model;
    }

    /// Install a persona, discarding the current conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] for blank text, or
    /// [`ChatError::Store`] if persisting fails. Either way the previous
    /// persona and history stay in place.
    pub fn install_persona(&mut self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation(MISSING_PERSONA));
        }
        let previous = self.session.clone();
        self.archive_current();
        self.session.install_persona(text);
        if let Err(e) = self.persist() {
            warn!(
                session_id = %previous.id(),
                error = %e,
                "failed to persist new persona, keeping previous session"
            );
            self.session = previous;
            self.resync_store();
            return Err(e);
        }
        info!(
            session_id = %self.session.id(),
            persona_chars = text.chars().count(),
            "persona installed"
        );
        Ok(())
    }

    /// Send a researcher message and return the in-character answer.
    ///
    /// The question is appended before the model is called. On success
    /// the answer is appended too; on failure the question stays in
    /// history marked failed and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] when no persona is active or the
    /// text is blank, [`ChatError::Model`] when the model call fails, and
    /// [`ChatError::Store`] if the question cannot be persisted. On a store
    /// error the question is dropped and the model is not called. A store
    /// failure after the answer arrives is logged and the answer returned.
    pub async fn submit_message(&mut self, text: &str) -> Result<String, ChatError> {
        let Some(persona) = self.session.persona() else {
            return Err(ChatError::Validation(MISSING_PERSONA));
        };
        if text.trim().is_empty() {
            return Err(ChatError::Validation(MISSING_MESSAGE));
        }

        let prompt = self.template.render(persona, self.session.history(), text);
        self.session.push(Turn::human(text));
        if let Err(e) = self.persist() {
            self.session.pop_last();
            warn!(
                session_id = %self.session.id(),
                error = %e,
                "failed to persist question, model not called"
            );
            self.resync_store();
            return Err(e);
        }

        debug!(
            session_id = %self.session.id(),
            model = %self.model.model_id(),
            prompt_chars = prompt.chars().count(),
            "calling model"
        );

        match self.model.generate(&prompt).await {
            Ok(reply) => {
                self.session.push(Turn::ai(reply.clone()));
                info!(
                    session_id = %self.session.id(),
                    turns = self.session.history().len(),
                    "exchange recorded"
                );
                if let Err(store_err) = self.persist() {
                    warn!(error = %store_err, "failed to persist answer");
                }
                Ok(reply)
            }
            Err(e) => {
                self.session.mark_last_failed();
                warn!(
                    session_id = %self.session.id(),
                    model = %self.model.model_id(),
                    error = %e,
                    "model call failed, question left unanswered"
                );
                if let Err(store_err) = self.persist() {
                    warn!(error = %store_err, "failed to persist failed turn");
                }
                Err(ChatError::Model(e))
            }
        }
    }

    /// Render the transcript with export diagnostics.
    pub fn transcript(&self) -> Transcript {
        transcript::render(self.session.history())
    }

    /// Render the downloadable transcript text.
    ///
    /// Turns that cannot be paired are skipped and logged.
    pub fn export_transcript(&self) -> String {
        let rendered = self.transcript();
        for skipped in &rendered.skipped {
            warn!(session_id = %self.session.id(), "{skipped}");
        }
        rendered.text
    }

    /// Forget the persona and history. Equivalent to a fresh session.
    pub fn reset(&mut self) {
        self.archive_current();
        self.session.clear();
        self.store.clear();
        info!(session_id = %self.session.id(), "session reset");
    }

    fn archive_current(&mut self) {
        let rendered = self.transcript();
        if rendered.is_empty() {
            return;
        }
        debug!(
            session_id = %self.session.id(),
            exchanges = rendered.exchanges,
            "archiving conversation"
        );
        self.session.archive(rendered.text);
    }

    /// Best-effort rewrite of the store after a rolled-back mutation, so a
    /// partial write does not outlive the in-memory state.
    fn resync_store(&mut self) {
        if let Err(e) = store::save(&mut self.store, &self.session) {
            debug!(error = %e, "store still rejecting writes after rollback");
        }
    }

    fn persist(&mut self) -> Result<(), ChatError> {
        store::save(&mut self.store, &self.session)?;
        Ok(())
    }
}
