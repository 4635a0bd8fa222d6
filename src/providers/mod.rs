//! Model client abstraction.
//!
//! The conversation core hands a fully assembled prompt to a
//! [`ModelClient`] and waits for the generated text. Which model answers,
//! and how credentials reach it, is the client's business; the core only
//! ever sees prompt text in and response text out.
//!
//! Implementations:
//! - [`command::CommandModel`]: pipes the prompt to an external program
//! - [`scripted::ScriptedModel`]: canned replies for tests and offline runs
//!
//! The [`router::ModelRouter`] maps configured model names to clients.

use async_trait::async_trait;
use regex::Regex;

pub mod command;
pub mod router;
pub mod scripted;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by model clients.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The backend process could not be started.
    #[error("failed to start model backend '{program}': {detail}")]
    Spawn {
        /// Program that failed to launch.
        program: String,
        /// Failure description.
        detail: String,
    },
    /// Reading from or writing to the backend failed.
    #[error("model backend I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The backend did not answer in time.
    #[error("model call timed out after {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },
    /// The backend exited unsuccessfully.
    #[error("model backend exited with status {code:?}: {stderr}")]
    Exit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Sanitized standard error output.
        stderr: String,
    },
    /// The backend answered with nothing.
    #[error("model returned an empty response")]
    EmptyResponse,
    /// The client cannot serve requests.
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Turns an assembled prompt into generated text.
///
/// Implementations must be `Send + Sync` so one client can be shared by
/// the router and any number of sessions.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a response for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] on transport, timeout, or backend failure.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;

    /// Name this client was configured under.
    fn model_id(&self) -> &str;
}

impl std::fmt::Debug for dyn ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("model_id", &self.model_id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

const MAX_ERROR_OUTPUT_CHARS: usize = 256;

/// Make backend error output safe to log and show.
///
/// Collapses whitespace, redacts strings shaped like provider API keys,
/// and truncates long output.
pub fn sanitize_backend_output(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-ant-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9_\-]{20,}",
        r"gsk_[A-Za-z0-9]{20,}",
        r"AIza[A-Za-z0-9_\-]{20,}",
        r"(?i)bearer\s+[A-Za-z0-9._\-]{16,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_OUTPUT_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_OUTPUT_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
