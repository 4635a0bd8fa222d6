//! Model client backed by an external program.
//!
//! The assembled prompt is written to the program's stdin and its stdout
//! is taken as the response. This keeps provider transport and
//! credentials outside the process: point the command at any local model
//! runner or vendor CLI that reads a prompt from stdin.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::ModelPreset;

use super::{sanitize_backend_output, ModelClient, ModelError};

/// Runs one process per prompt.
#[derive(Debug, Clone)]
pub struct CommandModel {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandModel {
    /// Create a command-backed client.
    pub fn new(name: String, program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            name,
            program,
            args,
            timeout,
        }
    }

    /// Build a client from a configured preset.
    pub fn from_preset(name: &str, preset: &ModelPreset) -> Self {
        Self::new(
            name.to_owned(),
            preset.command.clone(),
            preset.args.clone(),
            Duration::from_secs(preset.timeout_secs),
        )
    }

    /// Program that will be launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ModelClient for CommandModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let started = Instant::now();

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ModelError::Spawn {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| ModelError::Spawn {
            program: self.program.clone(),
            detail: "failed to capture stdin".to_owned(),
        })?;

        let bytes = prompt.as_bytes();
        let feed = async move {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await
        };
        let exchange = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            // A backend may legitimately exit without draining stdin.
            if let Err(e) = fed {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
            output
        };

        // Dropping the exchange on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ModelError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        debug!(
            model = %self.name,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            status = ?output.status.code(),
            "model backend finished"
        );

        if !output.status.success() {
            return Err(ModelError::Exit {
                code: output.status.code(),
                stderr: sanitize_backend_output(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.name
    }
}
