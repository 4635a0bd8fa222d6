//! Interactive terminal chat.
//!
//! Reads researcher input line by line and drives a
//! [`ConversationManager`]. Lines starting with `/` are commands; anything
//! else is a question for the persona. Command handlers return the text to
//! show, so the loop itself only does I/O.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::conversation::{ChatError, ConversationManager};
use crate::session::store::SessionStore;
use crate::session::Role;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/persona <text>`: install a persona.
    Persona(String),
    /// `/reset`: forget persona and history.
    Reset,
    /// `/history`: list turns.
    History,
    /// `/export [path]`: write the transcript.
    Export(Option<PathBuf>),
    /// `/archived`: show transcripts of earlier conversations.
    Archived,
    /// `/help`: list commands.
    Help,
    /// `/quit`: leave the chat.
    Quit,
    /// A question for the persona.
    Message(String),
    /// An unrecognized `/command`.
    Unknown(String),
    /// A blank line.
    Empty,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Message(trimmed.to_owned());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "persona" | "emulate" => Command::Persona(arg.to_owned()),
        "reset" | "clear" => Command::Reset,
        "history" => Command::History,
        "export" | "download" => {
            Command::Export((!arg.is_empty()).then(|| PathBuf::from(arg)))
        }
        "archived" => Command::Archived,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_owned()),
    }
}

/// List all available commands.
pub fn handle_help() -> String {
    [
        "Commands:",
        "  /persona <description>  emulate a new persona (clears the conversation)",
        "  /history                show the conversation so far",
        "  /export [path]          save the transcript",
        "  /archived               show transcripts of earlier conversations",
        "  /reset                  forget the persona and conversation",
        "  /quit                   leave",
        "Anything else is sent to the persona as a question.",
    ]
    .join("\n")
}

/// Install a persona and confirm.
pub fn handle_persona<S: SessionStore>(manager: &mut ConversationManager<S>, text: &str) -> String {
    match manager.install_persona(text) {
        Ok(()) => format!("Persona activated. PEARL will now emulate: {}", text.trim()),
        Err(e) => format!("Error: {e}"),
    }
}

/// Render the conversation so far.
pub fn handle_history<S: SessionStore>(manager: &ConversationManager<S>) -> String {
    let history = manager.history();
    if history.is_empty() {
        return "No conversation yet. Start with /persona <description>.".to_owned();
    }
    let mut out = String::new();
    for turn in history {
        let label = match turn.role {
            Role::Persona => "Persona",
            Role::Human => "You",
            Role::Ai => "AI",
        };
        let marker = if turn.failed { " (unanswered)" } else { "" };
        let _ = writeln!(
            out,
            "[{}] {label}{marker}: {}",
            turn.at.format("%H:%M:%S"),
            turn.content
        );
    }
    out.trim_end().to_owned()
}

/// Write the transcript to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn handle_export<S: SessionStore>(
    manager: &ConversationManager<S>,
    path: &Path,
) -> Result<String> {
    let transcript = manager.transcript();
    if transcript.is_empty() {
        return Ok("Nothing to export yet.".to_owned());
    }
    let text = manager.export_transcript();
    tokio::fs::write(path, text.as_bytes())
        .await
        .with_context(|| format!("failed to write transcript to {}", path.display()))?;
    info!(path = %path.display(), exchanges = transcript.exchanges, "transcript exported");
    Ok(format!(
        "Interview contains {} exchanges. Saved to {}",
        transcript.exchanges,
        path.display()
    ))
}

/// Show archived transcripts.
pub fn handle_archived<S: SessionStore>(manager: &ConversationManager<S>) -> String {
    let archived = manager.archived();
    if archived.is_empty() {
        return "No archived conversations.".to_owned();
    }
    let mut out = String::new();
    for (i, text) in archived.iter().enumerate() {
        let _ = writeln!(out, "--- conversation {} ---", i.saturating_add(1));
        out.push_str(text);
    }
    out.trim_end().to_owned()
}

/// Ask the persona a question.
pub async fn handle_message<S: SessionStore>(
    manager: &mut ConversationManager<S>,
    text: &str,
) -> String {
    match manager.submit_message(text).await {
        Ok(reply) => format!("AI: {reply}"),
        Err(ChatError::Model(e)) => {
            format!("Error: model call failed: {e}\nYour question was kept; ask again to retry.")
        }
        Err(e) => format!("Error: {e}"),
    }
}

/// Settings for [`run`].
#[derive(Debug, Clone)]
pub struct ReplOptions {
    /// Where `/export` writes when no path is given.
    pub transcript_file: PathBuf,
    /// Print a `> ` prompt before each read.
    pub show_prompt: bool,
}

/// Run the chat loop until `/quit` or end of input.
///
/// # Errors
///
/// Returns an error only when reading input or writing output fails.
pub async fn run<S, R, W>(
    manager: &mut ConversationManager<S>,
    mut input: R,
    output: &mut W,
    options: &ReplOptions,
) -> Result<()>
where
    S: SessionStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let greeting = match manager.persona() {
        Some(persona) => format!(
            "PEARL is emulating: {persona}\nModel: {}. Type /help for commands.",
            manager.model_id()
        ),
        None => format!(
            "Hi! I'm PEARL. Describe a persona with /persona <description>, then ask away.\nModel: {}. Type /help for commands.",
            manager.model_id()
        ),
    };
    write_block(output, &greeting).await?;

    let mut line = String::new();
    loop {
        if options.show_prompt {
            output.write_all(b"> ").await?;
            output.flush().await?;
        }
        line.clear();
        let read = input
            .read_line(&mut line)
            .await
            .context("failed to read input")?;
        if read == 0 {
            break;
        }

        let reply = match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => handle_help(),
            Command::Persona(text) => handle_persona(manager, &text),
            Command::Reset => {
                manager.reset();
                "Conversation cleared. Describe a new persona with /persona.".to_owned()
            }
            Command::History => handle_history(manager),
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| options.transcript_file.clone());
                match handle_export(manager, &path).await {
                    Ok(msg) => msg,
                    Err(e) => format!("Error: {e:#}"),
                }
            }
            Command::Archived => handle_archived(manager),
            Command::Message(text) => handle_message(manager, &text).await,
            Command::Unknown(name) => format!("Unknown command /{name}\n{}", handle_help()),
        };
        write_block(output, &reply).await?;
    }

    output.flush().await?;
    Ok(())
}

async fn write_block<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
