//! Plain-text transcript export.
//!
//! A transcript is derived from the turn history on demand and never
//! stored. Each answered question becomes two lines: the question, then
//! the answer. Anything that cannot be paired is skipped and reported as
//! a [`FormatError`] so one irregular turn never aborts the export.

use crate::session::{Role, Turn};

/// Why a turn was left out of the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A persona turn somewhere other than the start of the history.
    MisplacedPersona,
    /// A human turn with no answer following it.
    Unanswered,
    /// A human turn whose model call failed.
    FailedCall,
    /// An AI turn with no question before it.
    Orphaned,
}

impl SkipReason {
    const fn describe(self) -> &'static str {
        match self {
            Self::MisplacedPersona => "persona turn outside first position",
            Self::Unanswered => "question has no answer",
            Self::FailedCall => "model call failed for this question",
            Self::Orphaned => "answer has no preceding question",
        }
    }
}

/// A turn that could not be attributed to a question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("skipping {role} turn {index}: {}", .reason.describe())]
pub struct FormatError {
    /// Position of the turn in the history.
    pub index: usize,
    /// Role of the skipped turn.
    pub role: Role,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Rendered transcript plus export diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Transcript body, one question line and one answer line per exchange.
    pub text: String,
    /// Number of question/answer pairs rendered.
    pub exchanges: usize,
    /// Turns left out of the body.
    pub skipped: Vec<FormatError>,
}

impl Transcript {
    /// Whether no exchange was rendered.
    pub fn is_empty(&self) -> bool {
        self.exchanges == 0
    }
}

/// Render the transcript for a history.
///
/// Pure: the same history always yields byte-identical output.
pub fn render(history: &[Turn]) -> Transcript {
    let mut text = String::new();
    let mut exchanges = 0usize;
    let mut skipped = Vec::new();
    let mut pending: Option<(usize, &Turn)> = None;

    for (index, turn) in history.iter().enumerate() {
        match turn.role {
            Role::Persona => {
                if index != 0 {
                    skipped.push(skip(index, turn, SkipReason::MisplacedPersona));
                }
            }
            Role::Human => {
                if let Some((prev_index, prev)) = pending.replace((index, turn)) {
                    skipped.push(skip_unanswered(prev_index, prev));
                }
            }
            Role::Ai => match pending.take() {
                Some((_, question)) => {
                    push_line(&mut text, &question.content);
                    push_line(&mut text, &turn.content);
                    exchanges = exchanges.saturating_add(1);
                }
                None => skipped.push(skip(index, turn, SkipReason::Orphaned)),
            },
        }
    }
    if let Some((index, turn)) = pending {
        skipped.push(skip_unanswered(index, turn));
    }

    Transcript {
        text,
        exchanges,
        skipped,
    }
}

fn skip(index: usize, turn: &Turn, reason: SkipReason) -> FormatError {
    FormatError {
        index,
        role: turn.role,
        reason,
    }
}

fn skip_unanswered(index: usize, turn: &Turn) -> FormatError {
    let reason = if turn.failed {
        SkipReason::FailedCall
    } else {
        SkipReason::Unanswered
    };
    skip(index, turn, reason)
}

/// Append one transcript line, expanding literal `\n` escapes.
fn push_line(out: &mut String, content: &str) {
    out.push_str(&content.replace("\\n", "\n"));
    out.push('\n');
}
