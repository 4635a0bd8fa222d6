//! Prompt templates.
//!
//! A template is plain text with three recognized placeholders:
//! `{persona}`, `{history}` and `{input}`. Templates are parsed once into
//! segments and rendered in a single pass, so braces that appear inside
//! persona or user text are copied through untouched.

use std::fmt::Write as _;
use std::path::Path;

use regex::Regex;

use crate::session::{Role, Turn};

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Name of the template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "interview";

const INTERVIEW_TEMPLATE: &str = "\
You are following persona: {persona}. You are participating in an interview with a researcher. \
Respond to the questions asked by the researcher. Respond to one question at a time.
Your main objective is to stay in character throughout the entire conversation, adapting to the \
persona's characteristics, mannerisms, and knowledge.
Please provide a coherent, engaging, and in-character response to any questions or statements you receive.

Current conversation:
{history}
Human: {input}
AI:";

const CONVERSATION_TEMPLATE: &str = "\
You are following persona: {persona}. Engage in conversations with a researcher.
Your main objective is to stay in character throughout the entire conversation, adapting to the \
persona's characteristics, mannerisms, and knowledge.
Please provide a coherent, engaging, and in-character response to any questions or statements you receive. \
You are being interviewed by a researcher, so answer one question at a time in a way that is helpful to the researcher.

Current conversation:
{history}
Human: {input}
AI:";

const BUILTINS: &[(&str, &str)] = &[
    ("interview", INTERVIEW_TEMPLATE),
    ("conversation", CONVERSATION_TEMPLATE),
];

/// Template parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A `{name}` placeholder other than persona, history or input.
    #[error("unknown placeholder '{{{name}}}' in prompt template")]
    UnknownPlaceholder {
        /// The unrecognized placeholder name.
        name: String,
    },
    /// The template never inserts the user's message.
    #[error("prompt template must contain an {{input}} placeholder")]
    MissingInput,
    /// No built-in template with this name.
    #[error("no built-in prompt template named '{0}'")]
    UnknownBuiltin(String),
    /// Template file could not be read.
    #[error("failed to read prompt template {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Placeholder matcher failed to compile.
    #[error("placeholder pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Recognized template placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The active persona description.
    Persona,
    /// Prior conversation as `Human:` / `AI:` lines.
    History,
    /// The new user message.
    Input,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "persona" => Some(Self::Persona),
            "history" => Some(Self::History),
            "input" => Some(Self::Input),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownPlaceholder`] for unrecognized
    /// `{name}` slots and [`TemplateError::MissingInput`] when `{input}`
    /// is absent.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
        let mut segments = Vec::new();
        let mut cursor = 0usize;

        for caps in pattern.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let placeholder =
                Placeholder::from_name(name.as_str()).ok_or_else(|| {
                    TemplateError::UnknownPlaceholder {
                        name: name.as_str().to_owned(),
                    }
                })?;
            if whole.start() > cursor {
                segments.push(Segment::Literal(source[cursor..whole.start()].to_owned()));
            }
            segments.push(Segment::Slot(placeholder));
            cursor = whole.end();
        }
        if cursor < source.len() {
            segments.push(Segment::Literal(source[cursor..].to_owned()));
        }

        if !segments.contains(&Segment::Slot(Placeholder::Input)) {
            return Err(TemplateError::MissingInput);
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Look up a built-in template by name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownBuiltin`] for unknown names.
    pub fn builtin(name: &str) -> Result<Self, TemplateError> {
        let (_, text) = BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| TemplateError::UnknownBuiltin(name.to_owned()))?;
        Self::parse(text)
    }

    /// Names of all built-in templates.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTINS.iter().map(|(n, _)| *n)
    }

    /// Read and parse a template file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] if the file is unreadable, or a parse error.
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the template inserts the given placeholder.
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.segments.contains(&Segment::Slot(placeholder))
    }

    /// Assemble a prompt.
    ///
    /// `prior` is the history before the new message; the persona turn and
    /// failed human turns are left out of the `{history}` block.
    pub fn render(&self, persona: &str, prior: &[Turn], input: &str) -> String {
        let history = render_history(prior);
        let mut out = String::with_capacity(
            self.source
                .len()
                .saturating_add(persona.len())
                .saturating_add(history.len())
                .saturating_add(input.len()),
        );
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(Placeholder::Persona) => out.push_str(persona),
                Segment::Slot(Placeholder::History) => out.push_str(&history),
                Segment::Slot(Placeholder::Input) => out.push_str(input),
            }
        }
        out
    }
}

/// Render prior turns as `Human: ...` / `AI: ...` lines.
pub fn render_history(prior: &[Turn]) -> String {
    let mut out = String::new();
    for turn in prior
        .iter()
        .filter(|t| t.role != Role::Persona && !t.failed)
    {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{}: {}", turn.role.label(), turn.content);
    }
    out
}
