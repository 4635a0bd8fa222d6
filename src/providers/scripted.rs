//! Model client with scripted replies.
//!
//! Used by tests to stub the model, and by offline runs where no backend
//! is configured. Every prompt received is recorded for inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ModelClient, ModelError};

/// Model name registered for the built-in offline client.
pub const OFFLINE_MODEL: &str = "offline";

#[derive(Debug)]
enum Step {
    Reply(String),
    Fail(String),
}

/// What to do once the scripted steps run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exhausted {
    /// Fail with [`ModelError::Unavailable`].
    Fail,
    /// Answer with the last `Human:` line of the prompt.
    Echo,
}

/// Replays queued replies and failures in order.
#[derive(Debug)]
pub struct ScriptedModel {
    id: String,
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    exhausted: Exhausted,
}

impl ScriptedModel {
    /// Client that answers with `replies` in order, then fails.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: "scripted".to_owned(),
            steps: Mutex::new(replies.into_iter().map(|r| Step::Reply(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            exhausted: Exhausted::Fail,
        }
    }

    /// Client that repeats the researcher's latest question back.
    pub fn echo() -> Self {
        Self {
            id: OFFLINE_MODEL.to_owned(),
            steps: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            exhausted: Exhausted::Echo,
        }
    }

    /// Queue another reply.
    #[must_use]
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.push(Step::Reply(reply.into()));
        self
    }

    /// Queue a failure; the next call returns [`ModelError::Unavailable`].
    #[must_use]
    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.push(Step::Fail(reason.into()));
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push(&self, step: Step) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_owned());
        }

        let next = self
            .steps
            .lock()
            .map_err(|_| ModelError::Unavailable("script lock poisoned".to_owned()))?
            .pop_front();

        match (next, self.exhausted) {
            (Some(Step::Reply(text)), _) => Ok(text),
            (Some(Step::Fail(reason)), _) => Err(ModelError::Unavailable(reason)),
            (None, Exhausted::Echo) => Ok(echo_reply(prompt)),
            (None, Exhausted::Fail) => Err(ModelError::Unavailable(
                "scripted replies exhausted".to_owned(),
            )),
        }
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

fn echo_reply(prompt: &str) -> String {
    let question = prompt
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix("Human: "))
        .unwrap_or(prompt)
        .trim();
    format!("(offline) You asked: {question}")
}
