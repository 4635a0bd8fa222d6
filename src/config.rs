//! Configuration loading.
//!
//! Loads `config.toml` from `--config`, `$PEARL_CONFIG_PATH`, or
//! `~/.pearl/config.toml`. A missing file means defaults. Environment
//! variables override file values; file values override defaults.
//!
//! ```toml
//! [chat]
//! template = "interview"
//! transcript_file = "pearl_interview.txt"
//!
//! [models]
//! default = "llama"
//!
//! [models.presets.llama]
//! command = "ollama"
//! args = ["run", "llama3"]
//! timeout_secs = 120
//!
//! [logging]
//! level = "info"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::prompt::{PromptTemplate, TemplateError, DEFAULT_TEMPLATE};
use crate::providers::scripted::OFFLINE_MODEL;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PearlConfig {
    /// Conversation settings.
    pub chat: ChatConfig,
    /// Model presets and default selection.
    pub models: ModelsConfig,
    /// Log level and optional log directory.
    pub logging: LoggingConfig,
}

impl PearlConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::config_path_with(explicit, |key| std::env::var(key).ok())?;
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                Err(anyhow::anyhow!("failed to read config at {}: {e}", path.display()))
            }
        }
    }

    /// Resolve the config file path using a custom env resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if no explicit path is given and the home directory
    /// cannot be determined.
    pub fn config_path_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        if let Some(p) = env("PEARL_CONFIG_PATH") {
            return Ok(PathBuf::from(p));
        }
        Ok(config_dir()?.join("config.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the real environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PEARL_MODEL") {
            self.models.default = v;
        }
        if let Some(v) = env("PEARL_MODEL_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(n) if n > 0 => {
                    for preset in self.models.presets.values_mut() {
                        preset.timeout_secs = n;
                    }
                }
                _ => tracing::warn!(
                    var = "PEARL_MODEL_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("PEARL_TEMPLATE") {
            self.chat.template = v;
        }
        if let Some(v) = env("PEARL_TRANSCRIPT_FILE") {
            self.chat.transcript_file = PathBuf::from(v);
        }
        if let Some(v) = env("PEARL_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("PEARL_LOGS_DIR") {
            self.logging.logs_dir = Some(PathBuf::from(v));
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Build the prompt template this config selects.
    ///
    /// `template_path` wins over the built-in `template` name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the file is unreadable, the name is
    /// unknown, or the template is malformed.
    pub fn prompt_template(&self) -> Result<PromptTemplate, TemplateError> {
        match &self.chat.template_path {
            Some(path) => PromptTemplate::from_file(path),
            None => PromptTemplate::builtin(&self.chat.template),
        }
    }
}

/// Conversation settings (`[chat]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Built-in template name.
    pub template: String,
    /// Custom template file; overrides `template` when set.
    pub template_path: Option<PathBuf>,
    /// Default destination for `/export`.
    pub transcript_file: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_owned(),
            template_path: None,
            transcript_file: PathBuf::from("pearl_interview.txt"),
        }
    }
}

/// Model selection (`[models]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Name of the model used when none is requested.
    pub default: String,
    /// Named command-backed models.
    pub presets: BTreeMap<String, ModelPreset>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: OFFLINE_MODEL.to_owned(),
            presets: BTreeMap::new(),
        }
    }
}

/// One command-backed model (`[models.presets.<name>]`).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelPreset {
    /// Program to run.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds to wait for an answer.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Free-form description shown by `pearl models`.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_timeout_secs() -> u64 {
    120
}

/// Logging settings (`[logging]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs; console only when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            logs_dir: None,
        }
    }
}

/// Resolve the default config directory (`~/.pearl/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".pearl"))
}
