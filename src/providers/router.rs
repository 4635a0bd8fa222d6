//! Model router resolving configured model names to clients.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ModelsConfig;

use super::command::CommandModel;
use super::scripted::{ScriptedModel, OFFLINE_MODEL};
use super::ModelClient;

/// Model routing errors.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The requested name matches no configured model.
    #[error("unknown model '{name}', available: {available}")]
    UnknownModel {
        /// Requested name.
        name: String,
        /// Comma-separated configured names.
        available: String,
    },
    /// The configured default names no model.
    #[error("default model '{name}' is not configured")]
    DefaultUnavailable {
        /// Missing default name.
        name: String,
    },
    /// A preset has no command to run.
    #[error("model preset '{name}' has an empty command")]
    EmptyCommand {
        /// Preset name.
        name: String,
    },
}

/// Named model clients plus a default.
///
/// The offline echo model is always registered under [`OFFLINE_MODEL`].
#[derive(Clone)]
pub struct ModelRouter {
    models: HashMap<String, Arc<dyn ModelClient>>,
    default: String,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("models", &self.available())
            .field("default", &self.default)
            .finish()
    }
}

impl ModelRouter {
    /// Build a router from model config.
    ///
    /// # Errors
    ///
    /// Returns an error if a preset has an empty command or the default
    /// model is not among the registered names.
    pub fn from_config(models: &ModelsConfig) -> Result<Self, RouterError> {
        let mut registered: HashMap<String, Arc<dyn ModelClient>> = HashMap::new();
        registered.insert(OFFLINE_MODEL.to_owned(), Arc::new(ScriptedModel::echo()));

        for (name, preset) in &models.presets {
            if preset.command.trim().is_empty() {
                return Err(RouterError::EmptyCommand { name: name.clone() });
            }
            if name == OFFLINE_MODEL {
                warn!("model preset 'offline' shadows the built-in offline model");
            }
            registered.insert(
                name.clone(),
                Arc::new(CommandModel::from_preset(name, preset)),
            );
        }

        if !registered.contains_key(&models.default) {
            return Err(RouterError::DefaultUnavailable {
                name: models.default.clone(),
            });
        }
        if models.default == OFFLINE_MODEL {
            info!("default model is the offline echo model; configure [models.presets] to use a real backend");
        }

        Ok(Self {
            models: registered,
            default: models.default.clone(),
        })
    }

    /// Router serving a single client under `name`.
    pub fn single(name: &str, client: Arc<dyn ModelClient>) -> Self {
        let mut models = HashMap::new();
        models.insert(name.to_owned(), client);
        Self {
            models,
            default: name.to_owned(),
        }
    }

    /// Resolve a model by name, or the default when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownModel`] for unregistered names.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ModelClient>, RouterError> {
        let selected = name.unwrap_or(&self.default);
        self.models
            .get(selected)
            .cloned()
            .ok_or_else(|| RouterError::UnknownModel {
                name: selected.to_owned(),
                available: self.available().join(", "),
            })
    }

    /// Name of the default model.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Whether a model name is registered.
    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// All registered names in sorted order.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}
