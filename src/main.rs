//! PEARL CLI entry point.
//!
//! Provides `chat`, `models`, and `template` subcommands for running an
//! interactive persona interview, listing configured models, or printing
//! a prompt template.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};

use pearl::config::PearlConfig;
use pearl::conversation::ConversationManager;
use pearl::logging;
use pearl::prompt::PromptTemplate;
use pearl::providers::router::ModelRouter;
use pearl::providers::scripted::OFFLINE_MODEL;
use pearl::repl::{self, ReplOptions};

/// PEARL: interview a language model playing a persona.
#[derive(Parser)]
#[command(name = "pearl", version, about)]
struct Cli {
    /// Path to a config file (overrides PEARL_CONFIG_PATH).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat.
    Chat {
        /// Model to answer with (defaults to `models.default`).
        #[arg(long)]
        model: Option<String>,
        /// Persona description to install before the first prompt.
        #[arg(long, conflicts_with = "persona_file")]
        persona: Option<String>,
        /// Read the persona description from a file.
        #[arg(long)]
        persona_file: Option<PathBuf>,
        /// Use the built-in offline model regardless of configuration.
        #[arg(long, conflicts_with = "model")]
        offline: bool,
        /// Default path for `/export`.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// List configured models.
    Models,
    /// Print a prompt template.
    Template {
        /// Built-in template name (defaults to the configured template).
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = PearlConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Chat {
            model,
            persona,
            persona_file,
            offline,
            transcript,
        } => {
            let model = if offline {
                Some(OFFLINE_MODEL.to_owned())
            } else {
                model
            };
            handle_chat(config, model, persona, persona_file, transcript).await
        }
        Command::Models => handle_models(&config),
        Command::Template { name } => handle_template(&config, name.as_deref()),
    }
}

/// Run the interactive chat over stdin and stdout.
async fn handle_chat(
    config: PearlConfig,
    model: Option<String>,
    persona: Option<String>,
    persona_file: Option<PathBuf>,
    transcript: Option<PathBuf>,
) -> anyhow::Result<()> {
    let _logging_guard = match &config.logging.logs_dir {
        Some(dir) => Some(logging::init_file(dir, &config.logging.level)?),
        None => {
            logging::init_console(&config.logging.level);
            None
        }
    };

    let router = ModelRouter::from_config(&config.models).context("failed to create model router")?;
    let client = router
        .resolve(model.as_deref())
        .context("failed to select model")?;
    let template = config
        .prompt_template()
        .context("failed to load prompt template")?;

    info!(
        model = %client.model_id(),
        template = %config.chat.template,
        "pearl chat starting"
    );

    let mut manager = ConversationManager::new(client, template);

    let persona = match persona_file {
        Some(path) => Some(
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read persona file {}", path.display()))?,
        ),
        None => persona,
    };
    if let Some(text) = persona {
        manager
            .install_persona(&text)
            .context("failed to install persona")?;
    }

    let options = ReplOptions {
        transcript_file: transcript.unwrap_or_else(|| config.chat.transcript_file.clone()),
        show_prompt: true,
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    repl::run(&mut manager, stdin, &mut stdout, &options).await?;

    let leftover = manager.transcript();
    if !leftover.is_empty() {
        warn!(
            exchanges = leftover.exchanges,
            "exiting with an unexported conversation"
        );
    }
    info!("pearl chat finished");
    Ok(())
}

/// Print every registered model, marking the default.
fn handle_models(config: &PearlConfig) -> anyhow::Result<()> {
    let router = ModelRouter::from_config(&config.models).context("failed to create model router")?;
    for name in router.available() {
        let marker = if name == router.default_name() { "*" } else { " " };
        let detail = if name == OFFLINE_MODEL && !config.models.presets.contains_key(&name) {
            "built-in offline echo".to_owned()
        } else {
            config
                .models
                .presets
                .get(&name)
                .map(|preset| {
                    preset
                        .description
                        .clone()
                        .unwrap_or_else(|| preset.command.clone())
                })
                .unwrap_or_default()
        };
        println!("{marker} {name:<16} {detail}");
    }
    Ok(())
}

/// Print the source of a prompt template.
fn handle_template(config: &PearlConfig, name: Option<&str>) -> anyhow::Result<()> {
    let template = match name {
        Some(name) => PromptTemplate::builtin(name)?,
        None => config.prompt_template()?,
    };
    println!("{}", template.source());
    Ok(())
}
