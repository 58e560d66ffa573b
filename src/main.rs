use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use furrow_cli::config::{self, LoadedConfig};
use furrow_cli::output;
use furrow_cli::plans;
use furrow_cli::telemetry::{self, LogFormat};
use interrogation_flow::{BrowserSessionFactory, InterrogationEngine};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

/// Furrow - scripted interrogation of a chat assistant UI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log filter when FURROW_LOG and RUST_LOG are unset
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the planned conversations and write transcripts
    Run(RunArgs),

    /// Manage Furrow configuration
    Config(ConfigArgs),

    /// Inspect the selector fallback lists
    Selectors(SelectorsArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Conversation plan file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    plans: PathBuf,

    /// Write transcripts to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Override the conversation cap for this run
    #[arg(long, value_name = "N")]
    max_conversations: Option<usize>,

    /// Override the per-conversation exchange cap
    #[arg(long, value_name = "N")]
    max_exchanges: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration as YAML
    Show,

    /// Check the configuration file
    Validate,
}

#[derive(Args)]
struct SelectorsArgs {
    #[command(subcommand)]
    action: SelectorsAction,
}

#[derive(Subcommand)]
enum SelectorsAction {
    /// Show the effective selector set and its revision
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init(&cli.log_level, cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_HASH"),
        "Starting Furrow"
    );

    let loaded = config::load_config(cli.config.as_deref()).await?;

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, loaded).await,
        Commands::Config(args) => cmd_config(args, loaded).await,
        Commands::Selectors(args) => cmd_selectors(args, loaded),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn cmd_run(args: RunArgs, loaded: LoadedConfig) -> Result<()> {
    let mut config = loaded.config;
    config.apply_env_overrides();
    if let Some(cap) = args.max_conversations {
        config.limits.max_conversations_per_run = cap;
    }
    if let Some(cap) = args.max_exchanges {
        config.limits.max_exchanges_per_conversation = cap;
    }
    if args.headed {
        config.session.headless = false;
    }
    config.validate()?;

    let plans = plans::load_plans(&args.plans).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing the current exchange");
                cancel.cancel();
            }
        });
    }

    let factory = Arc::new(BrowserSessionFactory::new(config.session_config()));
    let engine = InterrogationEngine::new(factory, config.engine_settings())
        .with_cancellation(cancel.clone());

    let transcripts = engine.run(&plans).await;

    let failed = transcripts.iter().filter(|t| t.is_failed()).count();
    let answered = transcripts
        .iter()
        .flat_map(|t| &t.exchanges)
        .filter(|e| !e.response.is_error())
        .count();
    info!(
        conversations = transcripts.len(),
        failed_conversations = failed,
        answered_exchanges = answered,
        "run finished"
    );

    output::write_transcripts(&transcripts, args.output.as_deref()).await?;

    let any_answer = transcripts
        .iter()
        .any(|t| t.exchanges.iter().any(|e| !e.response.is_error()));
    if !cancel.is_cancelled() && !transcripts.is_empty() && !any_answer {
        bail!(
            "every conversation failed: no answer captured across {} conversations",
            transcripts.len()
        );
    }

    Ok(())
}

async fn cmd_config(args: ConfigArgs, loaded: LoadedConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let mut config = loaded.config;
            config.apply_env_overrides();
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigAction::Validate => {
            loaded.config.validate()?;
            let exists = tokio::fs::try_exists(&loaded.path).await.unwrap_or(false);
            if exists {
                println!("Configuration {} is valid", loaded.path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    loaded.path.display()
                );
            }
        }
    }
    Ok(())
}

fn cmd_selectors(args: SelectorsArgs, loaded: LoadedConfig) -> Result<()> {
    match args.action {
        SelectorsAction::Show => {
            print!("{}", serde_yaml::to_string(&loaded.config.selectors)?);
        }
    }
    Ok(())
}
