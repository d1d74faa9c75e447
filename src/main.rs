use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use justice_bot::{ChatSession, Config, PathFileSource, ReplyOutcome, SubmitOutcome};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "justice-bot")]
#[command(version)]
#[command(about = "Chat with the Justice Bot legal-information assistant", long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.justice-bot/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat interface (default)
    Chat,
    /// Ask a single question and print the conversation
    Ask {
        /// The question
        text: Vec<String>,
        /// Attach a file (repeatable)
        #[arg(short, long = "attach")]
        attach: Vec<PathBuf>,
        /// Print the conversation as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Log to stderr for one-shot commands
fn init_stderr_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("justice_bot={},warn", config.ui.log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Log to a file while the TUI owns the screen
fn init_file_tracing(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.home)
        .context("Failed to create .justice-bot directory")?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .with_context(|| format!("Failed to open log file {}", config.log_path().display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("justice_bot={},warn", config.ui.log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}

async fn ask(config: &Config, text: &str, attach: Vec<PathBuf>, json: bool) -> Result<()> {
    let mut session = ChatSession::from_config(config);
    session.bootstrap()?;

    if !attach.is_empty() {
        let source = PathFileSource::new(attach)
            .with_accepted_extensions(&config.attachments.accepted_extensions);
        session.stage(&source).context("Failed to attach files")?;
    }

    let conversation_id = match session.submit_active(text)? {
        SubmitOutcome::Sent { conversation_id, .. } => conversation_id,
        SubmitOutcome::Rejected => bail!("Nothing to send: give a question or attach a file"),
        SubmitOutcome::Bootstrapped { .. } => bail!("No conversation was active"),
    };

    if let Some(ReplyOutcome::Failed { error, .. }) = session.next_reply().await {
        eprintln!("⚠️  No reply: {}", error);
    }

    if json {
        let conversation = session
            .store()
            .get(&conversation_id)
            .context("Conversation disappeared")?;
        println!("{}", serde_json::to_string_pretty(conversation)?);
    } else {
        print!("{}", session.transcript(&conversation_id, &config.bot_name)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            init_file_tracing(&config)?;
            justice_bot::app::run(config).await
        }
        Commands::Ask { text, attach, json } => {
            init_stderr_tracing(&config);
            ask(&config, &text.join(" "), attach, json).await
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
            Ok(())
        }
    }
}
