mod commands;

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use vodar_core::{
    load_vodar_config, PipelineError, StoreError, TwitchError, VideoStatusStore, VodarConfig,
    WatchdogError,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vodar_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("twitch api error: {0}")]
    Twitch(#[from] TwitchError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "VOD archiver control interface", long_about = None)]
pub struct Cli {
    /// Path to the main configuration file
    #[arg(long, default_value = "configs/vodar.toml")]
    pub config: PathBuf,
    /// Alternative path for the status database
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the configured channel and archive new VODs until interrupted
    Run,
    /// Download a single VOD by id
    Fetch(FetchArgs),
    /// List tracked videos and their statuses
    Vods(VodsArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Video id to download
    pub video_id: String,
    /// Destination directory (defaults to the configured work dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VodsArgs {
    /// Filter by status (e.g. "downloaded" or "VIDEO_STATUS_DOWNLOADED")
    #[arg(long)]
    pub status: Option<String>,
    /// Limit of rows returned
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();
    match &cli.command {
        Commands::Run => commands::run::execute(&cli),
        Commands::Fetch(args) => commands::fetch::execute(&cli, args),
        Commands::Vods(args) => {
            let rows = commands::vods::execute(&cli, args)?;
            render(&rows, cli.format)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(args.shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

pub(crate) fn load_config(cli: &Cli) -> Result<VodarConfig> {
    Ok(load_vodar_config(&cli.config)?)
}

pub(crate) fn open_store(cli: &Cli, config: &VodarConfig) -> Result<VideoStatusStore> {
    let path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database_path());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(VideoStatusStore::builder().path(path).build()?)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for Vec<commands::vods::VodRow> {
    fn display(&self) -> String {
        if self.is_empty() {
            return "no videos tracked".to_string();
        }
        self.iter()
            .map(|row| {
                format!(
                    "{}  {}  {}  {}s  {}",
                    row.id, row.status, row.published_at, row.duration, row.title
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
