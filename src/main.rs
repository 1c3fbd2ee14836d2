//! mc-lang-tts: озвучка строк локализации Minecraft
//!
//! Точка входа командной строки. Библиотека делает всю работу, здесь только
//! разбор аргументов, сборка зависимостей и код завершения.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use mc_lang_tts::auth::TokenSource;
use mc_lang_tts::logger;
use mc_lang_tts::progress::ConsoleProgressObserver;
use mc_lang_tts::reference;
use mc_lang_tts::storage;
use mc_lang_tts::tts::GoogleTtsClient;
use mc_lang_tts::utils::ffmpeg::{self, FfmpegConverter};
use mc_lang_tts::{Pipeline, PipelineConfig, RunOptions};

#[derive(Parser)]
#[command(name = "mc-lang-tts")]
#[command(version)]
#[command(about = "Generate Minecraft localization audio with Google TTS and sync it to storage")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline (default)
    Run(RunArgs),

    /// Check that ffmpeg and Google credentials are available
    Check,

    /// Fetch the Google voice list and save the catalog snapshot
    FetchVoices,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Process only this language code (repeatable)
    #[arg(long, value_name = "CODE")]
    only: Vec<String>,

    /// Reconcile and report without generating or uploading
    #[arg(long)]
    dry_run: bool,

    /// Do not archive processed files after the run
    #[arg(long)]
    no_archive: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));
    let log_file = match command {
        Command::Run(_) => Some(config.log_file.as_path()),
        _ => None,
    };
    logger::init_logger(log_file).context("Failed to initialize logging")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let tokens = Arc::new(TokenSource::new(config.access_token.clone()));

    match command {
        Command::Run(args) => run_pipeline(config, http, tokens, args).await,
        Command::Check => check_dependencies(&config, &tokens).await,
        Command::FetchVoices => fetch_voices(&config, http, tokens).await,
    }
}

async fn run_pipeline(
    config: PipelineConfig,
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    args: RunArgs,
) -> Result<()> {
    let ffmpeg_binary = ffmpeg::locate_ffmpeg(config.ffmpeg_path.as_deref())?;
    log::info!("Using ffmpeg at {}", ffmpeg_binary.display());

    let converter = Arc::new(FfmpegConverter::new(
        ffmpeg_binary,
        Duration::from_secs(config.conversion_timeout_secs),
    ));
    let synthesizer = Arc::new(GoogleTtsClient::new(http.clone(), &config.tts, tokens.clone()));
    let store = storage::from_config(&config, http, tokens);

    let mut pipeline = Pipeline::new(config, synthesizer, converter, store);
    pipeline.add_observer(Box::new(ConsoleProgressObserver::new()));

    let options = RunOptions {
        only: args.only,
        dry_run: args.dry_run,
        archive: !args.no_archive,
    };

    let summary = pipeline.run(&options).await.context("Run aborted")?;

    println!(
        "Run {} finished: {} done, {} skipped, {} failed",
        summary.label,
        summary.count_done(),
        summary.count_skipped(),
        summary.count_failed()
    );
    Ok(())
}

async fn check_dependencies(config: &PipelineConfig, tokens: &TokenSource) -> Result<()> {
    let mut problems = Vec::new();

    match ffmpeg::locate_ffmpeg(config.ffmpeg_path.as_deref()) {
        Ok(binary) => match ffmpeg::ffmpeg_version(&binary).await {
            Ok(version) => println!("ffmpeg: {}", version),
            Err(e) => problems.push(format!("ffmpeg did not respond to -version: {}", e)),
        },
        Err(e) => problems.push(e.to_string()),
    }

    if config.tts.api_key.is_some() {
        println!("Google TTS: API key configured");
    } else {
        match tokens.token().await {
            Ok(_) => println!("Google credentials: access token available"),
            Err(e) => problems.push(e.to_string()),
        }
    }

    if problems.is_empty() {
        println!("All dependencies are available");
        return Ok(());
    }
    for problem in &problems {
        eprintln!("  - {}", problem);
    }
    anyhow::bail!("{} dependency check(s) failed", problems.len())
}

async fn fetch_voices(
    config: &PipelineConfig,
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
) -> Result<()> {
    let client = GoogleTtsClient::new(http, &config.tts, tokens);
    let catalog = client.list_voices().await.context("Failed to fetch voice list")?;

    let path = config.voice_catalog_path();
    reference::save_catalog_snapshot(&path, &catalog)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {} voices to {}", catalog.len(), path.display());
    Ok(())
}
