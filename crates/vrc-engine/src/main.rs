//! Video recompression CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrc_engine::{
    parse_manifest, run_batch, CancelHandle, EngineConfig, EngineError, InvocationOptions,
    Recompressor, Settings,
};

#[derive(Debug, Parser)]
#[command(name = "vrc", version, about = "Shrink videos that exceed size or dimension limits")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process one video and print the result as JSON
    Process {
        input: PathBuf,
        output: PathBuf,
        /// Settings as a JSON object
        #[arg(long, conflicts_with = "settings_file")]
        settings: Option<String>,
        /// Path to a JSON settings file
        #[arg(long)]
        settings_file: Option<PathBuf>,
        /// Cancel the invocation after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Report progress on stderr
        #[arg(long)]
        progress: bool,
    },
    /// Print media information as JSON
    Analyze { input: PathBuf },
    /// Print engine capabilities as JSON
    Info,
    /// Print the JSON Schema of the settings object
    Schema,
    /// Process every entry of a JSON manifest concurrently
    Batch {
        manifest: PathBuf,
        /// Overrides VRC_MAX_CONCURRENT
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let recompressor = Recompressor::new(EngineConfig::from_env());

    let code = match run(cli.command, &recompressor).await {
        Ok(code) => code,
        Err(e) => {
            let report = match e.downcast_ref::<EngineError>() {
                Some(engine) => engine.to_report(),
                None => vrc_engine::ErrorReport {
                    code: "INVALID_ARGUMENT".to_string(),
                    message: format!("{:#}", e),
                },
            };
            eprintln!(
                "{}",
                serde_json::to_string(&report).unwrap_or_else(|_| report.message.clone())
            );
            1
        }
    };

    std::process::exit(code);
}

/// Logs go to stderr so stdout carries only JSON results.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vrc_engine=info,vrc_media=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(command: Command, recompressor: &Recompressor) -> anyhow::Result<i32> {
    match command {
        Command::Process {
            input,
            output,
            settings,
            settings_file,
            timeout_secs,
            progress,
        } => {
            let settings = load_settings(settings.as_deref(), settings_file.as_deref()).await?;
            let cancel = CancelHandle::new();
            spawn_cancel_triggers(&cancel, timeout_secs.map(Duration::from_secs));

            let mut options = InvocationOptions::default().with_cancel(cancel.signal());
            if progress {
                options = options.with_progress(|fraction| {
                    eprintln!("progress: {:.1}%", fraction * 100.0);
                });
            }

            let result = recompressor
                .process_video_with(&input, &output, &settings, options)
                .await?;
            print_json(&result)?;
            Ok(0)
        }
        Command::Analyze { input } => {
            let info = recompressor.analyze_video(&input).await?;
            print_json(&info)?;
            Ok(0)
        }
        Command::Info => {
            print_json(&recompressor.capabilities())?;
            Ok(0)
        }
        Command::Schema => {
            print_json(&schemars::schema_for!(Settings))?;
            Ok(0)
        }
        Command::Batch {
            manifest,
            max_concurrent,
        } => {
            let raw = tokio::fs::read_to_string(&manifest)
                .await
                .with_context(|| format!("failed to read manifest {}", manifest.display()))?;
            let jobs = parse_manifest(&raw)
                .with_context(|| format!("invalid manifest {}", manifest.display()))?;

            let cancel = CancelHandle::new();
            spawn_cancel_triggers(&cancel, None);

            let limit = max_concurrent.unwrap_or(recompressor.config().max_concurrent);
            let outcomes = run_batch(recompressor, jobs, limit, Some(cancel.signal())).await;
            print_json(&outcomes)?;

            Ok(if outcomes.iter().all(|o| o.is_success()) { 0 } else { 1 })
        }
    }
}

/// Settings from `--settings`, `--settings-file`, or defaults.
async fn load_settings(
    inline: Option<&str>,
    file: Option<&Path>,
) -> anyhow::Result<Map<String, Value>> {
    let raw = match (inline, file) {
        (Some(json), _) => json.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read settings file {}", path.display()))?,
        (None, None) => return Ok(Map::new()),
    };

    let value: Value = serde_json::from_str(&raw).context("settings are not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => {
            // Reuse the settings parser's wording for the non-object case
            let err = Settings::from_value(&other)
                .err()
                .map(EngineError::from)
                .unwrap_or_else(|| EngineError::InvalidSettings {
                    key: "settings".to_string(),
                    reason: "expected an object".to_string(),
                });
            Err(err.into())
        }
    }
}

/// Fire `cancel` on Ctrl-C or after `timeout`.
fn spawn_cancel_triggers(cancel: &CancelHandle, timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling");
            on_signal.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            info!(timeout_secs = timeout.as_secs(), "Timeout reached, cancelling");
            on_timeout.cancel();
        });
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
