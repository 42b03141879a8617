//! postflow binary - archive a stream of posts to keyed JSONL tables
//!
//! ## Usage
//!
//! ```bash
//! cat events.jsonl | cargo run --release --bin postflow -- data/ election recount
//! cargo run --release --bin postflow -- data/ --input events.jsonl --mode overwrite --backlog 200
//! ```
//!
//! Arguments:
//! - save path (first positional) - directory for posts.jsonl / authors.jsonl
//! - filter terms (remaining positionals) - keep only posts mentioning one
//! - `--input FILE` - read events from FILE instead of stdin
//! - `--mode append|overwrite` (default: append)
//! - `--backlog N` - records accumulated before a flush (default: 500)
//!
//! Environment:
//! - RUST_LOG - logging level (optional, default: info)

use postflow::config::{ConfigError, EngineConfig, Mode, RuntimeConfig, DEFAULT_BACKLOG_SZ};
use postflow::{run_source_loop, shutdown_pair, ArchiveEngine, JsonlEventSource, SourceOutcome};
use std::env;
use std::path::PathBuf;

#[derive(Debug)]
struct CliArgs {
    save_path: PathBuf,
    filter_terms: Vec<String>,
    mode: Mode,
    backlog_sz: usize,
    input: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs, ConfigError> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut save_path: Option<PathBuf> = None;
    let mut filter_terms = Vec::new();
    let mut mode = Mode::Append;
    let mut backlog_sz = DEFAULT_BACKLOG_SZ;
    let mut input = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" | "-m" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| ConfigError::MissingArgument("--mode".to_string()))?;
                mode = value.parse()?;
                i += 2;
            }
            "--backlog" | "-b" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| ConfigError::MissingArgument("--backlog".to_string()))?;
                backlog_sz = value.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!("--backlog expects an integer, got {}", value))
                })?;
                i += 2;
            }
            "--input" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| ConfigError::MissingArgument("--input".to_string()))?;
                input = Some(PathBuf::from(value));
                i += 2;
            }
            positional => {
                if save_path.is_none() {
                    save_path = Some(PathBuf::from(positional));
                } else {
                    filter_terms.push(positional.to_string());
                }
                i += 1;
            }
        }
    }

    Ok(CliArgs {
        save_path: save_path
            .ok_or_else(|| ConfigError::MissingArgument("save path".to_string()))?,
        filter_terms,
        mode,
        backlog_sz,
        input,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let runtime = RuntimeConfig::from_env();
    env_logger::Builder::new()
        .parse_filters(&runtime.rust_log)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = parse_args()?;
    let engine_config = EngineConfig::new(&cli.save_path)
        .mode(cli.mode)
        .backlog_sz(cli.backlog_sz);
    engine_config.validate()?;

    log::info!("🚀 Starting postflow");
    log::info!("   Save path: {}", cli.save_path.display());
    log::info!("   Mode: {:?}", cli.mode);
    log::info!("   Backlog threshold: {}", cli.backlog_sz);
    if cli.filter_terms.is_empty() {
        log::info!("   Filter terms: none (keeping everything)");
    } else {
        log::warn!("Tracking terms: {:?}", cli.filter_terms);
    }

    let engine = ArchiveEngine::start(&engine_config)?;
    let sink = engine.sink();
    let (shutdown, token) = shutdown_pair();

    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Got shutdown signal!");
            signal_handle.request();
        }
    });

    let outcome = match &cli.input {
        Some(path) => {
            log::info!("📖 Reading events from {}", path.display());
            let mut source = JsonlEventSource::open(path)
                .await?
                .with_filter(cli.filter_terms.clone());
            run_source_loop(&mut source, &sink, &token).await
        }
        None => {
            log::info!("📖 Reading events from stdin");
            let mut source = JsonlEventSource::stdin().with_filter(cli.filter_terms.clone());
            run_source_loop(&mut source, &sink, &token).await
        }
    };

    match outcome {
        SourceOutcome::Exhausted => log::info!("Source finished"),
        SourceOutcome::ShutdownRequested => log::info!("Stopped by signal"),
        SourceOutcome::Terminal => log::error!("❌ Source reported a terminal error"),
        SourceOutcome::RetriesExhausted => log::error!("❌ Source retries exhausted"),
    }

    // The final flush runs inside stop() on every exit path above.
    engine.stop().await?;
    log::info!("✅ postflow exiting");

    Ok(())
}
