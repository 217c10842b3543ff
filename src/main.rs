mod cli;
mod config;
mod coordinator;
mod error;
mod key;
mod metadata;
mod paths;
mod progress;
mod router;
mod scanner;
mod state;
mod transfer;
mod watcher;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Command;
use config::Config;
use coordinator::{RunCoordinator, SystemFolderOpener};
use metadata::ExifExtractor;
use progress::{ConsoleSink, RunEvent};
use router::FileRouter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use watcher::VolumeWatcher;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let loaded = Config::load_for_startup(args.config.as_deref());
    for warning in &loaded.warnings {
        eprintln!("Warning: {}; using defaults", warning);
    }
    let config_path = loaded.path;
    let mut config = loaded.config;

    // Per-process overrides
    if let Some(ref output) = args.output {
        config.output.directory = output.clone();
    }
    if args.no_open {
        config.output.open_when_done = false;
    }

    init_logging(args.log_level.as_deref(), &config.logging.level);
    if let Some(ref path) = config_path {
        log::debug!("Using config {}", path.display());
    }

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&config),
        Command::Run { volume, json } => run_once(&config, &volume, json),
        Command::SetOutput { directory } => {
            let path = config_path.context("no config location on this system; pass --config <file>")?;
            let saved = Config::set_output_dir(&path, directory)?;
            println!(
                "Output directory set to {} ({})",
                saved.output.directory.display(),
                path.display()
            );
            Ok(())
        }
        Command::ShowConfig => {
            match config_path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# built-in defaults"),
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// `--log-level` wins over `RUST_LOG`, which wins over the config file.
fn init_logging(cli_level: Option<&str>, config_level: &str) {
    let mut builder = match cli_level {
        Some(level) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(level);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config_level)),
    };
    builder.init();
}

fn build_coordinator(config: &Config, events: crossbeam_channel::Sender<RunEvent>) -> Result<Arc<RunCoordinator>> {
    std::fs::create_dir_all(&config.output.directory)?;
    let router = FileRouter::new(Arc::new(ExifExtractor), &config.output.directory);
    let coordinator = RunCoordinator::new(
        router,
        config.run_settings(),
        events,
        Arc::new(SystemFolderOpener),
    )?;
    Ok(Arc::new(coordinator))
}

fn watch(config: &Config) -> Result<()> {
    let (run_tx, run_rx) = crossbeam_channel::unbounded();
    let sink = ConsoleSink::spawn(run_rx);
    let coordinator = build_coordinator(config, run_tx)?;
    log::info!("Output directory: {}", config.output.directory.display());

    let (volume_tx, volume_rx) = crossbeam_channel::unbounded();
    let _watcher = VolumeWatcher::start(
        config.watch.mount_roots.clone(),
        config.scan.media_dir.clone(),
        Duration::from_millis(config.watch.poll_interval_ms),
        volume_tx,
    );
    watcher::listen(&coordinator, volume_rx);

    drop(coordinator);
    let _ = sink.join();
    Ok(())
}

fn run_once(config: &Config, volume: &Path, json: bool) -> Result<()> {
    if !volume.is_dir() {
        anyhow::bail!("Volume is not a directory: {}", volume.display());
    }

    let (run_tx, run_rx) = crossbeam_channel::unbounded();
    let sink = ConsoleSink::spawn(run_rx);
    let coordinator = build_coordinator(config, run_tx)?;
    let outcome = coordinator.process_volume(volume);

    // Flush the sink before printing anything else.
    drop(coordinator);
    let _ = sink.join();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(reason) => anyhow::bail!("Nothing to do for {}: {}", volume.display(), reason),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Done. {} copied, {} skipped, {} failed.",
            summary.copied, summary.skipped, summary.failed
        );
    }
    Ok(())
}
