//! Spark Player - headless game client
//!
//! Loads the texture list, map and images, then drives the probe engine once
//! per frame until interrupted, the frame limit is hit, or a frame faults.
//!
//! Usage:
//!   spark-player [--base <url|dir>] [--map <path>] [--frames N] [--keyboard]

use anyhow::{bail, Context, Result};
use clap::Parser;
use spark_asset::{FileTransport, HttpTransport, PipelineStatus, ResourcePipeline, Transport};
use spark_player::{
    init_logging, Bootstrap, BootstrapOptions, KeyboardSource, LogOptions, PlayerConfig,
    ProbeFactory, RunPhase,
};
use spark_runtime::{Host, InputTracker, KeyBindings, SharedConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spark-player")]
#[command(about = "Spark game client - load a map and run the frame loop headless")]
#[command(version)]
struct Args {
    /// Config file layered over the global and project configs
    #[arg(long)]
    config: Option<PathBuf>,

    /// Asset base: an http(s) URL or a local directory
    #[arg(long)]
    base: Option<String>,

    /// Map to load, relative to the asset base
    #[arg(long)]
    map: Option<String>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Read arrow keys / WASD from the terminal (Esc or Ctrl+C quits)
    #[arg(long)]
    keyboard: bool,

    /// Log filter, e.g. "debug" or "spark_runtime=trace"
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base) = args.base {
        config.asset_base = base;
    }
    if let Some(map) = args.map {
        config.plan.map = map;
    }
    if args.log.is_some() {
        config.log_filter = args.log;
    }

    init_logging(LogOptions {
        filter: config.log_filter.clone(),
        raw_terminal: args.keyboard,
    });

    let host = Host::new(config.host_options(args.frames));
    log::info!("asset base: {}", config.asset_base);
    if config.is_remote() {
        let transport = HttpTransport::new(host.clone(), config.asset_base.clone());
        play(&host, transport, &config, args.keyboard)
    } else {
        let transport = FileTransport::new(host.clone(), config.asset_base.clone());
        play(&host, transport, &config, args.keyboard)
    }
}

fn play<T: Transport + 'static>(
    host: &Host,
    transport: T,
    config: &PlayerConfig,
    keyboard: bool,
) -> Result<()> {
    let bindings = KeyBindings::from_config(&config.input).context("Invalid key bindings")?;
    let input = InputTracker::new(bindings).shared();

    let pipeline = ResourcePipeline::new(transport, config.plan.clone());
    let bootstrap = Bootstrap::start(
        host,
        &pipeline,
        ProbeFactory,
        SharedConfig::new(config.engine.clone()),
        input.clone(),
        BootstrapOptions {
            width: config.display.width,
            height: config.display.height,
        },
    );

    let _keyboard = if keyboard {
        Some(KeyboardSource::spawn(host, input).context("Failed to open terminal keyboard")?)
    } else {
        None
    };

    let outcome = host.run();
    log::info!("{}", bootstrap.debug_report());
    outcome.context("Frame loop halted")?;

    if let PipelineStatus::Failed { stage } = pipeline.status() {
        bail!("Startup halted: failed to load the {stage}");
    }
    if let (RunPhase::Playing, Some(engine)) = (bootstrap.phase(), bootstrap.engine()) {
        let engine = engine.borrow();
        log::info!(
            "probe finished at ({:.1}, {:.1}) after {} frames",
            engine.position().0,
            engine.position().1,
            engine.frames()
        );
    }
    Ok(())
}
