//! vxa-play: command-line player
//!
//! Plays the given files one after another through the streaming core. A
//! 10 ms tick drives fades; Ctrl-C fades the current file out and exits.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vxa_player::{PlayerConfig, StreamHandle, StreamRegistry};

/// Interval between registry updates
const UPDATE_INTERVAL_MS: u64 = 10;

/// Command-line arguments for vxa-play
#[derive(Parser, Debug)]
#[command(name = "vxa-play")]
#[command(about = "Stream audio files through the vxa playback core")]
#[command(version)]
struct Args {
    /// Configuration file (default: $VXA_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Loop each file until interrupted
    #[arg(short = 'l', long = "loop")]
    looping: bool,

    /// Compute exact durations for files that do not declare one
    #[arg(long)]
    prescan: bool,

    /// Global volume in percent
    #[arg(long, default_value_t = 100.0)]
    volume: f32,

    /// Fade-in duration in seconds
    #[arg(long, default_value_t = 0.0)]
    fade_in: f32,

    /// Fade-out duration on Ctrl-C in seconds
    #[arg(long, default_value_t = 1.0)]
    fade_out: f32,

    /// Audio files to play
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

enum Outcome {
    Finished,
    Interrupted,
}

async fn play_until_done<F>(
    registry: &StreamRegistry,
    handle: StreamHandle,
    ctrl_c: &mut Pin<&mut F>,
    ticker: &mut Interval,
    fade_out: f32,
) -> Outcome
where
    F: Future<Output = std::io::Result<()>>,
{
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                registry.update();
                if registry.state(handle).map_or(true, |state| state.is_closing())
                    || registry.is_finished(handle)
                {
                    return Outcome::Finished;
                }
            }
            result = ctrl_c.as_mut() => {
                if let Err(e) = result {
                    warn!("Signal handler failed: {}", e);
                }
                info!("Interrupted, fading out over {:.1}s", fade_out);
                registry.fade_and_close(handle, 0.0, fade_out);
                while registry.state(handle).map_or(false, |state| !state.is_closing()) {
                    ticker.tick().await;
                    registry.update();
                }
                return Outcome::Interrupted;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = Arc::new(StreamRegistry::with_config(config).context("Failed to start playback core")?);
    registry.set_global_volume(args.volume);

    let mut ticker = tokio::time::interval(Duration::from_millis(UPDATE_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for path in &args.files {
        let handle = registry.load(path, args.prescan);
        if !handle.is_valid() {
            warn!("Skipping {}", path.display());
            continue;
        }
        info!("Playing {} ({:.1}s)", path.display(), registry.length(handle));

        if args.fade_in > 0.0 {
            registry.set_volume(handle, 0.0);
            registry.fade(handle, 100.0, args.fade_in);
        }
        registry.play(handle, args.looping);

        match play_until_done(&registry, handle, &mut ctrl_c, &mut ticker, args.fade_out).await {
            Outcome::Finished => registry.close(handle),
            Outcome::Interrupted => break,
        }
    }

    // Teardown joins threads; keep it off the async workers
    let shutdown_registry = Arc::clone(&registry);
    tokio::task::spawn_blocking(move || shutdown_registry.shutdown())
        .await
        .context("Shutdown task failed")?;

    info!("Playback complete");
    Ok(())
}
