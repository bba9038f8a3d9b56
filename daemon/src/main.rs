mod config;
mod endpoints;
mod event;
mod monitor;
mod paths;
mod phase;
mod process_monitor;
mod sink;
mod state;
mod status;

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::endpoints::SystemEndpointSampler;
use crate::monitor::Monitor;
use crate::process_monitor::SystemProcessLocator;
use crate::sink::{Indicator, IndicatorSink};
use crate::status::StatusFileSink;

/// Ticks never overlap or burst: a late tick pushes the schedule back.
fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

// The tracked-process map lives on this one thread; nothing else touches it.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // ── Logging ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("connmon=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir();
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        error!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path(&app_dir);
    let mut config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        error!("Config error (using defaults): {e:#}");
        config::Config::default()
    });

    // ── Monitor ───────────────────────────────────────────────────────────────
    let mut sink = StatusFileSink::new(paths::status_file_path(&app_dir));
    let mut monitor = Monitor::new(SystemProcessLocator::new(), SystemEndpointSampler);

    let (event_tx, mut event_rx) = mpsc::channel::<event::DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(event::DaemonEvent::Shutdown).await;
            }
        });
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        executable = phase::TARGET_EXECUTABLE,
        poll_interval_ms = config.monitor.poll_interval().as_millis() as u64,
        "connmon started"
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut ticker = poll_ticker(config.monitor.poll_interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                monitor.tick(Instant::now(), &mut sink);
            }

            evt = event_rx.recv() => match evt {
                Some(event::DaemonEvent::ConfigReloaded(new_config)) => {
                    let period = new_config.monitor.poll_interval();
                    if period != config.monitor.poll_interval() {
                        info!(poll_interval_ms = period.as_millis() as u64, "Poll interval changed");
                        ticker = poll_ticker(period);
                    } else {
                        info!("Config reloaded");
                    }
                    config = new_config;
                }

                Some(event::DaemonEvent::Shutdown) | None => {
                    info!("Shutting down");
                    break;
                }
            },
        }
    }

    sink.set_indicator(Indicator::Dormant);
}
