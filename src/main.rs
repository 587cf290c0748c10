//! Chainreactor daemon entry point.
//!
//! Owns everything outside the build cycle itself: logging setup, config
//! loading and hot reload (via a filesystem watcher on the working
//! directory), cron scheduling, and signal handling. The core is driven
//! through a single call per tick, [`cycle::run_cycle`].

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use cron::Schedule;
use log::{error, info, trace, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use chainreactor::config::Config;
use chainreactor::cycle;
use chainreactor::engine::DockerEngine;

const WATCH_PATH: &str = ".";
const CONFIG_FILES: [&str; 2] = ["chainreactor.toml", "chainreactor.json"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Start wide open; the effective level comes from the config below.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();

    let (fs_tx, mut fs_rx) = mpsc::channel(16);
    let _watcher = watch_config(fs_tx)?;

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

    'reload: loop {
        let plan = match load_config() {
            Ok((cfg, schedule)) => Some((cfg, schedule)),
            Err(e) => {
                // Stay idle until the config file changes again.
                error!("Bad configuration: {:#}", e);
                None
            }
        };

        let mut next_build = schedule_next(plan.as_ref());

        loop {
            tokio::select! {
                _ = sleep_until(next_build) => {
                    if let Some((cfg, _)) = &plan {
                        info!("Building");
                        build(cfg).await;
                    }
                    next_build = schedule_next(plan.as_ref());
                }
                Some(res) = fs_rx.recv() => {
                    // A watcher error means config edits can no longer be
                    // seen; that is fatal, matching a failed setup.
                    if handle_fs_event(res)? {
                        continue 'reload;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Terminating");
                    return Ok(());
                }
                _ = sigterm.recv() => {
                    warn!("Terminating");
                    return Ok(());
                }
            }
        }
    }
}

fn load_config() -> anyhow::Result<(Config, Schedule)> {
    info!("Loading config");
    let cfg = Config::load()?;
    let validated = cfg.validate()?;

    trace!(
        "Changing log level from {} to {}",
        log::max_level(),
        validated.log_level
    );
    log::set_max_level(validated.log_level);

    Ok((cfg, validated.schedule))
}

fn schedule_next(plan: Option<&(Config, Schedule)>) -> Option<DateTime<Utc>> {
    let next = plan.and_then(|(_, schedule)| schedule.upcoming(Utc).next());
    if let Some(at) = next {
        info!("Scheduling next build at {}", at);
    }
    next
}

async fn sleep_until(next: Option<DateTime<Utc>>) {
    match next {
        Some(at) => {
            let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
        }
        None => std::future::pending().await,
    }
}

/// Watch the working directory for config edits, forwarding events (and
/// watcher errors) into a tokio channel. The watcher must stay alive for as
/// long as events are wanted.
fn watch_config(tx: mpsc::Sender<notify::Result<notify::Event>>) -> anyhow::Result<RecommendedWatcher> {
    trace!("Setting up FS watcher");

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        // blocking_send is fine here, the callback runs on notify's thread
        let _ = tx.blocking_send(res);
    })
    .context("setting up FS watcher")?;

    watcher
        .watch(Path::new(WATCH_PATH), RecursiveMode::NonRecursive)
        .context("watching working directory")?;

    Ok(watcher)
}

/// Decide what a watcher message means for the reload loop: `Ok(true)`
/// restarts config loading, `Ok(false)` is noise, `Err` ends the process
/// (the watcher is broken, so config edits would go unnoticed).
fn handle_fs_event(res: notify::Result<notify::Event>) -> anyhow::Result<bool> {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!("FS watcher error: {}", e);
            return Err(e).context("FS watcher failed");
        }
    };

    trace!("Got FS event: {:?}", event);

    if matches!(event.kind, EventKind::Access(_)) {
        return Ok(false);
    }
    Ok(event.paths.iter().any(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| CONFIG_FILES.contains(&name))
    }))
}


async fn build(cfg: &Config) {
    let engine = match DockerEngine::connect() {
        Ok(engine) => engine,
        Err(e) => {
            error!("Couldn't set up Docker client: {:#}", e);
            return;
        }
    };

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.trigger_timeout_secs))
        .build()
    {
        Ok(http) => http,
        Err(e) => {
            error!("Couldn't set up HTTP client: {}", e);
            return;
        }
    };

    if let Err(e) = cycle::run_cycle(
        &engine,
        &http,
        &cfg.hub,
        &cfg.state_path,
        Duration::from_secs(cfg.pull_timeout_secs),
    )
    .await
    {
        error!("Build cycle aborted: {:#}", e);
    }
}
