//! Concurrent pulling of the configured base images.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::future;
use log::{debug, error};
use tokio_util::sync::CancellationToken;

use crate::engine::ImageEngine;

/// Pull every image in `images` in parallel and wait for all pulls to
/// terminate.
///
/// The first pull that fails (or times out) cancels its siblings; cancelled
/// pulls exit quietly, cancellation is the expected unwind rather than a
/// failure of its own. Returns `Err` if any pull failed, in which case the
/// caller must not fingerprint the partial image set.
pub async fn pull_all(
    engine: &dyn ImageEngine,
    images: &BTreeSet<String>,
    timeout: Duration,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let pulls = images
        .iter()
        .map(|image| pull_one(engine, image, timeout, &cancel));
    future::join_all(pulls).await;

    if cancel.is_cancelled() {
        bail!("one or more image pulls failed");
    }
    Ok(())
}

async fn pull_one(
    engine: &dyn ImageEngine,
    image: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Pull of {} cancelled", image);
        }
        pulled = tokio::time::timeout(timeout, engine.pull(image)) => {
            let result = match pulled {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("pull timed out after {:?}", timeout)),
            };
            if let Err(e) = result {
                error!("Couldn't pull image {}: {:#}", image, e);
                cancel.cancel();
            }
        }
    }
}
