//! One build cycle: synchronize base images, fingerprint each target's
//! resolved ids, trigger the targets whose fingerprint changed, persist.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use tokio::sync::Mutex;

use crate::config::HubConfig;
use crate::dispatch::dispatch_changed;
use crate::engine::ImageEngine;
use crate::fingerprint::fingerprint;
use crate::normalize::normalize;
use crate::state::{self, State};
use crate::sync::pull_all;

/// Run one cycle for the configured hub targets.
///
/// Returns `Err` when the cycle aborted before dispatch (sync failure, image
/// listing failure, unreadable state); the previously persisted state stays
/// authoritative and the next cycle retries from scratch. Individual trigger
/// failures never abort the cycle; they only roll back that target's entry so
/// it is retried next time. A failure to persist at the end is logged and
/// tolerated, at worst the next cycle redoes the detection work.
pub async fn run_cycle(
    engine: &dyn ImageEngine,
    http: &reqwest::Client,
    hub: &[HubConfig],
    state_path: &Path,
    pull_timeout: Duration,
) -> Result<()> {
    let images: BTreeSet<String> = hub
        .iter()
        .flat_map(|h| h.base.iter())
        .map(|base| normalize(base))
        .collect();

    if images.is_empty() {
        warn!("No base images to pull");
        return Ok(());
    }

    pull_all(engine, &images, pull_timeout)
        .await
        .context("synchronizing base images")?;

    debug!("Listing images");
    let listing = engine.list_images().await.context("listing images")?;

    // Resolved image set: first repo tag keys the engine-assigned id.
    let mut ids: HashMap<String, String> = HashMap::new();
    for img in listing {
        if let Some(tag) = img.repo_tags.first() {
            ids.insert(normalize(tag), img.id);
        }
    }

    // Dependent sub-mapping per trigger URL. An image the engine could not
    // resolve stays in the map with an empty id so the fingerprint still
    // moves and the target is re-triggered rather than silently matching.
    let mut urls: HashMap<String, HashMap<String, String>> = HashMap::new();
    for h in hub {
        let deps = urls.entry(h.post.clone()).or_default();
        for base in &h.base {
            let base = normalize(base);
            let id = ids.get(&base).cloned().unwrap_or_default();
            deps.insert(base, id);
        }
    }

    let next: State = urls
        .into_iter()
        .map(|(url, deps)| (url, fingerprint(&deps)))
        .collect();

    debug!("Reading state from {}", state_path.display());
    let current = state::load(state_path).context("loading persisted state")?;

    let mut changed = Vec::new();
    for (url, fp) in &next {
        if current.get(url) == Some(fp) {
            trace!("Not triggering {}", url);
        } else {
            info!("Some images changed, triggering {}", url);
            changed.push((url.clone(), current.get(url).cloned()));
        }
    }

    let next = Mutex::new(next);
    dispatch_changed(http, &changed, &next).await;
    let next = next.into_inner();

    debug!("Writing state to {}", state_path.display());
    if let Err(e) = state::save(state_path, &next) {
        error!("Couldn't write state: {}", e);
    }

    Ok(())
}
