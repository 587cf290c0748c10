//! Outbound build-trigger webhooks.

use futures_util::future;
use log::{error, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::state::State;

/// `User-Agent` sent with every trigger call.
pub const USER_AGENT: &str = concat!("chainreactor/", env!("CARGO_PKG_VERSION"));

/// POST to every changed trigger URL concurrently and wait for all calls.
///
/// `changed` pairs each URL with its previously committed fingerprint (if
/// any); `next` holds the freshly computed state. A call that does not
/// succeed rolls its URL back to the previous fingerprint under the shared
/// mutex, so the persisted state keeps saying "not yet triggered" and the
/// next cycle retries. A transport-level failure additionally cancels the
/// sibling calls, since it usually means the network as a whole is down;
/// an HTTP error status stays local to its target.
pub async fn dispatch_changed(
    http: &reqwest::Client,
    changed: &[(String, Option<String>)],
    next: &Mutex<State>,
) {
    let cancel = CancellationToken::new();

    let calls = changed
        .iter()
        .map(|(url, previous)| trigger_one(http, url, previous.as_deref(), next, &cancel));
    future::join_all(calls).await;
}

async fn trigger_one(
    http: &reqwest::Client,
    url: &str,
    previous: Option<&str>,
    next: &Mutex<State>,
    cancel: &CancellationToken,
) {
    let mut success = false;

    tokio::select! {
        _ = cancel.cancelled() => {}
        sent = http.post(url).header(reqwest::header::USER_AGENT, USER_AGENT).send() => {
            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    // Drain and discard the body; it carries nothing we use.
                    let _ = resp.bytes().await;

                    if status.as_u16() > 299 {
                        warn!("Couldn't trigger {}: status {}", url, status);
                    } else {
                        success = true;
                    }
                }
                Err(e) => {
                    error!("Couldn't trigger {}: {}", url, e);
                    cancel.cancel();
                }
            }
        }
    }

    if !success {
        let mut next = next.lock().await;
        match previous {
            Some(fp) => {
                next.insert(url.to_string(), fp.to_string());
            }
            None => {
                next.remove(url);
            }
        }
    }
}
