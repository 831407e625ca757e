//! Per-client poller (spec §4.7 trigger 2): wakes every `poll_interval`,
//! fetches state from each configured client for every active book, and
//! enqueues a sync for any book whose observed state moved since the last
//! cycle — independent of whether the event listener caught it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::client::Client;
use crate::storage::Store;

/// Runs forever, waking every `poll_interval_seconds`.
pub async fn run(
    clients: Vec<Arc<dyn Client>>,
    store: Arc<Store>,
    poll_interval_seconds: u64,
    enqueue: mpsc::UnboundedSender<String>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(poll_interval_seconds.max(1)));
    loop {
        ticker.tick().await;

        let mappings = match store.list_active_mappings().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "poller: failed to list mappings");
                continue;
            }
        };

        for mapping in &mappings {
            let mut changed = false;
            for client in &clients {
                if !client.is_configured() {
                    continue;
                }
                let prev = match store.read_state(&mapping.book_id, client.name()).await {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(client = client.name().as_str(), error = %e, "poller: failed to read prior state");
                        continue;
                    }
                };
                match client.fetch_state(mapping, prev.as_ref(), None).await {
                    Ok(Some(fetched)) => {
                        let moved = match &prev {
                            Some(p) => p.position != fetched.position,
                            None => true,
                        };
                        if moved {
                            changed = true;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(client = client.name().as_str(), book_id = %mapping.book_id, error = %e, "poller: fetch_state failed");
                    }
                }
            }
            if changed {
                let _ = enqueue.send(mapping.book_id.clone());
            }
        }
    }
}
