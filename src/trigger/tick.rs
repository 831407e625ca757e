//! Global tick (spec §4.7 trigger 3): a floor under the other two triggers
//! — every `sync_period_minutes`, every active mapping gets a sync cycle
//! regardless of whether anything was observed to change.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::storage::Store;

pub async fn run(store: Arc<Store>, period_minutes: u64, enqueue: mpsc::UnboundedSender<String>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(period_minutes.max(1) * 60));
    loop {
        ticker.tick().await;
        match store.list_active_mappings().await {
            Ok(mappings) => {
                for mapping in mappings {
                    let _ = enqueue.send(mapping.book_id);
                }
            }
            Err(e) => warn!(error = %e, "global tick: failed to list mappings"),
        }
    }
}
