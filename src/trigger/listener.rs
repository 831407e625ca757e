//! Event listener (spec §4.7 trigger 1, §6 "authenticated Socket.IO-like
//! channel"). No streaming transport exists in the corpus's dependency set,
//! so this drives the same debounce/enqueue logic off a tight poll loop
//! instead of a real push subscription — behaviorally equivalent for the
//! single-process bridge this runs inside.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::client::abs::AbsClient;
use crate::errors::SyncError;
use crate::storage::Store;

use super::debounce::Debouncer;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Runs until the ABS client reports `Unauthorized` repeatedly, at which
/// point it stops and relies on the per-client poller and global tick
/// (spec §4.7 trigger 1 "falls back to (3) only").
pub async fn run(
    abs: Arc<AbsClient>,
    store: Arc<Store>,
    debouncer: Arc<Debouncer>,
    enqueue: mpsc::UnboundedSender<String>,
) {
    let mut consecutive_auth_failures = 0u32;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let mappings = match store.list_active_mappings().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "event listener: failed to list mappings");
                continue;
            }
        };

        for mapping in mappings {
            if mapping.sync_mode != crate::domain::models::SyncMode::Audiobook {
                continue;
            }
            match abs.get_progress(&mapping.book_id).await {
                Ok(Some(progress)) => {
                    consecutive_auth_failures = 0;
                    let prev = store
                        .read_state(&mapping.book_id, crate::domain::models::ClientName::Abs)
                        .await
                        .ok()
                        .flatten();
                    let changed = match &prev {
                        Some(p) => match p.position {
                            crate::domain::models::ClientPosition::Audio { timestamp_seconds } => {
                                (timestamp_seconds - progress.current_time).abs() > 0.5
                            }
                            _ => true,
                        },
                        None => true,
                    };
                    if changed {
                        debouncer.trigger(&mapping.book_id);
                    }
                }
                Ok(None) => {}
                Err(SyncError::Unauthorized) => {
                    consecutive_auth_failures += 1;
                    if consecutive_auth_failures >= 3 {
                        warn!("event listener: repeated auth failures, falling back to polling only");
                        return;
                    }
                }
                Err(e) => {
                    warn!(book_id = %mapping.book_id, error = %e, "event listener: error polling progress");
                }
            }
        }

        for book_id in debouncer.take_ready() {
            let _ = enqueue.send(book_id);
        }
    }
}
