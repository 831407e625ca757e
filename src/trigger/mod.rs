//! Trigger layer (C7, spec §4.7): three independent sources of "something
//! may have changed for this book" feeding one coalescing sync queue.

pub mod debounce;
pub mod listener;
pub mod poller;
pub mod tick;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::Client;
use crate::config::Config;
use crate::storage::Store;
use crate::sync_engine::SyncEngine;

pub use debounce::Debouncer;

/// Spawns the event listener, per-client poller, and global tick, all
/// feeding a single dispatcher that coalesces repeat enqueues for the same
/// book and runs `sync_cycle` through the shared `SyncEngine`.
/// Returns the enqueue handle so other entry points (e.g. the KoSync-facing
/// HTTP surface, A4) can feed the same coalescing queue directly.
pub fn spawn(
    engine: Arc<SyncEngine>,
    store: Arc<Store>,
    clients: Vec<Arc<dyn Client>>,
    abs: Option<Arc<crate::client::abs::AbsClient>>,
    config: Arc<Config>,
) -> mpsc::UnboundedSender<String> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    if let Some(abs) = abs {
        let debouncer = Arc::new(Debouncer::new(config.debounce_seconds));
        let store = store.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            listener::run(abs, store, debouncer, tx).await;
        });
    }

    const POLLER_INTERVAL_SECONDS: u64 = 30;
    {
        let clients = clients.clone();
        let store = store.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            poller::run(clients, store, POLLER_INTERVAL_SECONDS, tx).await;
        });
    }

    {
        let store = store.clone();
        let tx = tx.clone();
        let period = config.sync_period_minutes;
        tokio::spawn(async move {
            tick::run(store, period, tx).await;
        });
    }

    let handle = tx.clone();
    tokio::spawn(async move {
        dispatch(engine, rx).await;
    });
    handle
}

/// Coalesces concurrent enqueues for the same `book_id`: a book already
/// queued or running is not scheduled again until its current cycle finishes
/// (spec §4.7 "All enqueues coalesce").
async fn dispatch(engine: Arc<SyncEngine>, mut rx: mpsc::UnboundedReceiver<String>) {
    let in_flight: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    while let Some(book_id) = rx.recv().await {
        let already_queued = {
            let mut guard = in_flight.lock().unwrap();
            if guard.contains(&book_id) {
                true
            } else {
                guard.insert(book_id.clone());
                false
            }
        };
        if already_queued {
            continue;
        }

        let engine = engine.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            info!(book_id = %book_id, "trigger: dispatching sync cycle");
            if let Err(e) = engine.sync_cycle(&book_id, false).await {
                warn!(book_id = %book_id, error = %e, "trigger: sync cycle failed");
            }
            in_flight.lock().unwrap().remove(&book_id);
        });
    }
}
