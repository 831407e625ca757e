//! Sync cycle engine (C8, spec §4.8): the single entry point that turns one
//! book's observed client states into at-most-one write per follower.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::{info, instrument, warn};

use crate::align::AlignmentMap;
use crate::client::{Client, UpdateRequest};
use crate::config::Config;
use crate::domain::models::{ClientName, ClientPosition, ClientState, Mapping, MappingStatus};
use crate::errors::{SyncError, SyncResult};
use crate::locate::{self, ParsedDocument};
use crate::storage::Store;
use crate::suppression::SuppressionTracker;
use crate::translate::{TranslationContext, Translator};

const ANTI_REGRESSION_TOLERANCE: f64 = 0.005;
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

pub struct SyncEngine {
    store: Arc<Store>,
    suppression: Arc<SuppressionTracker>,
    clients: Vec<Arc<dyn Client>>,
    translator: Translator,
    config: Arc<Config>,
    book_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    worker_pool: Arc<Semaphore>,
    ebook_cache: std::sync::Mutex<LruCache<String, Arc<ParsedDocument>>>,
    alignment_cache: std::sync::Mutex<LruCache<String, Arc<AlignmentMap>>>,
    data_dir: String,
}

impl SyncEngine {
    pub fn new(
        store: Arc<Store>,
        suppression: Arc<SuppressionTracker>,
        clients: Vec<Arc<dyn Client>>,
        config: Arc<Config>,
    ) -> Self {
        let capacity = std::num::NonZeroUsize::new(config.parsed_ebook_cache_capacity.max(1)).unwrap();
        SyncEngine {
            store,
            suppression,
            translator: Translator::new(config.fuzzy_window_fraction, config.fuzzy_threshold),
            worker_pool: Arc::new(Semaphore::new(num_cpus::get().max(1))),
            book_locks: DashMap::new(),
            ebook_cache: std::sync::Mutex::new(LruCache::new(capacity)),
            alignment_cache: std::sync::Mutex::new(LruCache::new(capacity)),
            data_dir: config.data_dir.clone(),
            config,
            clients,
        }
    }

    /// Run one sync cycle for `book_id`. Single-writer per book: the
    /// per-book lock serializes concurrent callers (spec §5).
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn sync_cycle(&self, book_id: &str, force: bool) -> SyncResult<()> {
        let lock = self
            .book_locks
            .entry(book_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        let _permit = self
            .worker_pool
            .acquire()
            .await
            .map_err(|e| SyncError::Fatal(e.to_string()))?;

        self.run_cycle_locked(book_id, force).await
    }

    async fn run_cycle_locked(&self, book_id: &str, force: bool) -> SyncResult<()> {
        let mapping = self
            .store
            .load_mapping(book_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(book_id.to_string()))?;

        if !mapping.is_syncable() {
            return Ok(());
        }

        let mut cached: HashMap<ClientName, ClientState> = HashMap::new();
        for client in &self.clients {
            if let Some(state) = self.store.read_state(book_id, client.name()).await? {
                cached.insert(client.name(), state);
            }
        }

        let mut contributing: Vec<(Arc<dyn Client>, ClientState, f64)> = Vec::new();
        for client in &self.clients {
            if !client.is_configured() {
                continue;
            }
            let prev = cached.get(&client.name());
            let fetched = client.fetch_state(&mapping, prev, None).await;
            let state = match fetched {
                Ok(Some(s)) => s,
                Ok(None) => continue,
                Err(SyncError::NotConfigured) => continue,
                Err(SyncError::Transient(msg)) => {
                    warn!(client = client.name().as_str(), %msg, "transient error fetching state");
                    continue;
                }
                Err(SyncError::Unauthorized) => {
                    warn!(client = client.name().as_str(), "unauthorized fetching state");
                    continue;
                }
                Err(SyncError::NotFound(_)) => continue,
                Err(SyncError::Fatal(msg)) => return Err(SyncError::Fatal(msg)),
                Err(e) => {
                    warn!(client = client.name().as_str(), error = %e, "error fetching state");
                    continue;
                }
            };

            if self.suppression.is_own_write(book_id, client.name()) {
                continue;
            }

            let Some(normalized) = state.position.normalized_percentage(mapping.duration_seconds)
            else {
                continue;
            };

            let prev_state = cached.get(&client.name());
            if !self.client_contributes(client.name(), &state, prev_state, normalized, &mapping) {
                continue;
            }

            contributing.push((client.clone(), state, normalized));
        }

        if contributing.is_empty() {
            return Ok(());
        }

        contributing.sort_by(|a, b| {
            a.1.last_updated
                .cmp(&b.1.last_updated)
                .then_with(|| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.0.name().cmp(&b.0.name()))
        });
        let (leader_client, leader_state, leader_normalized) =
            contributing.last().cloned().expect("non-empty contributing set");

        let max_cached = cached
            .values()
            .filter_map(|s| s.position.normalized_percentage(mapping.duration_seconds))
            .fold(0.0_f64, f64::max);

        let all_within_threshold = cached.values().all(|follower_state| {
            let Some(follower_pct) = follower_state
                .position
                .normalized_percentage(mapping.duration_seconds)
            else {
                return true;
            };
            (leader_normalized - follower_pct).abs() < self.config.sync_delta_between_clients_percent
        });
        if all_within_threshold && !cached.is_empty() {
            return Ok(());
        }

        if !force
            && leader_normalized < max_cached - ANTI_REGRESSION_TOLERANCE
            && cached
                .values()
                .any(|s| s.client_name != leader_client.name() && (max_cached - coordinate_normalized(s, mapping.duration_seconds)).abs() < 1e-9)
        {
            warn!(
                leader = leader_client.name().as_str(),
                leader_normalized, max_cached, "anti-regression: refusing to propagate"
            );
            return Ok(());
        }

        let alignment = self.load_alignment(&mapping).await;
        let ebook = self.load_ebook(&mapping).await;
        let ctx = TranslationContext {
            alignment: alignment.as_deref(),
            ebook: ebook.as_deref(),
            duration_seconds: mapping.duration_seconds,
            native_fast_path: false,
        };

        let mut updated_any = false;
        for client in &self.clients {
            if client.name() == leader_client.name() || !client.is_configured() {
                continue;
            }

            let translated = match self
                .translator
                .translate(&mapping, &leader_state.position, leader_client.as_ref(), client.name(), &ctx)
                .await
            {
                Ok(pos) => pos,
                Err(SyncError::NotFound(msg)) => {
                    warn!(follower = client.name().as_str(), %msg, "translation not found, skipping follower");
                    continue;
                }
                Err(e) => {
                    warn!(follower = client.name().as_str(), error = %e, "translation failed, skipping follower");
                    continue;
                }
            };

            let request = UpdateRequest {
                position: translated.clone(),
                force,
            };
            match client.update(&mapping, &request).await {
                // A 409 means the follower already holds this position (or
                // further along); spec treats it as a successful write too.
                Ok(()) | Err(SyncError::Conflict) => {
                    updated_any = true;
                    self.suppression.record(book_id, client.name());
                    let _ = self
                        .store
                        .write_state(&ClientState {
                            book_id: book_id.to_string(),
                            client_name: client.name(),
                            last_updated: leader_state.last_updated,
                            position: translated,
                        })
                        .await;
                }
                Err(e) => {
                    warn!(follower = client.name().as_str(), error = %e, "propagation failed");
                }
            }
        }

        self.store.write_state(&leader_state).await?;

        if updated_any {
            self.store
                .set_mapping_status(book_id, MappingStatus::Active, false)
                .await?;
            info!(leader = leader_client.name().as_str(), "sync cycle completed");
        } else {
            self.store
                .set_mapping_status(book_id, MappingStatus::Processing, true)
                .await?;
            if mapping.consecutive_failures + 1 >= MAX_CONSECUTIVE_FAILURES {
                self.store
                    .set_mapping_status(book_id, MappingStatus::FailedRetryLater, true)
                    .await?;
            }
        }

        Ok(())
    }

    /// Client-specific delta gate (spec §4.8 step 4): ABS gates on a raw
    /// seconds delta, KoReaderSync on a compound percentage-and-words delta,
    /// everyone else on a flat percentage delta.
    fn client_contributes(
        &self,
        client: ClientName,
        state: &ClientState,
        prev_state: Option<&ClientState>,
        normalized: f64,
        mapping: &Mapping,
    ) -> bool {
        let Some(prev_state) = prev_state else {
            return true;
        };
        let Some(prev_normalized) = prev_state
            .position
            .normalized_percentage(mapping.duration_seconds)
        else {
            return true;
        };

        match client {
            ClientName::Abs => {
                let (ClientPosition::Audio { timestamp_seconds: cur }, ClientPosition::Audio { timestamp_seconds: prev }) =
                    (&state.position, &prev_state.position)
                else {
                    return (normalized - prev_normalized).abs() >= self.config.sync_delta_abs_seconds / 3600.0;
                };
                (cur - prev).abs() >= self.config.sync_delta_abs_seconds
            }
            ClientName::KoReaderSync => {
                let pct_delta = (normalized - prev_normalized).abs();
                if pct_delta < self.config.sync_delta_kosync_percent {
                    return false;
                }
                // Word-count delta needs the ebook's word density; without a
                // cheap way to get that pre-translation, approximate using
                // the configured minimum word count directly against the
                // implied character span when an ebook is cached.
                let words_estimate = self
                    .ebook_cache
                    .lock()
                    .unwrap()
                    .peek(&mapping.book_id)
                    .map(|doc| {
                        let total_words = (doc.full_text.chars().count() as f64 / 6.0).max(1.0);
                        pct_delta * total_words
                    });
                match words_estimate {
                    Some(words) => words >= self.config.sync_delta_kosync_words as f64,
                    None => true,
                }
            }
            _ => (normalized - prev_normalized).abs() >= self.config.sync_delta_between_clients_percent,
        }
    }

    async fn load_alignment(&self, mapping: &Mapping) -> Option<Arc<AlignmentMap>> {
        let alignment_ref = mapping.alignment_ref.as_ref()?;
        if let Some(cached) = self.alignment_cache.lock().unwrap().get(&mapping.book_id) {
            return Some(cached.clone());
        }
        let raw = std::fs::read_to_string(alignment_ref).ok()?;
        let map: crate::align::AlignmentMap = serde_json::from_str(&raw).ok()?;
        let arc = Arc::new(map);
        self.alignment_cache
            .lock()
            .unwrap()
            .put(mapping.book_id.clone(), arc.clone());
        Some(arc)
    }

    async fn load_ebook(&self, mapping: &Mapping) -> Option<Arc<ParsedDocument>> {
        if let Some(cached) = self.ebook_cache.lock().unwrap().get(&mapping.book_id) {
            return Some(cached.clone());
        }
        let path = format!("{}/ebooks/{}.xhtml", self.data_dir, mapping.book_id);
        let raw = std::fs::read_to_string(path).ok()?;
        let doc = Arc::new(locate::parse(&raw));
        self.ebook_cache
            .lock()
            .unwrap()
            .put(mapping.book_id.clone(), doc.clone());
        Some(doc)
    }
}

fn coordinate_normalized(state: &ClientState, duration_seconds: Option<f64>) -> f64 {
    state
        .position
        .normalized_percentage(duration_seconds)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BulkContext;
    use crate::domain::models::SyncMode;
    use async_trait::async_trait;
    use chrono::Utc;
    use migration::MigratorTrait;
    use sea_orm::Database;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn test_db() -> Arc<sea_orm::DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Arc::new(db)
    }

    /// A single-client adapter that never finds a follower to propagate to
    /// (it is always its own leader), so every cycle reports no progress.
    /// Used to drive the pending -> processing -> failed_retry_later
    /// transition (spec "Status lifecycle" scenario) without a real backend.
    struct StallingClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Client for StallingClient {
        fn name(&self) -> ClientName {
            ClientName::Abs
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn fetch_state(
            &self,
            book: &Mapping,
            _prev: Option<&ClientState>,
            _bulk_ctx: Option<&BulkContext>,
        ) -> SyncResult<Option<ClientState>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ClientState {
                book_id: book.book_id.clone(),
                client_name: ClientName::Abs,
                last_updated: call as i64,
                position: ClientPosition::Audio {
                    timestamp_seconds: 100.0 + call as f64 * 500.0,
                },
            }))
        }

        async fn update(&self, _book: &Mapping, _request: &UpdateRequest) -> SyncResult<()> {
            Ok(())
        }

        async fn text_at(&self, _book: &Mapping, _position: &ClientPosition) -> SyncResult<String> {
            Ok(String::new())
        }
    }

    fn sample_mapping(book_id: &str) -> Mapping {
        Mapping {
            book_id: book_id.to_string(),
            title: "Test Book".to_string(),
            author: None,
            sync_mode: SyncMode::Audiobook,
            status: MappingStatus::Pending,
            duration_seconds: Some(36_000.0),
            alignment_ref: None,
            consecutive_failures: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn three_consecutive_failed_cycles_mark_failed_retry_later() {
        let store = Arc::new(Store::new(test_db().await));
        let mapping = sample_mapping("book1");
        store.upsert_mapping(&mapping).await.unwrap();

        let config = Arc::new(Config::with_layers(&[]).unwrap());
        let clients: Vec<Arc<dyn Client>> = vec![Arc::new(StallingClient {
            calls: AtomicU32::new(0),
        })];
        let engine = SyncEngine::new(
            store.clone(),
            Arc::new(SuppressionTracker::new(config.suppression_ttl_seconds)),
            clients,
            config,
        );

        for _ in 0..2 {
            engine.sync_cycle("book1", false).await.unwrap();
            let reloaded = store.load_mapping("book1").await.unwrap().unwrap();
            assert_eq!(reloaded.status, MappingStatus::Processing);
        }

        engine.sync_cycle("book1", false).await.unwrap();
        let reloaded = store.load_mapping("book1").await.unwrap().unwrap();
        assert_eq!(reloaded.status, MappingStatus::FailedRetryLater);
        assert_eq!(reloaded.consecutive_failures, 3);
    }
}
