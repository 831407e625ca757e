use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::domain::models::{ClientName, ClientPosition, ClientState, Locator};
use crate::storage::Store;

use super::models::{KoSyncProgressDto, ProgressPutResultDto};

pub struct SyncApiService {
    store: Arc<Store>,
    enqueue: mpsc::UnboundedSender<String>,
}

impl SyncApiService {
    pub fn new(store: Arc<Store>, enqueue: mpsc::UnboundedSender<String>) -> Self {
        SyncApiService { store, enqueue }
    }

    pub async fn get_progress(&self, document: &str) -> Result<Option<KoSyncProgressDto>, String> {
        let book_id = self
            .store
            .find_book_by_external_id(ClientName::KoReaderSync, document)
            .await
            .map_err(|e| e.to_string())?;
        let Some(book_id) = book_id else {
            return Ok(None);
        };
        let state = self
            .store
            .read_state(&book_id, ClientName::KoReaderSync)
            .await
            .map_err(|e| e.to_string())?;
        let Some(state) = state else {
            return Ok(None);
        };
        let ClientPosition::Text { percentage, locator } = state.position else {
            return Ok(None);
        };
        Ok(Some(KoSyncProgressDto {
            document: document.to_string(),
            progress: locator.and_then(|l| l.fragment).unwrap_or_default(),
            percentage,
            device: "abs-sync-bridge".to_string(),
            device_id: "abs-sync-bridge".to_string(),
            timestamp: Some(state.last_updated),
        }))
    }

    pub async fn put_progress(
        &self,
        document: &str,
        progress: &str,
        percentage: f64,
    ) -> Result<Option<ProgressPutResultDto>, String> {
        let book_id = self
            .store
            .find_book_by_external_id(ClientName::KoReaderSync, document)
            .await
            .map_err(|e| e.to_string())?;
        let Some(book_id) = book_id else {
            return Ok(None);
        };

        let timestamp = Utc::now().timestamp();
        let state = ClientState {
            book_id: book_id.clone(),
            client_name: ClientName::KoReaderSync,
            last_updated: timestamp,
            position: ClientPosition::Text {
                percentage: percentage.clamp(0.0, 1.0),
                locator: Some(Locator {
                    fragment: Some(progress.to_string()),
                    ..Default::default()
                }),
            },
        };
        self.store
            .write_state(&state)
            .await
            .map_err(|e| e.to_string())?;

        let _ = self.enqueue.send(book_id.clone());

        Ok(Some(ProgressPutResultDto {
            document: document.to_string(),
            timestamp,
        }))
    }
}
