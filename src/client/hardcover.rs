//! Hardcover adapter (spec §4.3 "write-only tracker", §9 Open Question 3):
//! `fetch_state` always reports absent — Hardcover is a one-way destination,
//! not a source of truth — and writes are delta-gated against the last
//! value this process itself sent, since there is nothing to read back.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::client::{BulkContext, Client, UpdateRequest};
use crate::domain::models::{ClientName, ClientPosition, ClientState, Mapping};
use crate::errors::{SyncError, SyncResult};

const MIN_DELTA_PERCENT: f64 = 0.01;

pub struct HardcoverClient {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
    last_sent: DashMap<String, f64>,
}

impl HardcoverClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(HardcoverClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            client,
            last_sent: DashMap::new(),
        })
    }

    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        let token = api_token.into();
        self.api_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    async fn send_progress(&self, book_id: &str, percentage: f64) -> SyncResult<()> {
        let token = self.api_token.as_ref().ok_or(SyncError::NotConfigured)?;
        let query = r#"
            mutation UpdateProgress($bookId: String!, $percentage: Float!) {
                update_user_book_read(book_id: $bookId, percentage: $percentage) { id }
            }
        "#;
        let resp = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "query": query,
                "variables": { "bookId": book_id, "percentage": percentage },
            }))
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        resp.error_for_status()
            .map_err(|e| SyncError::from_reqwest(&e))?;
        Ok(())
    }
}

#[async_trait]
impl Client for HardcoverClient {
    fn name(&self) -> ClientName {
        ClientName::Hardcover
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some() && !self.base_url.is_empty()
    }

    /// Always absent: Hardcover never feeds position back into the cycle.
    async fn fetch_state(
        &self,
        _book: &Mapping,
        _prev: Option<&ClientState>,
        _bulk_ctx: Option<&BulkContext>,
    ) -> SyncResult<Option<ClientState>> {
        Ok(None)
    }

    async fn update(&self, book: &Mapping, request: &UpdateRequest) -> SyncResult<()> {
        let percentage = match request.position {
            ClientPosition::Text { percentage, .. } => percentage,
            ClientPosition::Audio { .. } => request
                .position
                .normalized_percentage(book.duration_seconds)
                .ok_or_else(|| {
                    SyncError::InvalidData(
                        "Hardcover update requires a percentage or known duration".into(),
                    )
                })?,
        };

        if !request.force {
            if let Some(prev) = self.last_sent.get(&book.book_id) {
                if (percentage - *prev).abs() < MIN_DELTA_PERCENT {
                    return Ok(());
                }
            }
        }

        self.send_progress(&book.book_id, percentage).await?;
        self.last_sent.insert(book.book_id.clone(), percentage);
        Ok(())
    }

    async fn text_at(&self, _book: &Mapping, _position: &ClientPosition) -> SyncResult<String> {
        Err(SyncError::InvalidData(
            "Hardcover is write-only and has no text to locate".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MappingStatus, SyncMode};
    use chrono::Utc;

    fn sample_mapping() -> Mapping {
        Mapping {
            book_id: "book1".to_string(),
            title: "T".to_string(),
            author: None,
            sync_mode: SyncMode::EbookOnly,
            status: MappingStatus::Active,
            duration_seconds: None,
            alignment_ref: None,
            consecutive_failures: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fetch_state_is_always_none() {
        let client = HardcoverClient::new("http://localhost").unwrap();
        let state = client
            .fetch_state(&sample_mapping(), None, None)
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn small_delta_is_skipped_without_network() {
        let client = HardcoverClient::new("http://localhost").unwrap();
        client.last_sent.insert("book1".to_string(), 0.500);
        let request = UpdateRequest {
            position: ClientPosition::Text {
                percentage: 0.505,
                locator: None,
            },
            force: false,
        };
        // Under MIN_DELTA_PERCENT and not forced: returns Ok without attempting
        // a network call (no token configured would otherwise error first).
        let result = client.update(&sample_mapping(), &request).await;
        assert!(result.is_ok());
    }
}
