//! Booklore adapter (spec §4.3, §6): Booklore's own REST dialect for ebook
//! reading progress, encapsulated behind the same `Client` contract as every
//! other adapter — its wire shape stays opaque to the sync engine.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::client::{BulkContext, Client, UpdateRequest};
use crate::domain::models::{ClientName, ClientPosition, ClientState, Locator, Mapping};
use crate::errors::{SyncError, SyncResult};

pub struct BookloreClient {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl BookloreClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(BookloreClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            client,
        })
    }

    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        let token = api_token.into();
        self.api_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn get_progress(&self, book_id: &str) -> SyncResult<Option<BookloreProgress>> {
        let url = self.url(&format!("/api/v1/books/{}/progress", book_id));
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(|e| SyncError::from_reqwest(&e))?;
        let progress: BookloreProgress = resp
            .json()
            .await
            .map_err(|e| SyncError::InvalidData(e.to_string()))?;
        Ok(Some(progress))
    }

    async fn put_progress(&self, book_id: &str, body: &BookloreProgressUpdate) -> SyncResult<()> {
        let url = self.url(&format!("/api/v1/books/{}/progress", book_id));
        let resp = self
            .authed(self.client.put(&url).json(body))
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        resp.error_for_status()
            .map_err(|e| SyncError::from_reqwest(&e))?;
        Ok(())
    }
}

#[async_trait]
impl Client for BookloreClient {
    fn name(&self) -> ClientName {
        ClientName::Booklore
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some() && !self.base_url.is_empty()
    }

    async fn fetch_state(
        &self,
        book: &Mapping,
        _prev: Option<&ClientState>,
        _bulk_ctx: Option<&BulkContext>,
    ) -> SyncResult<Option<ClientState>> {
        let progress = self.get_progress(&book.book_id).await?;
        Ok(progress.map(|p| ClientState {
            book_id: book.book_id.clone(),
            client_name: ClientName::Booklore,
            last_updated: p.updated_at.unwrap_or_else(|| Utc::now().timestamp()),
            position: ClientPosition::Text {
                percentage: p.percentage,
                locator: Some(Locator {
                    cfi: p.cfi,
                    css_selector: p.css_selector,
                    ..Default::default()
                }),
            },
        }))
    }

    async fn update(&self, book: &Mapping, request: &UpdateRequest) -> SyncResult<()> {
        let ClientPosition::Text { percentage, locator } = &request.position else {
            return Err(SyncError::InvalidData(
                "Booklore client only accepts text positions".into(),
            ));
        };
        self.put_progress(
            &book.book_id,
            &BookloreProgressUpdate {
                percentage: *percentage,
                cfi: locator.as_ref().and_then(|l| l.cfi.clone()),
                css_selector: locator.as_ref().and_then(|l| l.css_selector.clone()),
            },
        )
        .await
    }

    async fn text_at(&self, _book: &Mapping, position: &ClientPosition) -> SyncResult<String> {
        match position {
            ClientPosition::Text {
                locator: Some(locator),
                ..
            } => Ok(locator
                .css_selector
                .clone()
                .or_else(|| locator.cfi.clone())
                .unwrap_or_default()),
            _ => Err(SyncError::InvalidData(
                "Booklore text_at requires a text position with a locator".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BookloreProgress {
    percentage: f64,
    cfi: Option<String>,
    css_selector: Option<String>,
    updated_at: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BookloreProgressUpdate {
    percentage: f64,
    cfi: Option<String>,
    css_selector: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_without_token() {
        let c = BookloreClient::new("http://localhost:6060").unwrap();
        assert!(!c.is_configured());
        let c = c.with_api_token("tok");
        assert!(c.is_configured());
    }
}
