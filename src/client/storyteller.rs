//! Storyteller adapter (spec §4.3, §6): token-authenticated REST client.
//! `PUT .../positions` treats 2xx, 204, and 409 alike as success, per the
//! upstream API's idempotent-write contract.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::client::{BulkContext, Client, UpdateRequest};
use crate::domain::models::{ClientName, ClientPosition, ClientState, Locator, Mapping};
use crate::errors::{SyncError, SyncResult};

pub struct StorytellerClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl StorytellerClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(StorytellerClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: None,
            password: None,
            client,
            token: Mutex::new(None),
        })
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let password = password.into();
        if !username.is_empty() && !password.is_empty() {
            self.username = Some(username);
            self.password = Some(password);
        }
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn token(&self) -> SyncResult<String> {
        if let Some(token) = self.token.lock().unwrap().clone() {
            return Ok(token);
        }
        let username = self
            .username
            .as_ref()
            .ok_or(SyncError::NotConfigured)?;
        let password = self.password.as_ref().ok_or(SyncError::NotConfigured)?;

        let resp = self
            .client
            .post(self.url("/api/token"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        let resp = resp.error_for_status().map_err(|e| SyncError::from_reqwest(&e))?;
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::InvalidData(e.to_string()))?;
        *self.token.lock().unwrap() = Some(body.token.clone());
        Ok(body.token)
    }

    async fn get_position(&self, uuid: &str) -> SyncResult<Option<StorytellerPosition>> {
        let token = self.token().await?;
        let resp = self
            .client
            .get(self.url(&format!("/api/v2/books/{}/positions", uuid)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(|e| SyncError::from_reqwest(&e))?;
        let position: StorytellerPosition = resp
            .json()
            .await
            .map_err(|e| SyncError::InvalidData(e.to_string()))?;
        Ok(Some(position))
    }

    async fn put_position(&self, uuid: &str, body: &StorytellerPutRequest) -> SyncResult<()> {
        let token = self.token().await?;
        let resp = self
            .client
            .put(self.url(&format!("/api/v2/books/{}/positions", uuid)))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;
        let status = resp.status().as_u16();
        if (200..300).contains(&status) || status == 204 || status == 409 {
            return Ok(());
        }
        resp.error_for_status()
            .map_err(|e| SyncError::from_reqwest(&e))?;
        Ok(())
    }
}

#[async_trait]
impl Client for StorytellerClient {
    fn name(&self) -> ClientName {
        ClientName::Storyteller
    }

    fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some() && !self.base_url.is_empty()
    }

    async fn fetch_state(
        &self,
        book: &Mapping,
        _prev: Option<&ClientState>,
        _bulk_ctx: Option<&BulkContext>,
    ) -> SyncResult<Option<ClientState>> {
        let position = self.get_position(&book.book_id).await?;
        Ok(position.map(|p| ClientState {
            book_id: book.book_id.clone(),
            client_name: ClientName::Storyteller,
            last_updated: Utc::now().timestamp(),
            position: ClientPosition::Text {
                percentage: p.progression,
                locator: Some(Locator {
                    fragment: p.fragments.first().cloned(),
                    ..Default::default()
                }),
            },
        }))
    }

    async fn update(&self, book: &Mapping, request: &UpdateRequest) -> SyncResult<()> {
        let ClientPosition::Text { percentage, locator } = &request.position else {
            return Err(SyncError::InvalidData(
                "Storyteller client only accepts text positions".into(),
            ));
        };
        let fragment = locator.as_ref().and_then(|l| l.fragment.clone());
        self.put_position(
            &book.book_id,
            &StorytellerPutRequest {
                uuid: book.book_id.clone(),
                fragments: fragment.into_iter().collect(),
                progression: *percentage,
            },
        )
        .await
    }

    async fn text_at(&self, _book: &Mapping, position: &ClientPosition) -> SyncResult<String> {
        match position {
            ClientPosition::Text {
                locator: Some(locator),
                ..
            } => Ok(locator.fragment.clone().unwrap_or_default()),
            _ => Err(SyncError::InvalidData(
                "Storyteller text_at requires a text position with a fragment".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct StorytellerPosition {
    fragments: Vec<String>,
    progression: f64,
    #[allow(dead_code)]
    uuid: Option<String>,
}

#[derive(Debug, Serialize)]
struct StorytellerPutRequest {
    uuid: String,
    fragments: Vec<String>,
    progression: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_without_credentials() {
        let c = StorytellerClient::new("http://localhost:9000").unwrap();
        assert!(!c.is_configured());
        let c = c.with_credentials("alice", "hunter2");
        assert!(c.is_configured());
    }

    #[test]
    fn position_deserializes() {
        let json = r#"{"fragments":["frag-12"],"progression":0.33,"uuid":"book-uuid"}"#;
        let p: StorytellerPosition = serde_json::from_str(json).unwrap();
        assert_eq!(p.fragments, vec!["frag-12".to_string()]);
        assert!((p.progression - 0.33).abs() < 1e-9);
    }
}
