//! Audiobook source adapter (spec §4.3 "Audiobook source (ABS)"): reads and
//! writes playback position in seconds, and doubles as the generic ABS REST
//! client the Kobo-facing HTTP surface (A4) proxies through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::client::{BulkContext, Client, UpdateRequest};
use crate::domain::models::{ClientName, ClientPosition, ClientState, Mapping};
use crate::errors::{SyncError, SyncResult};
use crate::transcribe::TranscriptStore;

#[derive(Clone)]
pub struct AbsClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    /// Used to satisfy `text_at` for the audio leader: a transcript slice
    /// around a given timestamp (spec §4.6 Translator).
    transcripts: Option<Arc<TranscriptStore>>,
}

impl AbsClient {
    /// Create a new client with the given base URL (e.g. "http://localhost:8080/audiobookshelf").
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        Ok(AbsClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
            transcripts: None,
        })
    }

    /// Return a client with the provided API key set (Bearer)
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn with_transcript_store(mut self, store: Arc<TranscriptStore>) -> Self {
        self.transcripts = Some(store);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> Option<(String, String)> {
        self.api_key
            .as_ref()
            .map(|k| ("Authorization".to_string(), format!("Bearer {}", k)))
    }

    /// GET /status (no auth required)
    pub async fn get_status(&self) -> anyhow::Result<StatusResponse> {
        let url = self.url("/status");
        let mut req = self.client.get(&url);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: StatusResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// GET /api/items/:id
    pub async fn get_item(
        &self,
        item_id: &str,
        expanded: bool,
        include: Option<&str>,
    ) -> anyhow::Result<ItemResponse> {
        let mut path = format!("/api/items/{}", item_id);
        let mut q = vec![];
        if expanded {
            q.push(("expanded", "1".to_string()));
        }
        if let Some(include) = include {
            q.push(("include", include.to_string()));
        }
        if !q.is_empty() {
            let qs: String = q
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            path = format!("{}?{}", path, qs);
        }

        let url = self.url(&path);
        let mut req = self.client.get(&url);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: ItemResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// Build cover URL for an item. This returns a public URL and does not perform a request.
    pub fn cover_url(
        &self,
        item_id: &str,
        size: Option<(u32, u32)>,
        format: Option<&str>,
        raw: bool,
    ) -> String {
        let mut path = format!("/api/items/{}/cover", item_id);
        let mut q = vec![];
        if let Some((w, h)) = size {
            q.push(format!("width={}", w));
            q.push(format!("height={}", h));
        }
        if let Some(fmt) = format {
            q.push(format!("format={}", fmt));
        }
        if raw {
            q.push("raw=1".to_string());
        }
        if !q.is_empty() {
            path = format!("{}?{}", path, q.join("&"));
        }
        self.url(&path)
    }

    /// GET /api/libraries
    pub async fn get_libraries(&self) -> anyhow::Result<LibrariesResponse> {
        let url = self.url("/api/libraries");
        let mut req = self.client.get(&url);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: LibrariesResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// GET /api/libraries/{lib_id}/series
    pub async fn get_library_series(
        &self,
        lib_id: &str,
        limit: i64,
        page: Option<i64>,
        filter: Option<&str>,
    ) -> anyhow::Result<LibrarySeriesResponse> {
        let url = self.url(&format!("/api/libraries/{}/series", lib_id));
        let req = self.client.get(&url);
        let req = if let Some((k, v)) = self.auth_header() {
            req.header(&k, &v)
        } else {
            req
        };
        let req = req.query(&[
            ("limit", limit.to_string()),
            ("filter", filter.unwrap_or("").to_string()),
            ("page", page.unwrap_or(0).to_string()),
        ]);

        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: LibrarySeriesResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// GET /api/libraries/{lib_id}/items
    pub async fn get_library_items(
        &self,
        lib_id: &str,
        limit: i64,
        page: Option<i64>,
        include: Option<&str>,
        filter: Option<&str>,
    ) -> anyhow::Result<LibraryItemsResponse> {
        let url = self.url(&format!("/api/libraries/{}/items", lib_id));
        let req = self.client.get(&url);
        let req = if let Some((k, v)) = self.auth_header() {
            req.header(&k, &v)
        } else {
            req
        };
        let req = req.query(&[
            ("limit", limit.to_string()),
            ("page", page.unwrap_or(0).to_string()),
            ("include", include.unwrap_or("media,media.metadata").to_string()),
            ("filter", filter.unwrap_or("").to_string()),
        ]);

        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        let parsed: LibraryItemsResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// GET /api/me/progress/:item_id — current user's playback progress.
    pub async fn get_progress(&self, item_id: &str) -> SyncResult<Option<MediaProgress>> {
        let url = self.url(&format!("/api/me/progress/{}", item_id));
        let mut req = self.client.get(&url);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await.map_err(|e| SyncError::from_reqwest(&e))?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(|e| SyncError::from_reqwest(&e))?;
        let progress: MediaProgress = resp
            .json()
            .await
            .map_err(|e| SyncError::InvalidData(e.to_string()))?;
        Ok(Some(progress))
    }

    /// PATCH /api/me/progress/:item_id — write playback progress in seconds.
    pub async fn update_progress(&self, item_id: &str, current_time: f64) -> SyncResult<()> {
        let url = self.url(&format!("/api/me/progress/{}", item_id));
        let mut req = self.client.patch(&url).json(&serde_json::json!({
            "currentTime": current_time,
        }));
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await.map_err(|e| SyncError::from_reqwest(&e))?;
        resp.error_for_status()
            .map_err(|e| SyncError::from_reqwest(&e))?;
        Ok(())
    }
}

#[async_trait]
impl Client for AbsClient {
    fn name(&self) -> ClientName {
        ClientName::Abs
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.base_url.is_empty()
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
            client_name: ClientName::Abs,
            last_updated: p.last_update_epoch_seconds(),
            position: ClientPosition::Audio {
                timestamp_seconds: p.current_time,
            },
        }))
    }

    async fn update(&self, book: &Mapping, request: &UpdateRequest) -> SyncResult<()> {
        let ClientPosition::Audio { timestamp_seconds } = request.position else {
            return Err(SyncError::InvalidData(
                "ABS client only accepts audio positions".into(),
            ));
        };
        self.update_progress(&book.book_id, timestamp_seconds).await
    }

    async fn text_at(&self, book: &Mapping, position: &ClientPosition) -> SyncResult<String> {
        let ClientPosition::Audio { timestamp_seconds } = position else {
            return Err(SyncError::InvalidData(
                "ABS text_at expects an audio position".into(),
            ));
        };
        let store = self
            .transcripts
            .as_ref()
            .ok_or_else(|| SyncError::Fatal("no transcript store configured".into()))?;
        store.snippet_near(&book.book_id, *timestamp_seconds, 800)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaProgress {
    pub id: Option<String>,
    #[serde(rename = "currentTime")]
    pub current_time: f64,
    #[serde(rename = "isFinished")]
    pub is_finished: Option<bool>,
    #[serde(rename = "lastUpdate")]
    pub last_update_ms: Option<i64>,
}

impl MediaProgress {
    fn last_update_epoch_seconds(&self) -> i64 {
        self.last_update_ms
            .map(|ms| ms / 1000)
            .unwrap_or_else(|| Utc::now().timestamp())
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub app: Option<String>,
    #[serde(rename = "serverVersion")]
    pub server_version: Option<String>,
    #[serde(rename = "isInit")]
    pub is_init: Option<bool>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ItemResponse {
    pub id: String,
    pub title: Option<String>,
    // allow extra fields
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LibrariesResponse {
    pub libraries: Vec<Library>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Library {
    pub id: String,
    pub name: String,
    pub folders: Vec<LibraryFolder>,
    #[serde(rename = "displayOrder")]
    pub display_order: Option<i64>,
    pub icon: Option<String>,
    #[serde(rename = "mediaType")]
    pub media_type: Option<String>,
    pub provider: Option<String>,
    pub settings: Option<serde_json::Value>,
    #[serde(rename = "lastScan")]
    pub last_scan: Option<serde_json::Value>,
    #[serde(rename = "lastScanVersion")]
    pub last_scan_version: Option<Option<String>>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<i64>,
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<i64>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LibraryFolder {
    pub id: String,
    #[serde(rename = "fullPath")]
    pub full_path: String,
    #[serde(rename = "libraryId")]
    pub library_id: String,
    #[serde(rename = "addedAt")]
    pub added_at: Option<i64>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LibrarySeriesResponse {
    pub results: Vec<LibrarySeries>,
    pub total: i64,
    pub limit: i64,
    pub page: i64,
    #[serde(rename = "sortDesc")]
    pub sort_desc: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LibrarySeries {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct LibraryItemsResponse {
    pub results: Vec<LibraryItem>,
    pub total: i64,
    pub limit: i64,
    pub page: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LibraryItem {
    pub id: Uuid,
    #[serde(rename = "addedAt")]
    pub added_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Media {
    pub metadata: Option<Metadata>,
    #[serde(rename = "coverPath")]
    pub cover_path: Option<String>,
    #[serde(rename = "ebookFormat")]
    pub ebook_format: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    #[serde(rename = "authorName")]
    pub author_name: Option<String>,
    #[serde(rename = "seriesName")]
    pub series_name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
}

impl Metadata {
    /// ABS reports either a bare year or a full date string; fall back to
    /// Jan 1st of the year when only a year is present.
    pub fn get_published_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_date.as_deref()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        raw.parse::<i32>()
            .ok()
            .and_then(|year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_cover_url_basic() {
        let c = AbsClient::new("http://localhost:8080/audiobookshelf").unwrap();
        let url = c.cover_url("abc123", Some((600, 800)), Some("jpeg"), false);
        assert_eq!(
            url,
            "http://localhost:8080/audiobookshelf/api/items/abc123/cover?width=600&height=800&format=jpeg"
        );
    }

    #[test]
    fn status_deserialize() {
        let json = r#"{ "app": "audiobookshelf", "serverVersion": "2.3.4", "isInit": true }"#;
        let s: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(s.app.unwrap(), "audiobookshelf");
        assert_eq!(s.server_version.unwrap(), "2.3.4");
        assert_eq!(s.is_init.unwrap(), true);
    }

    #[test]
    fn libraries_deserialize_example() {
        let json = r#"
                {
                    "libraries": [
                        { "id": "1", "name": "A", "folders": [{ "id": "f1", "fullPath": "/a", "libraryId": "1", "addedAt": 1 }], "displayOrder": 1, "icon": "database", "mediaType": "book", "provider": "audible", "settings": {"coverAspectRatio":1}, "lastScan": 123, "lastScanVersion": "2.27.0", "createdAt": 1, "lastUpdate": 2 }
                    ]
                }
                "#;

        let libs: LibrariesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(libs.libraries.len(), 1);
        assert_eq!(libs.libraries[0].id, "1");
        assert_eq!(libs.libraries[0].folders[0].full_path, "/a");
    }

    #[test]
    fn metadata_published_date_falls_back_to_year() {
        let m = Metadata {
            title: None,
            author_name: None,
            series_name: None,
            description: None,
            language: None,
            published_date: Some("1999".to_string()),
        };
        let dt = m.get_published_date().unwrap();
        assert_eq!(dt.format("%Y").to_string(), "1999");
    }

    #[test]
    fn is_configured_requires_api_key() {
        let c = AbsClient::new("http://localhost:8080").unwrap();
        assert!(!c.is_configured());
        let c = c.with_api_key("k");
        assert!(c.is_configured());
    }
}
