//! Client adapter contract (C3, spec §4.3): a uniform interface over every
//! external service, audio or text coordinated, read-write or write-only.

pub mod abs;
pub mod booklore;
pub mod hardcover;
pub mod kosync;
pub mod storyteller;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::models::{ClientName, ClientPosition, ClientState, Mapping};
use crate::errors::SyncResult;

/// What the sync engine asks a client to write (spec §4.8 step 9 "Propagate").
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub position: ClientPosition,
    /// Set when the user explicitly forced propagation past anti-regression
    /// (spec §4.8 step 7).
    pub force: bool,
}

/// Raw per-book payload a bulk fetch returns; adapters interpret their own shape.
pub type BulkContext = HashMap<String, serde_json::Value>;

#[async_trait]
pub trait Client: Send + Sync {
    fn name(&self) -> ClientName;

    /// False means this client is silently skipped in every cycle (spec §4.3).
    fn is_configured(&self) -> bool;

    /// `Ok(None)` means "no progress known" — a valid state, not an error
    /// (spec §9 "Error returns mixed with absent-values").
    async fn fetch_state(
        &self,
        book: &Mapping,
        prev: Option<&ClientState>,
        bulk_ctx: Option<&BulkContext>,
    ) -> SyncResult<Option<ClientState>>;

    /// Optional: called once per cycle to amortize N per-book lookups.
    /// Default implementation reports no bulk support.
    async fn fetch_bulk(&self) -> SyncResult<Option<HashMap<String, BulkContext>>> {
        Ok(None)
    }

    async fn update(&self, book: &Mapping, request: &UpdateRequest) -> SyncResult<()>;

    /// Extract a snippet of ebook text (or transcript text) at the given
    /// position; used by the translator (C6).
    async fn text_at(&self, book: &Mapping, position: &ClientPosition) -> SyncResult<String>;
}
