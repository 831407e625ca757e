use std::sync::Arc;

use chrono::Utc;
use poem_openapi::payload::Json;

use crate::admin_api::models::{
    CreateMappingRequestDto, ErrorDto, LinkExternalIdResponse, MappingCreateResponse, MappingDto,
    MappingListResponse, SuggestionDto, SuggestionListResponse,
};
use crate::domain::models::{ClientName, Mapping, MappingStatus, SyncMode};
use crate::storage::Store;

pub struct MappingService {
    store: Arc<Store>,
}

impl MappingService {
    pub fn new(store: Arc<Store>) -> Self {
        MappingService { store }
    }

    pub async fn list(&self) -> MappingListResponse {
        match self.store.list_active_mappings().await {
            Ok(mappings) => MappingListResponse::Ok(Json(mappings.into_iter().map(to_dto).collect())),
            Err(e) => MappingListResponse::BadGateway(Json(ErrorDto {
                message: e.to_string(),
            })),
        }
    }

    pub async fn create(&self, req: CreateMappingRequestDto) -> MappingCreateResponse {
        let sync_mode = match req.sync_mode.as_str() {
            "ebook_only" => SyncMode::EbookOnly,
            "audiobook" => SyncMode::Audiobook,
            other => {
                return MappingCreateResponse::BadRequest(Json(ErrorDto {
                    message: format!("unknown sync_mode '{}'", other),
                }));
            }
        };

        let mapping = Mapping {
            book_id: req.abs_item_id.clone(),
            title: req.title,
            author: req.author,
            sync_mode,
            status: MappingStatus::Pending,
            duration_seconds: req.duration_seconds,
            alignment_ref: None,
            consecutive_failures: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        if let Err(e) = self.store.upsert_mapping(&mapping).await {
            return MappingCreateResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            }));
        }
        if let Err(e) = self
            .store
            .link_external_id(&mapping.book_id, ClientName::Abs, &req.abs_item_id)
            .await
        {
            tracing::warn!(error = %e, "mapping created but ABS external id link failed");
        }

        MappingCreateResponse::Created(Json(to_dto(mapping)))
    }

    pub async fn link_external_id(
        &self,
        book_id: &str,
        client_name: &str,
        external_id: &str,
    ) -> LinkExternalIdResponse {
        let Some(client) = ClientName::parse(client_name) else {
            return LinkExternalIdResponse::BadRequest(Json(ErrorDto {
                message: format!("unknown client_name '{}'", client_name),
            }));
        };
        match self.store.link_external_id(book_id, client, external_id).await {
            Ok(()) => LinkExternalIdResponse::Ok,
            Err(e) => LinkExternalIdResponse::BadRequest(Json(ErrorDto {
                message: e.to_string(),
            })),
        }
    }

    /// Unmapped external ids surfaced at the edge of the trigger layer
    /// (spec §3 "Suggestion", optional) — reviewed and turned into a real
    /// mapping by an operator via `link_external_id`.
    pub async fn list_suggestions(&self) -> SuggestionListResponse {
        match self.store.list_suggestions().await {
            Ok(suggestions) => SuggestionListResponse::Ok(Json(
                suggestions
                    .into_iter()
                    .map(|s| SuggestionDto {
                        source_client: s.source_client.as_str().to_string(),
                        external_id: s.external_id,
                        candidate_book_id: s.candidate_book_id,
                        confidence: s.confidence,
                    })
                    .collect(),
            )),
            Err(e) => SuggestionListResponse::BadGateway(Json(ErrorDto {
                message: e.to_string(),
            })),
        }
    }
}

fn to_dto(m: Mapping) -> MappingDto {
    MappingDto {
        book_id: m.book_id,
        title: m.title,
        author: m.author,
        sync_mode: match m.sync_mode {
            SyncMode::Audiobook => "audiobook".to_string(),
            SyncMode::EbookOnly => "ebook_only".to_string(),
        },
        status: match m.status {
            MappingStatus::Pending => "pending".to_string(),
            MappingStatus::Processing => "processing".to_string(),
            MappingStatus::Active => "active".to_string(),
            MappingStatus::FailedRetryLater => "failed_retry_later".to_string(),
            MappingStatus::Disabled => "disabled".to_string(),
        },
        duration_seconds: m.duration_seconds,
    }
}
