//! Admin-facing HTTP surface (A4), bound to `primary_port` and kept separate
//! from the KoSync-facing surface so the sync port can be safely exposed to
//! the open internet while this one stays behind a private network (spec §6
//! "may be split across two ports").

mod models;
mod services;

use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, param::Query, payload::Json};

use crate::client::abs::AbsClient;
use crate::storage::Store;
use crate::transcribe::JobManager;
use models::{
    AlignmentBuildResponse, CreateMappingRequestDto, LibraryItemsResponse, LibraryListResponse,
    LinkExternalIdRequestDto, LinkExternalIdResponse, MappingCreateResponse, MappingListResponse,
    SuggestionListResponse,
};
use services::library::LibraryService;
use services::mapping::MappingService;
use services::transcription::TranscriptionService;

pub struct AdminApi {
    pub abs: Arc<AbsClient>,
    pub store: Arc<Store>,
    pub jobs: Arc<JobManager>,
    pub data_dir: String,
}

#[OpenApi]
impl AdminApi {
    #[oai(path = "/v1/libraries", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_libraries(&self) -> LibraryListResponse {
        LibraryService::new(&self.abs).list_libraries().await
    }

    #[oai(path = "/v1/libraries/:library_id/items", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, library_id, limit, page, include, filter))]
    async fn list_library_items(
        &self,
        library_id: Path<String>,
        Query(limit): Query<Option<i64>>,
        Query(page): Query<Option<i64>>,
        Query(include): Query<Option<String>>,
        Query(filter): Query<Option<String>>,
    ) -> LibraryItemsResponse {
        LibraryService::new(&self.abs)
            .list_library_items(
                &library_id.0,
                limit.unwrap_or(50),
                page,
                include.as_deref(),
                filter.as_deref(),
            )
            .await
    }

    #[oai(path = "/v1/mappings", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_mappings(&self) -> MappingListResponse {
        MappingService::new(self.store.clone()).list().await
    }

    #[oai(path = "/v1/mappings", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn create_mapping(&self, body: Json<CreateMappingRequestDto>) -> MappingCreateResponse {
        MappingService::new(self.store.clone()).create(body.0).await
    }

    #[oai(path = "/v1/mappings/:book_id/external-ids", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, book_id, body))]
    async fn link_external_id(
        &self,
        book_id: Path<String>,
        body: Json<LinkExternalIdRequestDto>,
    ) -> LinkExternalIdResponse {
        MappingService::new(self.store.clone())
            .link_external_id(&book_id.0, &body.0.client_name, &body.0.external_id)
            .await
    }

    #[oai(path = "/v1/suggestions", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_suggestions(&self) -> SuggestionListResponse {
        MappingService::new(self.store.clone()).list_suggestions().await
    }

    #[oai(path = "/v1/mappings/:book_id/alignment", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, book_id))]
    async fn build_alignment(&self, book_id: Path<String>) -> AlignmentBuildResponse {
        TranscriptionService::new(self.store.clone(), self.jobs.clone(), self.data_dir.clone())
            .build_alignment(&book_id.0)
            .await
    }
}
