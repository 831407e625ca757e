//! KoSync-compatible HTTP surface (A4, spec §6 "KoReader sync protocol
//! (server role)"). Exposed so a KOReader device can point its progress-sync
//! plugin directly at this bridge instead of (or alongside) a standalone
//! koreader-sync server.

mod models;
mod service;

use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, payload::Json};
use tokio::sync::mpsc;

use crate::storage::Store;
use models::{
    ErrorDto, HealthDto, HealthResponse, KoSyncProgressDto, ProgressGetResponse,
    ProgressPutResponse, UserCreateRequestDto, UserResponse, UserResultDto,
};
use service::SyncApiService;

pub struct SyncApi {
    pub store: Arc<Store>,
    pub enqueue: mpsc::UnboundedSender<String>,
}

#[OpenApi]
impl SyncApi {
    #[oai(path = "/healthcheck", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn healthcheck(&self) -> HealthResponse {
        HealthResponse::Ok(Json(HealthDto {
            state: "OK".to_string(),
        }))
    }

    /// Single-user bridge: account creation always succeeds, there is
    /// nothing to persist beyond what the mapping layer already tracks.
    #[oai(path = "/users/create", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn create_user(&self, body: Json<UserCreateRequestDto>) -> UserResponse {
        UserResponse::Ok(Json(UserResultDto {
            username: body.0.username,
        }))
    }

    #[oai(path = "/users/auth", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn auth_user(&self) -> UserResponse {
        UserResponse::Ok(Json(UserResultDto {
            username: "abs-sync-bridge".to_string(),
        }))
    }

    #[oai(path = "/syncs/progress/:document", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, document))]
    async fn get_progress(&self, document: Path<String>) -> ProgressGetResponse {
        let service = SyncApiService::new(self.store.clone(), self.enqueue.clone());
        match service.get_progress(&document.0).await {
            Ok(Some(dto)) => ProgressGetResponse::Ok(Json(dto)),
            Ok(None) => ProgressGetResponse::NotFound(Json(ErrorDto {
                message: "document not mapped to a known book".to_string(),
            })),
            Err(e) => ProgressGetResponse::NotFound(Json(ErrorDto { message: e })),
        }
    }

    #[oai(path = "/syncs/progress/:document", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, document, body))]
    async fn put_progress(
        &self,
        document: Path<String>,
        body: Json<KoSyncProgressDto>,
    ) -> ProgressPutResponse {
        let service = SyncApiService::new(self.store.clone(), self.enqueue.clone());
        match service
            .put_progress(&document.0, &body.0.progress, body.0.percentage)
            .await
        {
            Ok(Some(dto)) => ProgressPutResponse::Ok(Json(dto)),
            Ok(None) => ProgressPutResponse::NotFound(Json(ErrorDto {
                message: "document not mapped to a known book".to_string(),
            })),
            Err(e) => ProgressPutResponse::BadRequest(Json(ErrorDto { message: e })),
        }
    }
}
