//! DTOs for the KoSync-compatible surface (spec §6 "KoReader sync protocol
//! (server role)"), following the teacher's `poem_openapi` Object/ApiResponse
//! idiom.

use poem_openapi::{ApiResponse, Object, payload::Json};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    pub message: String,
}

#[derive(Debug, Clone, Object)]
pub struct HealthDto {
    pub state: String,
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    #[oai(status = 200)]
    Ok(Json<HealthDto>),
}

#[derive(Debug, Clone, Object)]
pub struct UserCreateRequestDto {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Object)]
pub struct UserResultDto {
    pub username: String,
}

#[derive(ApiResponse)]
pub enum UserResponse {
    #[oai(status = 200)]
    Ok(Json<UserResultDto>),
    #[oai(status = 401)]
    Unauthorized(Json<ErrorDto>),
}

/// KOSync's own progress document shape: `document` is a hash of the book's
/// content, not our internal `book_id` (spec §6).
#[derive(Debug, Clone, Object)]
pub struct KoSyncProgressDto {
    pub document: String,
    pub progress: String,
    pub percentage: f64,
    pub device: String,
    pub device_id: String,
    #[oai(skip_serializing_if_is_none)]
    pub timestamp: Option<i64>,
}

#[derive(ApiResponse)]
pub enum ProgressGetResponse {
    #[oai(status = 200)]
    Ok(Json<KoSyncProgressDto>),
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
pub struct ProgressPutResultDto {
    pub document: String,
    pub timestamp: i64,
}

#[derive(ApiResponse)]
pub enum ProgressPutResponse {
    #[oai(status = 200)]
    Ok(Json<ProgressPutResultDto>),
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}
