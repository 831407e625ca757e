use poem_openapi::{ApiResponse, Object, payload::Json};
use uuid::Uuid;

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    pub message: String,
}

#[derive(Debug, Clone, Object)]
pub struct LibraryDto {
    pub id: Uuid,
    pub name: String,
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Object)]
pub struct LibraryItemDto {
    pub id: Uuid,
    pub title: Option<String>,
    pub author: Option<String>,
    pub series: Option<String>,
    pub cover_url: Option<String>,
    pub ebook_format: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(ApiResponse)]
pub enum LibraryListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<LibraryDto>>),
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum LibraryItemsResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<LibraryItemDto>>),
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
pub struct MappingDto {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub sync_mode: String,
    pub status: String,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Object)]
pub struct CreateMappingRequestDto {
    /// ABS library item id; also used as the internal `book_id`.
    pub abs_item_id: String,
    pub title: String,
    pub author: Option<String>,
    pub sync_mode: String,
    pub duration_seconds: Option<f64>,
}

#[derive(ApiResponse)]
pub enum MappingListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<MappingDto>>),
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum MappingCreateResponse {
    #[oai(status = 201)]
    Created(Json<MappingDto>),
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
pub struct LinkExternalIdRequestDto {
    pub client_name: String,
    pub external_id: String,
}

#[derive(ApiResponse)]
pub enum LinkExternalIdResponse {
    #[oai(status = 200)]
    Ok,
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
pub struct SuggestionDto {
    pub source_client: String,
    pub external_id: String,
    pub candidate_book_id: String,
    pub confidence: f64,
}

#[derive(ApiResponse)]
pub enum SuggestionListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<SuggestionDto>>),
    #[oai(status = 502)]
    BadGateway(Json<ErrorDto>),
}

#[derive(Debug, Clone, Object)]
pub struct AlignmentBuildResultDto {
    pub book_id: String,
    pub anchor_count: usize,
    pub alignment_path: String,
}

#[derive(ApiResponse)]
pub enum AlignmentBuildResponse {
    #[oai(status = 200)]
    Ok(Json<AlignmentBuildResultDto>),
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}
