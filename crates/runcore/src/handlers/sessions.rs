//! Live session ingest: start a session, append chunks, finalize or recover.

use axum::{Extension, extract::Path, response::Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::session_service::{ChunkUpload, ChunkUploadOutcome, ClientSummary, SessionService};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    pub course_id: Option<Uuid>,
    pub device_info: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/runs/sessions",
    tag = "runs",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session started", body = CreateSessionResponse),
        (status = 404, description = "course_id does not exist")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_session(
    Extension(service): Extension<SessionService>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let session_id = service
        .create_session(user_id, req.started_at, req.course_id, req.device_info)
        .await?;
    Ok(Json(CreateSessionResponse { session_id }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChunkUploadResponse {
    pub chunk_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/runs/sessions/{id}/chunks",
    tag = "runs",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ChunkUpload,
    responses(
        (status = 200, description = "Chunk accepted", body = ChunkUploadResponse),
        (status = 409, description = "Duplicate sequence"),
        (status = 400, description = "Session is not active")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_chunk(
    Extension(service): Extension<SessionService>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(chunk): Json<ChunkUpload>,
) -> Result<Json<ChunkUploadResponse>, AppError> {
    let chunk_id = service.upload_chunk(user_id, session_id, chunk).await?;
    Ok(Json(ChunkUploadResponse { chunk_id }))
}

#[utoipa::path(
    post,
    path = "/api/v1/runs/sessions/{id}/chunks/batch",
    tag = "runs",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = Vec<ChunkUpload>,
    responses(
        (status = 200, description = "Per-chunk accept/fail outcome", body = ChunkUploadOutcome)
    ),
    security(("bearer_auth" = []))
)]
pub async fn batch_upload_chunks(
    Extension(service): Extension<SessionService>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(chunks): Json<Vec<ChunkUpload>>,
) -> Result<Json<ChunkUploadOutcome>, AppError> {
    let outcome = service.batch_upload_chunks(user_id, session_id, chunks).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteSessionRequest {
    pub total_chunks: i32,
    pub summary: ClientSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizeResponse {
    pub run_record_id: Uuid,
    pub missing_chunk_sequences: Vec<i32>,
}

#[utoipa::path(
    post,
    path = "/api/v1/runs/sessions/{id}/complete",
    tag = "runs",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CompleteSessionRequest,
    responses(
        (status = 200, description = "Run finalized", body = FinalizeResponse),
        (status = 409, description = "Session already completed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_session(
    Extension(service): Extension<SessionService>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CompleteSessionRequest>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (run_record_id, missing_chunk_sequences) = service
        .complete_session(user_id, session_id, req.total_chunks, req.summary)
        .await?;
    Ok(Json(FinalizeResponse { run_record_id, missing_chunk_sequences }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoverSessionRequest {
    #[schema(value_type = String)]
    pub finished_at: OffsetDateTime,
    pub total_chunks: i32,
}

#[utoipa::path(
    post,
    path = "/api/v1/runs/sessions/{id}/recover",
    tag = "runs",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = RecoverSessionRequest,
    responses(
        (status = 200, description = "Session reconstructed from server-held chunks", body = FinalizeResponse),
        (status = 400, description = "No chunks to recover from")
    ),
    security(("bearer_auth" = []))
)]
pub async fn recover_session(
    Extension(service): Extension<SessionService>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<RecoverSessionRequest>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (run_record_id, missing_chunk_sequences) = service
        .recover_session(user_id, session_id, req.finished_at, req.total_chunks)
        .await?;
    Ok(Json(FinalizeResponse { run_record_id, missing_chunk_sequences }))
}
