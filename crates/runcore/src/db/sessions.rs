use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    ChunkSummary, ChunkType, Cumulative, PauseInterval, RunChunk, RunSession, SessionStatus, Split,
    TrackPoint,
};

use super::Database;

impl Database {
    pub async fn create_session(
        &self,
        user_id: Uuid,
        course_id: Option<Uuid>,
        started_at: OffsetDateTime,
        device_info: Option<serde_json::Value>,
        status: SessionStatus,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query!(
            r#"
            INSERT INTO run_sessions (id, user_id, course_id, status, started_at, device_info, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
            id,
            user_id,
            course_id,
            status as _,
            started_at,
            device_info.map(Json) as _,
        )
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<RunSession>, AppError> {
        let session = sqlx::query_as!(
            RunSession,
            r#"
            SELECT id, user_id, course_id, status as "status: SessionStatus",
                   started_at, device_info as "device_info: Json<serde_json::Value>", created_at
            FROM run_sessions
            WHERE id = $1
            "#,
            session_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn set_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE run_sessions SET status = $2 WHERE id = $1",
            session_id,
            status as _
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_chunk_by_sequence(
        &self,
        session_id: Uuid,
        sequence: i32,
    ) -> Result<Option<RunChunk>, AppError> {
        let chunk = sqlx::query_as!(
            RunChunk,
            r#"
            SELECT id, session_id, sequence, chunk_type as "chunk_type: ChunkType",
                   raw_gps_points as "raw_gps_points: Json<Vec<TrackPoint>>",
                   filtered_points as "filtered_points: Json<Vec<TrackPoint>>",
                   chunk_summary as "chunk_summary: Json<ChunkSummary>",
                   cumulative as "cumulative: Json<Cumulative>",
                   completed_splits as "completed_splits: Json<Vec<Split>>",
                   pause_intervals as "pause_intervals: Json<Vec<PauseInterval>>",
                   created_at
            FROM run_chunks
            WHERE session_id = $1 AND sequence = $2
            "#,
            session_id,
            sequence
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(chunk)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_chunk(
        &self,
        session_id: Uuid,
        sequence: i32,
        chunk_type: ChunkType,
        raw_gps_points: Vec<TrackPoint>,
        filtered_points: Option<Vec<TrackPoint>>,
        chunk_summary: ChunkSummary,
        cumulative: Cumulative,
        completed_splits: Vec<Split>,
        pause_intervals: Vec<PauseInterval>,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query!(
            r#"
            INSERT INTO run_chunks (
                id, session_id, sequence, chunk_type, raw_gps_points, filtered_points,
                chunk_summary, cumulative, completed_splits, pause_intervals, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            "#,
            id,
            session_id,
            sequence,
            chunk_type as _,
            Json(raw_gps_points) as _,
            filtered_points.map(Json) as _,
            Json(chunk_summary) as _,
            Json(cumulative) as _,
            Json(completed_splits) as _,
            Json(pause_intervals) as _,
        )
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn list_chunks(&self, session_id: Uuid) -> Result<Vec<RunChunk>, AppError> {
        let chunks = sqlx::query_as!(
            RunChunk,
            r#"
            SELECT id, session_id, sequence, chunk_type as "chunk_type: ChunkType",
                   raw_gps_points as "raw_gps_points: Json<Vec<TrackPoint>>",
                   filtered_points as "filtered_points: Json<Vec<TrackPoint>>",
                   chunk_summary as "chunk_summary: Json<ChunkSummary>",
                   cumulative as "cumulative: Json<Cumulative>",
                   completed_splits as "completed_splits: Json<Vec<Split>>",
                   pause_intervals as "pause_intervals: Json<Vec<PauseInterval>>",
                   created_at
            FROM run_chunks
            WHERE session_id = $1
            ORDER BY sequence ASC
            "#,
            session_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }
}
