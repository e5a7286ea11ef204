//! Session and chunk ingest: accept an append-only stream of GPS chunks
//! for one live run, persist each durably, and at finalization decide
//! whether to trust the client-supplied summary or reconstruct one.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::Database;
use crate::errors::AppError;
use crate::models::{ChunkSummary, ChunkType, Cumulative, PauseInterval, RunSession, SessionStatus, Split, TrackPoint};
use crate::task_queue::TaskQueue;
use crate::trace;

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    queue: TaskQueue,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChunkUpload {
    pub sequence: i32,
    pub chunk_type: ChunkType,
    pub raw_points: Vec<TrackPoint>,
    pub filtered_points: Option<Vec<TrackPoint>>,
    pub chunk_summary: ChunkSummary,
    pub cumulative: Cumulative,
    #[serde(default)]
    pub completed_splits: Vec<Split>,
    #[serde(default)]
    pub pause_intervals: Vec<PauseInterval>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedChunk {
    pub sequence: i32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChunkUploadOutcome {
    pub accepted: Vec<i32>,
    pub failed: Vec<FailedChunk>,
}

impl SessionService {
    pub fn new(db: Database, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    /// Fetches the session and verifies the caller owns it, reporting
    /// ownership violations as not-found so existence never leaks.
    async fn owned_session(&self, user_id: Uuid, session_id: Uuid) -> Result<RunSession, AppError> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if session.user_id != user_id {
            return Err(AppError::NotFound);
        }

        Ok(session)
    }

    pub async fn create_session(
        &self,
        user_id: Uuid,
        started_at: OffsetDateTime,
        course_id: Option<Uuid>,
        device_info: Option<serde_json::Value>,
    ) -> Result<Uuid, AppError> {
        if let Some(course_id) = course_id {
            self.db
                .get_course(course_id)
                .await?
                .ok_or(AppError::NotFound)?;
        }

        self.db
            .create_session(user_id, course_id, started_at, device_info, SessionStatus::Active)
            .await
    }

    pub async fn upload_chunk(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        chunk: ChunkUpload,
    ) -> Result<Uuid, AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        if session.status != SessionStatus::Active {
            return Err(AppError::InvalidSessionState(status_str(session.status).into()));
        }

        if self
            .db
            .get_chunk_by_sequence(session_id, chunk.sequence)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateChunk(chunk.sequence));
        }

        self.db
            .insert_chunk(
                session_id,
                chunk.sequence,
                chunk.chunk_type,
                chunk.raw_points,
                chunk.filtered_points,
                chunk.chunk_summary,
                chunk.cumulative,
                chunk.completed_splits,
                chunk.pause_intervals,
            )
            .await
    }

    /// Allowed while the session is `{active, completed, recovered}` so a
    /// client can backfill after a crash. Duplicates are silently reported
    /// as accepted (idempotent-success).
    pub async fn batch_upload_chunks(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        chunks: Vec<ChunkUpload>,
    ) -> Result<ChunkUploadOutcome, AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        if session.status == SessionStatus::Imported {
            return Err(AppError::InvalidSessionState(status_str(session.status).into()));
        }

        let mut accepted = Vec::new();
        let mut failed = Vec::new();

        for chunk in chunks {
            let sequence = chunk.sequence;
            if self.db.get_chunk_by_sequence(session_id, sequence).await?.is_some() {
                accepted.push(sequence);
                continue;
            }

            match self
                .db
                .insert_chunk(
                    session_id,
                    chunk.sequence,
                    chunk.chunk_type,
                    chunk.raw_points,
                    chunk.filtered_points,
                    chunk.chunk_summary,
                    chunk.cumulative,
                    chunk.completed_splits,
                    chunk.pause_intervals,
                )
                .await
            {
                Ok(_) => accepted.push(sequence),
                Err(e) => failed.push(FailedChunk { sequence, error: e.to_string() }),
            }
        }

        Ok(ChunkUploadOutcome { accepted, failed })
    }

    /// Creates the RunRecord from the client-reported summary (Q1:
    /// trusted without reconciliation against server-held chunks) and
    /// returns the sequences in `[0, total_chunks)` not yet persisted.
    pub async fn complete_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        total_chunks: i32,
        summary: ClientSummary,
    ) -> Result<(Uuid, Vec<i32>), AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        if session.status != SessionStatus::Active {
            return Err(AppError::AlreadyCompleted);
        }

        let run_record_id = crate::run_finalization::finalize_run_from_summary(
            &self.db, &self.queue, &session, session_id, summary,
        )
        .await?;

        self.db.set_session_status(session_id, SessionStatus::Completed).await?;

        let persisted = self.db.list_chunks(session_id).await?;
        let missing = missing_sequences(&persisted.iter().map(|c| c.sequence).collect::<Vec<_>>(), total_chunks);

        Ok((run_record_id, missing))
    }

    /// Used when the client crashed before calling `complete`. Reconstructs
    /// the summary entirely from server-held chunks: the last chunk's
    /// `cumulative` is authoritative (monotonicity assumption); filtered
    /// (or raw) points are concatenated across chunks in ascending
    /// `sequence` order.
    pub async fn recover_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        finished_at: OffsetDateTime,
        total_chunks: i32,
    ) -> Result<(Uuid, Vec<i32>), AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        if session.status == SessionStatus::Completed {
            return Err(AppError::AlreadyCompleted);
        }

        let chunks = self.db.list_chunks(session_id).await?;
        if chunks.is_empty() {
            return Err(AppError::NoChunks);
        }

        let last = chunks.last().expect("non-empty checked above");
        let cumulative = last.cumulative.0.clone();

        let mut points: Vec<TrackPoint> = Vec::new();
        let mut splits = Vec::new();
        let mut pauses = Vec::new();
        for chunk in &chunks {
            points.extend_from_slice(chunk.points());
            splits.extend(chunk.completed_splits.0.iter().cloned());
            pauses.extend(chunk.pause_intervals.0.iter().cloned());
        }

        let derived = trace::derive_activity(&points);
        let started_at = session.started_at;

        let run_record_id = crate::run_finalization::finalize_recovered_run(
            &self.db,
            &self.queue,
            &session,
            session_id,
            started_at,
            finished_at,
            cumulative,
            derived,
            splits,
            pauses,
        )
        .await?;

        self.db.set_session_status(session_id, SessionStatus::Recovered).await?;

        let persisted = self.db.list_chunks(session_id).await?;
        let missing = missing_sequences(&persisted.iter().map(|c| c.sequence).collect::<Vec<_>>(), total_chunks);

        Ok((run_record_id, missing))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClientSummary {
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub avg_pace_seconds_per_km: Option<i64>,
    pub best_pace_seconds_per_km: Option<i64>,
    pub avg_speed_ms: Option<f64>,
    pub max_speed_ms: Option<f64>,
    pub elevation_gain_meters: i32,
    pub elevation_loss_meters: i32,
    pub route_geometry: serde_json::Value,
    #[serde(default)]
    pub elevation_profile: Vec<f64>,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub pause_intervals: Vec<PauseInterval>,
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub finished_at: OffsetDateTime,
}

fn missing_sequences(persisted: &[i32], total_chunks: i32) -> Vec<i32> {
    (0..total_chunks).filter(|seq| !persisted.contains(seq)).collect()
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::Recovered => "recovered",
        SessionStatus::Imported => "imported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sequences_reports_gaps() {
        assert_eq!(missing_sequences(&[0, 1, 2], 5), vec![3, 4]);
        assert_eq!(missing_sequences(&[0, 1, 2, 3, 4], 5), Vec::<i32>::new());
    }
}
