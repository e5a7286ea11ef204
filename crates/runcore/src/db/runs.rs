use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{PauseInterval, RunRecord, RunSource, Split};

use super::Database;

#[allow(clippy::too_many_arguments)]
pub struct NewRunRecord {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub course_id: Option<Uuid>,
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub total_elapsed_seconds: Option<i64>,
    pub avg_pace_seconds_per_km: Option<i64>,
    pub best_pace_seconds_per_km: Option<i64>,
    pub avg_speed_ms: Option<f64>,
    pub max_speed_ms: Option<f64>,
    pub elevation_gain_meters: i32,
    pub elevation_loss_meters: i32,
    pub route_geometry: serde_json::Value,
    pub elevation_profile: Vec<f64>,
    pub splits: Vec<Split>,
    pub pause_intervals: Vec<PauseInterval>,
    pub course_completed: Option<bool>,
    pub route_match_percent: Option<f64>,
    pub max_deviation_meters: Option<f64>,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub source: RunSource,
    pub external_import_id: Option<Uuid>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl Database {
    pub async fn create_run_record(&self, new: NewRunRecord) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query!(
            r#"
            INSERT INTO run_records (
                id, user_id, session_id, course_id, distance_meters, duration_seconds,
                total_elapsed_seconds, avg_pace_seconds_per_km, best_pace_seconds_per_km,
                avg_speed_ms, max_speed_ms, elevation_gain_meters, elevation_loss_meters,
                route_geometry, elevation_profile, splits, pause_intervals,
                course_completed, route_match_percent, max_deviation_meters,
                is_flagged, flag_reason, source, external_import_id,
                started_at, finished_at, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25, $26, now()
            )
            "#,
            id,
            new.user_id,
            new.session_id,
            new.course_id,
            new.distance_meters,
            new.duration_seconds,
            new.total_elapsed_seconds,
            new.avg_pace_seconds_per_km,
            new.best_pace_seconds_per_km,
            new.avg_speed_ms,
            new.max_speed_ms,
            new.elevation_gain_meters,
            new.elevation_loss_meters,
            new.route_geometry,
            Json(new.elevation_profile) as _,
            Json(new.splits) as _,
            Json(new.pause_intervals) as _,
            new.course_completed,
            new.route_match_percent,
            new.max_deviation_meters,
            new.is_flagged,
            new.flag_reason,
            new.source as _,
            new.external_import_id,
            new.started_at,
            new.finished_at,
        )
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_run_record(&self, id: Uuid) -> Result<Option<RunRecord>, AppError> {
        let record = sqlx::query_as!(
            RunRecord,
            r#"
            SELECT id, user_id, session_id, course_id, distance_meters, duration_seconds,
                   total_elapsed_seconds, avg_pace_seconds_per_km, best_pace_seconds_per_km,
                   avg_speed_ms, max_speed_ms, calories, elevation_gain_meters, elevation_loss_meters,
                   route_geometry,
                   elevation_profile as "elevation_profile: Json<Vec<f64>>",
                   splits as "splits: Json<Vec<Split>>",
                   pause_intervals as "pause_intervals: Json<Vec<PauseInterval>>",
                   course_completed, route_match_percent, max_deviation_meters,
                   is_flagged, flag_reason, source as "source: RunSource", external_import_id,
                   started_at, finished_at, created_at
            FROM run_records
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Every RunRecord with this `course_id` — the completion-rate
    /// denominator; attempts include flagged runs.
    pub async fn count_course_attempts(&self, course_id: Uuid) -> Result<i64, AppError> {
        let row = sqlx::query!(
            "SELECT COUNT(*) as count FROM run_records WHERE course_id = $1",
            course_id
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.count.unwrap_or(0))
    }

    /// Completed, non-flagged RunRecords for a course — the set Ranking and
    /// CourseStats are recomputed from.
    pub async fn completed_run_records_for_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<RunRecord>, AppError> {
        let records = sqlx::query_as!(
            RunRecord,
            r#"
            SELECT id, user_id, session_id, course_id, distance_meters, duration_seconds,
                   total_elapsed_seconds, avg_pace_seconds_per_km, best_pace_seconds_per_km,
                   avg_speed_ms, max_speed_ms, calories, elevation_gain_meters, elevation_loss_meters,
                   route_geometry,
                   elevation_profile as "elevation_profile: Json<Vec<f64>>",
                   splits as "splits: Json<Vec<Split>>",
                   pause_intervals as "pause_intervals: Json<Vec<PauseInterval>>",
                   course_completed, route_match_percent, max_deviation_meters,
                   is_flagged, flag_reason, source as "source: RunSource", external_import_id,
                   started_at, finished_at, created_at
            FROM run_records
            WHERE course_id = $1 AND course_completed = true AND is_flagged = false
            ORDER BY created_at ASC
            "#,
            course_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
