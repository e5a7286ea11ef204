//! Core entities from the data model: User, Course, CourseStats, RunSession,
//! RunChunk, RunRecord, Ranking, ExternalImport, plus the tagged JSON-payload
//! types that travel inside chunk/record columns.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub nickname: String,
    pub total_distance_m: i64,
    pub total_runs: i32,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn new(nickname: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname,
            total_distance_m: 0,
            total_runs: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_score(score: f64) -> Self {
        if score < 33.0 {
            Difficulty::Easy
        } else if score < 66.0 {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub run_record_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    /// GeoJSON LineString, `[lng, lat, alt?]` per vertex, post map-matching.
    pub route_geometry: serde_json::Value,
    /// GeoJSON LineString before any normalization was applied.
    pub raw_route_geometry: serde_json::Value,
    pub start_lat: f64,
    pub start_lng: f64,
    pub distance_m: i64,
    pub elevation_gain_m: i32,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub course_type: Option<String>,
    pub lap_count: Option<i32>,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CourseStats {
    pub course_id: Uuid,
    pub total_runs: i64,
    pub unique_runners: i64,
    pub avg_duration_s: Option<i64>,
    pub best_duration_s: Option<i64>,
    pub avg_pace_s_per_km: Option<i64>,
    pub best_pace_s_per_km: Option<i64>,
    pub completion_rate: f64,
    /// Keys `"00"`..`"23"`.
    #[schema(value_type = HashMap<String, i64>)]
    pub runs_by_hour: Json<HashMap<String, i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Recovered,
    Imported,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RunSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Option<Uuid>,
    pub status: SessionStatus,
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    #[schema(value_type = Option<serde_json::Value>)]
    pub device_info: Option<Json<serde_json::Value>>,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ChunkType {
    Intermediate,
    Final,
}

/// One raw GPS fix as carried in a chunk's point arrays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub alt: Option<f64>,
    #[schema(value_type = String)]
    pub timestamp: OffsetDateTime,
    pub speed_ms: Option<f64>,
    pub heart_rate: Option<i32>,
}

impl TrackPoint {
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChunkSummary {
    pub distance_m: f64,
    pub duration_s: i64,
    pub avg_pace_s_per_km: Option<i64>,
    pub elevation_change_m: f64,
    pub point_count: i64,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<OffsetDateTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Cumulative {
    pub total_distance_meters: f64,
    pub total_duration_seconds: i64,
    pub avg_pace_seconds_per_km: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Split {
    pub split_number: i32,
    pub distance_meters: f64,
    pub duration_seconds: i64,
    pub pace_seconds_per_km: i64,
    pub elevation_delta_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PauseInterval {
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub ended_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunChunk {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sequence: i32,
    pub chunk_type: ChunkType,
    pub raw_gps_points: Json<Vec<TrackPoint>>,
    pub filtered_points: Option<Json<Vec<TrackPoint>>>,
    pub chunk_summary: Json<ChunkSummary>,
    pub cumulative: Json<Cumulative>,
    pub completed_splits: Json<Vec<Split>>,
    pub pause_intervals: Json<Vec<PauseInterval>>,
    pub created_at: OffsetDateTime,
}

impl RunChunk {
    /// Filtered points if present, otherwise the raw stream — the ingest
    /// contract's fallback used during recovery reconstruction.
    pub fn points(&self) -> &[TrackPoint] {
        self.filtered_points
            .as_ref()
            .map(|p| p.0.as_slice())
            .unwrap_or(self.raw_gps_points.0.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RunSource {
    App,
    GpxUpload,
    FitUpload,
    Strava,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RunRecord {
    pub id: Uuid,
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
    pub calories: Option<i32>,
    pub elevation_gain_meters: i32,
    pub elevation_loss_meters: i32,
    pub route_geometry: serde_json::Value,
    #[schema(value_type = Vec<f64>)]
    pub elevation_profile: Json<Vec<f64>>,
    #[schema(value_type = Vec<Split>)]
    pub splits: Json<Vec<Split>>,
    #[schema(value_type = Vec<PauseInterval>)]
    pub pause_intervals: Json<Vec<PauseInterval>>,
    /// null = no course chosen; Some(true/false) = match outcome.
    pub course_completed: Option<bool>,
    pub route_match_percent: Option<f64>,
    pub max_deviation_meters: Option<f64>,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub source: RunSource,
    pub external_import_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub started_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub finished_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Ranking {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub best_duration_s: i64,
    pub best_pace_s_per_km: i64,
    pub run_count: i32,
    pub rank: i32,
    #[schema(value_type = String)]
    pub achieved_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ImportSource {
    Gpx,
    Fit,
    Strava,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ExternalImport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: ImportSource,
    pub external_id: Option<String>,
    pub object_store_path: Option<String>,
    pub status: ImportStatus,
    pub run_record_id: Option<Uuid>,
    pub error_message: Option<String>,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}
