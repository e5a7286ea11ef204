//! Shared tail end of every ingest path (live completion, live recovery,
//! file/third-party import): attempt a course match, run speed-anomaly
//! detection, persist the RunRecord, update the runner's cumulative stats,
//! and — only when the run completed a course cleanly — enqueue the
//! post-commit ranking/stats task.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Database;
use crate::errors::AppError;
use crate::models::{Course, PauseInterval, RunSession, RunSource, Split};
use crate::route_matcher::{self, Point2D, RouteMatchResult};
use crate::session_service::ClientSummary;
use crate::speed_anomaly;
use crate::task_queue::{RankingTrigger, Task, TaskQueue};
use crate::trace::DerivedActivity;

/// Everything the shared tail needs, independent of which caller produced it.
struct FinalizedRun {
    distance_meters: i64,
    duration_seconds: i64,
    avg_pace_seconds_per_km: Option<i64>,
    best_pace_seconds_per_km: Option<i64>,
    avg_speed_ms: Option<f64>,
    max_speed_ms: Option<f64>,
    elevation_gain_meters: i32,
    elevation_loss_meters: i32,
    route_geometry: serde_json::Value,
    elevation_profile: Vec<f64>,
    splits: Vec<Split>,
    pause_intervals: Vec<PauseInterval>,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
}

pub async fn finalize_run_from_summary(
    db: &Database,
    queue: &TaskQueue,
    session: &RunSession,
    session_id: Uuid,
    summary: ClientSummary,
) -> Result<Uuid, AppError> {
    let run = FinalizedRun {
        distance_meters: summary.distance_meters,
        duration_seconds: summary.duration_seconds,
        avg_pace_seconds_per_km: summary.avg_pace_seconds_per_km,
        best_pace_seconds_per_km: summary.best_pace_seconds_per_km,
        avg_speed_ms: summary.avg_speed_ms,
        max_speed_ms: summary.max_speed_ms,
        elevation_gain_meters: summary.elevation_gain_meters,
        elevation_loss_meters: summary.elevation_loss_meters,
        route_geometry: summary.route_geometry,
        elevation_profile: summary.elevation_profile,
        splits: summary.splits,
        pause_intervals: summary.pause_intervals,
        started_at: summary.started_at,
        finished_at: summary.finished_at,
    };

    finalize(db, queue, session, session_id, run, RunSource::App, None).await
}

#[allow(clippy::too_many_arguments)]
pub async fn finalize_recovered_run(
    db: &Database,
    queue: &TaskQueue,
    session: &RunSession,
    session_id: Uuid,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    cumulative: crate::models::Cumulative,
    derived: DerivedActivity,
    splits: Vec<Split>,
    pauses: Vec<PauseInterval>,
) -> Result<Uuid, AppError> {
    // The last chunk's cumulative snapshot is authoritative for
    // distance/duration/avg pace (monotonicity assumption); everything
    // else comes from re-deriving the concatenated trace.
    let run = FinalizedRun {
        distance_meters: cumulative.total_distance_meters.round() as i64,
        duration_seconds: cumulative.total_duration_seconds,
        avg_pace_seconds_per_km: cumulative.avg_pace_seconds_per_km,
        best_pace_seconds_per_km: derived.best_pace_seconds_per_km,
        avg_speed_ms: derived.avg_speed_ms,
        max_speed_ms: Some(derived.max_speed_ms),
        elevation_gain_meters: derived.elevation_gain_meters.round() as i32,
        elevation_loss_meters: derived.elevation_loss_meters.round() as i32,
        route_geometry: serde_json::to_value(&derived.route_coordinates)
            .unwrap_or(serde_json::Value::Array(vec![])),
        elevation_profile: derived.elevation_profile,
        splits,
        pause_intervals: pauses,
        started_at,
        finished_at,
    };

    finalize(db, queue, session, session_id, run, RunSource::App, None).await
}

/// Used by the import pipeline, which has no bound session to read
/// `course_id` from and instead runs candidate selection itself.
#[allow(clippy::too_many_arguments)]
pub async fn finalize_imported_run(
    db: &Database,
    queue: &TaskQueue,
    session: &RunSession,
    session_id: Uuid,
    derived: DerivedActivity,
    source: RunSource,
    external_import_id: Uuid,
) -> Result<Uuid, AppError> {
    let started_at = session.started_at;
    let finished_at = started_at + time::Duration::seconds(derived.duration_seconds);

    let run = FinalizedRun {
        distance_meters: derived.distance_meters.round() as i64,
        duration_seconds: derived.duration_seconds,
        avg_pace_seconds_per_km: derived.avg_pace_seconds_per_km,
        best_pace_seconds_per_km: derived.best_pace_seconds_per_km,
        avg_speed_ms: derived.avg_speed_ms,
        max_speed_ms: Some(derived.max_speed_ms),
        elevation_gain_meters: derived.elevation_gain_meters.round() as i32,
        elevation_loss_meters: derived.elevation_loss_meters.round() as i32,
        route_geometry: serde_json::to_value(&derived.route_coordinates)
            .unwrap_or(serde_json::Value::Array(vec![])),
        elevation_profile: derived.elevation_profile,
        splits: derived.splits,
        pause_intervals: vec![],
        started_at,
        finished_at,
    };

    finalize(db, queue, session, session_id, run, source, Some(external_import_id)).await
}

async fn finalize(
    db: &Database,
    queue: &TaskQueue,
    session: &RunSession,
    session_id: Uuid,
    run: FinalizedRun,
    source: RunSource,
    external_import_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    let anomaly = speed_anomaly::analyze_run(
        run.distance_meters,
        run.duration_seconds,
        run.avg_speed_ms,
        run.max_speed_ms,
        &run.splits,
        run.best_pace_seconds_per_km,
    );

    let (course_id, match_result) =
        attempt_course_match(db, session, external_import_id.is_some(), &run.route_geometry).await?;

    let new_record = crate::db::runs::NewRunRecord {
        user_id: session.user_id,
        session_id,
        course_id,
        distance_meters: run.distance_meters,
        duration_seconds: run.duration_seconds,
        total_elapsed_seconds: Some(run.duration_seconds),
        avg_pace_seconds_per_km: run.avg_pace_seconds_per_km,
        best_pace_seconds_per_km: run.best_pace_seconds_per_km,
        avg_speed_ms: run.avg_speed_ms,
        max_speed_ms: run.max_speed_ms,
        elevation_gain_meters: run.elevation_gain_meters,
        elevation_loss_meters: run.elevation_loss_meters,
        route_geometry: run.route_geometry,
        elevation_profile: run.elevation_profile,
        splits: run.splits,
        pause_intervals: run.pause_intervals,
        course_completed: match_result.as_ref().map(|m| m.is_completed),
        route_match_percent: match_result.as_ref().map(|m| m.route_match_percent),
        max_deviation_meters: match_result.as_ref().map(|m| m.max_deviation_meters),
        is_flagged: anomaly.is_flagged,
        flag_reason: anomaly.flag_reason,
        source,
        external_import_id,
        started_at: run.started_at,
        finished_at: run.finished_at,
    };

    let run_record_id = db.create_run_record(new_record).await?;
    db.update_user_cumulative_stats(session.user_id, run.distance_meters).await?;

    let completed_cleanly = match_result.as_ref().is_some_and(|m| m.is_completed) && !anomaly.is_flagged;
    if completed_cleanly {
        if let Some(course_id) = course_id {
            queue.enqueue(Task::RecomputeRanking(RankingTrigger {
                course_id,
                user_id: session.user_id,
                duration_s: run.duration_seconds,
                pace_s_per_km: run.avg_pace_seconds_per_km.unwrap_or(0),
                finished_at: run.finished_at,
            }));
        }
    }

    Ok(run_record_id)
}

/// Live sessions only ever match their own bound course. Imports search
/// public candidates within 500 m of the runner's start.
async fn attempt_course_match(
    db: &Database,
    session: &RunSession,
    is_import: bool,
    route_geometry: &serde_json::Value,
) -> Result<(Option<Uuid>, Option<RouteMatchResult>), AppError> {
    let runner_points = points_from_geometry(route_geometry);
    if runner_points.is_empty() {
        return Ok((session.course_id, None));
    }

    if is_import {
        let start = runner_points[0];
        let candidates = db.candidate_courses_near(start.lat, start.lng).await?;
        return Ok(best_candidate_match(&runner_points, candidates));
    }

    let Some(course_id) = session.course_id else {
        return Ok((None, None));
    };
    let Some(course) = db.get_course(course_id).await? else {
        return Ok((None, None));
    };

    let course_points = points_from_geometry(&course.route_geometry);
    let result = route_matcher::calculate_route_match(&runner_points, &course_points);
    Ok((Some(course_id), Some(result)))
}

/// Evaluate every candidate, keep the highest `route_match_percent` among
/// those that meet the completion threshold; ties keep the first (nearest).
fn best_candidate_match(
    runner_points: &[Point2D],
    candidates: Vec<Course>,
) -> (Option<Uuid>, Option<RouteMatchResult>) {
    let mut best: Option<(Uuid, RouteMatchResult)> = None;

    for course in candidates {
        let course_points = points_from_geometry(&course.route_geometry);
        let result = route_matcher::calculate_route_match(runner_points, &course_points);
        if !result.is_completed {
            continue;
        }
        if best
            .as_ref()
            .is_none_or(|(_, b)| result.route_match_percent > b.route_match_percent)
        {
            best = Some((course.id, result));
        }
    }

    match best {
        Some((id, result)) => (Some(id), Some(result)),
        None => (None, None),
    }
}

fn points_from_geometry(geometry: &serde_json::Value) -> Vec<Point2D> {
    let Some(array) = geometry.as_array() else {
        return vec![];
    };

    array
        .iter()
        .filter_map(|v| {
            let coords = v.as_array()?;
            let lng = coords.first()?.as_f64()?;
            let lat = coords.get(1)?.as_f64()?;
            Some(Point2D { lat, lng })
        })
        .collect()
}
