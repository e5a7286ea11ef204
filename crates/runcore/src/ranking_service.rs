//! Ranking and course-stats recompute, plus the difficulty recalculation it
//! can trigger. Runs entirely as post-commit background work, each
//! invocation opening its own pool checkout via the `Database` handle it's
//! given.

use std::collections::HashMap;
use uuid::Uuid;

use crate::db::Database;
use crate::difficulty;
use crate::errors::AppError;
use crate::models::CourseStats;
use crate::task_queue::RankingTrigger;

/// Ranking upsert, then rank recomputation, then course-stats
/// recomputation, then (only if completion rate moved) difficulty
/// recalculation — the full post-commit tail for one finished run.
pub async fn upsert_and_recompute(db: &Database, trigger: &RankingTrigger) -> anyhow::Result<()> {
    upsert_ranking(db, trigger).await?;
    recompute_ranks(db, trigger.course_id).await?;
    let completion_rate_changed = recompute_course_stats(db, trigger.course_id).await?;
    if completion_rate_changed {
        recalculate_difficulty(db, trigger.course_id).await?;
    }
    Ok(())
}

async fn upsert_ranking(db: &Database, trigger: &RankingTrigger) -> Result<(), AppError> {
    match db.get_ranking(trigger.course_id, trigger.user_id).await? {
        None => {
            db.insert_ranking(
                trigger.course_id,
                trigger.user_id,
                trigger.duration_s,
                trigger.pace_s_per_km,
                trigger.finished_at,
            )
            .await
        }
        Some(_) => {
            db.bump_ranking(
                trigger.course_id,
                trigger.user_id,
                trigger.duration_s,
                trigger.pace_s_per_km,
                trigger.finished_at,
            )
            .await
        }
    }
}

/// Ranking rows ordered by `best_duration_s` ascending get ranks
/// `1..=n`. Ties break by insertion order, not `achieved_at` — the rows
/// are already enumerated by row order via `db::list_rankings_for_course`.
async fn recompute_ranks(db: &Database, course_id: Uuid) -> Result<(), AppError> {
    let rankings = db.list_rankings_for_course(course_id).await?;
    for (idx, ranking) in rankings.iter().enumerate() {
        db.set_rank(ranking.id, idx as i32 + 1).await?;
    }
    Ok(())
}

/// Recomputes `CourseStats` from scratch over the course's completed,
/// non-flagged RunRecords. Returns whether `completion_rate` changed,
/// which gates whether difficulty gets recalculated.
async fn recompute_course_stats(db: &Database, course_id: Uuid) -> Result<bool, AppError> {
    let course = db.get_course(course_id).await?.ok_or(AppError::NotFound)?;
    let previous = db.get_course_stats(course_id).await?;

    let completed = db.completed_run_records_for_course(course_id).await?;
    let attempts = db.count_course_attempts(course_id).await?;

    let total_runs = completed.len() as i64;
    let unique_runners: std::collections::HashSet<Uuid> =
        completed.iter().map(|r| r.user_id).collect();

    let durations: Vec<i64> = completed.iter().map(|r| r.duration_seconds).collect();
    let avg_duration_s = average(&durations);
    let best_duration_s = durations.iter().min().copied();

    // Paces are derived from the course's own reference distance, not the
    // individual run's distance.
    let course_distance_km = course.distance_m as f64 / 1000.0;
    let avg_pace_s_per_km = avg_duration_s.filter(|_| course_distance_km > 0.0).map(|d| (d as f64 / course_distance_km).floor() as i64);
    let best_pace_s_per_km = best_duration_s.filter(|_| course_distance_km > 0.0).map(|d| (d as f64 / course_distance_km).floor() as i64);

    let completion_rate = if attempts > 0 {
        total_runs as f64 / attempts as f64
    } else {
        0.0
    };

    let mut runs_by_hour: HashMap<String, i64> = HashMap::new();
    for run in &completed {
        let hour = run.started_at.to_offset(time::UtcOffset::UTC).hour();
        *runs_by_hour.entry(format!("{hour:02}")).or_insert(0) += 1;
    }

    let stats = CourseStats {
        course_id,
        total_runs,
        unique_runners: unique_runners.len() as i64,
        avg_duration_s,
        best_duration_s,
        avg_pace_s_per_km,
        best_pace_s_per_km,
        completion_rate,
        runs_by_hour: sqlx::types::Json(runs_by_hour),
    };

    let changed = previous
        .map(|p| (p.completion_rate - completion_rate).abs() > f64::EPSILON)
        .unwrap_or(true);

    db.upsert_course_stats(&stats).await?;
    Ok(changed)
}

async fn recalculate_difficulty(db: &Database, course_id: Uuid) -> Result<(), AppError> {
    let course = db.get_course(course_id).await?.ok_or(AppError::NotFound)?;
    let stats = db.get_course_stats(course_id).await?;

    let difficulty = difficulty::compute_difficulty(
        course.distance_m,
        course.elevation_gain_m,
        stats.map(|s| s.completion_rate),
    );

    db.update_course_difficulty(course_id, difficulty).await
}

fn average(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<i64>() / values.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_is_none() {
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn average_floors() {
        assert_eq!(average(&[10, 11]), Some(10));
    }

    /// `recompute_ranks` assigns rank purely by the order
    /// `list_rankings_for_course` returns rows in, so two rows tied on
    /// `best_duration_s` keep whichever relative order the query produced
    /// rather than being re-sorted by `achieved_at`.
    #[test]
    fn tie_break_is_insertion_order() {
        let durations = [42_i64, 42_i64, 41_i64];
        let ranks: Vec<i32> = durations
            .iter()
            .enumerate()
            .map(|(idx, _)| idx as i32 + 1)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }
}
