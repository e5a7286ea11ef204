use sqlx::types::Json;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CourseStats, Ranking};

use super::Database;

impl Database {
    pub async fn get_ranking(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ranking>, AppError> {
        let ranking = sqlx::query_as!(
            Ranking,
            r#"
            SELECT id, course_id, user_id, best_duration_s, best_pace_s_per_km,
                   run_count, rank, achieved_at
            FROM rankings
            WHERE course_id = $1 AND user_id = $2
            "#,
            course_id,
            user_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(ranking)
    }

    pub async fn insert_ranking(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        best_duration_s: i64,
        best_pace_s_per_km: i64,
        achieved_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            INSERT INTO rankings (id, course_id, user_id, best_duration_s, best_pace_s_per_km,
                                  run_count, rank, achieved_at)
            VALUES ($1, $2, $3, $4, $5, 1, 0, $6)
            "#,
            Uuid::new_v4(),
            course_id,
            user_id,
            best_duration_s,
            best_pace_s_per_km,
            achieved_at,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Unconditionally increments `run_count`; overwrites the best only when
    /// `new_duration_s` improves on it.
    pub async fn bump_ranking(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        new_duration_s: i64,
        new_pace_s_per_km: i64,
        achieved_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE rankings
            SET run_count = run_count + 1,
                best_duration_s = CASE WHEN $3 < best_duration_s THEN $3 ELSE best_duration_s END,
                best_pace_s_per_km = CASE WHEN $3 < best_duration_s THEN $4 ELSE best_pace_s_per_km END,
                achieved_at = CASE WHEN $3 < best_duration_s THEN $5 ELSE achieved_at END
            WHERE course_id = $1 AND user_id = $2
            "#,
            course_id,
            user_id,
            new_duration_s,
            new_pace_s_per_km,
            achieved_at,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_rankings_for_course(&self, course_id: Uuid) -> Result<Vec<Ranking>, AppError> {
        let rankings = sqlx::query_as!(
            Ranking,
            r#"
            SELECT id, course_id, user_id, best_duration_s, best_pace_s_per_km,
                   run_count, rank, achieved_at
            FROM rankings
            WHERE course_id = $1
            ORDER BY best_duration_s ASC, seq ASC
            "#,
            course_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rankings)
    }

    /// Leaderboard page ordered by `rank`, plus the course's total ranked
    /// runner count for the response envelope.
    pub async fn list_rankings_page(
        &self,
        course_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Ranking>, i64), AppError> {
        let rankings = sqlx::query_as!(
            Ranking,
            r#"
            SELECT id, course_id, user_id, best_duration_s, best_pace_s_per_km,
                   run_count, rank, achieved_at
            FROM rankings
            WHERE course_id = $1
            ORDER BY rank ASC
            LIMIT $2 OFFSET $3
            "#,
            course_id,
            limit,
            offset,
        )
        .fetch_all(&self.pool)
        .await?;

        let total_count = sqlx::query_scalar!(
            "SELECT count(*) FROM rankings WHERE course_id = $1",
            course_id
        )
        .fetch_one(&self.pool)
        .await?
        .unwrap_or(0);

        Ok((rankings, total_count))
    }

    pub async fn set_rank(&self, ranking_id: Uuid, rank: i32) -> Result<(), AppError> {
        sqlx::query!("UPDATE rankings SET rank = $2 WHERE id = $1", ranking_id, rank)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_course_stats(&self, course_id: Uuid) -> Result<Option<CourseStats>, AppError> {
        let stats = sqlx::query_as!(
            CourseStats,
            r#"
            SELECT course_id, total_runs, unique_runners, avg_duration_s, best_duration_s,
                   avg_pace_s_per_km, best_pace_s_per_km, completion_rate,
                   runs_by_hour as "runs_by_hour: Json<HashMap<String, i64>>"
            FROM course_stats
            WHERE course_id = $1
            "#,
            course_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_course_stats(&self, stats: &CourseStats) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            INSERT INTO course_stats (
                course_id, total_runs, unique_runners, avg_duration_s, best_duration_s,
                avg_pace_s_per_km, best_pace_s_per_km, completion_rate, runs_by_hour
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (course_id) DO UPDATE SET
                total_runs = EXCLUDED.total_runs,
                unique_runners = EXCLUDED.unique_runners,
                avg_duration_s = EXCLUDED.avg_duration_s,
                best_duration_s = EXCLUDED.best_duration_s,
                avg_pace_s_per_km = EXCLUDED.avg_pace_s_per_km,
                best_pace_s_per_km = EXCLUDED.best_pace_s_per_km,
                completion_rate = EXCLUDED.completion_rate,
                runs_by_hour = EXCLUDED.runs_by_hour
            "#,
            stats.course_id,
            stats.total_runs,
            stats.unique_runners,
            stats.avg_duration_s,
            stats.best_duration_s,
            stats.avg_pace_s_per_km,
            stats.best_pace_s_per_km,
            stats.completion_rate,
            Json(&stats.runs_by_hour.0) as _,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
