use uuid::Uuid;

use crate::errors::AppError;
use crate::models::User;

use super::Database;

impl Database {
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as!(
            User,
            r#"
            SELECT id, nickname, total_distance_m, total_runs, created_at
            FROM users
            WHERE id = $1
            "#,
            user_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Post-run cumulative counters. Mutated only here, matching the data
    /// model's statement that a User is mutated only by the stats task.
    pub async fn update_user_cumulative_stats(
        &self,
        user_id: Uuid,
        distance_meters: i64,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE users
            SET total_distance_m = total_distance_m + $2, total_runs = total_runs + 1
            WHERE id = $1
            "#,
            user_id,
            distance_meters
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
