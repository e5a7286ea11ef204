use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ExternalImport, ImportSource, ImportStatus};

use super::Database;

impl Database {
    /// `id` is caller-supplied so the object store path (keyed by the same
    /// id) can be computed before the row exists.
    pub async fn create_import(
        &self,
        id: Uuid,
        user_id: Uuid,
        source: ImportSource,
        external_id: Option<String>,
        object_store_path: Option<String>,
    ) -> Result<Uuid, AppError> {
        sqlx::query!(
            r#"
            INSERT INTO external_imports (id, user_id, source, external_id, object_store_path,
                                          status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', now())
            "#,
            id,
            user_id,
            source as _,
            external_id,
            object_store_path,
        )
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// FIFO claim of one `pending` import, matching the "at most one import
    /// per worker" backpressure rule — `FOR UPDATE SKIP LOCKED` lets
    /// multiple workers claim distinct rows concurrently without blocking.
    pub async fn claim_pending_import(&self) -> Result<Option<ExternalImport>, AppError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_as!(
            ExternalImport,
            r#"
            UPDATE external_imports
            SET status = 'processing'
            WHERE id = (
                SELECT id FROM external_imports
                WHERE status = 'pending'
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, user_id, source as "source: ImportSource", external_id,
                      object_store_path, status as "status: ImportStatus",
                      run_record_id, error_message, created_at
            "#
        )
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claimed)
    }

    pub async fn mark_import_completed(
        &self,
        import_id: Uuid,
        run_record_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE external_imports
            SET status = 'completed', run_record_id = $2
            WHERE id = $1
            "#,
            import_id,
            run_record_id,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_import_failed(&self, import_id: Uuid, error_message: &str) -> Result<(), AppError> {
        sqlx::query!(
            r#"
            UPDATE external_imports
            SET status = 'failed', error_message = $2
            WHERE id = $1
            "#,
            import_id,
            error_message,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_import(&self, import_id: Uuid) -> Result<Option<ExternalImport>, AppError> {
        let import = sqlx::query_as!(
            ExternalImport,
            r#"
            SELECT id, user_id, source as "source: ImportSource", external_id,
                   object_store_path, status as "status: ImportStatus",
                   run_record_id, error_message, created_at
            FROM external_imports
            WHERE id = $1
            "#,
            import_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(import)
    }
}
