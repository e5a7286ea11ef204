//! In-process background task queue: handlers enqueue an opaque message;
//! worker threads pull and execute with their own DB session. At-least-once
//! delivery; every task here is idempotent by construction (ranking/stats
//! recompute from scratch; import execution re-claims are naturally safe
//! since claim is `FOR UPDATE SKIP LOCKED`).
//!
//! Built on a `rayon::ThreadPool` paired with a `tokio::runtime::Runtime`
//! handle so async DB calls can run from worker threads outside axum's
//! own runtime.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::db::Database;
use crate::import::pipeline;
use crate::ranking_service;

/// Everything the ranking task needs about the run that triggered it, so
/// the task doesn't have to re-fetch the RunRecord under its own
/// transaction.
#[derive(Debug, Clone)]
pub struct RankingTrigger {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub duration_s: i64,
    pub pace_s_per_km: i64,
    pub finished_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub enum Task {
    RecomputeRanking(RankingTrigger),
    /// Claim-and-run the oldest `pending` import (FIFO). Carries no id: the
    /// worker always claims whichever row is next, so repeated enqueues
    /// are harmless.
    ProcessPendingImport,
}

#[derive(Clone)]
pub struct TaskQueue {
    rt: Arc<Runtime>,
    pool: Arc<rayon::ThreadPool>,
    db: Database,
    object_store: crate::object_store_service::ObjectStoreService,
}

impl TaskQueue {
    pub fn new(db: Database, object_store: crate::object_store_service::ObjectStoreService) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .expect("failed to build background worker pool");

        Self {
            rt: Arc::new(Runtime::new().expect("failed to build background worker runtime")),
            pool: Arc::new(pool),
            db,
            object_store,
        }
    }

    pub fn enqueue(&self, task: Task) {
        let db = self.db.clone();
        let object_store = self.object_store.clone();
        let rt = self.rt.clone();
        let queue = self.clone();

        self.pool.spawn(move || {
            rt.block_on(async move {
                if let Err(e) = run_task(&db, &queue, &object_store, task.clone()).await {
                    tracing::error!(?task, error = %e, "background task failed");
                }
            });
        });
    }
}

async fn run_task(
    db: &Database,
    queue: &TaskQueue,
    object_store: &crate::object_store_service::ObjectStoreService,
    task: Task,
) -> anyhow::Result<()> {
    match task {
        Task::RecomputeRanking(trigger) => {
            ranking_service::upsert_and_recompute(db, &trigger).await?;
        }
        Task::ProcessPendingImport => {
            pipeline::claim_and_run_next(db, queue, object_store).await?;
        }
    }

    Ok(())
}
