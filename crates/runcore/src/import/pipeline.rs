//! File / third-party import pipeline: claim a pending import, parse its
//! blob, derive a trace, and finalize it through the same tail live
//! sessions use. Runs entirely inside the background task queue; any
//! failure flips the import to `failed` and never touches other imports.

use crate::db::Database;
use crate::errors::AppError;
use crate::import::parsers::{self, ParseError};
use crate::models::{ExternalImport, ImportSource, RunSource, SessionStatus};
use crate::object_store_service::{FileType, ObjectStoreService};
use crate::run_finalization;
use crate::task_queue::TaskQueue;
use crate::trace;

const MIN_DISTANCE_M: f64 = 100.0;
const MIN_DURATION_S: i64 = 30;

/// Claims the oldest pending import, if any, and runs it to completion.
/// A no-op (`Ok(())`) when the queue is empty, so repeated enqueues of
/// `ProcessPendingImport` are always harmless.
pub async fn claim_and_run_next(
    db: &Database,
    queue: &TaskQueue,
    object_store: &ObjectStoreService,
) -> anyhow::Result<()> {
    let Some(import) = db.claim_pending_import().await? else {
        return Ok(());
    };

    match run_import(db, queue, object_store, &import).await {
        Ok(()) => {}
        Err(e) => {
            tracing::warn!(import_id = %import.id, error = %e, "import failed");
            db.mark_import_failed(import.id, &e.to_string()).await?;
        }
    }

    Ok(())
}

async fn run_import(
    db: &Database,
    queue: &TaskQueue,
    object_store: &ObjectStoreService,
    import: &ExternalImport,
) -> Result<(), AppError> {
    let object_path = import
        .object_store_path
        .as_ref()
        .ok_or_else(|| AppError::Validation("import has no stored blob".into()))?;

    let bytes = object_store.get_file(object_path).await?;

    let file_type = match import.source {
        ImportSource::Gpx => FileType::Gpx,
        ImportSource::Fit => FileType::Fit,
        ImportSource::Strava => FileType::Other,
    };

    let points = parsers::parse_activity_file(file_type, bytes)
        .map_err(|e: ParseError| AppError::Validation(e.to_string()))?;

    let derived = trace::derive_activity(&points);
    if derived.distance_meters < MIN_DISTANCE_M || derived.duration_seconds < MIN_DURATION_S || points.is_empty()
    {
        return Err(AppError::Validation(format!(
            "run too short to import: {:.1}m over {}s ({} points)",
            derived.distance_meters,
            derived.duration_seconds,
            points.len()
        )));
    }

    let started_at = points.first().expect("non-empty checked above").timestamp;

    let session_id = db
        .create_session(import.user_id, None, started_at, None, SessionStatus::Imported)
        .await?;
    let session = db
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::Internal("synthetic import session vanished".into()))?;

    let source = match import.source {
        ImportSource::Gpx => RunSource::GpxUpload,
        ImportSource::Fit => RunSource::FitUpload,
        ImportSource::Strava => RunSource::Strava,
    };

    let run_record_id =
        run_finalization::finalize_imported_run(db, queue, &session, session_id, derived, source, import.id)
            .await?;

    db.mark_import_completed(import.id, run_record_id).await?;
    Ok(())
}
