//! File import upload: accept a GPX/FIT blob, persist it, and enqueue
//! background parsing.

use axum::{
    Extension,
    extract::{Multipart, Path},
    response::Json,
};
use axum_extra::headers::{ContentType, HeaderMapExt, Mime};
use bytes::BytesMut;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::Database;
use crate::errors::AppError;
use crate::models::{ExternalImport, ImportSource};
use crate::object_store_service::{FileType, ObjectStoreService};
use crate::task_queue::{Task, TaskQueue};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadImportResponse {
    pub import_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/imports/upload",
    tag = "imports",
    request_body(content_type = "multipart/form-data", description = "GPX or FIT file"),
    responses(
        (status = 200, description = "Import accepted and queued", body = UploadImportResponse),
        (status = 400, description = "Missing file, unsupported type, or file exceeds 20 MiB")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_import(
    Extension(db): Extension<Database>,
    Extension(store): Extension<ObjectStoreService>,
    Extension(queue): Extension<TaskQueue>,
    Extension(config): Extension<Config>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadImportResponse>, AppError> {
    let max_upload_bytes = config.max_upload_bytes();
    let mut file_bytes = BytesMut::new();
    let mut mime_hdr = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("failed to process multipart data".into()))?
    {
        if field.name() == Some("file") {
            mime_hdr = field.headers().typed_get::<ContentType>();
            let chunk = field
                .bytes()
                .await
                .map_err(|_| AppError::Validation("failed to read file data".into()))?;
            if file_bytes.len() + chunk.len() > max_upload_bytes {
                return Err(AppError::UploadTooLarge);
            }
            file_bytes.extend(chunk);
        }
    }

    if file_bytes.is_empty() {
        return Err(AppError::Validation("no file provided".into()));
    }

    let file_bytes = file_bytes.freeze();

    let declared = mime_hdr.map(|ct| FileType::from(Mime::from(ct)));
    let file_type = match declared {
        Some(FileType::Gpx) => FileType::Gpx,
        Some(FileType::Fit) => FileType::Fit,
        _ => FileType::detect_from_bytes(&file_bytes),
    };

    let import_source = match file_type {
        FileType::Gpx => ImportSource::Gpx,
        FileType::Fit => ImportSource::Fit,
        FileType::Other => {
            return Err(AppError::Validation(
                "unsupported file type, only GPX and FIT are accepted".into(),
            ));
        }
    };

    let import_id = Uuid::new_v4();

    let object_store_path = store
        .store_file(user_id, import_id, file_type, file_bytes)
        .await?;

    db.create_import(import_id, user_id, import_source, None, Some(object_store_path))
        .await?;

    queue.enqueue(Task::ProcessPendingImport);

    Ok(Json(UploadImportResponse { import_id }))
}

#[utoipa::path(
    get,
    path = "/api/v1/imports/{id}",
    tag = "imports",
    params(("id" = Uuid, Path, description = "Import id")),
    responses(
        (status = 200, description = "Import status", body = ExternalImport),
        (status = 404, description = "Import not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_import(
    Extension(db): Extension<Database>,
    AuthUser(user_id): AuthUser,
    Path(import_id): Path<Uuid>,
) -> Result<Json<ExternalImport>, AppError> {
    let import = db.get_import(import_id).await?.ok_or(AppError::NotFound)?;

    if import.user_id != user_id {
        return Err(AppError::NotFound);
    }

    Ok(Json(import))
}
