use axum_extra::headers::Mime;
use bytes::Bytes;
use object_store::{ObjectStore, PutOptions, local::LocalFileSystem, path::Path};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppError;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Gpx,
    Fit,
    Other,
}

impl From<Mime> for FileType {
    fn from(mime: Mime) -> Self {
        match mime.type_().as_str() {
            "application" => match mime.subtype().as_str() {
                "gpx" | "gpx+xml" => FileType::Gpx,
                "octet-stream" | "fit" | "vnd.ant.fit" => FileType::detect_from_hint(mime.subtype().as_str()),
                s => {
                    tracing::warn!("unknown mime subtype: {s}");
                    FileType::Other
                }
            },
            s => {
                tracing::warn!("unknown mime type: {s}");
                FileType::Other
            }
        }
    }
}

impl FileType {
    pub fn as_mime_str(self) -> &'static str {
        match self {
            FileType::Gpx => "application/gpx+xml",
            FileType::Fit => "application/vnd.ant.fit",
            FileType::Other => "application/octet-stream",
        }
    }

    /// Browsers frequently send GPX/FIT as `octet-stream`; fall back to content sniffing.
    fn detect_from_hint(subtype: &str) -> FileType {
        match subtype {
            "fit" | "vnd.ant.fit" => FileType::Fit,
            _ => FileType::Other,
        }
    }

    /// Sniff a file's type from its leading bytes when the declared mime type
    /// was uninformative (`octet-stream`, missing, or wrong).
    pub fn detect_from_bytes(bytes: &[u8]) -> FileType {
        if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
            return FileType::Fit;
        }
        if let Ok(text) = std::str::from_utf8(&bytes[..bytes.len().min(256)]) {
            if text.contains("<gpx") {
                return FileType::Gpx;
            }
        }
        FileType::Other
    }
}

#[derive(Clone, Debug)]
pub struct ObjectStoreService {
    store: Arc<dyn ObjectStore>,
    _base_path: String,
}

impl ObjectStoreService {
    pub fn new_local(base_path: String) -> Self {
        std::fs::create_dir_all(&base_path).expect("failed to create object store directory");
        let store = Arc::new(LocalFileSystem::new_with_prefix(&base_path).unwrap());
        Self {
            store,
            _base_path: base_path,
        }
    }

    pub async fn store_file(
        &self,
        user_id: Uuid,
        import_id: Uuid,
        file_type: FileType,
        content: Bytes,
    ) -> Result<String, AppError> {
        if matches!(file_type, FileType::Other) {
            return Err(AppError::Validation(format!(
                "unsupported file type: {file_type:?}, only GPX and FIT are accepted"
            )));
        }

        let object_path = format!("imports/{user_id}/{import_id}");
        let path = Path::from(object_path.clone());

        self.store
            .put_opts(&path, content.into(), PutOptions::default())
            .await
            .map_err(|e| AppError::Internal(format!("failed to store file: {e}")))?;

        Ok(object_path)
    }

    pub async fn get_file(&self, object_path: &str) -> Result<Bytes, AppError> {
        let path = Path::from(object_path);

        let result = self.store.get(&path).await.map_err(|_| AppError::NotFound)?;

        result
            .bytes()
            .await
            .map_err(|e| AppError::Internal(format!("failed to read file: {e}")))
    }

    pub async fn delete_file(&self, object_path: &str) -> Result<(), AppError> {
        let path = Path::from(object_path);

        self.store
            .delete(&path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to delete file: {e}")))
    }
}
