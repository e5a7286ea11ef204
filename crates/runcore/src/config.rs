//! Environment-driven configuration, loaded once at startup.

use std::env;

/// Settings for the in-scope surface, plus inert placeholders for the
/// out-of-scope collaborators (auth issuance, OAuth, CDN, maps) so the shape
/// of a full deployment's config is visible even though nothing reads them.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub object_store_path: String,
    pub port: u16,
    pub max_upload_size_mb: u64,
    pub cors_origins: Option<Vec<String>>,

    pub jwt_secret_key: Option<String>,
    pub jwt_algorithm: Option<String>,
    pub access_token_expire_minutes: Option<String>,
    pub refresh_token_expire_days: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub cdn_base_url: Option<String>,
    pub mapbox_access_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://docker:pg@0.0.0.0".to_string()),
            object_store_path: env::var("OBJECT_STORE_PATH")
                .unwrap_or_else(|_| "./uploads".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
            max_upload_size_mb: env::var("MAX_UPLOAD_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            cors_origins: env::var("CORS_ORIGINS").ok().map(|v| {
                v.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            }),

            jwt_secret_key: env::var("JWT_SECRET_KEY").ok(),
            jwt_algorithm: env::var("JWT_ALGORITHM").ok(),
            access_token_expire_minutes: env::var("ACCESS_TOKEN_EXPIRE_MINUTES").ok(),
            refresh_token_expire_days: env::var("REFRESH_TOKEN_EXPIRE_DAYS").ok(),
            oauth_client_id: env::var("OAUTH_CLIENT_ID").ok(),
            oauth_client_secret: env::var("OAUTH_CLIENT_SECRET").ok(),
            s3_access_key_id: env::var("S3_ACCESS_KEY_ID").ok(),
            s3_secret_access_key: env::var("S3_SECRET_ACCESS_KEY").ok(),
            cdn_base_url: env::var("CDN_BASE_URL").ok(),
            mapbox_access_token: env::var("MAPBOX_ACCESS_TOKEN").ok(),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb as usize * 1024 * 1024
    }
}
