pub mod auth;
pub mod config;
pub mod db;
pub mod difficulty;
pub mod errors;
pub mod handlers;
pub mod heatmap;
pub mod import;
pub mod models;
pub mod object_store_service;
pub mod ranking_service;
pub mod request_id;
pub mod route_matcher;
pub mod run_finalization;
pub mod session_service;
pub mod speed_anomaly;
pub mod task_queue;
pub mod trace;

use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use crate::request_id::request_id_middleware;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    db::Database,
    handlers::{
        batch_upload_chunks, complete_session, course_rankings, courses_in_bounds, create_session,
        get_import, health_check, list_courses, nearby_courses, recover_session, upload_chunk,
        upload_import, viewport_heatmap,
    },
    object_store_service::ObjectStoreService,
    session_service::SessionService,
    task_queue::TaskQueue,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pacing Platform API",
        description = "Server core for GPS run ingest, course matching, rankings and spatial queries",
        version = "1.0.0",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://localhost:3001", description = "Local development server"),
    ),
    tags(
        (name = "runs", description = "Live session ingest and finalization"),
        (name = "imports", description = "File / third-party import uploads"),
        (name = "courses", description = "Course discovery, rankings and heatmap"),
        (name = "health", description = "Liveness probe"),
    ),
    paths(
        handlers::health_check,
        handlers::create_session,
        handlers::upload_chunk,
        handlers::batch_upload_chunks,
        handlers::complete_session,
        handlers::recover_session,
        handlers::upload_import,
        handlers::get_import,
        handlers::list_courses,
        handlers::nearby_courses,
        handlers::courses_in_bounds,
        handlers::course_rankings,
        handlers::viewport_heatmap,
    ),
    components(
        schemas(
            models::Course,
            models::CourseStats,
            models::Difficulty,
            models::Ranking,
            models::RunRecord,
            models::RunSource,
            models::RunSession,
            models::SessionStatus,
            models::ChunkType,
            models::ChunkSummary,
            models::Cumulative,
            models::Split,
            models::PauseInterval,
            models::TrackPoint,
            models::ExternalImport,
            models::ImportSource,
            models::ImportStatus,
            handlers::sessions::CreateSessionRequest,
            handlers::sessions::CreateSessionResponse,
            handlers::sessions::ChunkUploadResponse,
            handlers::sessions::CompleteSessionRequest,
            handlers::sessions::RecoverSessionRequest,
            handlers::sessions::FinalizeResponse,
            session_service::ChunkUpload,
            session_service::FailedChunk,
            session_service::ChunkUploadOutcome,
            session_service::ClientSummary,
            handlers::imports::UploadImportResponse,
            handlers::courses::CourseMarker,
            handlers::courses::CourseRankingsResponse,
            heatmap::HeatmapCell,
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

pub fn create_router(pool: PgPool, config: Config) -> Router {
    let db = Database::new(pool);
    let store = ObjectStoreService::new_local(config.object_store_path.clone());
    let queue = TaskQueue::new(db.clone(), store.clone());
    let sessions = SessionService::new(db.clone(), queue.clone());

    let allow_origin = match &config.cors_origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
        None => AllowOrigin::any(),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(allow_origin);

    Router::new()
        .route("/health", get(health_check))
        // Live session ingest
        .route("/api/v1/runs/sessions", post(create_session))
        .route("/api/v1/runs/sessions/{id}/chunks", post(upload_chunk))
        .route(
            "/api/v1/runs/sessions/{id}/chunks/batch",
            post(batch_upload_chunks),
        )
        .route("/api/v1/runs/sessions/{id}/complete", post(complete_session))
        .route("/api/v1/runs/sessions/{id}/recover", post(recover_session))
        // Imports
        .route("/api/v1/imports/upload", post(upload_import))
        .route("/api/v1/imports/{id}", get(get_import))
        // Courses / spatial queries
        .route("/api/v1/courses", get(list_courses))
        .route("/api/v1/courses/nearby", get(nearby_courses))
        .route("/api/v1/courses/bounds", get(courses_in_bounds))
        .route("/api/v1/courses/{id}/rankings", get(course_rankings))
        .route("/api/v1/heatmap", get(viewport_heatmap))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(Extension(db))
        .layer(Extension(store))
        .layer(Extension(queue))
        .layer(Extension(sessions))
        .layer(Extension(config))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(request_id_middleware))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

pub async fn run_server(pool: PgPool, config: Config) -> anyhow::Result<()> {
    let port = config.port;
    let app = create_router(pool, config);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    println!("Server running on http://0.0.0.0:{}", port);
    println!(
        "Swagger UI available at http://0.0.0.0:{}/swagger-ui/",
        port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
