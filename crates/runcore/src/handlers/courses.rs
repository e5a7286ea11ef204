//! Course discovery: list/search, proximity queries, an enriched bounds
//! lookup for map markers, rankings, and the viewport heatmap.

use axum::{
    Extension,
    extract::{Path, Query},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::Database;
use crate::db::courses::{CourseFilter, CourseSort};
use crate::errors::AppError;
use crate::heatmap::{self, HeatmapCell};
use crate::models::{Course, CourseStats, Ranking};

const MAX_NEARBY_RADIUS_M: f64 = 50_000.0;
const MAX_HEATMAP_CELLS: usize = 10_000;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCoursesQuery {
    pub search: Option<String>,
    pub min_distance_m: Option<i64>,
    pub max_distance_m: Option<i64>,
    pub near_lat: Option<f64>,
    pub near_lng: Option<f64>,
    pub near_radius_m: Option<f64>,
    pub sort: Option<String>,
    #[serde(default = "crate::handlers::pagination::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    tag = "courses",
    params(ListCoursesQuery),
    responses((status = 200, description = "Matching public courses", body = Vec<Course>))
)]
pub async fn list_courses(
    Extension(db): Extension<Database>,
    Query(q): Query<ListCoursesQuery>,
) -> Result<Json<Vec<Course>>, AppError> {
    let sort = match q.sort.as_deref() {
        Some("shortest") => CourseSort::ShortestFirst,
        Some("longest") => CourseSort::LongestFirst,
        _ => CourseSort::Newest,
    };

    let near = match (q.near_lat, q.near_lng) {
        (Some(lat), Some(lng)) => Some((lat, lng, q.near_radius_m.unwrap_or(f64::INFINITY))),
        _ => None,
    };

    let filter = CourseFilter {
        search: q.search,
        min_distance_m: q.min_distance_m,
        max_distance_m: q.max_distance_m,
        near,
        sort,
        limit: q.limit,
        offset: q.offset,
    };

    let courses = db.list_courses(&filter).await?;
    Ok(Json(courses))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyCoursesQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    #[serde(default = "crate::handlers::pagination::default_limit")]
    pub limit: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/nearby",
    tag = "courses",
    params(NearbyCoursesQuery),
    responses(
        (status = 200, description = "Public courses within radius_m, nearest first", body = Vec<Course>),
        (status = 400, description = "radius_m exceeds 50 km")
    )
)]
pub async fn nearby_courses(
    Extension(db): Extension<Database>,
    Query(q): Query<NearbyCoursesQuery>,
) -> Result<Json<Vec<Course>>, AppError> {
    if q.radius_m > MAX_NEARBY_RADIUS_M {
        return Err(AppError::Validation(format!(
            "radius_m must not exceed {MAX_NEARBY_RADIUS_M}"
        )));
    }

    let courses = db.nearby_courses(q.lat, q.lng, q.radius_m, q.limit).await?;
    Ok(Json(courses))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BoundsQuery {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseMarker {
    pub course: Course,
    pub stats: Option<CourseStats>,
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/bounds",
    tag = "courses",
    params(BoundsQuery),
    responses((status = 200, description = "Public courses inside the envelope, each enriched with its course stats", body = Vec<CourseMarker>))
)]
pub async fn courses_in_bounds(
    Extension(db): Extension<Database>,
    Query(q): Query<BoundsQuery>,
) -> Result<Json<Vec<CourseMarker>>, AppError> {
    let courses = db
        .courses_in_bounds(q.min_lat, q.min_lng, q.max_lat, q.max_lng)
        .await?;

    let mut markers = Vec::with_capacity(courses.len());
    for course in courses {
        let stats = db.get_course_stats(course.id).await?;
        markers.push(CourseMarker { course, stats });
    }

    Ok(Json(markers))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RankingsQuery {
    #[serde(default = "crate::handlers::pagination::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseRankingsResponse {
    pub rankings: Vec<Ranking>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/rankings",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course id"), RankingsQuery),
    responses(
        (status = 200, description = "Leaderboard page ordered by rank", body = CourseRankingsResponse),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_rankings(
    Extension(db): Extension<Database>,
    Path(course_id): Path<Uuid>,
    Query(q): Query<RankingsQuery>,
) -> Result<Json<CourseRankingsResponse>, AppError> {
    db.get_course(course_id).await?.ok_or(AppError::NotFound)?;

    let (rankings, total_count) = db.list_rankings_page(course_id, q.limit, q.offset).await?;

    Ok(Json(CourseRankingsResponse {
        rankings,
        total_count,
        limit: q.limit,
        offset: q.offset,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HeatmapQuery {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
    #[serde(default = "default_heatmap_limit")]
    pub limit: usize,
}

fn default_heatmap_limit() -> usize {
    1_000
}

#[utoipa::path(
    get,
    path = "/api/v1/heatmap",
    tag = "courses",
    params(HeatmapQuery),
    responses(
        (status = 200, description = "Weighted grid cells for routes passing through the viewport", body = Vec<HeatmapCell>),
        (status = 400, description = "limit exceeds 10,000")
    )
)]
pub async fn viewport_heatmap(
    Extension(db): Extension<Database>,
    Query(q): Query<HeatmapQuery>,
) -> Result<Json<Vec<HeatmapCell>>, AppError> {
    if q.limit > MAX_HEATMAP_CELLS {
        return Err(AppError::Validation(format!("limit must not exceed {MAX_HEATMAP_CELLS}")));
    }

    let routes = db
        .routes_in_viewport(q.min_lat, q.min_lng, q.max_lat, q.max_lng)
        .await?;

    let cells = heatmap::build_heatmap(&routes, q.min_lat, q.min_lng, q.max_lat, q.max_lng, q.limit);
    Ok(Json(cells))
}
