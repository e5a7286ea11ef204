use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Course, Difficulty};

use super::Database;

/// Earth radius used in the raw-SQL haversine expressions below; matches the
/// Rust-side constant in `route_matcher.rs`.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseSort {
    #[default]
    Newest,
    ShortestFirst,
    LongestFirst,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub search: Option<String>,
    pub min_distance_m: Option<i64>,
    pub max_distance_m: Option<i64>,
    pub near: Option<(f64, f64, f64)>,
    pub sort: CourseSort,
    pub limit: i64,
    pub offset: i64,
}

impl Database {
    pub async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as!(
            Course,
            r#"
            SELECT id, creator_id, run_record_id, title, description,
                   route_geometry, raw_route_geometry, start_lat, start_lng,
                   distance_m, elevation_gain_m, difficulty as "difficulty: Difficulty",
                   is_public, tags, course_type, lap_count, created_at
            FROM courses
            WHERE id = $1
            "#,
            course_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    pub async fn list_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>, AppError> {
        let order_by = match filter.sort {
            CourseSort::Newest => "created_at DESC",
            CourseSort::ShortestFirst => "distance_m ASC",
            CourseSort::LongestFirst => "distance_m DESC",
        };

        let search_pattern = filter.search.as_ref().map(|s| format!("%{s}%"));
        let (near_lat, near_lng, near_radius_m) =
            filter.near.unwrap_or((0.0, 0.0, f64::INFINITY));

        let query = format!(
            r#"
            SELECT id, creator_id, run_record_id, title, description,
                   route_geometry, raw_route_geometry, start_lat, start_lng,
                   distance_m, elevation_gain_m, difficulty, is_public, tags,
                   course_type, lap_count, created_at
            FROM courses
            WHERE is_public = true
              AND ($1::text IS NULL OR title ILIKE $1)
              AND ($2::bigint IS NULL OR distance_m >= $2)
              AND ($3::bigint IS NULL OR distance_m <= $3)
              AND {EARTH_RADIUS_M} * 2 * asin(sqrt(
                    sin(radians(start_lat - $4) / 2) ^ 2
                    + cos(radians($4)) * cos(radians(start_lat))
                      * sin(radians(start_lng - $5) / 2) ^ 2
                  )) <= $6
            ORDER BY {order_by}
            LIMIT $7 OFFSET $8
            "#
        );

        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(search_pattern)
            .bind(filter.min_distance_m)
            .bind(filter.max_distance_m)
            .bind(near_lat)
            .bind(near_lng)
            .bind(near_radius_m)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(courses)
    }

    /// Public courses within `radius_m` of `(lat, lng)`, nearest first.
    pub async fn nearby_courses(
        &self,
        lat: f64,
        lng: f64,
        radius_m: f64,
        limit: i64,
    ) -> Result<Vec<Course>, AppError> {
        let query = format!(
            r#"
            SELECT id, creator_id, run_record_id, title, description,
                   route_geometry, raw_route_geometry, start_lat, start_lng,
                   distance_m, elevation_gain_m, difficulty, is_public, tags,
                   course_type, lap_count, created_at
            FROM courses
            WHERE is_public = true
              AND {EARTH_RADIUS_M} * 2 * asin(sqrt(
                    sin(radians(start_lat - $1) / 2) ^ 2
                    + cos(radians($1)) * cos(radians(start_lat))
                      * sin(radians(start_lng - $2) / 2) ^ 2
                  )) <= $4
            ORDER BY {EARTH_RADIUS_M} * 2 * asin(sqrt(
                    sin(radians(start_lat - $1) / 2) ^ 2
                    + cos(radians($1)) * cos(radians(start_lat))
                      * sin(radians(start_lng - $2) / 2) ^ 2
                  )) ASC
            LIMIT $3
            "#
        );

        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(lat)
            .bind(lng)
            .bind(limit)
            .bind(radius_m)
            .fetch_all(&self.pool)
            .await?;

        Ok(courses)
    }

    /// Candidate courses for course-match attempts: public, start within
    /// 500 m, top 10 nearest.
    pub async fn candidate_courses_near(&self, lat: f64, lng: f64) -> Result<Vec<Course>, AppError> {
        self.nearby_courses(lat, lng, 500.0, 10).await
    }

    /// Public courses whose start point falls inside a lat/lng envelope.
    pub async fn courses_in_bounds(
        &self,
        min_lat: f64,
        min_lng: f64,
        max_lat: f64,
        max_lng: f64,
    ) -> Result<Vec<Course>, AppError> {
        let courses = sqlx::query_as!(
            Course,
            r#"
            SELECT id, creator_id, run_record_id, title, description,
                   route_geometry, raw_route_geometry, start_lat, start_lng,
                   distance_m, elevation_gain_m, difficulty as "difficulty: Difficulty",
                   is_public, tags, course_type, lap_count, created_at
            FROM courses
            WHERE is_public = true
              AND start_lat BETWEEN $1 AND $2
              AND start_lng BETWEEN $3 AND $4
            "#,
            min_lat,
            max_lat,
            min_lng,
            max_lng
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(courses)
    }

    pub async fn update_course_difficulty(
        &self,
        course_id: Uuid,
        difficulty: Difficulty,
    ) -> Result<(), AppError> {
        sqlx::query!(
            "UPDATE courses SET difficulty = $2 WHERE id = $1",
            course_id,
            difficulty as _
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
