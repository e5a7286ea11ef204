use uuid::Uuid;

use crate::errors::AppError;

use super::Database;

pub struct RouteRow {
    pub run_record_id: Uuid,
    pub route_geometry: serde_json::Value,
}

impl Database {
    /// Every run record whose route may pass through the viewport, capped at
    /// 500 as a backpressure limit — no completion/flag/course filter, any
    /// run's route can intersect the envelope regardless of whether it
    /// matched a course. Filtering by the route's own first vertex is an
    /// approximation of an `ST_Intersects` envelope test (no PostGIS
    /// geometry column is stored here, see `DESIGN.md`);
    /// `heatmap::build_heatmap` re-checks every vertex against the
    /// envelope before snapping it to a cell.
    pub async fn routes_in_viewport(
        &self,
        min_lat: f64,
        min_lng: f64,
        max_lat: f64,
        max_lng: f64,
    ) -> Result<Vec<RouteRow>, AppError> {
        let pad = 0.05; // ~5km, wide enough to catch routes starting just outside the viewport
        let rows = sqlx::query!(
            r#"
            SELECT id, route_geometry
            FROM run_records
            WHERE (route_geometry->0->>0)::float8 BETWEEN $1 - $5 AND $2 + $5
              AND (route_geometry->0->>1)::float8 BETWEEN $3 - $5 AND $4 + $5
            LIMIT 500
            "#,
            min_lat,
            max_lat,
            min_lng,
            max_lng,
            pad,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RouteRow {
                run_record_id: r.id,
                route_geometry: r.route_geometry,
            })
            .collect())
    }
}
