//! Viewport heatmap: snaps route vertices to a coarse lat/lng grid and
//! weights each cell by the number of distinct runs passing through it.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::heatmap::RouteRow;

const GRID_SIZE_DEG: f64 = 0.00045;
const MAX_OUTPUT_CELLS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellKey {
    row: i64,
    col: i64,
}

impl CellKey {
    fn snap(lat: f64, lng: f64) -> Self {
        Self {
            row: (lat / GRID_SIZE_DEG).floor() as i64,
            col: (lng / GRID_SIZE_DEG).floor() as i64,
        }
    }

    fn centroid(self) -> (f64, f64) {
        let lat = (self.row as f64 + 0.5) * GRID_SIZE_DEG;
        let lng = (self.col as f64 + 0.5) * GRID_SIZE_DEG;
        (round6(lat), round6(lng))
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HeatmapCell {
    pub lat: f64,
    pub lng: f64,
    pub weight: i64,
}

/// Builds heatmap cells from candidate routes already restricted to (an
/// approximation of) the viewport by the caller's DB query; every vertex is
/// still re-checked against the exact envelope here before being snapped to
/// a cell.
pub fn build_heatmap(
    routes: &[RouteRow],
    min_lat: f64,
    min_lng: f64,
    max_lat: f64,
    max_lng: f64,
    limit: usize,
) -> Vec<HeatmapCell> {
    let limit = limit.min(MAX_OUTPUT_CELLS);
    let mut cell_runs: HashMap<CellKey, HashSet<Uuid>> = HashMap::new();

    for route in routes {
        let Some(points) = route.route_geometry.as_array() else {
            continue;
        };

        for point in points {
            let Some(coords) = point.as_array() else { continue };
            let (Some(lng), Some(lat)) = (coords.first().and_then(|v| v.as_f64()), coords.get(1).and_then(|v| v.as_f64())) else {
                continue;
            };

            if lat < min_lat || lat > max_lat || lng < min_lng || lng > max_lng {
                continue;
            }

            cell_runs
                .entry(CellKey::snap(lat, lng))
                .or_default()
                .insert(route.run_record_id);
        }
    }

    let mut cells: Vec<HeatmapCell> = cell_runs
        .into_iter()
        .map(|(key, runs)| {
            let (lat, lng) = key.centroid();
            HeatmapCell {
                lat,
                lng,
                weight: runs.len() as i64,
            }
        })
        .collect();

    cells.sort_by(|a, b| b.weight.cmp(&a.weight));
    cells.truncate(limit);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: Uuid, points: Vec<[f64; 2]>) -> RouteRow {
        RouteRow {
            run_record_id: id,
            route_geometry: serde_json::to_value(points).unwrap(),
        }
    }

    /// No two cells share the same rounded `(lat, lng)`.
    #[test]
    fn no_duplicate_cells() {
        let routes = vec![
            route(Uuid::new_v4(), vec![[10.0, 20.0], [10.00001, 20.00001]]),
            route(Uuid::new_v4(), vec![[10.0, 20.0]]),
        ];
        let cells = build_heatmap(&routes, 0.0, 0.0, 90.0, 180.0, 10_000);

        let mut seen = HashSet::new();
        for cell in &cells {
            assert!(seen.insert((cell.lat.to_bits(), cell.lng.to_bits())));
        }
    }

    #[test]
    fn weight_counts_distinct_runs_not_points() {
        let id = Uuid::new_v4();
        let routes = vec![route(id, vec![[10.0, 20.0], [10.0, 20.0], [10.0, 20.0]])];
        let cells = build_heatmap(&routes, 0.0, 0.0, 90.0, 180.0, 10_000);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].weight, 1);
    }

    #[test]
    fn points_outside_envelope_are_dropped() {
        let routes = vec![route(Uuid::new_v4(), vec![[200.0, 100.0]])];
        let cells = build_heatmap(&routes, 0.0, 0.0, 90.0, 180.0, 10_000);
        assert!(cells.is_empty());
    }

    #[test]
    fn output_is_capped() {
        let mut points = Vec::new();
        for i in 0..50 {
            points.push([i as f64 * 0.01, i as f64 * 0.01]);
        }
        let routes = vec![route(Uuid::new_v4(), points)];
        let cells = build_heatmap(&routes, 0.0, 0.0, 90.0, 180.0, 5);
        assert_eq!(cells.len(), 5);
    }
}
