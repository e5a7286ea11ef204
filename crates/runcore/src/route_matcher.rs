//! Route Matcher: decides per-run course completion and a match-percent
//! metric used for leaderboard gating, by comparing a runner's finalized
//! trace against a course's reference polyline.

use serde::Serialize;
use utoipa::ToSchema;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const STRAIGHT_THRESHOLD_M: f64 = 50.0;
const CURVE_THRESHOLD_M: f64 = 60.0;
const COMPLETION_MIN_MATCH: f64 = 0.8;
const CURVATURE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteMatchResult {
    pub is_completed: bool,
    pub route_match_percent: f64,
    pub max_deviation_meters: f64,
    pub deviation_points: usize,
    pub total_points: usize,
    pub curve_section_count: usize,
}

fn haversine_distance(p1: Point2D, p2: Point2D) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let dlat = (p2.lat - p1.lat).to_radians();
    let dlng = (p2.lng - p1.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Shortest distance from a point to a segment, via planar projection
/// clamped to the endpoints — accurate enough for short segments at GPS
/// scale, the same approximation the course geometry was designed around.
fn point_to_segment_distance(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let ab_dist = haversine_distance(a, b);
    if ab_dist < 1e-10 {
        return haversine_distance(p, a);
    }

    let ap_lat = p.lat - a.lat;
    let ap_lng = p.lng - a.lng;
    let ab_lat = b.lat - a.lat;
    let ab_lng = b.lng - a.lng;

    let dot = ap_lat * ab_lat + ap_lng * ab_lng;
    let len_sq = ab_lat.powi(2) + ab_lng.powi(2);

    let t = if len_sq > 0.0 {
        (dot / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let proj = Point2D {
        lat: a.lat + t * ab_lat,
        lng: a.lng + t * ab_lng,
    };

    haversine_distance(p, proj)
}

/// Menger curvature at `p2` given three consecutive points:
/// `2 * triangle_area / (a * b * c)`.
fn calculate_curvature(p1: Point2D, p2: Point2D, p3: Point2D) -> f64 {
    let a = haversine_distance(p1, p2);
    let b = haversine_distance(p2, p3);
    let c = haversine_distance(p1, p3);

    if a < 1e-6 || b < 1e-6 || c < 1e-6 {
        return 0.0;
    }

    let s = (a + b + c) / 2.0;
    let area_sq = (s * (s - a) * (s - b) * (s - c)).max(0.0);
    let area = area_sq.sqrt();

    if a * b * c < 1e-10 {
        return 0.0;
    }

    2.0 * area / (a * b * c)
}

/// `true` at index `i` means segment `i` (between vertex `i` and `i+1`) is
/// curved. Marking both segments adjacent to a high-curvature vertex keeps
/// the wider tolerance applied through the whole bend.
fn classify_segments(course_points: &[Point2D]) -> Vec<bool> {
    let n = course_points.len();
    if n < 3 {
        return vec![false; n.saturating_sub(1)];
    }

    let mut is_curved = vec![false; n - 1];
    for i in 1..n - 1 {
        let curvature =
            calculate_curvature(course_points[i - 1], course_points[i], course_points[i + 1]);
        if curvature > CURVATURE_THRESHOLD {
            is_curved[i - 1] = true;
            if i < n - 1 {
                is_curved[i] = true;
            }
        }
    }
    is_curved
}

fn find_nearest_segment(point: Point2D, course_points: &[Point2D]) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut min_idx = 0;
    for i in 0..course_points.len() - 1 {
        let dist = point_to_segment_distance(point, course_points[i], course_points[i + 1]);
        if dist < min_dist {
            min_dist = dist;
            min_idx = i;
        }
    }
    min_idx
}

/// Compare a runner's GPS trace against a course's reference polyline.
/// Empty runner stream or fewer than two course vertices is a degenerate
/// input: zero result, not completed.
pub fn calculate_route_match(runner_points: &[Point2D], course_points: &[Point2D]) -> RouteMatchResult {
    if runner_points.is_empty() || course_points.len() < 2 {
        return RouteMatchResult {
            is_completed: false,
            route_match_percent: 0.0,
            max_deviation_meters: 0.0,
            deviation_points: 0,
            total_points: runner_points.len(),
            curve_section_count: 0,
        };
    }

    let is_curved = classify_segments(course_points);
    let curve_section_count = is_curved.iter().filter(|c| **c).count();

    let mut matched_count = 0usize;
    let mut deviation_count = 0usize;
    let mut max_deviation = 0.0f64;

    for &runner_point in runner_points {
        let seg_idx = find_nearest_segment(runner_point, course_points);
        let dist = point_to_segment_distance(
            runner_point,
            course_points[seg_idx],
            course_points[seg_idx + 1],
        );

        let threshold = if is_curved[seg_idx] {
            CURVE_THRESHOLD_M
        } else {
            STRAIGHT_THRESHOLD_M
        };

        if dist <= threshold {
            matched_count += 1;
        } else {
            deviation_count += 1;
        }

        max_deviation = max_deviation.max(dist);
    }

    let total = runner_points.len();
    let match_ratio = matched_count as f64 / total as f64;

    RouteMatchResult {
        is_completed: match_ratio >= COMPLETION_MIN_MATCH,
        route_match_percent: (match_ratio * 100.0 * 10.0).round() / 10.0,
        max_deviation_meters: (max_deviation * 10.0).round() / 10.0,
        deviation_points: deviation_count,
        total_points: total,
        curve_section_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ~100 m of longitude at mid-latitudes.
    const STEP_LNG_100M: f64 = 100.0 / 88_740.0;

    fn straight_course() -> Vec<Point2D> {
        (0..=10)
            .map(|i| Point2D {
                lat: 37.0,
                lng: 127.0 + STEP_LNG_100M * i as f64,
            })
            .collect()
    }

    /// Scenario 4: runner trace identical but offset 40 m laterally — within
    /// the 50 m straight threshold on every point.
    #[test]
    fn route_match_within_threshold() {
        let course = straight_course();
        let lat_offset = 40.0 / 111_000.0;
        let runner: Vec<Point2D> = (0..=100)
            .map(|i| Point2D {
                lat: 37.0 + lat_offset,
                lng: 127.0 + STEP_LNG_100M * (i as f64 / 10.0),
            })
            .collect();

        let result = calculate_route_match(&runner, &course);

        assert_eq!(result.route_match_percent, 100.0);
        assert!(result.is_completed);
        assert!((result.max_deviation_meters - 40.0).abs() < 2.0);
    }

    /// Scenario 5: runner offset by 80 m — beyond both thresholds.
    #[test]
    fn route_miss_outside_threshold() {
        let course = straight_course();
        let lat_offset = 80.0 / 111_000.0;
        let runner: Vec<Point2D> = (0..=100)
            .map(|i| Point2D {
                lat: 37.0 + lat_offset,
                lng: 127.0 + STEP_LNG_100M * (i as f64 / 10.0),
            })
            .collect();

        let result = calculate_route_match(&runner, &course);

        assert_eq!(result.route_match_percent, 0.0);
        assert!(!result.is_completed);
    }

    #[test]
    fn degenerate_inputs_yield_zero_result() {
        let course = straight_course();
        let result = calculate_route_match(&[], &course);
        assert!(!result.is_completed);

        let runner = vec![Point2D { lat: 37.0, lng: 127.0 }];
        let result = calculate_route_match(&runner, &[Point2D { lat: 37.0, lng: 127.0 }]);
        assert!(!result.is_completed);
        assert_eq!(result.route_match_percent, 0.0);
    }

    #[test]
    fn curved_segment_gets_the_wider_threshold() {
        // A sharp right-angle bend: the vertex and its two adjacent
        // segments should classify as curved.
        let course = vec![
            Point2D { lat: 37.0, lng: 127.0 },
            Point2D { lat: 37.0, lng: 127.001 },
            Point2D { lat: 37.001, lng: 127.001 },
        ];
        let is_curved = classify_segments(&course);
        assert_eq!(is_curved, vec![true, true]);
    }
}
