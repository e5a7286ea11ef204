//! Trace Derivation: a pure function reducing an ordered point stream to
//! distance, splits, elevation, pace and speed. Used by both the live
//! session-recovery path and the file/third-party import pipeline.

use geo::{Distance as _, Haversine};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{PauseInterval, Split, TrackPoint};

const SPLIT_DISTANCE_M: f64 = 1000.0;
const ELEVATION_HYSTERESIS_M: f64 = 2.0;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DerivedActivity {
    pub distance_meters: f64,
    pub duration_seconds: i64,
    pub avg_pace_seconds_per_km: Option<i64>,
    pub best_pace_seconds_per_km: Option<i64>,
    pub max_speed_ms: f64,
    pub avg_speed_ms: Option<f64>,
    pub elevation_gain_meters: f64,
    pub elevation_loss_meters: f64,
    pub splits: Vec<Split>,
    /// `[lng, lat, alt]` triples in input order.
    pub route_coordinates: Vec<[f64; 3]>,
    pub elevation_profile: Vec<f64>,
}

trait TrackMetric {
    type Output;
    fn next_point(&mut self, prev: Option<&TrackPoint>, point: &TrackPoint);
    fn finish(self) -> Self::Output;
}

#[derive(Default)]
struct DistanceMetric {
    total: f64,
}

impl TrackMetric for DistanceMetric {
    type Output = f64;
    fn next_point(&mut self, prev: Option<&TrackPoint>, point: &TrackPoint) {
        if let Some(prev) = prev {
            self.total += Haversine.distance(prev.point(), point.point());
        }
    }
    fn finish(self) -> f64 {
        self.total
    }
}

/// Single-pass elevation accumulator with 2 m hysteresis: the reference
/// altitude only moves once an accumulated delta clears the threshold, which
/// suppresses GPS jitter from registering as repeated small gains/losses.
/// Altitudes of exactly 0 or missing are treated as absent samples.
#[derive(Default)]
struct ElevationMetric {
    reference: Option<f64>,
    gain: f64,
    loss: f64,
}

impl TrackMetric for ElevationMetric {
    type Output = (f64, f64);
    fn next_point(&mut self, _prev: Option<&TrackPoint>, point: &TrackPoint) {
        let Some(alt) = point.alt.filter(|a| *a != 0.0) else {
            return;
        };
        let Some(reference) = self.reference else {
            self.reference = Some(alt);
            return;
        };
        let delta = alt - reference;
        if delta.abs() >= ELEVATION_HYSTERESIS_M {
            if delta > 0.0 {
                self.gain += delta;
            } else {
                self.loss += -delta;
            }
            self.reference = Some(alt);
        }
    }
    fn finish(self) -> (f64, f64) {
        (self.gain, self.loss)
    }
}

/// Emits a split each time cumulative distance since the last boundary
/// crosses 1000 m.
#[derive(Default)]
struct SplitMetric {
    splits: Vec<Split>,
    since_boundary_m: f64,
    since_boundary_elevation: f64,
    segment_start_time: Option<time::OffsetDateTime>,
    last_alt: Option<f64>,
}

impl TrackMetric for SplitMetric {
    type Output = Vec<Split>;
    fn next_point(&mut self, prev: Option<&TrackPoint>, point: &TrackPoint) {
        if self.segment_start_time.is_none() {
            self.segment_start_time = Some(point.timestamp);
        }
        if let Some(prev) = prev {
            let step = Haversine.distance(prev.point(), point.point());
            self.since_boundary_m += step;
        }
        if let Some(alt) = point.alt.filter(|a| *a != 0.0) {
            if let Some(last_alt) = self.last_alt {
                self.since_boundary_elevation += alt - last_alt;
            }
            self.last_alt = Some(alt);
        }

        if self.since_boundary_m >= SPLIT_DISTANCE_M {
            let duration_seconds = self
                .segment_start_time
                .map(|start| (point.timestamp - start).whole_seconds())
                .unwrap_or(0)
                .max(0);
            self.splits.push(Split {
                split_number: self.splits.len() as i32 + 1,
                distance_meters: self.since_boundary_m,
                duration_seconds,
                pace_seconds_per_km: duration_seconds,
                elevation_delta_m: self.since_boundary_elevation,
            });
            self.since_boundary_m = 0.0;
            self.since_boundary_elevation = 0.0;
            self.segment_start_time = Some(point.timestamp);
        }
    }
    fn finish(self) -> Vec<Split> {
        self.splits
    }
}

/// Reduce an ordered, time-stamped point stream to distance, splits,
/// elevation, pace and speed. Idempotent and deterministic; empty or
/// single-point input yields a zero-filled [`DerivedActivity`].
pub fn derive_activity(points: &[TrackPoint]) -> DerivedActivity {
    if points.len() < 2 {
        return DerivedActivity::default();
    }

    let mut distance = DistanceMetric::default();
    let mut elevation = ElevationMetric::default();
    let mut splits = SplitMetric::default();

    let mut prev: Option<&TrackPoint> = None;
    let mut max_speed: f64 = 0.0;
    for point in points {
        distance.next_point(prev, point);
        elevation.next_point(prev, point);
        splits.next_point(prev, point);
        if let Some(speed) = point.speed_ms {
            max_speed = max_speed.max(speed);
        }
        prev = Some(point);
    }

    let distance_meters = distance.finish();
    let (elevation_gain_meters, elevation_loss_meters) = elevation.finish();
    let splits = splits.finish();

    let started_at = points.first().unwrap().timestamp;
    let finished_at = points.last().unwrap().timestamp;
    let duration_seconds = (finished_at - started_at).whole_seconds().max(0);

    let avg_pace_seconds_per_km = if distance_meters > 0.0 {
        Some((duration_seconds as f64 / (distance_meters / 1000.0)).floor() as i64)
    } else {
        None
    };
    let avg_speed_ms = if duration_seconds > 0 && distance_meters > 0.0 {
        Some(distance_meters / duration_seconds as f64)
    } else {
        None
    };
    let best_pace_seconds_per_km = splits.iter().map(|s| s.pace_seconds_per_km).min();

    let route_coordinates = points
        .iter()
        .map(|p| [p.lng, p.lat, p.alt.unwrap_or(0.0)])
        .collect();
    let elevation_profile = points
        .iter()
        .filter_map(|p| p.alt.filter(|a| *a != 0.0))
        .collect();

    DerivedActivity {
        distance_meters,
        duration_seconds,
        avg_pace_seconds_per_km,
        best_pace_seconds_per_km,
        max_speed_ms: max_speed,
        avg_speed_ms,
        elevation_gain_meters,
        elevation_loss_meters,
        splits,
        route_coordinates,
        elevation_profile,
    }
}

/// Split a point stream on gaps with no movement and a time gap beyond the
/// given threshold, returning the detected pause intervals. Used by the
/// session completion path when the client didn't already compute pauses.
pub fn detect_pauses(points: &[TrackPoint], min_gap_seconds: i64) -> Vec<PauseInterval> {
    let mut pauses = Vec::new();
    for window in points.windows(2) {
        let gap = (window[1].timestamp - window[0].timestamp).whole_seconds();
        if gap >= min_gap_seconds {
            pauses.push(PauseInterval {
                started_at: window[0].timestamp,
                ended_at: window[1].timestamp,
            });
        }
    }
    pauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn pt(lat: f64, lng: f64, alt: Option<f64>, t_offset_s: i64) -> TrackPoint {
        TrackPoint {
            lat,
            lng,
            alt,
            timestamp: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(t_offset_s),
            speed_ms: None,
            heart_rate: None,
        }
    }

    /// Scenario 1: points on a straight line every 100 m at 10 s cadence for
    /// 2.1 km. Expect distance 2100 m, duration 210 s, two splits each with
    /// pace 100 s/km, best and avg pace both 100.
    #[test]
    fn split_boundary_scenario() {
        // ~100 m per 0.0009 degrees of latitude.
        let step_deg = 100.0 / 111_000.0;
        let points: Vec<TrackPoint> = (0..=21)
            .map(|i| pt(37.0 + step_deg * i as f64, 127.0, None, i * 10))
            .collect();

        let derived = derive_activity(&points);

        assert!((derived.distance_meters - 2100.0).abs() < 5.0);
        assert_eq!(derived.duration_seconds, 210);
        assert_eq!(derived.splits.len(), 2);
        for split in &derived.splits {
            assert_eq!(split.pace_seconds_per_km, 100);
        }
        assert_eq!(derived.best_pace_seconds_per_km, Some(100));
        assert_eq!(derived.avg_pace_seconds_per_km, Some(100));
    }

    /// Scenario 2: elevation hysteresis over 10 points.
    #[test]
    fn elevation_hysteresis_scenario() {
        let altitudes = [100.0, 100.5, 101.0, 100.7, 103.0, 102.0, 105.0, 104.0, 107.0, 100.0];
        let points: Vec<TrackPoint> = altitudes
            .iter()
            .enumerate()
            .map(|(i, alt)| pt(37.0 + i as f64 * 0.0001, 127.0, Some(*alt), i as i64 * 10))
            .collect();

        let derived = derive_activity(&points);

        assert!((derived.elevation_gain_meters - 7.0).abs() < 1e-9);
        assert!((derived.elevation_loss_meters - 7.0).abs() < 1e-9);
    }

    #[test]
    fn empty_and_single_point_are_zero_filled() {
        assert_eq!(derive_activity(&[]).distance_meters, 0.0);
        let one = vec![pt(37.0, 127.0, Some(10.0), 0)];
        let derived = derive_activity(&one);
        assert_eq!(derived.distance_meters, 0.0);
        assert_eq!(derived.duration_seconds, 0);
    }

    #[test]
    fn zero_and_missing_altitudes_are_treated_as_absent() {
        let points = vec![
            pt(37.0, 127.0, Some(0.0), 0),
            pt(37.001, 127.0, None, 10),
            pt(37.002, 127.0, Some(50.0), 20),
        ];
        let derived = derive_activity(&points);
        assert_eq!(derived.elevation_profile, vec![50.0]);
    }
}
