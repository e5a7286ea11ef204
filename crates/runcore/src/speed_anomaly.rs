//! Speed-Anomaly Detector: a pure function over a finalized run summary that
//! flags physically impossible speeds.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Split;

/// `(min_distance_m, max_avg_speed_ms)`, strictest bracket whose
/// `min_distance_m` is still `<= distance_m` applies.
const DISTANCE_SPEED_LIMITS: [(i64, f64, &str); 6] = [
    (0, 10.5, "under 1km"),
    (1_000, 7.5, "1km+"),
    (5_000, 6.8, "5km+"),
    (10_000, 6.3, "10km+"),
    (21_097, 6.0, "half marathon+"),
    (42_195, 5.8, "full marathon+"),
];

const MIN_SPLIT_PACE_SEC_PER_KM: i64 = 120;
const MAX_INSTANTANEOUS_SPEED_MS: f64 = 12.5;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnomalyResult {
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub confidence: f64,
}

impl AnomalyResult {
    fn clean() -> Self {
        Self {
            is_flagged: false,
            flag_reason: None,
            confidence: 0.0,
        }
    }
}

fn pace_str(pace_s_per_km: i64) -> String {
    format!("{}:{:02}/km", pace_s_per_km / 60, pace_s_per_km % 60)
}

/// Analyze a completed run for speed anomalies. Flags a run when average
/// speed exceeds its distance bracket's limit, instantaneous max speed
/// exceeds the human cap, the best split pace is impossibly fast, or any
/// individual split is.
pub fn analyze_run(
    distance_meters: i64,
    duration_seconds: i64,
    avg_speed_ms: Option<f64>,
    max_speed_ms: Option<f64>,
    splits: &[Split],
    best_pace_seconds_per_km: Option<i64>,
) -> AnomalyResult {
    if duration_seconds <= 0 || distance_meters <= 0 {
        return AnomalyResult::clean();
    }

    let mut reasons: Vec<String> = Vec::new();

    let mut actual_avg = distance_meters as f64 / duration_seconds as f64;
    if let Some(reported) = avg_speed_ms.filter(|s| *s > 0.0) {
        actual_avg = actual_avg.max(reported);
    }

    let (speed_limit, bracket_name) = DISTANCE_SPEED_LIMITS
        .iter()
        .rev()
        .find(|(min_dist, _, _)| distance_meters >= *min_dist)
        .map(|(_, limit, name)| (*limit, *name))
        .unwrap_or((MAX_INSTANTANEOUS_SPEED_MS, ""));

    if actual_avg > speed_limit {
        reasons.push(format!(
            "average speed {actual_avg:.1}m/s exceeds the {bracket_name} human limit of {speed_limit:.1}m/s"
        ));
    }

    if let Some(max_speed) = max_speed_ms.filter(|s| *s > MAX_INSTANTANEOUS_SPEED_MS) {
        reasons.push(format!(
            "peak instantaneous speed {max_speed:.1}m/s exceeds the human limit of {MAX_INSTANTANEOUS_SPEED_MS}m/s"
        ));
    }

    if let Some(best_pace) = best_pace_seconds_per_km.filter(|p| *p < MIN_SPLIT_PACE_SEC_PER_KM) {
        reasons.push(format!(
            "best split pace {} is faster than the human limit of 2:00/km",
            pace_str(best_pace)
        ));
    }

    if let Some(split) = splits
        .iter()
        .find(|s| s.pace_seconds_per_km > 0 && s.pace_seconds_per_km < MIN_SPLIT_PACE_SEC_PER_KM)
    {
        reasons.push(format!(
            "split {} pace {} is anomalous",
            split.split_number,
            pace_str(split.pace_seconds_per_km)
        ));
    }

    if reasons.is_empty() {
        return AnomalyResult::clean();
    }

    let num_reasons = reasons.len();
    AnomalyResult {
        is_flagged: true,
        flag_reason: Some(reasons.into_iter().take(3).collect::<Vec<_>>().join(" / ")),
        confidence: (num_reasons as f64 * 0.4).min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario 6: 10 km in 25 minutes → avg speed 6.67 m/s, exceeds the
    /// 10km+ bracket limit of 6.3 m/s.
    #[test]
    fn flags_impossible_average_speed() {
        let result = analyze_run(10_000, 25 * 60, None, None, &[], None);
        assert!(result.is_flagged);
        assert!(result.flag_reason.as_ref().unwrap().contains("10km+"));
    }

    #[test]
    fn clean_run_is_not_flagged() {
        let result = analyze_run(10_000, 50 * 60, None, None, &[], Some(300));
        assert!(!result.is_flagged);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn confidence_caps_at_one_with_three_reasons() {
        let splits = vec![Split {
            split_number: 1,
            distance_meters: 1000.0,
            duration_seconds: 90,
            pace_seconds_per_km: 90,
            elevation_delta_m: 0.0,
        }];
        let result = analyze_run(10_000, 25 * 60, None, Some(20.0), &splits, Some(90));
        assert!(result.is_flagged);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.flag_reason.as_ref().unwrap().split(" / ").count(), 3);
    }

    #[test]
    fn zero_distance_or_duration_is_never_flagged() {
        assert!(!analyze_run(0, 100, None, None, &[], None).is_flagged);
        assert!(!analyze_run(100, 0, None, None, &[], None).is_flagged);
    }
}
