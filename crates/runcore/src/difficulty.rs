//! Difficulty Scoring: a weighted combination of distance, elevation gain,
//! gradient and completion rate, bucketed into easy/medium/hard.

use crate::models::Difficulty;

const DISTANCE_CAP_M: f64 = 10_000.0;
const ELEVATION_CAP_M: f64 = 300.0;
const GRADIENT_CAP_M_PER_KM: f64 = 60.0;

/// `completion_rate` of `None` means "unknown" — neutral score, let the
/// other factors decide.
pub fn compute_difficulty(
    distance_meters: i64,
    elevation_gain_meters: i32,
    completion_rate: Option<f64>,
) -> Difficulty {
    let distance_meters = distance_meters as f64;
    let elevation_gain_meters = elevation_gain_meters as f64;

    let dist_score = (distance_meters / DISTANCE_CAP_M * 100.0).min(100.0);
    let elev_score = (elevation_gain_meters / ELEVATION_CAP_M * 100.0).min(100.0);

    let grad_score = if distance_meters > 0.0 {
        let gradient_per_km = elevation_gain_meters / distance_meters * 1000.0;
        (gradient_per_km / GRADIENT_CAP_M_PER_KM * 100.0).min(100.0)
    } else {
        0.0
    };

    let comp_score = completion_rate.map_or(50.0, |rate| (1.0 - rate) * 100.0);

    let total = dist_score * 0.3 + elev_score * 0.3 + grad_score * 0.2 + comp_score * 0.2;

    Difficulty::from_score(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flat_course_is_easy() {
        assert_eq!(compute_difficulty(1_000, 5, Some(0.9)), Difficulty::Easy);
    }

    #[test]
    fn long_hilly_course_is_hard() {
        assert_eq!(compute_difficulty(15_000, 500, Some(0.2)), Difficulty::Hard);
    }

    #[test]
    fn unknown_completion_rate_uses_neutral_score() {
        let with_unknown = compute_difficulty(5_000, 100, None);
        let with_neutral = compute_difficulty(5_000, 100, Some(0.5));
        assert_eq!(with_unknown, with_neutral);
    }
}
