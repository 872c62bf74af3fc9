//! Confidence scoring for observations before they are served.
//!
//! Confidence starts at 1.0 and only ever shrinks; every applied discount
//! leaves a named issue behind so callers can explain a low score. The
//! floor keeps even the worst response distinguishable from "no data".

use chrono::{Duration, Utc};

use crate::models::QualityAssessment;
use crate::provider::Observation;

pub const CONFIDENCE_FLOOR: f64 = 0.1;

/// Share of valid values below which a series counts as gappy.
pub const COMPLETENESS_THRESHOLD: f64 = 0.8;

/// Observations older than this carry less weight.
pub const AGE_THRESHOLD_DAYS: i64 = 7;

const LOW_COMPLETENESS_DISCOUNT: f64 = 0.7;
const AGED_DISCOUNT: f64 = 0.8;
const COARSE_DISCOUNT: f64 = 0.9;
const STALE_DISCOUNT: f64 = 0.6;

pub const ISSUE_LOW_COMPLETENESS: &str = "low_completeness";
pub const ISSUE_AGED: &str = "aged_observation";
pub const ISSUE_COARSE: &str = "coarser_than_requested";
pub const ISSUE_STALE: &str = "stale_cache";
pub const ISSUE_SYNTHETIC: &str = "offline_synthetic";

fn apply(confidence: f64, factor: f64) -> f64 {
    (confidence * factor).max(CONFIDENCE_FLOOR)
}

/// Fraction of values that carry data.
pub fn completeness(values: &[Option<f64>]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let valid = values.iter().filter(|v| v.is_some()).count();
    valid as f64 / values.len() as f64
}

/// Score an observation against the resolution the caller asked for.
///
/// Metadata-only observations (imagery) skip the completeness check;
/// an observation with neither values nor metadata is flagged invalid.
pub fn assess(observation: &Observation, target_resolution_m: u32) -> QualityAssessment {
    let mut confidence = 1.0;
    let mut issues = Vec::new();

    if !observation.values.is_empty() && completeness(&observation.values) < COMPLETENESS_THRESHOLD
    {
        confidence = apply(confidence, LOW_COMPLETENESS_DISCOUNT);
        issues.push(ISSUE_LOW_COMPLETENESS.to_string());
    }

    let age = Utc::now().signed_duration_since(observation.acquired);
    if age > Duration::days(AGE_THRESHOLD_DAYS) {
        confidence = apply(confidence, AGED_DISCOUNT);
        issues.push(ISSUE_AGED.to_string());
    }

    if observation.native_resolution_m > target_resolution_m {
        confidence = apply(confidence, COARSE_DISCOUNT);
        issues.push(ISSUE_COARSE.to_string());
    }

    let is_valid = !observation.values.is_empty() || !observation.educational.is_empty();
    QualityAssessment {
        confidence,
        issues,
        is_valid,
    }
}

/// Discount a cached payload that is being served past its freshness
/// window. Idempotent on the issue list.
pub fn mark_stale(quality: &mut QualityAssessment) {
    quality.confidence = apply(quality.confidence, STALE_DISCOUNT);
    if !quality.issues.iter().any(|issue| issue == ISSUE_STALE) {
        quality.issues.push(ISSUE_STALE.to_string());
    }
}

/// Assessment attached to generated fallback data.
pub fn synthetic() -> QualityAssessment {
    QualityAssessment {
        confidence: CONFIDENCE_FLOOR,
        issues: vec![ISSUE_SYNTHETIC.to_string()],
        is_valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn fresh_observation(values: Vec<Option<f64>>, native_m: u32) -> Observation {
        Observation::new(values, native_m)
    }

    #[test]
    fn test_clean_observation_scores_full_confidence() {
        let observation = fresh_observation(vec![Some(0.3), Some(0.31)], 100);
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 1.0));
        assert!(quality.issues.is_empty());
        assert!(quality.is_valid);
    }

    #[test]
    fn test_gappy_series_is_discounted() {
        let observation = fresh_observation(vec![Some(0.3), None, None, Some(0.2)], 100);
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 0.7));
        assert_eq!(quality.issues, vec![ISSUE_LOW_COMPLETENESS]);
    }

    #[test]
    fn test_completeness_boundary_is_not_discounted() {
        // exactly 4 of 5 valid
        let observation = fresh_observation(
            vec![Some(0.1), Some(0.2), Some(0.3), Some(0.4), None],
            100,
        );
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 1.0));
    }

    #[test]
    fn test_aged_observation_is_discounted() {
        let observation = fresh_observation(vec![Some(0.3)], 100)
            .with_acquired(Utc::now() - Duration::days(8));
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 0.8));
        assert_eq!(quality.issues, vec![ISSUE_AGED]);
    }

    #[test]
    fn test_coarser_source_is_discounted() {
        let observation = fresh_observation(vec![Some(0.3)], 9000);
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 0.9));
        assert_eq!(quality.issues, vec![ISSUE_COARSE]);

        let same = assess(&fresh_observation(vec![Some(0.3)], 100), 100);
        assert!(close(same.confidence, 1.0));
    }

    #[test]
    fn test_discounts_compound() {
        let observation = fresh_observation(vec![Some(0.3), None, None], 9000)
            .with_acquired(Utc::now() - Duration::days(10));
        let quality = assess(&observation, 100);
        assert!(close(quality.confidence, 0.7 * 0.8 * 0.9));
        assert_eq!(quality.issues.len(), 3);
    }

    #[test]
    fn test_confidence_never_goes_below_floor() {
        let mut quality = QualityAssessment {
            confidence: 0.15,
            issues: Vec::new(),
            is_valid: true,
        };
        mark_stale(&mut quality);
        mark_stale(&mut quality);
        assert!(close(quality.confidence, CONFIDENCE_FLOOR));
        // issue recorded once
        assert_eq!(quality.issues, vec![ISSUE_STALE]);
    }

    #[test]
    fn test_metadata_only_observation_skips_completeness() {
        let observation =
            fresh_observation(Vec::new(), 250).with_note("tile_url", "https://example.test/t.jpg");
        let quality = assess(&observation, 250);
        assert!(close(quality.confidence, 1.0));
        assert!(quality.is_valid);
    }

    #[test]
    fn test_empty_observation_is_invalid() {
        let observation = fresh_observation(Vec::new(), 250);
        let quality = assess(&observation, 250);
        assert!(!quality.is_valid);
    }

    #[test]
    fn test_synthetic_assessment_sits_on_the_floor() {
        let quality = synthetic();
        assert!(close(quality.confidence, CONFIDENCE_FLOOR));
        assert_eq!(quality.issues, vec![ISSUE_SYNTHETIC]);
        assert!(quality.is_valid);
    }
}
