use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::request::DataKind;

/// Where a served response came from, relative to the live source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    /// Fetched from the upstream source during this call.
    Live,
    /// Served from a cache entry inside the freshness window.
    Cached,
    /// Served from an expired cache entry because the live fetch failed.
    StaleCache,
    /// Synthesized locally with no upstream contact.
    Offline,
}

/// Summary statistics over the valid readings of a value sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueStatistics {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub valid_count: usize,
}

impl ValueStatistics {
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let valid: Vec<f64> = values.iter().flatten().copied().collect();
        if valid.is_empty() {
            return ValueStatistics {
                mean: None,
                min: None,
                max: None,
                valid_count: 0,
            };
        }
        let sum: f64 = valid.iter().sum();
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        ValueStatistics {
            mean: Some(sum / valid.len() as f64),
            min: Some(min),
            max: Some(max),
            valid_count: valid.len(),
        }
    }
}

/// Confidence and detected issues for one response.
///
/// `confidence` only ever moves down as issues accumulate and never goes
/// below the floor; a response with no usable readings is flagged with
/// `is_valid == false` rather than a zero confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub confidence: f64,
    pub issues: Vec<String>,
    pub is_valid: bool,
}

/// The single response shape every caller receives, whatever the source,
/// fallback tier, or data kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub kind: DataKind,
    pub source_id: String,
    /// Resolution of the data actually served, which may be coarser than
    /// the caller requested.
    pub resolution_m: u32,
    pub values: Vec<Option<f64>>,
    pub statistics: ValueStatistics,
    pub quality: QualityAssessment,
    /// Human-readable notes about the source: native resolution, depth
    /// semantics, revisit cadence, units.
    pub educational: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
    pub freshness: DataFreshness,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_over_mixed_values() {
        let values = vec![Some(0.2), None, Some(0.4), Some(0.3), None];
        let stats = ValueStatistics::from_values(&values);
        assert_eq!(stats.valid_count, 3);
        assert!((stats.mean.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(stats.min, Some(0.2));
        assert_eq!(stats.max, Some(0.4));
    }

    #[test]
    fn test_statistics_with_no_valid_values() {
        let stats = ValueStatistics::from_values(&[None, None]);
        assert_eq!(stats.valid_count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
    }

    #[test]
    fn test_statistics_empty_sequence() {
        let stats = ValueStatistics::from_values(&[]);
        assert_eq!(stats.valid_count, 0);
        assert_eq!(stats.mean, None);
    }

    #[test]
    fn test_freshness_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DataFreshness::StaleCache).unwrap(),
            "\"stale_cache\""
        );
        assert_eq!(
            serde_json::to_string(&DataFreshness::Offline).unwrap(),
            "\"offline\""
        );
        assert_eq!(serde_json::to_string(&DataFreshness::Live).unwrap(), "\"live\"");
    }
}
