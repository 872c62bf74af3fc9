//! Synthetic fallback data for when no real source can be reached.
//!
//! Generated values sit inside typical ranges for each kind and are
//! clearly labeled as estimates. The rng is seeded from the request's
//! cache key, so the same place, period, and kind always yield the same
//! series. Imagery cannot be synthesized.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::models::{
    DataFreshness, DataKind, DataRequest, DataResponse, MoistureDepth, ValueStatistics,
};
use crate::router::keys::cache_key;
use crate::router::quality;

/// Source id attached to generated responses.
pub const SOURCE_ID: &str = "OFFLINE";

const SOIL_MOISTURE_RANGE: (f64, f64) = (0.18, 0.40);
const NDVI_RANGE: (f64, f64) = (0.2, 0.8);
const PRECIPITATION_MAX_MM: f64 = 12.0;
const DRY_DAY_PROBABILITY: f64 = 0.6;

/// Generates plausible stand-in observations.
#[derive(Clone, Copy, Debug)]
pub struct OfflineFallbackGenerator {
    seed: u64,
}

impl OfflineFallbackGenerator {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Fixed-seed constructor so tests can pin the generated series.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, kind: DataKind, request: &DataRequest) -> StdRng {
        let mut hasher = DefaultHasher::new();
        cache_key(kind, request).hash(&mut hasher);
        StdRng::seed_from_u64(self.seed ^ hasher.finish())
    }

    /// Build a synthetic response, or `None` for kinds that cannot be
    /// generated (imagery).
    pub fn generate(&self, kind: DataKind, request: &DataRequest) -> Option<DataResponse> {
        if kind == DataKind::Imagery {
            return None;
        }

        let mut rng = self.rng_for(kind, request);
        let days = request.date_range.days().max(1) as usize;
        let values: Vec<Option<f64>> = (0..days)
            .map(|_| Some(Self::sample(kind, &mut rng)))
            .collect();

        let mut response = DataResponse {
            kind,
            source_id: SOURCE_ID.to_string(),
            resolution_m: request.resolution_m,
            statistics: ValueStatistics::from_values(&values),
            values,
            quality: quality::synthetic(),
            educational: Default::default(),
            timestamp: Utc::now(),
            cached: false,
            freshness: DataFreshness::Offline,
        };

        response
            .educational
            .insert("source".to_string(), "synthetic fallback".to_string());
        response.educational.insert(
            "note".to_string(),
            "estimated from typical ranges, not measured".to_string(),
        );
        response
            .educational
            .insert("units".to_string(), Self::units(kind).to_string());
        response
            .educational
            .insert("typical_range".to_string(), Self::range_note(kind).to_string());
        if kind == DataKind::SoilMoisture {
            let depth = request.depth.unwrap_or(MoistureDepth::Surface);
            response
                .educational
                .insert("depth".to_string(), depth.description().to_string());
        }

        Some(response)
    }

    fn sample(kind: DataKind, rng: &mut StdRng) -> f64 {
        match kind {
            DataKind::SoilMoisture => rng.gen_range(SOIL_MOISTURE_RANGE.0..=SOIL_MOISTURE_RANGE.1),
            DataKind::Vegetation => rng.gen_range(NDVI_RANGE.0..=NDVI_RANGE.1),
            DataKind::Precipitation => {
                if rng.gen_bool(DRY_DAY_PROBABILITY) {
                    0.0
                } else {
                    rng.gen_range(0.0..PRECIPITATION_MAX_MM)
                }
            }
            DataKind::Imagery => unreachable!("imagery is never generated"),
        }
    }

    fn units(kind: DataKind) -> &'static str {
        match kind {
            DataKind::SoilMoisture => "m³/m³ volumetric water content",
            DataKind::Vegetation => "NDVI (dimensionless)",
            DataKind::Precipitation => "mm/day",
            DataKind::Imagery => "",
        }
    }

    fn range_note(kind: DataKind) -> &'static str {
        match kind {
            DataKind::SoilMoisture => "0.18-0.40 for cultivated soils",
            DataKind::Vegetation => "0.2-0.8 from sparse to dense canopy",
            DataKind::Precipitation => "0-12 mm/day, most days dry",
            DataKind::Imagery => "",
        }
    }
}

impl Default for OfflineFallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use chrono::NaiveDate;

    fn request_for_days(days: u32) -> DataRequest {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = start + chrono::Duration::days(i64::from(days) - 1);
        DataRequest::new(37.5, 127.0, 9000, DateRange::new(start, end))
    }

    #[test]
    fn test_one_value_per_requested_day() {
        let generator = OfflineFallbackGenerator::with_seed(7);
        let response = generator
            .generate(DataKind::SoilMoisture, &request_for_days(5))
            .unwrap();
        assert_eq!(response.values.len(), 5);
        assert_eq!(response.statistics.valid_count, 5);
    }

    #[test]
    fn test_same_request_yields_same_series() {
        let generator = OfflineFallbackGenerator::with_seed(7);
        let a = generator
            .generate(DataKind::Vegetation, &request_for_days(5))
            .unwrap();
        let b = generator
            .generate(DataKind::Vegetation, &request_for_days(5))
            .unwrap();
        assert_eq!(a.values, b.values);

        let elsewhere = DataRequest::new(
            -12.0,
            44.0,
            9000,
            request_for_days(5).date_range,
        );
        let c = generator.generate(DataKind::Vegetation, &elsewhere).unwrap();
        assert_ne!(a.values, c.values);
    }

    #[test]
    fn test_values_stay_in_plausible_ranges() {
        let generator = OfflineFallbackGenerator::with_seed(42);
        let request = request_for_days(30);

        let soil = generator
            .generate(DataKind::SoilMoisture, &request)
            .unwrap();
        assert!(soil
            .values
            .iter()
            .flatten()
            .all(|v| (0.18..=0.40).contains(v)));

        let vegetation = generator.generate(DataKind::Vegetation, &request).unwrap();
        assert!(vegetation
            .values
            .iter()
            .flatten()
            .all(|v| (0.2..=0.8).contains(v)));

        let precipitation = generator
            .generate(DataKind::Precipitation, &request)
            .unwrap();
        assert!(precipitation
            .values
            .iter()
            .flatten()
            .all(|v| (0.0..=12.0).contains(v)));
        // a month has at least one dry day at these odds
        assert!(precipitation.values.iter().flatten().any(|v| *v == 0.0));
    }

    #[test]
    fn test_response_is_labeled_synthetic() {
        let generator = OfflineFallbackGenerator::new();
        let response = generator
            .generate(DataKind::SoilMoisture, &request_for_days(1))
            .unwrap();

        assert_eq!(response.source_id, "OFFLINE");
        assert_eq!(response.freshness, DataFreshness::Offline);
        assert!(!response.cached);
        assert!((response.quality.confidence - 0.1).abs() < 1e-9);
        assert_eq!(response.quality.issues, vec!["offline_synthetic"]);
        assert!(response.quality.is_valid);
        assert_eq!(
            response.educational.get("source").map(String::as_str),
            Some("synthetic fallback")
        );
        assert!(response.educational.contains_key("depth"));
    }

    #[test]
    fn test_imagery_cannot_be_generated() {
        let generator = OfflineFallbackGenerator::new();
        assert!(generator
            .generate(DataKind::Imagery, &request_for_days(1))
            .is_none());
    }
}
