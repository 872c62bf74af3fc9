//! Deterministic cache-key derivation.
//!
//! Nearby coordinates share an entry: both are rounded to three decimals
//! (about 110 m at the equator) before they enter the key, so repeated
//! taps around the same field do not fan out into distinct fetches.

use crate::models::{DataKind, DataRequest, MoistureDepth};

fn round_coordinate(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    // -0.0001 rounds to -0.0; the key must not distinguish the two zeros
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Key for one logical observation, e.g.
/// `soil_moisture:37.500:127.000:2024-05-01:surface`.
///
/// The depth segment only exists for soil moisture; a request without an
/// explicit depth shares the surface entry, matching the adapter default.
pub fn cache_key(kind: DataKind, request: &DataRequest) -> String {
    let lat = round_coordinate(request.latitude);
    let lon = round_coordinate(request.longitude);

    let mut key = format!(
        "{}:{:.3}:{:.3}:{}",
        kind.as_str(),
        lat,
        lon,
        request.date_range.start
    );
    if request.date_range.start != request.date_range.end {
        key.push_str(&format!("..{}", request.date_range.end));
    }
    if kind == DataKind::SoilMoisture {
        let depth = request.depth.unwrap_or(MoistureDepth::Surface);
        key.push(':');
        key.push_str(depth.as_str());
    }
    key
}
