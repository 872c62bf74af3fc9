//! SMAP soil-moisture adapter.
//!
//! Queries the L4 soil-moisture coverage service with a small bounding box
//! around the requested point. Depth selects between the surface (0-5 cm)
//! and root-zone (0-100 cm) products of the same mission; both share the
//! 9 km native grid.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::ProviderError;
use crate::models::{DataKind, DataRequest, MoistureDepth};
use crate::provider::capabilities::{ProviderCapabilities, RateQuota};
use crate::provider::snippet;
use crate::provider::traits::{EarthDataProvider, Observation};

const PROVIDER_ID: &str = "SMAP";

const NATIVE_RESOLUTION_M: u32 = 9000;

/// Half-width of the query bounding box, in degrees.
const BBOX_HALF_DEG: f64 = 0.05;

/// Volumetric soil moisture outside this range is not physical and is
/// treated as missing.
const PLAUSIBLE_RANGE: (f64, f64) = (0.0, 0.6);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Coverage service response: readings for the cells intersecting the box.
#[derive(Debug, Deserialize)]
struct CoverageResponse {
    values: Vec<Option<f64>>,
}

#[derive(Clone, Debug)]
pub struct SmapConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SmapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://n5eil02u.ecs.nsidc.org/egi/request".to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// SMAP L4 soil-moisture adapter.
pub struct SmapProvider {
    client: Client,
    config: SmapConfig,
}

impl SmapProvider {
    pub fn new(config: SmapConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    fn bounding_box(latitude: f64, longitude: f64) -> (f64, f64, f64, f64) {
        (
            longitude - BBOX_HALF_DEG,
            latitude - BBOX_HALF_DEG,
            longitude + BBOX_HALF_DEG,
            latitude + BBOX_HALF_DEG,
        )
    }

    /// Readings outside the physical range become missing values.
    fn screen(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
        values
            .into_iter()
            .map(|v| v.filter(|x| (PLAUSIBLE_RANGE.0..=PLAUSIBLE_RANGE.1).contains(x)))
            .collect()
    }
}

impl Default for SmapProvider {
    fn default() -> Self {
        Self::new(SmapConfig::default())
    }
}

#[async_trait]
impl EarthDataProvider for SmapProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            kinds: &[DataKind::SoilMoisture],
            native_resolution_m: NATIVE_RESOLUTION_M,
            supports_depth: true,
        }
    }

    fn rate_quota(&self) -> RateQuota {
        RateQuota::per_minute(30)
    }

    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError> {
        let depth = request.depth.unwrap_or(MoistureDepth::Surface);
        let (west, south, east, north) =
            Self::bounding_box(request.latitude, request.longitude);
        let bbox = format!("{west:.4},{south:.4},{east:.4},{north:.4}");
        let date = request.date_range.start.format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("coverage", depth.product()),
                ("bbox", bbox.as_str()),
                ("date", date.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER_ID, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(
                PROVIDER_ID,
                status.as_u16(),
                snippet(&body),
            ));
        }

        let body: CoverageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_ID, e.to_string()))?;

        if body.values.is_empty() {
            return Err(ProviderError::NoData {
                source_id: PROVIDER_ID,
            });
        }

        let values = Self::screen(body.values);

        Ok(Observation::new(values, NATIVE_RESOLUTION_M)
            .with_note("mission", "SMAP L4 global soil moisture")
            .with_note("native_resolution", "9 km")
            .with_note("depth", depth.description())
            .with_note("units", "m³/m³ volumetric soil moisture")
            .with_note("revisit", "2-3 days"))
    }
}
