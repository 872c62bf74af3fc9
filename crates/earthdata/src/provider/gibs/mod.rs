//! Imagery adapter for the GIBS WMTS tile service.
//!
//! GIBS serves pre-rendered browse imagery on a geographic (EPSG:4326)
//! tile grid: two columns by one row at zoom 0, doubling per level. The
//! adapter resolves the tile containing the requested point, fetches it
//! once to confirm availability, and returns a metadata-only observation
//! carrying the tile URL and coordinates. `values` stays empty for
//! imagery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::errors::ProviderError;
use crate::models::{DataKind, DataRequest};
use crate::provider::capabilities::{ProviderCapabilities, RateQuota};
use crate::provider::snippet;
use crate::provider::traits::{EarthDataProvider, Observation};

const PROVIDER_ID: &str = "GIBS";

const NATIVE_RESOLUTION_M: u32 = 250;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct GibsConfig {
    pub base_url: String,
    pub layer: String,
    pub tile_matrix_set: String,
    pub zoom: u8,
    pub timeout: Duration,
}

impl Default for GibsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gibs.earthdata.nasa.gov/wmts/epsg4326/best".to_string(),
            layer: "MODIS_Terra_CorrectedReflectance_TrueColor".to_string(),
            tile_matrix_set: "250m".to_string(),
            zoom: 6,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Tile containing a point on the geographic grid, clamped to the grid
/// edge for boundary coordinates.
fn tile_for(latitude: f64, longitude: f64, zoom: u8) -> (u32, u32) {
    let rows = 1u32 << zoom;
    let cols = rows * 2;

    let row = ((90.0 - latitude) / 180.0 * f64::from(rows)).floor();
    let col = ((longitude + 180.0) / 360.0 * f64::from(cols)).floor();

    let row = (row.max(0.0) as u32).min(rows - 1);
    let col = (col.max(0.0) as u32).min(cols - 1);
    (row, col)
}

/// True-color browse imagery adapter.
pub struct GibsProvider {
    client: Client,
    config: GibsConfig,
}

impl GibsProvider {
    pub fn new(config: GibsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    fn tile_url(&self, request: &DataRequest, row: u32, col: u32) -> String {
        format!(
            "{}/{}/default/{}/{}/{}/{}/{}.jpg",
            self.config.base_url,
            self.config.layer,
            request.date_range.start.format("%Y-%m-%d"),
            self.config.tile_matrix_set,
            self.config.zoom,
            row,
            col,
        )
    }
}

#[async_trait]
impl EarthDataProvider for GibsProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            kinds: &[DataKind::Imagery],
            native_resolution_m: NATIVE_RESOLUTION_M,
            supports_depth: false,
        }
    }

    fn rate_quota(&self) -> RateQuota {
        RateQuota::per_minute(60)
    }

    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError> {
        let (row, col) = tile_for(request.latitude, request.longitude, self.config.zoom);
        let url = self.tile_url(request, row, col);

        // One probe fetch confirms the layer has imagery for the date.
        let response = self
            .client
            .get(&url)
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

        Ok(Observation::new(Vec::new(), NATIVE_RESOLUTION_M)
            .with_note("tile_url", &url)
            .with_note("layer", &self.config.layer)
            .with_note(
                "tile",
                format!("zoom {} row {} col {}", self.config.zoom, row, col),
            )
            .with_note("mission", "Global Imagery Browse Services")
            .with_note("native_resolution", "250 m")
            .with_note("revisit", "daily"))
    }
}
