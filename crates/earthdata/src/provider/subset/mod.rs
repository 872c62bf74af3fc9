//! Vegetation-index adapter for the ORNL DAAC point-subset service.
//!
//! One adapter serves two catalog products: 250 m MODIS and 375 m VIIRS
//! composites. The service answers in CSV with one row per composite
//! period, raw integer values, a -3000 fill sentinel and a 0.0001 scale
//! factor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::errors::ProviderError;
use crate::models::{DataKind, DataRequest};
use crate::provider::capabilities::{ProviderCapabilities, RateQuota};
use crate::provider::snippet;
use crate::provider::traits::{EarthDataProvider, Observation};

/// Raw sentinel the service emits for cloud or water pixels.
const FILL_VALUE: f64 = -3000.0;

/// Raw values are scaled integers.
const SCALE_FACTOR: f64 = 0.0001;

/// Scaled NDVI outside this range is not physical and is treated as missing.
const NDVI_RANGE: (f64, f64) = (-0.2, 1.0);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug)]
struct SubsetSource {
    id: &'static str,
    product: &'static str,
    band: &'static str,
    native_resolution_m: u32,
    mission: &'static str,
    native_resolution_note: &'static str,
}

const MODIS: SubsetSource = SubsetSource {
    id: "MODIS",
    product: "MOD13Q1",
    band: "250m_16_days_NDVI",
    native_resolution_m: 250,
    mission: "Terra MODIS",
    native_resolution_note: "250 m",
};

const VIIRS: SubsetSource = SubsetSource {
    id: "VIIRS",
    product: "VNP13A1",
    band: "375m_16_days_NDVI",
    native_resolution_m: 375,
    mission: "Suomi NPP VIIRS",
    native_resolution_note: "375 m",
};

#[derive(Clone, Debug)]
pub struct SubsetConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://modis.ornl.gov/rst/api/v1".to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Point-subset adapter, parameterized over the catalog product.
pub struct SubsetProvider {
    client: Client,
    config: SubsetConfig,
    source: SubsetSource,
}

impl SubsetProvider {
    /// 250 m MODIS NDVI composites.
    pub fn modis(config: SubsetConfig) -> Self {
        Self::with_source(config, MODIS)
    }

    /// 375 m VIIRS NDVI composites.
    pub fn viirs(config: SubsetConfig) -> Self {
        Self::with_source(config, VIIRS)
    }

    fn with_source(config: SubsetConfig, source: SubsetSource) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            source,
        }
    }

    /// Fill sentinel to missing, then scale and range-screen.
    fn screen(&self, raw: f64) -> Option<f64> {
        if (raw - FILL_VALUE).abs() < f64::EPSILON {
            return None;
        }
        let scaled = raw * SCALE_FACTOR;
        if (NDVI_RANGE.0..=NDVI_RANGE.1).contains(&scaled) {
            Some(scaled)
        } else {
            None
        }
    }

    fn parse_csv(&self, body: &str) -> Result<Vec<Option<f64>>, ProviderError> {
        let mut values = Vec::new();
        for line in body.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let raw = line
                .split(',')
                .nth(1)
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .ok_or_else(|| {
                    ProviderError::malformed(
                        self.source.id,
                        format!("row missing value column: {line}"),
                    )
                })?;
            let raw: f64 = raw.parse().map_err(|_| {
                ProviderError::malformed(self.source.id, format!("unparseable row: {line}"))
            })?;
            values.push(self.screen(raw));
        }

        if values.is_empty() {
            return Err(ProviderError::NoData {
                source_id: self.source.id,
            });
        }
        Ok(values)
    }
}

#[async_trait]
impl EarthDataProvider for SubsetProvider {
    fn id(&self) -> &'static str {
        self.source.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            kinds: &[DataKind::Vegetation],
            native_resolution_m: self.source.native_resolution_m,
            supports_depth: false,
        }
    }

    fn rate_quota(&self) -> RateQuota {
        RateQuota::per_minute(30)
    }

    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError> {
        let url = format!("{}/subset", self.config.base_url);
        let latitude = format!("{:.4}", request.latitude);
        let longitude = format!("{:.4}", request.longitude);
        let start = request.date_range.start.format("%Y-%m-%d").to_string();
        let end = request.date_range.end.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("product", self.source.product),
                ("band", self.source.band),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::network(self.source.id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(
                self.source.id,
                status.as_u16(),
                snippet(&body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(self.source.id, e.to_string()))?;
        let values = self.parse_csv(&body)?;

        Ok(Observation::new(values, self.source.native_resolution_m)
            .with_note("mission", self.source.mission)
            .with_note("native_resolution", self.source.native_resolution_note)
            .with_note("product", self.source.product)
            .with_note("units", "NDVI (dimensionless)")
            .with_note("revisit", "16-day composite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> DataRequest {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        DataRequest::new(37.5, 127.0, 250, DateRange::single_day(date))
    }

    #[test]
    fn test_modis_identity() {
        let provider = SubsetProvider::modis(SubsetConfig::default());
        assert_eq!(provider.id(), "MODIS");
        assert_eq!(provider.capabilities().native_resolution_m, 250);
        assert_eq!(provider.capabilities().kinds, &[DataKind::Vegetation]);
    }

    #[test]
    fn test_viirs_identity() {
        let provider = SubsetProvider::viirs(SubsetConfig::default());
        assert_eq!(provider.id(), "VIIRS");
        assert_eq!(provider.capabilities().native_resolution_m, 375);
    }

    #[test]
    fn test_screen_scales_and_drops_fill() {
        let provider = SubsetProvider::modis(SubsetConfig::default());
        assert_eq!(provider.screen(6200.0), Some(0.62));
        assert_eq!(provider.screen(-3000.0), None);
        // scales to 1.5, outside the physical range
        assert_eq!(provider.screen(15000.0), None);
        assert_eq!(provider.screen(-1500.0), Some(-0.15));
    }

    #[tokio::test]
    async fn test_fetch_parses_csv_rows() {
        let server = MockServer::start().await;
        let csv = "date,value\n2024-05-01,6200\n2024-05-17,-3000\n2024-06-02,7100\n";
        Mock::given(method("GET"))
            .and(path("/subset"))
            .and(query_param("product", "MOD13Q1"))
            .and(query_param("band", "250m_16_days_NDVI"))
            .and(query_param("latitude", "37.5000"))
            .respond_with(ResponseTemplate::new(200).set_body_string(csv))
            .expect(1)
            .mount(&server)
            .await;

        let provider = SubsetProvider::modis(SubsetConfig {
            base_url: server.uri(),
            ..SubsetConfig::default()
        });
        let observation = provider.fetch(&request()).await.unwrap();

        assert_eq!(observation.values, vec![Some(0.62), None, Some(0.71)]);
        assert_eq!(observation.native_resolution_m, 250);
        assert_eq!(
            observation.educational.get("revisit").map(String::as_str),
            Some("16-day composite")
        );
    }

    #[tokio::test]
    async fn test_viirs_queries_its_own_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subset"))
            .and(query_param("product", "VNP13A1"))
            .and(query_param("band", "375m_16_days_NDVI"))
            .respond_with(ResponseTemplate::new(200).set_body_string("date,value\n2024-05-01,4000\n"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = SubsetProvider::viirs(SubsetConfig {
            base_url: server.uri(),
            ..SubsetConfig::default()
        });
        let observation = provider.fetch(&request()).await.unwrap();
        assert_eq!(observation.values, vec![Some(0.4)]);
    }

    #[tokio::test]
    async fn test_header_only_body_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subset"))
            .respond_with(ResponseTemplate::new(200).set_body_string("date,value\n"))
            .mount(&server)
            .await;

        let provider = SubsetProvider::modis(SubsetConfig {
            base_url: server.uri(),
            ..SubsetConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_row_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subset"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("date,value\n2024-05-01,not-a-number\n"),
            )
            .mount(&server)
            .await;

        let provider = SubsetProvider::modis(SubsetConfig {
            base_url: server.uri(),
            ..SubsetConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_service_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subset"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance window"))
            .mount(&server)
            .await;

        let provider = SubsetProvider::modis(SubsetConfig {
            base_url: server.uri(),
            ..SubsetConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        match err {
            ProviderError::Http { status, source_id, .. } => {
                assert_eq!(status, 503);
                assert_eq!(source_id, "MODIS");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
