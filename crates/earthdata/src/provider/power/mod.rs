//! Precipitation adapter for the NASA POWER daily point service.
//!
//! POWER answers with a nested JSON document whose values live under
//! `properties.parameter.PRECTOTCORR`, keyed by `YYYYMMDD` day strings
//! with a -999 fill sentinel. No credentials are required.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::ProviderError;
use crate::models::{DataKind, DataRequest};
use crate::provider::capabilities::{ProviderCapabilities, RateQuota};
use crate::provider::snippet;
use crate::provider::traits::{EarthDataProvider, Observation};

const PROVIDER_ID: &str = "POWER";

/// Reanalysis cells are roughly half a degree across.
const NATIVE_RESOLUTION_M: u32 = 50_000;

const FILL_VALUE: f64 = -999.0;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct PowerConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://power.larc.nasa.gov/api".to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: PowerParameters,
}

#[derive(Debug, Deserialize)]
struct PowerParameters {
    /// Day strings sort lexicographically, which is chronological here.
    #[serde(rename = "PRECTOTCORR")]
    precipitation: BTreeMap<String, f64>,
}

/// Daily corrected-precipitation adapter.
pub struct PowerProvider {
    client: Client,
    config: PowerConfig,
}

impl PowerProvider {
    pub fn new(config: PowerConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// Fill sentinel and negative totals are treated as missing.
    fn screen(raw: f64) -> Option<f64> {
        if (raw - FILL_VALUE).abs() < f64::EPSILON || raw < 0.0 {
            None
        } else {
            Some(raw)
        }
    }
}

#[async_trait]
impl EarthDataProvider for PowerProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            kinds: &[DataKind::Precipitation],
            native_resolution_m: NATIVE_RESOLUTION_M,
            supports_depth: false,
        }
    }

    fn rate_quota(&self) -> RateQuota {
        RateQuota::per_minute(60)
    }

    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError> {
        let url = format!("{}/temporal/daily/point", self.config.base_url);
        let latitude = format!("{:.4}", request.latitude);
        let longitude = format!("{:.4}", request.longitude);
        let start = request.date_range.start.format("%Y%m%d").to_string();
        let end = request.date_range.end.format("%Y%m%d").to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("parameters", "PRECTOTCORR"),
                ("community", "AG"),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("format", "JSON"),
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

        let body: PowerResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_ID, e.to_string()))?;

        let by_day = body.properties.parameter.precipitation;
        if by_day.is_empty() {
            return Err(ProviderError::NoData {
                source_id: PROVIDER_ID,
            });
        }
        let values: Vec<Option<f64>> = by_day.into_values().map(Self::screen).collect();

        Ok(Observation::new(values, NATIVE_RESOLUTION_M)
            .with_note("mission", "NASA POWER (MERRA-2 reanalysis)")
            .with_note("native_resolution", "~50 km")
            .with_note("parameter", "PRECTOTCORR corrected precipitation")
            .with_note("units", "mm/day")
            .with_note("revisit", "daily"))
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
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        DataRequest::new(37.5, 127.0, 50_000, DateRange::new(start, end))
    }

    #[test]
    fn test_provider_id_and_capabilities() {
        let provider = PowerProvider::new(PowerConfig::default());
        assert_eq!(provider.id(), "POWER");
        assert_eq!(provider.capabilities().kinds, &[DataKind::Precipitation]);
        assert!(!provider.capabilities().supports_depth);
    }

    #[test]
    fn test_screen_drops_fill_and_negatives() {
        assert_eq!(PowerProvider::screen(4.2), Some(4.2));
        assert_eq!(PowerProvider::screen(0.0), Some(0.0));
        assert_eq!(PowerProvider::screen(-999.0), None);
        assert_eq!(PowerProvider::screen(-0.1), None);
    }

    #[tokio::test]
    async fn test_fetch_orders_days_chronologically() {
        let server = MockServer::start().await;
        // keys deliberately out of order in the document
        let body = serde_json::json!({
            "properties": {
                "parameter": {
                    "PRECTOTCORR": {
                        "20240503": 0.0,
                        "20240501": 4.2,
                        "20240502": -999.0,
                    }
                }
            }
        });
        Mock::given(method("GET"))
            .and(path("/temporal/daily/point"))
            .and(query_param("parameters", "PRECTOTCORR"))
            .and(query_param("start", "20240501"))
            .and(query_param("end", "20240503"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PowerProvider::new(PowerConfig {
            base_url: server.uri(),
            ..PowerConfig::default()
        });
        let observation = provider.fetch(&request()).await.unwrap();

        assert_eq!(observation.values, vec![Some(4.2), None, Some(0.0)]);
        assert_eq!(observation.native_resolution_m, 50_000);
        assert_eq!(
            observation.educational.get("units").map(String::as_str),
            Some("mm/day")
        );
    }

    #[tokio::test]
    async fn test_empty_parameter_map_is_no_data() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "properties": { "parameter": { "PRECTOTCORR": {} } }
        });
        Mock::given(method("GET"))
            .and(path("/temporal/daily/point"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let provider = PowerProvider::new(PowerConfig {
            base_url: server.uri(),
            ..PowerConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_missing_parameter_block_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temporal/daily/point"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"properties": {}})),
            )
            .mount(&server)
            .await;

        let provider = PowerProvider::new(PowerConfig {
            base_url: server.uri(),
            ..PowerConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_service_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temporal/daily/point"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = PowerProvider::new(PowerConfig {
            base_url: server.uri(),
            ..PowerConfig::default()
        });
        let err = provider.fetch(&request()).await.unwrap_err();
        match err {
            ProviderError::Http { status, .. } => assert_eq!(status, 429),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
