//! HLS vegetation-index adapter backed by the AppEEARS task service.
//!
//! Unlike the synchronous adapters, extraction happens through a
//! long-running remote task: submit, poll until the task reaches a
//! terminal state, then fetch the result bundle. All three calls carry
//! Earthdata Login credentials.
//!
//! A fetch that exceeds the local wall-clock budget abandons the remote
//! task rather than cancelling it; the service expires orphaned tasks on
//! its own schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use verdant_auth::CredentialStore;

use crate::errors::ProviderError;
use crate::models::{DataKind, DataRequest};
use crate::provider::capabilities::{ProviderCapabilities, RateQuota};
use crate::provider::snippet;
use crate::provider::traits::{EarthDataProvider, Observation};

const PROVIDER_ID: &str = "HLS";

const NATIVE_RESOLUTION_M: u32 = 30;

/// NDVI outside this range is not physical and is treated as missing.
const NDVI_RANGE: (f64, f64) = (-0.2, 1.0);

#[derive(Clone, Debug)]
pub struct AppeearsConfig {
    pub base_url: String,
    /// Pause between status polls.
    pub poll_interval: Duration,
    /// Wall-clock budget for the whole submit-poll-fetch cycle.
    pub task_budget: Duration,
    pub timeout: Duration,
}

impl Default for AppeearsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://appeears.earthdatacloud.nasa.gov/api".to_string(),
            poll_interval: Duration::from_secs(10),
            task_budget: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskSubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct BundleResponse {
    samples: Vec<SamplePoint>,
}

#[derive(Debug, Deserialize)]
struct SamplePoint {
    #[serde(default)]
    value: Option<f64>,
}

/// AppEEARS point-extraction adapter for 30 m HLS NDVI.
pub struct AppeearsProvider {
    client: Client,
    config: AppeearsConfig,
    credentials: Arc<CredentialStore>,
}

impl AppeearsProvider {
    pub fn new(config: AppeearsConfig, credentials: Arc<CredentialStore>) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            credentials,
        }
    }

    async fn send_authenticated(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self.credentials.authenticated_fetch(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(
                PROVIDER_ID,
                status.as_u16(),
                snippet(&body),
            ));
        }
        Ok(response)
    }

    async fn submit_task(&self, request: &DataRequest) -> Result<String, ProviderError> {
        let payload = json!({
            "task_type": "point",
            "task_name": format!(
                "ndvi_{:.3}_{:.3}_{}",
                request.latitude, request.longitude, request.date_range.start
            ),
            "params": {
                "dates": [{
                    "startDate": request.date_range.start.format("%m-%d-%Y").to_string(),
                    "endDate": request.date_range.end.format("%m-%d-%Y").to_string(),
                }],
                "layers": [{ "product": "HLSL30.020", "layer": "NDVI" }],
                "coordinates": [{
                    "latitude": request.latitude,
                    "longitude": request.longitude,
                }],
            },
        });

        let url = format!("{}/task", self.config.base_url);
        let response = self
            .send_authenticated(self.client.post(&url).json(&payload))
            .await?;
        let body: TaskSubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_ID, e.to_string()))?;
        Ok(body.task_id)
    }

    async fn poll_status(&self, task_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/task/{}", self.config.base_url, task_id);
        let response = self.send_authenticated(self.client.get(&url)).await?;
        let body: TaskStatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_ID, e.to_string()))?;
        Ok(body.status)
    }

    async fn fetch_bundle(&self, task_id: &str) -> Result<Vec<Option<f64>>, ProviderError> {
        let url = format!("{}/bundle/{}", self.config.base_url, task_id);
        let response = self.send_authenticated(self.client.get(&url)).await?;
        let body: BundleResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(PROVIDER_ID, e.to_string()))?;

        if body.samples.is_empty() {
            return Err(ProviderError::NoData {
                source_id: PROVIDER_ID,
            });
        }

        Ok(body
            .samples
            .into_iter()
            .map(|s| s.value.filter(|v| (NDVI_RANGE.0..=NDVI_RANGE.1).contains(v)))
            .collect())
    }

    /// Poll until the task reaches a terminal state or the wall-clock
    /// budget runs out.
    async fn await_completion(&self, task_id: &str) -> Result<(), ProviderError> {
        let started = Instant::now();
        loop {
            if started.elapsed() >= self.config.task_budget {
                return Err(ProviderError::TaskTimedOut {
                    source_id: PROVIDER_ID,
                    task_id: task_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;

            match self.poll_status(task_id).await?.as_str() {
                "done" => return Ok(()),
                "error" => {
                    return Err(ProviderError::TaskFailed {
                        source_id: PROVIDER_ID,
                        task_id: task_id.to_string(),
                        message: "task ended in the error state".to_string(),
                    })
                }
                other => debug!("Extraction task {task_id} is {other}"),
            }
        }
    }
}

#[async_trait]
impl EarthDataProvider for AppeearsProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            kinds: &[DataKind::Vegetation],
            native_resolution_m: NATIVE_RESOLUTION_M,
            supports_depth: false,
        }
    }

    fn rate_quota(&self) -> RateQuota {
        // Every fetch costs a submit plus several polls upstream
        RateQuota::per_minute(5)
    }

    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError> {
        let task_id = self.submit_task(request).await?;
        debug!("Submitted extraction task {task_id}");

        self.await_completion(&task_id).await?;
        let values = self.fetch_bundle(&task_id).await?;

        Ok(Observation::new(values, NATIVE_RESOLUTION_M)
            .with_note("mission", "Harmonized Landsat Sentinel-2 (HLS)")
            .with_note("native_resolution", "30 m")
            .with_note("layer", "NDVI from HLSL30 surface reflectance")
            .with_note("units", "NDVI (dimensionless)")
            .with_note("revisit", "2-3 days"))
    }
}
