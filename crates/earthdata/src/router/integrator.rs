//! The caller-facing aggregation surface.
//!
//! `DataIntegrator` owns the registered adapters and turns one request
//! into one response through a fixed fallback chain:
//!
//! 1. a fresh cache entry (younger than the freshness window) is served
//!    as `Cached`;
//! 2. otherwise the selected adapter is fetched live, rate-limited,
//!    scored, cached, and served as `Live`;
//! 3. on live failure, a cache entry of any age is served as
//!    `StaleCache` with its confidence discounted;
//! 4. failing that, the offline generator produces a labeled synthetic
//!    response.
//!
//! Only invalid input reaches the caller as an error; source-side
//! failures are absorbed by the chain. Imagery is the one kind the
//! generator cannot cover, so it alone can exhaust the chain.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use log::{debug, warn};

use crate::cache::DataCache;
use crate::errors::{EarthDataError, FallbackClass, ProviderError};
use crate::models::{
    DataFreshness, DataKind, DataRequest, DataResponse, SourceDescriptor, ValueStatistics,
};
use crate::offline::OfflineFallbackGenerator;
use crate::provider::{EarthDataProvider, WindowRateLimiter};
use crate::router::keys::cache_key;
use crate::router::quality;
use crate::router::selection::select_source;

/// Cache entries younger than this are served without contacting the
/// source again.
pub const FRESH_WINDOW_MINUTES: i64 = 60;

pub struct DataIntegrator {
    providers: HashMap<&'static str, Arc<dyn EarthDataProvider>>,
    cache: Arc<DataCache>,
    limiter: WindowRateLimiter,
    offline: OfflineFallbackGenerator,
}

impl DataIntegrator {
    pub fn new(cache: Arc<DataCache>) -> Self {
        Self {
            providers: HashMap::new(),
            cache,
            limiter: WindowRateLimiter::new(),
            offline: OfflineFallbackGenerator::new(),
        }
    }

    pub fn with_offline_generator(mut self, offline: OfflineFallbackGenerator) -> Self {
        self.offline = offline;
        self
    }

    /// Register an adapter under its own id and adopt its rate quota.
    /// Registering the same id again replaces the previous adapter.
    pub fn register(&mut self, provider: Arc<dyn EarthDataProvider>) {
        self.limiter.configure(provider.id(), provider.rate_quota());
        self.providers.insert(provider.id(), provider);
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    /// Resolve one request into one response. The explicit resolution
    /// wins over whatever the request carries.
    pub async fn get_data_at_resolution(
        &self,
        kind: DataKind,
        resolution_m: u32,
        request: &DataRequest,
    ) -> Result<DataResponse, EarthDataError> {
        let mut request = request.clone();
        request.resolution_m = resolution_m;
        self.resolve(kind, &request, false).await
    }

    /// Run the same chain but mark the cached result as worth keeping
    /// when offline storage gets tight. Used by the background queue.
    pub async fn prefetch(
        &self,
        kind: DataKind,
        request: &DataRequest,
    ) -> Result<DataResponse, EarthDataError> {
        self.resolve(kind, request, true).await
    }

    async fn resolve(
        &self,
        kind: DataKind,
        request: &DataRequest,
        offline_priority: bool,
    ) -> Result<DataResponse, EarthDataError> {
        request.validate()?;
        let descriptor = select_source(kind, request.resolution_m)?;
        let key = cache_key(kind, request);

        let held = self.cache.get(&key);
        if let Some(entry) = &held {
            if !entry.older_than(Duration::minutes(FRESH_WINDOW_MINUTES)) {
                debug!("Serving {key} from cache");
                return Ok(Self::as_cached(entry.payload.clone()));
            }
        }

        debug!(
            "Routing {} at {} m to {}",
            kind, request.resolution_m, descriptor.adapter_id
        );
        match self.fetch_live(descriptor, kind, request, &key, offline_priority).await {
            Ok(response) => Ok(response),
            Err(error) if error.fallback_class() == FallbackClass::InvalidInput => {
                Err(EarthDataError::invalid_request(error.to_string()))
            }
            Err(error) => {
                warn!("Live fetch failed for {key}: {error}");

                if let Some(entry) = held {
                    warn!("Serving {key} stale after live failure");
                    return Ok(Self::as_stale(entry.payload.clone()));
                }

                match self.offline.generate(kind, request) {
                    Some(synthetic) => {
                        warn!("Serving {key} synthetically after live failure");
                        Ok(synthetic)
                    }
                    None => Err(EarthDataError::Exhausted {
                        kind,
                        message: error.to_string(),
                    }),
                }
            }
        }
    }

    async fn fetch_live(
        &self,
        descriptor: &'static SourceDescriptor,
        kind: DataKind,
        request: &DataRequest,
        key: &str,
        offline_priority: bool,
    ) -> Result<DataResponse, ProviderError> {
        let provider = self
            .providers
            .get(descriptor.adapter_id)
            .ok_or_else(|| {
                ProviderError::network(descriptor.adapter_id, "no adapter registered")
            })?;

        self.limiter.acquire(descriptor.adapter_id).await;
        let observation = provider.fetch(request).await?;

        let quality = quality::assess(&observation, request.resolution_m);
        let response = DataResponse {
            kind,
            source_id: descriptor.adapter_id.to_string(),
            resolution_m: observation.native_resolution_m,
            statistics: ValueStatistics::from_values(&observation.values),
            values: observation.values,
            quality,
            educational: observation.educational,
            timestamp: observation.acquired,
            cached: false,
            freshness: DataFreshness::Live,
        };

        self.cache.set(key, response.clone(), offline_priority);
        Ok(response)
    }

    fn as_cached(mut payload: DataResponse) -> DataResponse {
        payload.cached = true;
        payload.freshness = DataFreshness::Cached;
        payload
    }

    fn as_stale(mut payload: DataResponse) -> DataResponse {
        payload.cached = true;
        payload.freshness = DataFreshness::StaleCache;
        quality::mark_stale(&mut payload.quality);
        payload
    }
}
