//! Multi-source Earth-observation data aggregation.
//!
//! This crate routes point-and-period data requests (soil moisture,
//! vegetation index, precipitation, browse imagery) to the NASA source
//! that can serve them at the requested resolution, and degrades
//! gracefully when that source cannot answer: fresh cache, live fetch,
//! stale cache, synthetic fallback, in that order. Every response comes
//! back in one shape, labeled with its freshness tier and a scored
//! quality assessment.
//!
//! # Core Types
//!
//! - [`DataIntegrator`]: the caller-facing surface; owns the adapters,
//!   the fallback chain, and per-source rate limiting
//! - [`EarthDataProvider`]: trait each source adapter implements
//! - [`DataCache`]: bounded LRU cache with TTL cleanup, offline
//!   retention, and durable snapshots
//! - [`RequestQueue`]: background FIFO that warms the cache one fetch
//!   per scheduler tick
//! - [`OfflineFallbackGenerator`]: labeled synthetic data for when no
//!   source is reachable
//! - [`DataRequest`] / [`DataResponse`]: the single request and
//!   response shapes
//!
//! Authentication for the sources that need it lives in the companion
//! `verdant-auth` crate and is injected where an adapter requires it.

pub mod cache;
pub mod errors;
pub mod models;
pub mod offline;
pub mod provider;
pub mod queue;
pub mod router;

pub use cache::{CacheEntry, CachePersister, CacheStats, DataCache, DEFAULT_CAPACITY};
pub use errors::{EarthDataError, FallbackClass, ProviderError};
pub use models::{
    descriptor_for, sources_for_kind, DataFreshness, DataKind, DataRequest, DataResponse,
    DateRange, MoistureDepth, QualityAssessment, SourceDescriptor, ValueStatistics, SOURCES,
};
pub use offline::OfflineFallbackGenerator;
pub use provider::{
    AppeearsConfig, AppeearsProvider, EarthDataProvider, GibsConfig, GibsProvider, Observation,
    PowerConfig, PowerProvider, ProviderCapabilities, RateQuota, SmapConfig, SmapProvider,
    SubsetConfig, SubsetProvider, WindowRateLimiter,
};
pub use queue::{spawn_drain_task, RequestQueue};
pub use router::{cache_key, select_source, DataIntegrator, FRESH_WINDOW_MINUTES};
