//! Source adapter trait definitions.
//!
//! This module defines the core `EarthDataProvider` trait that all
//! upstream source adapters implement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ProviderError;
use crate::models::DataRequest;

use super::capabilities::{ProviderCapabilities, RateQuota};

/// Raw result of one adapter fetch, before the integrator scores and
/// enriches it into a full response.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Readings in the product's own order; `None` marks a fill value or a
    /// reading the adapter rejected as physically implausible.
    pub values: Vec<Option<f64>>,
    pub native_resolution_m: u32,
    /// When the upstream data was acquired, as reported or inferred.
    pub acquired: DateTime<Utc>,
    /// Source-specific notes: native resolution, depth semantics, revisit
    /// cadence, units. Every adapter fills this before returning.
    pub educational: BTreeMap<String, String>,
}

impl Observation {
    pub fn new(values: Vec<Option<f64>>, native_resolution_m: u32) -> Self {
        Observation {
            values,
            native_resolution_m,
            acquired: Utc::now(),
            educational: BTreeMap::new(),
        }
    }

    pub fn with_acquired(mut self, acquired: DateTime<Utc>) -> Self {
        self.acquired = acquired;
        self
    }

    pub fn with_note(mut self, key: &str, value: impl Into<String>) -> Self {
        self.educational.insert(key.to_string(), value.into());
        self
    }
}

/// Trait for Earth-observation source adapters.
///
/// Implement this trait to add support for a new upstream source. The
/// integrator uses the adapter's capabilities for routing sanity checks
/// and its rate quota for per-source request pacing.
///
/// An adapter either returns an [`Observation`] or a typed
/// [`ProviderError`]; it never signals failure with an empty result.
#[async_trait]
pub trait EarthDataProvider: Send + Sync {
    /// Unique identifier for this adapter.
    ///
    /// A constant string like "SMAP" or "MODIS", used for logging, rate
    /// limiter tracking, and source attribution in responses.
    fn id(&self) -> &'static str;

    /// Describes what this adapter serves.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Request quota the integrator enforces for this adapter.
    fn rate_quota(&self) -> RateQuota;

    /// Fetch raw data for the request.
    ///
    /// The request has already been validated and routed; the adapter is
    /// responsible for provider-specific query construction, payload
    /// parsing, fill-value handling, and attaching its educational notes.
    async fn fetch(&self, request: &DataRequest) -> Result<Observation, ProviderError>;
}
