//! Provider capabilities and rate-quota configuration.
//!
//! This module defines structures describing what an Earth-data source
//! adapter can serve and how quickly it may be called.

use std::time::Duration;

use crate::models::DataKind;

/// Describes what a source adapter can serve.
///
/// Used by the integrator to sanity-check routing decisions and by
/// diagnostics to describe the registered sources.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Data kinds this adapter serves.
    pub kinds: &'static [DataKind],

    /// Resolution the upstream product is natively produced at, in meters.
    pub native_resolution_m: u32,

    /// Whether the adapter distinguishes soil depth layers.
    pub supports_depth: bool,
}

/// Fixed-window request quota for a source adapter.
///
/// A request that would exceed `max_requests` within the current window
/// waits for the window to reset instead of failing.
#[derive(Clone, Copy, Debug)]
pub struct RateQuota {
    /// Maximum requests allowed per window.
    pub max_requests: u32,

    /// Length of the counting window.
    pub window: Duration,
}

impl RateQuota {
    pub fn per_minute(max_requests: u32) -> Self {
        RateQuota {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateQuota {
    fn default() -> Self {
        RateQuota::per_minute(30)
    }
}
