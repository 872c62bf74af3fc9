//! Error types and fallback classification for the earthdata crate.
//!
//! This module provides:
//! - [`ProviderError`]: Failures raised by source adapters
//! - [`EarthDataError`]: Terminal errors the integrator surfaces to callers
//! - [`FallbackClass`]: Classification for determining fallback behavior

mod fallback;

pub use fallback::FallbackClass;

use thiserror::Error;
use verdant_auth::AuthError;

use crate::models::DataKind;

/// Errors raised by source adapters.
///
/// Adapters never return empty responses: every failure is one of these
/// variants. Each is classified into a [`FallbackClass`] via the
/// [`fallback_class`](Self::fallback_class) method, which determines how
/// the integrator handles it. Callers never see these raw; the integrator
/// either degrades to a cached or synthetic response or converts the error
/// into an [`EarthDataError`].
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The source answered with a non-success HTTP status.
    #[error("{source_id}: HTTP {status}: {message}")]
    Http {
        source_id: &'static str,
        status: u16,
        message: String,
    },

    /// The source could not be reached at the transport level.
    #[error("{source_id}: network failure: {message}")]
    Network {
        source_id: &'static str,
        message: String,
    },

    /// The source answered but the body was not in the documented shape.
    #[error("{source_id}: malformed payload: {message}")]
    MalformedPayload {
        source_id: &'static str,
        message: String,
    },

    /// A long-running extraction task ended in the provider's error state.
    #[error("{source_id}: task {task_id} failed: {message}")]
    TaskFailed {
        source_id: &'static str,
        task_id: String,
        message: String,
    },

    /// A long-running extraction task did not complete within the local
    /// wall-clock budget. The remote task is abandoned, not cancelled.
    #[error("{source_id}: task {task_id} still incomplete after {waited_secs}s")]
    TaskTimedOut {
        source_id: &'static str,
        task_id: String,
        waited_secs: u64,
    },

    /// The source had nothing for the requested point and period.
    #[error("{source_id}: no data for the requested point and period")]
    NoData { source_id: &'static str },

    /// The source cannot serve this request shape at all.
    #[error("{source_id}: unsupported request: {message}")]
    Unsupported {
        source_id: &'static str,
        message: String,
    },

    /// The authenticated source rejected or could not obtain credentials.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

impl ProviderError {
    /// Create an HTTP-status error.
    pub fn http(source_id: &'static str, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Http {
            source_id,
            status,
            message: message.into(),
        }
    }

    /// Create a transport-level error.
    pub fn network(source_id: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Network {
            source_id,
            message: message.into(),
        }
    }

    /// Create a malformed-payload error.
    pub fn malformed(source_id: &'static str, message: impl Into<String>) -> Self {
        ProviderError::MalformedPayload {
            source_id,
            message: message.into(),
        }
    }

    /// The adapter the error came from, or a fixed label for auth failures.
    pub fn source_id(&self) -> &'static str {
        match self {
            Self::Http { source_id, .. }
            | Self::Network { source_id, .. }
            | Self::MalformedPayload { source_id, .. }
            | Self::TaskFailed { source_id, .. }
            | Self::TaskTimedOut { source_id, .. }
            | Self::NoData { source_id }
            | Self::Unsupported { source_id, .. } => source_id,
            Self::Auth(_) => "EARTHDATA_LOGIN",
        }
    }

    /// Returns the fallback classification for this error.
    ///
    /// - [`FallbackClass::Degrade`]: serve a stale cache entry or a
    ///   synthetic response instead
    /// - [`FallbackClass::InvalidInput`]: surface immediately, no fallback
    pub fn fallback_class(&self) -> FallbackClass {
        match self {
            // Source-side trouble: the chain can still produce a response.
            Self::Http { .. }
            | Self::Network { .. }
            | Self::MalformedPayload { .. }
            | Self::TaskFailed { .. }
            | Self::TaskTimedOut { .. }
            | Self::NoData { .. }
            | Self::Auth(_) => FallbackClass::Degrade,

            // The request is wrong for this source; degrading would hide it.
            Self::Unsupported { .. } => FallbackClass::InvalidInput,
        }
    }
}

/// Terminal errors the integrator surfaces to callers.
///
/// These are the only errors a caller ever receives: everything else is
/// absorbed by the fallback chain and turned into a degraded response.
#[derive(Error, Debug)]
pub enum EarthDataError {
    /// No source serves this kind at the requested resolution.
    #[error("no source can serve {kind} at {requested_m} m resolution")]
    UnsupportedResolution { kind: DataKind, requested_m: u32 },

    /// The request failed validation before any source was contacted.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Every fallback tier failed, including the synthetic generator.
    #[error("all sources exhausted for {kind}: {message}")]
    Exhausted { kind: DataKind, message: String },
}

impl EarthDataError {
    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        EarthDataError::InvalidRequest {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_degrades() {
        let error = ProviderError::http("SMAP", 503, "service unavailable");
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
    }

    #[test]
    fn test_network_error_degrades() {
        let error = ProviderError::network("POWER", "connection refused");
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
    }

    #[test]
    fn test_malformed_payload_degrades() {
        let error = ProviderError::malformed("MODIS", "expected numeric column");
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
    }

    #[test]
    fn test_task_timeout_degrades() {
        let error = ProviderError::TaskTimedOut {
            source_id: "HLS",
            task_id: "t-123".to_string(),
            waited_secs: 300,
        };
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
    }

    #[test]
    fn test_no_data_degrades() {
        let error = ProviderError::NoData { source_id: "SMAP" };
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
    }

    #[test]
    fn test_auth_failure_degrades() {
        let error = ProviderError::Auth(AuthError::NotAuthenticated);
        assert_eq!(error.fallback_class(), FallbackClass::Degrade);
        assert_eq!(error.source_id(), "EARTHDATA_LOGIN");
    }

    #[test]
    fn test_unsupported_is_invalid_input() {
        let error = ProviderError::Unsupported {
            source_id: "GIBS",
            message: "zoom level out of range".to_string(),
        };
        assert_eq!(error.fallback_class(), FallbackClass::InvalidInput);
    }

    #[test]
    fn test_source_id_accessor() {
        assert_eq!(ProviderError::http("SMAP", 500, "boom").source_id(), "SMAP");
        assert_eq!(
            ProviderError::TaskFailed {
                source_id: "HLS",
                task_id: "t-1".to_string(),
                message: "exploded".to_string(),
            }
            .source_id(),
            "HLS"
        );
    }

    #[test]
    fn test_error_display() {
        let error = ProviderError::http("SMAP", 503, "service unavailable");
        assert_eq!(
            format!("{}", error),
            "SMAP: HTTP 503: service unavailable"
        );

        let error = ProviderError::TaskTimedOut {
            source_id: "HLS",
            task_id: "t-9".to_string(),
            waited_secs: 300,
        };
        assert_eq!(
            format!("{}", error),
            "HLS: task t-9 still incomplete after 300s"
        );

        let error = EarthDataError::UnsupportedResolution {
            kind: DataKind::Vegetation,
            requested_m: 400,
        };
        assert_eq!(
            format!("{}", error),
            "no source can serve vegetation at 400 m resolution"
        );
    }
}
