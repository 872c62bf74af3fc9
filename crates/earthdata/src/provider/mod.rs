//! Source adapters for the upstream Earth-observation services.

pub mod appeears;
pub mod capabilities;
pub mod gibs;
pub mod power;
pub mod rate_limit;
pub mod smap;
pub mod subset;
pub mod traits;

pub use appeears::{AppeearsConfig, AppeearsProvider};
pub use capabilities::{ProviderCapabilities, RateQuota};
pub use gibs::{GibsConfig, GibsProvider};
pub use power::{PowerConfig, PowerProvider};
pub use rate_limit::WindowRateLimiter;
pub use smap::{SmapConfig, SmapProvider};
pub use subset::{SubsetConfig, SubsetProvider};
pub use traits::{EarthDataProvider, Observation};

/// Shorten an error body for logs and error messages.
pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(160).collect()
}
