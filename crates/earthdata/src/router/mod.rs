//! Resolution-aware routing, quality scoring, and the fallback chain.

pub mod integrator;
pub mod keys;
pub mod quality;
pub mod selection;

pub use integrator::{DataIntegrator, FRESH_WINDOW_MINUTES};
pub use keys::cache_key;
pub use selection::select_source;
