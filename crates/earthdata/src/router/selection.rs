//! Resolution-aware source selection.

use crate::errors::EarthDataError;
use crate::models::{sources_for_kind, DataKind, SourceDescriptor};

/// Pick the source for a kind at a requested resolution.
///
/// Walks the descriptor table in selection order and takes the first
/// source whose bound covers the request. A vegetation request coarser
/// than the coarsest bounded source has no owner and fails; the caller
/// surfaces that instead of silently serving a mismatched product.
pub fn select_source(
    kind: DataKind,
    resolution_m: u32,
) -> Result<&'static SourceDescriptor, EarthDataError> {
    sources_for_kind(kind)
        .find(|descriptor| {
            descriptor
                .max_resolution_m
                .map_or(true, |max| resolution_m <= max)
        })
        .ok_or(EarthDataError::UnsupportedResolution {
            kind,
            requested_m: resolution_m,
        })
}
