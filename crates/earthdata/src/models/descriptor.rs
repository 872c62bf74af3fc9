use crate::models::request::DataKind;

/// Static description of one upstream source. These tables are resolved
/// once at startup and never mutated.
#[derive(Clone, Copy, Debug)]
pub struct SourceDescriptor {
    pub adapter_id: &'static str,
    pub kind: DataKind,
    /// Resolution the source natively produces, in meters.
    pub native_resolution_m: u32,
    /// Coarsest requested resolution this source is selected for.
    /// `None` means the source serves the kind at any requested resolution.
    pub max_resolution_m: Option<u32>,
    pub requires_auth: bool,
    pub revisit: &'static str,
}

/// All known sources, finest first within each kind. Selection walks this
/// table in order and takes the first source whose bound covers the request.
pub const SOURCES: &[SourceDescriptor] = &[
    SourceDescriptor {
        adapter_id: "SMAP",
        kind: DataKind::SoilMoisture,
        native_resolution_m: 9000,
        max_resolution_m: None,
        requires_auth: false,
        revisit: "2-3 days",
    },
    SourceDescriptor {
        adapter_id: "HLS",
        kind: DataKind::Vegetation,
        native_resolution_m: 30,
        max_resolution_m: Some(30),
        requires_auth: true,
        revisit: "2-3 days",
    },
    SourceDescriptor {
        adapter_id: "MODIS",
        kind: DataKind::Vegetation,
        native_resolution_m: 250,
        max_resolution_m: Some(250),
        requires_auth: false,
        revisit: "16-day composite",
    },
    SourceDescriptor {
        adapter_id: "VIIRS",
        kind: DataKind::Vegetation,
        native_resolution_m: 375,
        max_resolution_m: Some(375),
        requires_auth: false,
        revisit: "16-day composite",
    },
    SourceDescriptor {
        adapter_id: "POWER",
        kind: DataKind::Precipitation,
        native_resolution_m: 50_000,
        max_resolution_m: None,
        requires_auth: false,
        revisit: "daily",
    },
    SourceDescriptor {
        adapter_id: "GIBS",
        kind: DataKind::Imagery,
        native_resolution_m: 250,
        max_resolution_m: None,
        requires_auth: false,
        revisit: "daily",
    },
];

/// Look a source up by its adapter id.
pub fn descriptor_for(adapter_id: &str) -> Option<&'static SourceDescriptor> {
    SOURCES.iter().find(|d| d.adapter_id == adapter_id)
}

/// All sources serving a kind, in selection order.
pub fn sources_for_kind(kind: DataKind) -> impl Iterator<Item = &'static SourceDescriptor> {
    SOURCES.iter().filter(move |d| d.kind == kind)
}
