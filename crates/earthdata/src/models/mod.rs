//! Request, response, and source-description models shared by every layer.

pub mod descriptor;
pub mod request;
pub mod response;

pub use descriptor::{descriptor_for, sources_for_kind, SourceDescriptor, SOURCES};
pub use request::{DataKind, DataRequest, DateRange, MoistureDepth};
pub use response::{DataFreshness, DataResponse, QualityAssessment, ValueStatistics};
