use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::EarthDataError;

/// Semantic family of Earth-observation data a caller can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    SoilMoisture,
    Vegetation,
    Precipitation,
    Imagery,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::SoilMoisture => "soil_moisture",
            DataKind::Vegetation => "vegetation",
            DataKind::Precipitation => "precipitation",
            DataKind::Imagery => "imagery",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which soil layer a moisture request targets. Selects between two
/// products of the same mission rather than between different sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoistureDepth {
    Surface,
    RootZone,
}

impl MoistureDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoistureDepth::Surface => "surface",
            MoistureDepth::RootZone => "root_zone",
        }
    }

    /// Coverage identifier the soil-moisture service expects.
    pub fn product(&self) -> &'static str {
        match self {
            MoistureDepth::Surface => "sm_surface",
            MoistureDepth::RootZone => "sm_rootzone",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MoistureDepth::Surface => "0-5 cm surface layer",
            MoistureDepth::RootZone => "0-100 cm root zone",
        }
    }
}

impl fmt::Display for MoistureDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive date interval, in the data product's own calendar (UTC days).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        DateRange {
            start: date,
            end: date,
        }
    }

    /// Number of calendar days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A point-and-period data request. `resolution_m` is the caller's desired
/// spatial resolution; the router decides which source can honor it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub resolution_m: u32,
    pub date_range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<MoistureDepth>,
}

impl DataRequest {
    pub fn new(latitude: f64, longitude: f64, resolution_m: u32, date_range: DateRange) -> Self {
        DataRequest {
            latitude,
            longitude,
            resolution_m,
            date_range,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: MoistureDepth) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Reject requests outside the coordinate domain or with a degenerate
    /// resolution or date range before any source is contacted.
    pub fn validate(&self) -> Result<(), EarthDataError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EarthDataError::invalid_request(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EarthDataError::invalid_request(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if self.resolution_m == 0 {
            return Err(EarthDataError::invalid_request(
                "resolution must be a positive number of meters",
            ));
        }
        if self.date_range.start > self.date_range.end {
            return Err(EarthDataError::invalid_request(format!(
                "date range starts {} after it ends {}",
                self.date_range.start, self.date_range.end
            )));
        }
        Ok(())
    }
}
