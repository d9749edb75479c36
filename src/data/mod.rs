//! Core data models for Plateau Water CLI
//!
//! This module contains all the data types used throughout the application
//! for representing monitoring sites, streamflow, water quality, and drought
//! conditions.

pub mod drought;
pub mod site;
pub mod streamflow;
pub mod water_quality;

pub use drought::{DroughtClient, DroughtError};
pub use site::{all_sites, get_site_by_id, SITES};
pub use streamflow::{StreamflowClient, StreamflowError};
pub use water_quality::{WaterQualityClient, WaterQualityError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A water-monitoring site on the Colorado Plateau
///
/// Uses `&'static str` for string fields to allow static initialization
/// of the SITES array. This struct only implements `Serialize` (not
/// `Deserialize`) because the static string references cannot be safely
/// deserialized; use `get_site_by_id` to look up sites from stored IDs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Site {
    /// Short identifier used on the command line
    pub id: &'static str,
    /// USGS site number of the stream gauge
    pub site_no: &'static str,
    /// Human-readable gauge name
    pub name: &'static str,
    /// River the gauge sits on
    pub river: &'static str,
    /// Two-letter state code
    pub state: &'static str,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
    /// County FIPS code used for drought lookups
    pub county_fips: &'static str,
}

/// A single discharge reading from a stream gauge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReading {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Discharge in cubic feet per second
    pub discharge_cfs: f64,
}

/// Streamflow time series for one site over a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamflowSeries {
    /// USGS site number
    pub site_no: String,
    /// Gauge name as reported by NWIS
    pub site_name: String,
    /// Readings in chronological order
    pub readings: Vec<FlowReading>,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

impl StreamflowSeries {
    /// The most recent reading, if any
    pub fn latest(&self) -> Option<&FlowReading> {
        self.readings.last()
    }
}

/// Reporting status of a site in a multi-site conditions snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStatus {
    /// The gauge reported a current reading
    Online,
    /// No data came back for the gauge
    Offline,
}

/// Latest conditions at one site
///
/// A site that fails to report is still represented, marked `Offline`, so a
/// multi-site snapshot always covers every requested site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConditions {
    /// USGS site number
    pub site_no: String,
    /// Whether the gauge reported
    pub status: SiteStatus,
    /// The latest reading, when online
    pub latest: Option<FlowReading>,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// One measured result from a water-quality monitoring record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterQualitySample {
    /// What was measured (e.g. "Temperature, water")
    pub characteristic: String,
    /// Measured value, when the result was numeric
    pub value: Option<f64>,
    /// Unit code reported with the value
    pub unit: Option<String>,
    /// Date the sample was collected
    pub sample_date: NaiveDate,
}

/// Water-quality results for one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterQualityReport {
    /// Monitoring location identifier (e.g. "USGS-09380000")
    pub site_id: String,
    /// Samples, most recent first
    pub samples: Vec<WaterQualitySample>,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// US Drought Monitor intensity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DroughtLevel {
    /// No drought
    None,
    /// Abnormally dry
    D0,
    /// Moderate drought
    D1,
    /// Severe drought
    D2,
    /// Extreme drought
    D3,
    /// Exceptional drought
    D4,
}

impl DroughtLevel {
    /// Short label matching Drought Monitor terminology
    pub fn label(&self) -> &'static str {
        match self {
            DroughtLevel::None => "none",
            DroughtLevel::D0 => "D0 abnormally dry",
            DroughtLevel::D1 => "D1 moderate",
            DroughtLevel::D2 => "D2 severe",
            DroughtLevel::D3 => "D3 extreme",
            DroughtLevel::D4 => "D4 exceptional",
        }
    }
}

/// Drought conditions for one county
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroughtConditions {
    /// County FIPS code
    pub fips: String,
    /// Worst drought category with non-zero area coverage
    pub level: DroughtLevel,
    /// Percent of county area at each category, indexed D0..D4
    pub category_percent: [f64; 5],
    /// Week the observation is valid for
    pub valid_date: NaiveDate,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}
