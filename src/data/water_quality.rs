//! Water Quality Portal client
//!
//! Fetches sample results from the EPA/USGS Water Quality Portal for a
//! monitoring location and maps them to normalized samples. Requests go
//! through the shared response cache with a one-day TTL, since WQP results
//! trail field sampling by days.

use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{WaterQualityReport, WaterQualitySample};
use crate::cache::{CacheService, CacheTtl};

/// Base URL for the Water Quality Portal result search
const WQP_BASE_URL: &str = "https://www.waterqualitydata.us/data/Result/search";

/// Per-request timeout; WQP queries can be slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Characteristics requested when the caller does not name any
pub const DEFAULT_CHARACTERISTICS: [&str; 3] =
    ["Temperature, water", "Specific conductance", "pH"];

/// Errors that can occur when fetching water quality data
#[derive(Debug, Error)]
pub enum WaterQualityError {
    /// The portal could not be reached and no cached copy exists
    #[error("water quality data unavailable for {site_id}: {reason}")]
    Unavailable { site_id: String, reason: String },

    /// The portal answered with something unparseable
    #[error("failed to parse WQP response: {0}")]
    ParseError(String),
}

/// Response from the Water Quality Portal
#[derive(Debug, Deserialize)]
struct WqpResponse {
    #[serde(default)]
    results: Vec<WqpRecord>,
}

/// A single result record from the portal
#[derive(Debug, Deserialize)]
struct WqpRecord {
    #[serde(rename = "CharacteristicName")]
    characteristic_name: Option<String>,
    /// Measured value; the portal reports it as a string
    #[serde(rename = "ResultMeasureValue")]
    result_value: Option<String>,
    #[serde(rename = "ResultMeasure/MeasureUnitCode")]
    unit_code: Option<String>,
    /// Sample collection date (YYYY-MM-DD)
    #[serde(rename = "ActivityStartDate")]
    activity_start_date: Option<String>,
}

/// Client for fetching sample results from the Water Quality Portal
#[derive(Debug, Clone)]
pub struct WaterQualityClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Shared response cache
    cache: CacheService,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl WaterQualityClient {
    /// Creates a new WaterQualityClient using the given cache
    pub fn new(cache: CacheService) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: WQP_BASE_URL.to_string(),
        }
    }

    /// Creates a new WaterQualityClient with a custom base URL (for testing)
    #[cfg(test)]
    pub fn with_base_url(cache: CacheService, base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url,
        }
    }

    /// WQP monitoring-location identifier for a USGS site number
    fn wqp_site_id(site_no: &str) -> String {
        format!("USGS-{}", site_no)
    }

    /// Cache key for a site and normalized characteristic set
    fn cache_key(site_no: &str, characteristics: &[String]) -> String {
        let joined = characteristics
            .iter()
            .map(|c| sanitize_key_component(c))
            .collect::<Vec<_>>()
            .join("+");
        format!("water_quality_{}_{}", site_no, joined)
    }

    /// Fetches recent sample results for a site
    ///
    /// # Arguments
    /// * `site_no` - USGS site number (e.g. "09380000")
    /// * `characteristics` - Characteristic names to query; empty means the
    ///   default set
    ///
    /// # Behavior
    /// - Characteristics are sorted and deduplicated before both the request
    ///   and the cache key are built, so equivalent filter sets share a key
    /// - Returns a cached report when one is fresh
    /// - On fetch failure, serves an expired cached report if one exists
    /// - Otherwise raises `WaterQualityError::Unavailable`
    pub async fn fetch_results(
        &self,
        site_no: &str,
        characteristics: &[&str],
    ) -> Result<WaterQualityReport, WaterQualityError> {
        let mut normalized: Vec<String> = if characteristics.is_empty() {
            DEFAULT_CHARACTERISTICS.iter().map(|c| c.to_string()).collect()
        } else {
            characteristics.iter().map(|c| c.to_string()).collect()
        };
        normalized.sort();
        normalized.dedup();

        let cache_key = Self::cache_key(site_no, &normalized);

        // Peek rather than get so an expired report survives the refresh
        // attempt and can be served if the fetch fails
        let stale = match self.cache.peek::<WaterQualityReport>(&cache_key) {
            Some(cached) if !cached.expired => return Ok(cached.value),
            Some(cached) => Some(cached.value),
            None => None,
        };

        match self.fetch_from_api(site_no, &normalized).await {
            Ok(report) => {
                self.cache.set(&cache_key, &report, CacheTtl::WATER_QUALITY);
                Ok(report)
            }
            Err(reason) => {
                if let Some(report) = stale {
                    log::warn!("WQP fetch failed, serving stale results for {}", site_no);
                    return Ok(report);
                }
                Err(WaterQualityError::Unavailable {
                    site_id: Self::wqp_site_id(site_no),
                    reason,
                })
            }
        }
    }

    /// Fetches and parses results directly from the portal
    async fn fetch_from_api(
        &self,
        site_no: &str,
        characteristics: &[String],
    ) -> Result<WaterQualityReport, String> {
        let site_id = Self::wqp_site_id(site_no);
        let url = format!(
            "{}?siteid={}&characteristicName={}&mimeType=json&sorted=yes",
            self.base_url,
            urlencoded(&site_id),
            characteristics
                .iter()
                .map(|c| urlencoded(c))
                .collect::<Vec<_>>()
                .join(";")
        );

        let response: WqpResponse = self
            .http_client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        Ok(parse_report(&response, &site_id))
    }
}

/// Maps portal records to a normalized report, dropping records without a
/// characteristic name or sample date
fn parse_report(response: &WqpResponse, site_id: &str) -> WaterQualityReport {
    let mut samples: Vec<WaterQualitySample> = response
        .results
        .iter()
        .filter_map(|record| {
            let characteristic = record.characteristic_name.clone()?;
            let sample_date = record
                .activity_start_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
            Some(WaterQualitySample {
                characteristic,
                value: record.result_value.as_deref().and_then(|v| v.parse().ok()),
                unit: record.unit_code.clone(),
                sample_date,
            })
        })
        .collect();

    samples.sort_by(|a, b| b.sample_date.cmp(&a.sample_date));

    WaterQualityReport {
        site_id: site_id.to_string(),
        samples,
        fetched_at: Utc::now(),
    }
}

/// Lowercases and strips a characteristic name down to a filesystem-safe
/// cache-key token
fn sanitize_key_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// URL-encodes a string for use in query parameters
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20").replace(',', "%2C")
}
