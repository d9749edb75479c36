//! US Drought Monitor client
//!
//! Fetches drought-severity area percentages by county from the Drought
//! Monitor data services and condenses them into a single level per county.
//! The monitor publishes weekly, so entries cache for hours.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{DroughtConditions, DroughtLevel};
use crate::cache::{CacheService, CacheTtl};

/// Base URL for county drought-severity statistics
const USDM_BASE_URL: &str =
    "https://usdmdataservices.unl.edu/api/CountyStatistics/GetDroughtSeverityStatisticsByAreaPercent";

/// Per-request timeout; the statistics service is the slowest of the three
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// How far back to ask for observations; wide enough to always cover the
/// most recent weekly map
const LOOKBACK_DAYS: i64 = 30;

/// Errors that can occur when fetching drought data
#[derive(Debug, Error)]
pub enum DroughtError {
    /// The service could not be reached and no cached copy exists
    #[error("drought data unavailable for county {fips}: {reason}")]
    Unavailable { fips: String, reason: String },

    /// The service answered with something unparseable
    #[error("failed to parse Drought Monitor response: {0}")]
    ParseError(String),
}

/// One weekly observation row; the service reports percentages as strings
#[derive(Debug, Deserialize)]
struct UsdmRecord {
    #[serde(rename = "ValidStart")]
    valid_start: Option<String>,
    #[serde(rename = "D0")]
    d0: Option<String>,
    #[serde(rename = "D1")]
    d1: Option<String>,
    #[serde(rename = "D2")]
    d2: Option<String>,
    #[serde(rename = "D3")]
    d3: Option<String>,
    #[serde(rename = "D4")]
    d4: Option<String>,
}

/// Client for fetching drought conditions from the US Drought Monitor
#[derive(Debug, Clone)]
pub struct DroughtClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Shared response cache
    cache: CacheService,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl DroughtClient {
    /// Creates a new DroughtClient using the given cache
    pub fn new(cache: CacheService) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: USDM_BASE_URL.to_string(),
        }
    }

    /// Creates a new DroughtClient with a custom base URL (for testing)
    #[cfg(test)]
    pub fn with_base_url(cache: CacheService, base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url,
        }
    }

    /// Cache key for a county
    fn cache_key(fips: &str) -> String {
        format!("drought_{}", fips)
    }

    /// Fetches current drought conditions for a county
    ///
    /// # Arguments
    /// * `fips` - Five-digit county FIPS code (e.g. "04005")
    ///
    /// # Behavior
    /// - Returns cached conditions when they are fresh
    /// - On a miss, fetches the last month of weekly observations and keeps
    ///   the most recent one
    /// - On fetch failure, serves expired cached conditions if they exist
    /// - Otherwise raises `DroughtError::Unavailable`
    pub async fn fetch_conditions(&self, fips: &str) -> Result<DroughtConditions, DroughtError> {
        let cache_key = Self::cache_key(fips);

        // Peek rather than get so expired conditions survive the refresh
        // attempt and can be served if the fetch fails
        let stale = match self.cache.peek::<DroughtConditions>(&cache_key) {
            Some(cached) if !cached.expired => return Ok(cached.value),
            Some(cached) => Some(cached.value),
            None => None,
        };

        match self.fetch_from_api(fips).await {
            Ok(conditions) => {
                self.cache.set(&cache_key, &conditions, CacheTtl::DROUGHT);
                Ok(conditions)
            }
            Err(reason) => {
                if let Some(conditions) = stale {
                    log::warn!(
                        "Drought Monitor fetch failed, serving stale conditions for {}",
                        fips
                    );
                    return Ok(conditions);
                }
                Err(DroughtError::Unavailable {
                    fips: fips.to_string(),
                    reason,
                })
            }
        }
    }

    /// Fetches and parses conditions directly from the API
    async fn fetch_from_api(&self, fips: &str) -> Result<DroughtConditions, String> {
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(LOOKBACK_DAYS);
        let url = format!(
            "{}?aoi={}&startdate={}&enddate={}&statisticsType=1",
            self.base_url,
            fips,
            start.format("%m/%d/%Y"),
            end.format("%m/%d/%Y")
        );

        let records: Vec<UsdmRecord> = self
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

        parse_conditions(&records, fips).map_err(|e| e.to_string())
    }
}

/// Picks the most recent observation and condenses it into one level
fn parse_conditions(
    records: &[UsdmRecord],
    fips: &str,
) -> Result<DroughtConditions, DroughtError> {
    let latest = records
        .iter()
        .filter_map(|record| {
            let date = record
                .valid_start
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
            Some((date, record))
        })
        .max_by_key(|(date, _)| *date)
        .ok_or_else(|| {
            DroughtError::ParseError(format!("no observations for county {}", fips))
        })?;

    let (valid_date, record) = latest;
    let category_percent = [
        parse_percent(&record.d0),
        parse_percent(&record.d1),
        parse_percent(&record.d2),
        parse_percent(&record.d3),
        parse_percent(&record.d4),
    ];

    Ok(DroughtConditions {
        fips: fips.to_string(),
        level: worst_level(&category_percent),
        category_percent,
        valid_date,
        fetched_at: Utc::now(),
    })
}

/// Parses a percentage field, treating absent or malformed values as zero
fn parse_percent(field: &Option<String>) -> f64 {
    field
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

/// The worst drought category with non-zero area coverage
fn worst_level(category_percent: &[f64; 5]) -> DroughtLevel {
    const LEVELS: [DroughtLevel; 5] = [
        DroughtLevel::D0,
        DroughtLevel::D1,
        DroughtLevel::D2,
        DroughtLevel::D3,
        DroughtLevel::D4,
    ];
    LEVELS
        .iter()
        .zip(category_percent.iter())
        .rev()
        .find(|(_, pct)| **pct > 0.0)
        .map(|(level, _)| *level)
        .unwrap_or(DroughtLevel::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (CacheService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheService::with_dir(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    fn record(valid_start: &str, pcts: [&str; 5]) -> UsdmRecord {
        UsdmRecord {
            valid_start: Some(valid_start.to_string()),
            d0: Some(pcts[0].to_string()),
            d1: Some(pcts[1].to_string()),
            d2: Some(pcts[2].to_string()),
            d3: Some(pcts[3].to_string()),
            d4: Some(pcts[4].to_string()),
        }
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(DroughtClient::cache_key("04005"), "drought_04005");
    }

    #[test]
    fn test_worst_level_picks_highest_nonzero_category() {
        assert_eq!(worst_level(&[0.0, 0.0, 0.0, 0.0, 0.0]), DroughtLevel::None);
        assert_eq!(worst_level(&[42.0, 0.0, 0.0, 0.0, 0.0]), DroughtLevel::D0);
        assert_eq!(worst_level(&[100.0, 80.0, 15.5, 0.0, 0.0]), DroughtLevel::D2);
        assert_eq!(worst_level(&[100.0, 100.0, 100.0, 99.0, 0.1]), DroughtLevel::D4);
    }

    #[test]
    fn test_parse_percent_tolerates_bad_values() {
        assert!((parse_percent(&Some("12.5".to_string())) - 12.5).abs() < 0.01);
        assert_eq!(parse_percent(&Some("garbage".to_string())), 0.0);
        assert_eq!(parse_percent(&None), 0.0);
    }

    #[test]
    fn test_parse_conditions_keeps_most_recent_week() {
        let records = vec![
            record("2024-05-07", ["50", "20", "0", "0", "0"]),
            record("2024-05-21", ["80", "40", "10", "0", "0"]),
            record("2024-05-14", ["60", "30", "5", "0", "0"]),
        ];

        let conditions = parse_conditions(&records, "04005").unwrap();

        assert_eq!(
            conditions.valid_date,
            NaiveDate::from_ymd_opt(2024, 5, 21).unwrap()
        );
        assert_eq!(conditions.level, DroughtLevel::D2);
        assert!((conditions.category_percent[0] - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_conditions_empty_is_parse_error() {
        let result = parse_conditions(&[], "04005");
        assert!(matches!(result, Err(DroughtError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_fetch_returns_cached_on_fresh_cache() {
        let (cache, _dir) = create_test_cache();

        let conditions = DroughtConditions {
            fips: "04005".to_string(),
            level: DroughtLevel::D1,
            category_percent: [90.0, 45.0, 0.0, 0.0, 0.0],
            valid_date: NaiveDate::from_ymd_opt(2024, 5, 21).unwrap(),
            fetched_at: Utc::now(),
        };
        cache.set(
            &DroughtClient::cache_key("04005"),
            &conditions,
            CacheTtl::DROUGHT,
        );

        let client = DroughtClient::with_base_url(cache, "http://127.0.0.1:9/usdm".to_string());
        let result = client.fetch_conditions("04005").await.unwrap();

        assert_eq!(result.level, DroughtLevel::D1);
    }

    #[tokio::test]
    async fn test_fetch_serves_stale_conditions_when_api_is_down() {
        let (cache, _dir) = create_test_cache();

        let conditions = DroughtConditions {
            fips: "04005".to_string(),
            level: DroughtLevel::D2,
            category_percent: [100.0, 60.0, 15.0, 0.0, 0.0],
            valid_date: NaiveDate::from_ymd_opt(2024, 5, 21).unwrap(),
            fetched_at: Utc::now(),
        };
        cache.set(&DroughtClient::cache_key("04005"), &conditions, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(10));

        let client = DroughtClient::with_base_url(cache, "http://127.0.0.1:9/usdm".to_string());
        let result = client.fetch_conditions("04005").await.unwrap();

        assert_eq!(result.level, DroughtLevel::D2);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_api_without_cache_raises() {
        let (cache, _dir) = create_test_cache();
        let client = DroughtClient::with_base_url(cache, "http://127.0.0.1:9/usdm".to_string());

        let result = client.fetch_conditions("04005").await;

        match result {
            Err(DroughtError::Unavailable { fips, .. }) => assert_eq!(fips, "04005"),
            _ => panic!("expected Unavailable"),
        }
    }
}
