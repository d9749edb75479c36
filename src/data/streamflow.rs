//! USGS NWIS streamflow client
//!
//! Fetches discharge time series and current conditions from the USGS
//! Instantaneous Values service, going through the shared response cache so
//! repeated requests inside the TTL window never re-hit the network.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{FlowReading, SiteConditions, SiteStatus, StreamflowSeries};
use crate::cache::{CacheService, CacheTtl};

/// Base URL for the NWIS Instantaneous Values service
const NWIS_IV_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";

/// USGS parameter code for discharge in cubic feet per second
const PARAMETER_DISCHARGE: &str = "00060";

/// Per-request timeout for the NWIS service
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// NWIS sentinel for a missing or ice-affected reading
const MISSING_VALUE: f64 = -999_999.0;

/// Errors that can occur when fetching streamflow data
#[derive(Debug, Error)]
pub enum StreamflowError {
    /// The service could not be reached and no cached copy exists
    #[error("streamflow data unavailable for site {site_no}: {reason}")]
    Unavailable { site_no: String, reason: String },

    /// The service answered with something unparseable
    #[error("failed to parse NWIS response: {0}")]
    ParseError(String),
}

/// Top-level NWIS JSON response
#[derive(Debug, Deserialize)]
struct NwisResponse {
    value: NwisValue,
}

#[derive(Debug, Deserialize)]
struct NwisValue {
    #[serde(rename = "timeSeries", default)]
    time_series: Vec<NwisTimeSeries>,
}

/// One gauge's series within the response
#[derive(Debug, Deserialize)]
struct NwisTimeSeries {
    #[serde(rename = "sourceInfo")]
    source_info: NwisSourceInfo,
    #[serde(default)]
    values: Vec<NwisValues>,
}

#[derive(Debug, Deserialize)]
struct NwisSourceInfo {
    #[serde(rename = "siteName")]
    site_name: String,
    #[serde(rename = "siteCode")]
    site_code: Vec<NwisSiteCode>,
}

#[derive(Debug, Deserialize)]
struct NwisSiteCode {
    value: String,
}

#[derive(Debug, Deserialize)]
struct NwisValues {
    #[serde(default)]
    value: Vec<NwisPoint>,
}

/// A single timestamped reading; NWIS reports values as strings
#[derive(Debug, Deserialize)]
struct NwisPoint {
    value: String,
    #[serde(rename = "dateTime")]
    date_time: String,
}

/// Client for fetching streamflow data from the NWIS service
#[derive(Debug, Clone)]
pub struct StreamflowClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Shared response cache
    cache: CacheService,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl StreamflowClient {
    /// Creates a new StreamflowClient using the given cache
    pub fn new(cache: CacheService) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: NWIS_IV_BASE_URL.to_string(),
        }
    }

    /// Creates a new StreamflowClient with a custom base URL (for testing)
    #[cfg(test)]
    pub fn with_base_url(cache: CacheService, base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url,
        }
    }

    /// Cache key for a single-site series over a period
    fn series_cache_key(site_no: &str, days: u32) -> String {
        format!("streamflow_{}_{}d", site_no, days)
    }

    /// Cache key for a multi-site conditions snapshot
    ///
    /// Sorts and deduplicates the site list so the same set of sites always
    /// maps to the same key regardless of argument order.
    fn conditions_cache_key(site_nos: &[String]) -> String {
        let mut normalized: Vec<&str> = site_nos.iter().map(String::as_str).collect();
        normalized.sort_unstable();
        normalized.dedup();
        format!("conditions_{}", normalized.join("_"))
    }

    /// Fetches a discharge time series for one site
    ///
    /// # Arguments
    /// * `site_no` - USGS site number (e.g. "09380000")
    /// * `days` - Length of the period, in days back from now
    ///
    /// # Behavior
    /// - Returns a cached series when one is fresh
    /// - On a miss, fetches from NWIS and caches the parsed series
    /// - On fetch failure, serves an expired cached series if one exists
    /// - Otherwise raises `StreamflowError::Unavailable`
    pub async fn fetch_series(
        &self,
        site_no: &str,
        days: u32,
    ) -> Result<StreamflowSeries, StreamflowError> {
        let cache_key = Self::series_cache_key(site_no, days);

        // Peek rather than get so an expired series survives the refresh
        // attempt and can be served if the fetch fails
        let stale = match self.cache.peek::<StreamflowSeries>(&cache_key) {
            Some(cached) if !cached.expired => return Ok(cached.value),
            Some(cached) => Some(cached.value),
            None => None,
        };

        match self.fetch_series_from_api(site_no, days).await {
            Ok(series) => {
                self.cache
                    .set(&cache_key, &series, CacheTtl::STREAMFLOW_SERIES);
                Ok(series)
            }
            Err(reason) => {
                // Degraded fallback: an expired series beats no series
                if let Some(series) = stale {
                    log::warn!("NWIS fetch failed, serving stale series for {}", site_no);
                    return Ok(series);
                }
                Err(StreamflowError::Unavailable {
                    site_no: site_no.to_string(),
                    reason,
                })
            }
        }
    }

    /// Fetches the latest reading for a set of sites in one request
    ///
    /// Always returns one entry per requested site: a site missing from the
    /// response, or the whole request failing with no stale cached snapshot,
    /// yields an `Offline` marker rather than an error.
    pub async fn fetch_current_conditions(&self, site_nos: &[&str]) -> Vec<SiteConditions> {
        let mut normalized: Vec<String> = site_nos.iter().map(|s| s.to_string()).collect();
        normalized.sort();
        normalized.dedup();
        if normalized.is_empty() {
            return Vec::new();
        }
        let cache_key = Self::conditions_cache_key(&normalized);

        let stale = match self.cache.peek::<Vec<SiteConditions>>(&cache_key) {
            Some(cached) if !cached.expired => return cached.value,
            Some(cached) => Some(cached.value),
            None => None,
        };

        match self.fetch_conditions_from_api(&normalized).await {
            Ok(conditions) => {
                self.cache
                    .set(&cache_key, &conditions, CacheTtl::CURRENT_CONDITIONS);
                conditions
            }
            Err(reason) => {
                if let Some(conditions) = stale {
                    log::warn!("NWIS fetch failed, serving stale conditions snapshot");
                    return conditions;
                }
                log::warn!("NWIS conditions fetch failed with no cached copy: {}", reason);
                let now = Utc::now();
                normalized
                    .into_iter()
                    .map(|site_no| SiteConditions {
                        site_no,
                        status: SiteStatus::Offline,
                        latest: None,
                        fetched_at: now,
                    })
                    .collect()
            }
        }
    }

    /// Fetches and parses a single-site series directly from the API
    async fn fetch_series_from_api(
        &self,
        site_no: &str,
        days: u32,
    ) -> Result<StreamflowSeries, String> {
        let url = format!(
            "{}?format=json&sites={}&period=P{}D&parameterCd={}&siteStatus=all",
            self.base_url, site_no, days, PARAMETER_DISCHARGE
        );

        let response: NwisResponse = self
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

        parse_series(&response, site_no).map_err(|e| e.to_string())
    }

    /// Fetches and parses the latest readings for many sites
    async fn fetch_conditions_from_api(
        &self,
        site_nos: &[String],
    ) -> Result<Vec<SiteConditions>, String> {
        // No period parameter: the IV service returns only the most recent
        // value per site
        let url = format!(
            "{}?format=json&sites={}&parameterCd={}&siteStatus=all",
            self.base_url,
            site_nos.join(","),
            PARAMETER_DISCHARGE
        );

        let response: NwisResponse = self
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

        Ok(parse_conditions(&response, site_nos))
    }
}

/// Extracts the series for `site_no` from an NWIS response
fn parse_series(response: &NwisResponse, site_no: &str) -> Result<StreamflowSeries, StreamflowError> {
    let series = response
        .value
        .time_series
        .iter()
        .find(|ts| ts.source_info.site_code.iter().any(|c| c.value == site_no))
        .ok_or_else(|| {
            StreamflowError::ParseError(format!("no time series for site {}", site_no))
        })?;

    Ok(StreamflowSeries {
        site_no: site_no.to_string(),
        site_name: series.source_info.site_name.clone(),
        readings: parse_readings(series),
        fetched_at: Utc::now(),
    })
}

/// Builds one `SiteConditions` per requested site from an NWIS response
fn parse_conditions(response: &NwisResponse, site_nos: &[String]) -> Vec<SiteConditions> {
    let now = Utc::now();
    site_nos
        .iter()
        .map(|site_no| {
            let latest = response
                .value
                .time_series
                .iter()
                .find(|ts| {
                    ts.source_info
                        .site_code
                        .iter()
                        .any(|c| &c.value == site_no)
                })
                .and_then(|ts| parse_readings(ts).pop());

            SiteConditions {
                site_no: site_no.clone(),
                status: if latest.is_some() {
                    SiteStatus::Online
                } else {
                    SiteStatus::Offline
                },
                latest,
                fetched_at: now,
            }
        })
        .collect()
}

/// Parses the readings of one gauge, skipping unparseable points and the
/// NWIS missing-value sentinel
fn parse_readings(series: &NwisTimeSeries) -> Vec<FlowReading> {
    series
        .values
        .iter()
        .flat_map(|block| block.value.iter())
        .filter_map(|point| {
            let discharge: f64 = point.value.parse().ok()?;
            if discharge <= MISSING_VALUE {
                return None;
            }
            let timestamp = DateTime::parse_from_rfc3339(&point.date_time)
                .ok()?
                .with_timezone(&Utc);
            Some(FlowReading {
                timestamp,
                discharge_cfs: discharge,
            })
        })
        .collect()
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

    fn sample_response(site_no: &str, points: &[(&str, &str)]) -> NwisResponse {
        let points_json: Vec<String> = points
            .iter()
            .map(|(value, time)| format!(r#"{{"value":"{}","dateTime":"{}"}}"#, value, time))
            .collect();
        let json = format!(
            r#"{{"value":{{"timeSeries":[{{
                "sourceInfo":{{"siteName":"Test Gauge","siteCode":[{{"value":"{}"}}]}},
                "values":[{{"value":[{}]}}]
            }}]}}}}"#,
            site_no,
            points_json.join(",")
        );
        serde_json::from_str(&json).expect("sample response should parse")
    }

    #[test]
    fn test_series_cache_key() {
        assert_eq!(
            StreamflowClient::series_cache_key("09380000", 7),
            "streamflow_09380000_7d"
        );
        assert_eq!(
            StreamflowClient::series_cache_key("09380000", 30),
            "streamflow_09380000_30d"
        );
    }

    #[test]
    fn test_conditions_cache_key_is_order_independent() {
        let a = vec!["09380000".to_string(), "09180500".to_string()];
        let b = vec![
            "09180500".to_string(),
            "09380000".to_string(),
            "09180500".to_string(),
        ];
        assert_eq!(
            StreamflowClient::conditions_cache_key(&a),
            StreamflowClient::conditions_cache_key(&b)
        );
    }

    #[test]
    fn test_parse_series_extracts_readings() {
        let response = sample_response(
            "09380000",
            &[
                ("12400", "2024-06-01T00:00:00.000-07:00"),
                ("12600", "2024-06-01T00:15:00.000-07:00"),
            ],
        );

        let series = parse_series(&response, "09380000").unwrap();
        assert_eq!(series.site_name, "Test Gauge");
        assert_eq!(series.readings.len(), 2);
        assert!((series.readings[0].discharge_cfs - 12400.0).abs() < 0.01);
        assert!(series.readings[0].timestamp < series.readings[1].timestamp);
    }

    #[test]
    fn test_parse_series_skips_missing_value_sentinel() {
        let response = sample_response(
            "09380000",
            &[
                ("-999999", "2024-06-01T00:00:00.000-07:00"),
                ("150", "2024-06-01T00:15:00.000-07:00"),
            ],
        );

        let series = parse_series(&response, "09380000").unwrap();
        assert_eq!(series.readings.len(), 1);
        assert!((series.readings[0].discharge_cfs - 150.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_series_unknown_site_is_parse_error() {
        let response = sample_response("09380000", &[("100", "2024-06-01T00:00:00.000-07:00")]);

        let result = parse_series(&response, "09999999");
        assert!(matches!(result, Err(StreamflowError::ParseError(_))));
    }

    #[test]
    fn test_parse_conditions_marks_missing_sites_offline() {
        let response = sample_response("09380000", &[("100", "2024-06-01T00:00:00.000-07:00")]);
        let sites = vec!["09380000".to_string(), "09379500".to_string()];

        let conditions = parse_conditions(&response, &sites);

        assert_eq!(conditions.len(), 2);
        let online = conditions.iter().find(|c| c.site_no == "09380000").unwrap();
        assert_eq!(online.status, SiteStatus::Online);
        assert!((online.latest.as_ref().unwrap().discharge_cfs - 100.0).abs() < 0.01);

        let offline = conditions.iter().find(|c| c.site_no == "09379500").unwrap();
        assert_eq!(offline.status, SiteStatus::Offline);
        assert!(offline.latest.is_none());
    }

    #[tokio::test]
    async fn test_fetch_series_returns_cached_on_fresh_cache() {
        let (cache, _dir) = create_test_cache();

        let series = StreamflowSeries {
            site_no: "09380000".to_string(),
            site_name: "Lees Ferry".to_string(),
            readings: vec![FlowReading {
                timestamp: Utc::now(),
                discharge_cfs: 9000.0,
            }],
            fetched_at: Utc::now(),
        };
        cache.set(
            &StreamflowClient::series_cache_key("09380000", 7),
            &series,
            CacheTtl::STREAMFLOW_SERIES,
        );

        // Unroutable base URL: a cache miss would fail loudly
        let client =
            StreamflowClient::with_base_url(cache, "http://127.0.0.1:9/nwis".to_string());
        let result = client.fetch_series("09380000", 7).await.unwrap();

        assert_eq!(result.site_name, "Lees Ferry");
        assert_eq!(result.readings.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_series_serves_stale_copy_when_api_is_down() {
        let (cache, _dir) = create_test_cache();

        let series = StreamflowSeries {
            site_no: "09380000".to_string(),
            site_name: "Lees Ferry".to_string(),
            readings: vec![FlowReading {
                timestamp: Utc::now(),
                discharge_cfs: 8800.0,
            }],
            fetched_at: Utc::now(),
        };
        cache.set(
            &StreamflowClient::series_cache_key("09380000", 7),
            &series,
            Duration::ZERO,
        );
        std::thread::sleep(Duration::from_millis(10));

        let client =
            StreamflowClient::with_base_url(cache, "http://127.0.0.1:9/nwis".to_string());
        let result = client.fetch_series("09380000", 7).await.unwrap();

        assert_eq!(result.site_name, "Lees Ferry");
        assert!((result.readings[0].discharge_cfs - 8800.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_fetch_conditions_serves_stale_snapshot_when_api_is_down() {
        let (cache, _dir) = create_test_cache();

        let snapshot = vec![SiteConditions {
            site_no: "09380000".to_string(),
            status: SiteStatus::Online,
            latest: Some(FlowReading {
                timestamp: Utc::now(),
                discharge_cfs: 120.0,
            }),
            fetched_at: Utc::now(),
        }];
        cache.set(
            &StreamflowClient::conditions_cache_key(&["09380000".to_string()]),
            &snapshot,
            Duration::ZERO,
        );
        std::thread::sleep(Duration::from_millis(10));

        let client =
            StreamflowClient::with_base_url(cache, "http://127.0.0.1:9/nwis".to_string());
        let conditions = client.fetch_current_conditions(&["09380000"]).await;

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, SiteStatus::Online);
    }

    #[tokio::test]
    async fn test_fetch_series_unreachable_api_without_cache_raises() {
        let (cache, _dir) = create_test_cache();
        let client =
            StreamflowClient::with_base_url(cache, "http://127.0.0.1:9/nwis".to_string());

        let result = client.fetch_series("09380000", 7).await;

        match result {
            Err(StreamflowError::Unavailable { site_no, .. }) => {
                assert_eq!(site_no, "09380000");
            }
            other => panic!("expected Unavailable, got {:?}", other.map(|s| s.site_no)),
        }
    }

    #[tokio::test]
    async fn test_fetch_conditions_unreachable_api_marks_all_offline() {
        let (cache, _dir) = create_test_cache();
        let client =
            StreamflowClient::with_base_url(cache, "http://127.0.0.1:9/nwis".to_string());

        let conditions = client
            .fetch_current_conditions(&["09380000", "09379500"])
            .await;

        assert_eq!(conditions.len(), 2);
        assert!(conditions.iter().all(|c| c.status == SiteStatus::Offline));
    }

    #[tokio::test]
    async fn test_fetch_conditions_empty_input() {
        let (cache, _dir) = create_test_cache();
        let client = StreamflowClient::new(cache);

        let conditions = client.fetch_current_conditions(&[]).await;
        assert!(conditions.is_empty());
    }
}
