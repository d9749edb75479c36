//! Command-line interface parsing for Plateau Water CLI
//!
//! This module handles parsing of CLI arguments using clap, including site
//! resolution from short IDs or USGS site numbers.

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::{get_site_by_id, Site, SITES};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified site is not in the registry
    #[error("Unknown site: '{0}'. Valid sites: {valid}", valid = valid_site_ids())]
    UnknownSite(String),
}

/// Comma-separated list of valid short site IDs, for error messages
fn valid_site_ids() -> String {
    SITES
        .iter()
        .map(|site| site.id)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plateau Water CLI - view Colorado Plateau water-monitoring conditions
#[derive(Parser, Debug)]
#[command(name = "plateau-water")]
#[command(about = "Colorado Plateau streamflow, water quality, and drought conditions")]
#[command(version)]
pub struct Cli {
    /// Disable the persistent cache tier for this run
    #[arg(long)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show current conditions across monitoring sites
    Conditions {
        /// Sites to include (short ID or USGS number); all sites if omitted
        #[arg(long, value_delimiter = ',')]
        sites: Vec<String>,
    },
    /// Show a streamflow time series for one site
    Flow {
        /// Site to query (short ID or USGS number)
        site: String,
        /// Period length in days
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Show recent water-quality sample results for one site
    Quality {
        /// Site to query (short ID or USGS number)
        site: String,
        /// Characteristic names to query; a default set if omitted
        #[arg(long = "characteristic")]
        characteristics: Vec<String>,
    },
    /// Show drought conditions for the county of one site
    Drought {
        /// Site to query (short ID or USGS number)
        site: String,
    },
    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print hit/miss counters and per-tier sizes
    Stats,
    /// Delete every cached entry
    Clear,
}

/// Resolves a CLI site argument against the registry
///
/// # Arguments
/// * `arg` - Short ID (e.g. "lees-ferry") or USGS site number
///
/// # Returns
/// * `Ok(&Site)` if the site is known
/// * `Err(CliError::UnknownSite)` otherwise
pub fn resolve_site(arg: &str) -> Result<&'static Site, CliError> {
    get_site_by_id(arg).ok_or_else(|| CliError::UnknownSite(arg.to_string()))
}

/// Resolves a list of site arguments, defaulting to every registered site
pub fn resolve_sites(args: &[String]) -> Result<Vec<&'static Site>, CliError> {
    if args.is_empty() {
        return Ok(SITES.iter().collect());
    }
    args.iter().map(|arg| resolve_site(arg)).collect()
}
