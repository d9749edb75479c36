//! Plateau Water CLI - view Colorado Plateau water-monitoring conditions
//!
//! A command-line application that displays streamflow, water quality, and
//! drought information for USGS monitoring sites on the Colorado Plateau.

use std::collections::HashMap;
use std::error::Error;

use clap::Parser;

use plateau_water::cache::{CacheService, SweepConfig, SweepHandle};
use plateau_water::cli::{resolve_site, resolve_sites, CacheAction, Cli, Command};
use plateau_water::data::{
    DroughtClient, DroughtLevel, Site, SiteStatus, StreamflowClient, WaterQualityClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    // Composition root: one cache instance, injected into every client
    let cache = if cli.no_cache {
        CacheService::memory_only()
    } else {
        CacheService::new()
    };
    let sweep = SweepHandle::spawn(cache.clone(), SweepConfig::default());

    let result = run(&cli, &cache).await;

    sweep.shutdown().await;
    result
}

async fn run(cli: &Cli, cache: &CacheService) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Command::Conditions { sites } => {
            let sites = resolve_sites(sites)?;
            show_conditions(cache, &sites).await;
        }
        Command::Flow { site, days } => {
            let site = resolve_site(site)?;
            show_flow(cache, site, *days).await?;
        }
        Command::Quality {
            site,
            characteristics,
        } => {
            let site = resolve_site(site)?;
            show_quality(cache, site, characteristics).await?;
        }
        Command::Drought { site } => {
            let site = resolve_site(site)?;
            show_drought(cache, site).await?;
        }
        Command::Cache { action } => show_cache(cache, action),
    }
    Ok(())
}

/// Prints a conditions table covering flow status and county drought level
async fn show_conditions(cache: &CacheService, sites: &[&'static Site]) {
    let flow_client = StreamflowClient::new(cache.clone());
    let drought_client = DroughtClient::new(cache.clone());

    let site_nos: Vec<&str> = sites.iter().map(|s| s.site_no).collect();
    let conditions = flow_client.fetch_current_conditions(&site_nos).await;

    // One drought lookup per distinct county, fetched concurrently
    let mut fips_list: Vec<&str> = sites.iter().map(|s| s.county_fips).collect();
    fips_list.sort();
    fips_list.dedup();
    let drought_results =
        futures::future::join_all(fips_list.iter().map(|f| drought_client.fetch_conditions(f)))
            .await;
    let drought_by_fips: HashMap<&str, DroughtLevel> = fips_list
        .iter()
        .zip(drought_results)
        .filter_map(|(fips, result)| result.ok().map(|c| (*fips, c.level)))
        .collect();

    println!(
        "{:<38} {:>12} {:<9} {}",
        "Site", "Flow (cfs)", "Status", "Drought"
    );
    for site in sites {
        let site_conditions = conditions.iter().find(|c| c.site_no == site.site_no);
        let (flow, status) = match site_conditions {
            Some(c) if c.status == SiteStatus::Online => (
                c.latest
                    .as_ref()
                    .map(|r| format!("{:.0}", r.discharge_cfs))
                    .unwrap_or_else(|| "-".to_string()),
                "online",
            ),
            _ => ("-".to_string(), "offline"),
        };
        let drought = drought_by_fips
            .get(site.county_fips)
            .map(|level| level.label())
            .unwrap_or("-");
        println!("{:<38} {:>12} {:<9} {}", site.name, flow, status, drought);
    }
}

/// Prints a summary of one site's discharge series
async fn show_flow(
    cache: &CacheService,
    site: &'static Site,
    days: u32,
) -> Result<(), Box<dyn Error>> {
    let client = StreamflowClient::new(cache.clone());
    let series = client.fetch_series(site.site_no, days).await?;

    println!("{} ({} days)", series.site_name, days);
    if series.readings.is_empty() {
        println!("No readings reported for this period.");
        return Ok(());
    }

    let values: Vec<f64> = series.readings.iter().map(|r| r.discharge_cfs).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    println!("Readings: {}", series.readings.len());
    if let Some(latest) = series.latest() {
        println!(
            "Latest:   {:.0} cfs at {}",
            latest.discharge_cfs,
            latest.timestamp.format("%Y-%m-%d %H:%M UTC")
        );
    }
    println!("Min/Mean/Max: {:.0} / {:.0} / {:.0} cfs", min, mean, max);
    Ok(())
}

/// Prints recent water-quality samples for one site
async fn show_quality(
    cache: &CacheService,
    site: &'static Site,
    characteristics: &[String],
) -> Result<(), Box<dyn Error>> {
    let client = WaterQualityClient::new(cache.clone());
    let refs: Vec<&str> = characteristics.iter().map(String::as_str).collect();
    let report = client.fetch_results(site.site_no, &refs).await?;

    println!("Water quality at {} ({})", site.name, report.site_id);
    if report.samples.is_empty() {
        println!("No recent sample results.");
        return Ok(());
    }
    for sample in report.samples.iter().take(15) {
        let value = sample
            .value
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<28} {:>10} {}",
            sample.sample_date,
            sample.characteristic,
            value,
            sample.unit.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Prints county drought conditions for one site
async fn show_drought(cache: &CacheService, site: &'static Site) -> Result<(), Box<dyn Error>> {
    let client = DroughtClient::new(cache.clone());
    let conditions = client.fetch_conditions(site.county_fips).await?;

    println!(
        "Drought near {} (county FIPS {}, week of {})",
        site.name, conditions.fips, conditions.valid_date
    );
    println!("Level: {}", conditions.level.label());
    for (category, pct) in ["D0", "D1", "D2", "D3", "D4"]
        .iter()
        .zip(conditions.category_percent.iter())
    {
        println!("{}: {:.1}% of county area", category, pct);
    }
    Ok(())
}

/// Prints cache statistics or clears the cache
fn show_cache(cache: &CacheService, action: &CacheAction) {
    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("Hits:         {}", stats.hits);
            println!("Misses:       {}", stats.misses);
            println!("Hit ratio:    {:.1}%", stats.hit_ratio);
            println!(
                "Memory tier:  {} items, {}",
                stats.memory_items, stats.memory_size
            );
            println!(
                "Disk tier:    {} items, {}",
                stats.disk_items, stats.disk_size
            );
            match stats.last_cleanup {
                Some(at) => println!("Last cleanup: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last cleanup: never"),
            }
        }
        CacheAction::Clear => {
            cache.clear();
            println!("Cache cleared.");
        }
    }
}
