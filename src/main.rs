//! # Mackerel Tracker Application Entry Point
//!
//! Thin command-line front end over `mackerel_lib`:
//!
//! - `fetch-grid`: fetch the configured area cube batch by batch and write
//!   the grid snapshot
//! - `hotspots [--hour N] [--month M] [--threshold T]`: score the snapshot
//!   (refetching when stale or missing) at the forecast step nearest to
//!   `now + N` hours and print hotspots as JSON
//! - `sweep`: sample the water mask and fetch current vectors per point
//!
//! Logging goes to stderr through `env_logger` (`RUST_LOG`, default `info`);
//! results go to stdout.

use anyhow::{bail, Context};
use chrono::{Datelike, Utc};
use env_logger::Env;
use mackerel_lib::{
    cache::CachedProvider,
    config::Config,
    grid::AssembledGrid,
    provider::{BBox, DmiClient},
    sampler::{self, WaterMask},
    snapshot::{self, GridSnapshot},
    suitability::{generate_hotspots, HotspotStrength, HotspotSummary},
    sweep::{self, AreaRequest},
    timeline,
};
use serde_json::json;
use std::env;

const USAGE: &str = "usage: mackerel-tracker <fetch-grid | hotspots [--hour N] [--month M] [--threshold T] | sweep>";

/// Options for the `hotspots` command.
#[derive(Debug, Default, PartialEq)]
struct HotspotArgs {
    hour: i64,
    month: Option<u32>,
    threshold: Option<f64>,
}

impl HotspotArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .with_context(|| format!("missing value for {flag}"))?;
            match flag.as_str() {
                "--hour" => parsed.hour = value.parse().context("--hour expects an integer")?,
                "--month" => {
                    let month: u32 = value.parse().context("--month expects 1-12")?;
                    if !(1..=12).contains(&month) {
                        bail!("--month expects 1-12, got {month}");
                    }
                    parsed.month = Some(month);
                }
                "--threshold" => {
                    parsed.threshold = Some(value.parse().context("--threshold expects a number")?)
                }
                other => bail!("unknown option {other}\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = Config::load();
    let provider = CachedProvider::new(
        DmiClient::new(&config.provider, config.api_key())?,
        config.snapshot_ttl(),
    );

    let rt = tokio::runtime::Runtime::new()?;

    match command.as_str() {
        "fetch-grid" => {
            let snapshot = rt.block_on(fetch_grid(&provider, &config))?;
            println!("{}", serde_json::to_string_pretty(&snapshot.metadata)?);
        }
        "hotspots" => {
            let options = HotspotArgs::parse(&args[1..])?;
            let grid = match snapshot::load_snapshot(&config.cache.snapshot_path, config.snapshot_ttl()) {
                Ok(snapshot) => snapshot.into_grid(),
                Err(e) => {
                    log::info!("Snapshot unavailable ({}), fetching", e);
                    rt.block_on(fetch_grid(&provider, &config))?.into_grid()
                }
            };
            let report = hotspots(&grid, &options, config.hotspots.threshold)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "sweep" => {
            let mask = WaterMask::load(&config.sweep.mask_path).with_context(|| {
                format!("loading water mask {}", config.sweep.mask_path.display())
            })?;
            let points = sampler::sample(&mask, config.sweep.step_degrees);
            log::info!("Sweeping {} water points", points.len());

            let swept = rt.block_on(sweep::sweep_points(&provider, &points, &config.pacing()));
            println!("{}", serde_json::to_string_pretty(&swept)?);
        }
        other => bail!("unknown command {other}\n{USAGE}"),
    }

    Ok(())
}

/// Fetch the configured area and persist it as the current snapshot.
async fn fetch_grid(
    provider: &CachedProvider<DmiClient>,
    config: &Config,
) -> anyhow::Result<GridSnapshot> {
    let bbox: BBox = config.area.bbox.parse()?;
    let request = AreaRequest {
        bbox,
        parameters: config.area.parameters.clone(),
        batch_size: config.area.batch_size,
        format: config.provider.format.clone(),
        crs: config.provider.crs.clone(),
    };

    let report = sweep::fetch_area_grid(provider, &request, &config.pacing()).await?;
    if !report.is_complete() {
        log::warn!("{} batch(es) missing from grid", report.failed_batches.len());
    }

    let fetched: Vec<String> = request
        .parameters
        .iter()
        .filter(|p| !report.failed_batches.iter().any(|batch| batch.contains(p)))
        .cloned()
        .collect();

    let snapshot = GridSnapshot::from_grid(
        report.grid,
        &config.provider.collection,
        fetched,
        &config.area.bbox,
        &config.provider.format,
    );
    if let Err(e) = snapshot::save_snapshot(&config.cache.snapshot_path, &snapshot) {
        // non-fatal: the grid is still usable for this run
        log::warn!("Could not save snapshot: {}", e);
    }
    Ok(snapshot)
}

fn hotspots(
    grid: &AssembledGrid,
    options: &HotspotArgs,
    default_threshold: f64,
) -> anyhow::Result<serde_json::Value> {
    let Some(bounds) = timeline::compute_bounds(&grid.timestamps, None) else {
        bail!("grid has no usable timestamps");
    };
    let hour = bounds.snap(bounds.clamp(options.hour));
    let target = bounds.instant_at(hour);
    let Some(time) = timeline::nearest_timestamp(&grid.timestamps, target) else {
        bail!("no forecast step near {target}");
    };

    let month = Some(options.month.unwrap_or_else(|| target.month()));
    let threshold = options.threshold.unwrap_or(default_threshold);
    let hotspots = generate_hotspots(&grid.snapshot_at(time), threshold, month);
    let summary = HotspotSummary::from_hotspots(&hotspots);

    let hotspots: Vec<_> = hotspots
        .iter()
        .map(|h| json!({ "hotspot": h, "strength": HotspotStrength::classify(h.suitability) }))
        .collect();

    Ok(json!({
        "time": time,
        "hourOffset": hour,
        "availableHours": bounds.available_hours,
        "generatedAt": Utc::now(),
        "threshold": threshold,
        "summary": summary,
        "hotspots": hotspots,
    }))
}
