//! # Paced Fetch Orchestration
//!
//! The forecast API enforces a request-rate ceiling, so every request issued
//! here is awaited before the next one starts, with a fixed pause in between.
//! Issuing these requests concurrently would break the provider's terms.
//!
//! ## Failure Semantics
//!
//! - **Area fetch**: the first parameter batch defines the grid and must
//!   succeed. Later batches are best-effort: a failing batch is logged and
//!   skipped, leaving its parameters absent from the merged grid.
//! - **Point sweep**: each point is independent. A failed or invalid point is
//!   logged and skipped; the sweep continues with the next one.
//!
//! Nothing is retried.

use crate::coverage::{CoverageError, CoverageResponse};
use crate::grid::{assemble, AssembledGrid};
use crate::provider::{batch_parameters, BBox, EnvironmentalProvider, ProviderError};
use crate::{CurrentVector, SamplePoint};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Parameters requested by point sweeps
pub const CURRENT_PARAMETERS: [&str; 2] = ["current-u", "current-v"];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("malformed response: {0}")]
    Malformed(#[from] CoverageError),

    #[error("invalid data: {0}")]
    Validation(String),
}

/// Fixed delays between consecutive requests to the same provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    pub batch_delay: Duration,
    pub point_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(2000),
            point_delay: Duration::from_millis(150),
        }
    }
}

/// What to fetch for an area.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaRequest {
    pub bbox: BBox,
    pub parameters: Vec<String>,
    pub batch_size: usize,
    pub format: String,
    pub crs: String,
}

/// Outcome of a best-effort area fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaFetchReport {
    pub grid: AssembledGrid,
    /// Batches that failed and are absent from `grid`
    pub failed_batches: Vec<Vec<String>>,
}

impl AreaFetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Fetch every parameter batch for an area and merge them into one grid.
///
/// Batches are requested one after another in parameter order, with
/// `pacing.batch_delay` between consecutive requests and none before the
/// first. Each response is assembled on its own and merged into the first
/// batch's grid by coordinate key and timestamp.
///
/// # Errors
/// - [`FetchError::Validation`]: `request.parameters` is empty
/// - [`FetchError::Provider`] / [`FetchError::Malformed`]: the first batch
///   failed or could not be assembled
///
/// A later batch that fails is not an error: it is logged and listed in
/// [`AreaFetchReport::failed_batches`].
///
/// # Example
/// ```no_run
/// use mackerel_lib::config::Config;
/// use mackerel_lib::provider::DmiClient;
/// use mackerel_lib::sweep::{fetch_area_grid, AreaRequest};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load();
/// let client = DmiClient::new(&config.provider, config.api_key())?;
/// let request = AreaRequest {
///     bbox: config.area.bbox.parse()?,
///     parameters: config.area.parameters.clone(),
///     batch_size: config.area.batch_size,
///     format: config.provider.format.clone(),
///     crs: config.provider.crs.clone(),
/// };
///
/// let report = fetch_area_grid(&client, &request, &config.pacing()).await?;
/// println!("{} points, {} failed batches", report.grid.points.len(), report.failed_batches.len());
/// # Ok(())
/// # }
/// ```
pub async fn fetch_area_grid<P>(
    provider: &P,
    request: &AreaRequest,
    pacing: &Pacing,
) -> Result<AreaFetchReport, FetchError>
where
    P: EnvironmentalProvider + ?Sized,
{
    let batches = batch_parameters(&request.parameters, request.batch_size);
    let Some((first, rest)) = batches.split_first() else {
        return Err(FetchError::Validation("no parameters requested".to_string()));
    };
    let total = batches.len();

    log::info!("Batch 1/{}: {}", total, first.join(", "));
    let mut grid = fetch_and_assemble(provider, request, first).await?;
    log::info!(
        "{} timesteps, {} points",
        grid.timestamps.len(),
        grid.points.len()
    );

    let mut failed_batches = Vec::new();
    for (i, batch) in rest.iter().enumerate() {
        sleep(pacing.batch_delay).await;

        log::info!("Batch {}/{}: {}", i + 2, total, batch.join(", "));
        match fetch_and_assemble(provider, request, batch).await {
            Ok(addition) => {
                grid.merge_from(&addition);
                log::info!("Batch {} merged", i + 2);
            }
            Err(err) => {
                log::warn!("Batch {} failed, continuing without it: {}", i + 2, err);
                failed_batches.push(batch.clone());
            }
        }
    }

    Ok(AreaFetchReport {
        grid,
        failed_batches,
    })
}

async fn fetch_and_assemble<P>(
    provider: &P,
    request: &AreaRequest,
    batch: &[String],
) -> Result<AssembledGrid, FetchError>
where
    P: EnvironmentalProvider + ?Sized,
{
    let response = provider
        .fetch_batch(batch, &request.bbox, &request.format, &request.crs)
        .await?;
    Ok(assemble(&response, batch)?)
}

/// Current at one location and forecast step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedCurrent {
    /// Empty when the provider sent fewer timestamps than values
    pub time: String,
    #[serde(flatten)]
    pub current: CurrentVector,
}

impl TimedCurrent {
    pub fn is_complete(&self) -> bool {
        self.current.u.is_some() && self.current.v.is_some()
    }
}

/// A swept location with its current time series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweptPoint {
    pub lat: f64,
    pub lon: f64,
    pub vectors: Vec<TimedCurrent>,
}

/// Current time series at one location.
///
/// Fails with [`FetchError::Validation`] when either component is missing
/// entirely or the two series differ in length.
pub async fn fetch_current_vectors<P>(
    provider: &P,
    lat: f64,
    lon: f64,
) -> Result<Vec<TimedCurrent>, FetchError>
where
    P: EnvironmentalProvider + ?Sized,
{
    let parameters: Vec<String> = CURRENT_PARAMETERS.iter().map(|p| p.to_string()).collect();
    let response = provider.fetch_point(lat, lon, &parameters).await?;
    current_series(&response).map_err(|reason| {
        FetchError::Validation(format!("{reason} at {lat},{lon}"))
    })
}

fn current_series(response: &CoverageResponse) -> Result<Vec<TimedCurrent>, &'static str> {
    let u = response.range_values("current-u").unwrap_or_default();
    let v = response.range_values("current-v").unwrap_or_default();
    if u.is_empty() || v.is_empty() {
        return Err("missing u/v values");
    }
    if u.len() != v.len() {
        return Err("u/v length mismatch");
    }

    let times = response.timestamps();
    Ok(u.iter()
        .zip(v)
        .enumerate()
        .map(|(i, (&u, &v))| TimedCurrent {
            time: times.get(i).cloned().unwrap_or_default(),
            current: CurrentVector { u, v },
        })
        .collect())
}

/// Fetch currents for every sample point, one request at a time.
///
/// Points whose request fails, or whose series contains a missing component,
/// are left out.
pub async fn sweep_points<P>(
    provider: &P,
    points: &[SamplePoint],
    pacing: &Pacing,
) -> Vec<SweptPoint>
where
    P: EnvironmentalProvider + ?Sized,
{
    let mut swept = Vec::new();

    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            sleep(pacing.point_delay).await;
        }

        match fetch_current_vectors(provider, point.lat, point.lon).await {
            Ok(vectors) if vectors.iter().all(TimedCurrent::is_complete) => {
                swept.push(SweptPoint {
                    lat: point.lat,
                    lon: point.lon,
                    vectors,
                });
            }
            Ok(_) => log::debug!("dropping {},{}: incomplete currents", point.lat, point.lon),
            Err(err) => log::warn!("skipping {},{}: {}", point.lat, point.lon, err),
        }
    }

    log::info!("Swept {} of {} points", swept.len(), points.len());
    swept
}
