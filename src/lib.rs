//! # Mackerel Tracker Core Library
//!
//! This library turns ocean forecast grids for Scandinavian coastal waters into a
//! ranked list of mackerel habitat hotspots. It owns the data model shared by
//! every stage of the pipeline and re-exports the stages themselves.
//!
//! ## Data Flow
//!
//! 1. **Sample**: [`sampler`] lays a regular lat/lon grid over a water mask and
//!    keeps the nodes that fall on water
//! 2. **Fetch**: [`provider`] talks to the forecast API, [`sweep`] paces the
//!    batched area requests and the per-point current requests
//! 3. **Assemble**: [`grid`] converts CoverageJSON cubes into per-point,
//!    time-ordered readings and merges batches by coordinate key
//! 4. **Align**: [`timeline`] maps a requested hour offset onto the sparse set of
//!    forecast hours that actually exist
//! 5. **Score**: [`suitability`] rates every point and keeps the hotspots
//!
//! ## Coordinate Keys
//!
//! Points coming from different provider calls are matched through [`GridKey`],
//! an integer-scaled lat/lon pair at 4 decimal places (~11 m). Two coordinates
//! that print the same with 4 decimals always produce the same key.
//!
//! ## Missing Data
//!
//! Forecast cubes contain `null` over land and outside the model domain. A
//! missing parameter is always `None` in an [`EnvironmentalReading`], never `0.0`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod cache;
pub mod config;
pub mod coverage;
pub mod grid;
pub mod provider;
pub mod sampler;
pub mod snapshot;
pub mod suitability;
pub mod sweep;
pub mod timeline;


/// Scale factor used by [`GridKey`] and [`round4`] (4 decimal places).
pub const COORD_SCALE: f64 = 10_000.0;

/// Round a coordinate to 4 decimal places.
///
/// # Example
/// ```
/// use mackerel_lib::round4;
///
/// assert_eq!(round4(55.123_456), 55.1235);
/// assert_eq!(round4(12.0), 12.0);
/// ```
pub fn round4(value: f64) -> f64 {
    (value * COORD_SCALE).round() / COORD_SCALE
}

/// Composite coordinate key with a fixed precision of 4 decimal places.
///
/// Stored as integers so that equality and hashing never depend on float
/// formatting.
///
/// # Example
/// ```
/// use mackerel_lib::GridKey;
///
/// let a = GridKey::new(55.000_01, 12.5);
/// let b = GridKey::new(55.0, 12.500_04);
/// assert_eq!(a, b);
/// assert_eq!(a.lat(), 55.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl GridKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_e4: (lat * COORD_SCALE).round() as i64,
            lon_e4: (lon * COORD_SCALE).round() as i64,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat_e4 as f64 / COORD_SCALE
    }

    pub fn lon(&self) -> f64 {
        self.lon_e4 as f64 / COORD_SCALE
    }
}

impl std::fmt::Display for GridKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat(), self.lon())
    }
}

/// A candidate sampling location on water, rounded to 4 decimals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
}

impl SamplePoint {
    /// Build a sample point, rounding both coordinates to 4 decimals.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: round4(lat),
            lon: round4(lon),
        }
    }

    pub fn key(&self) -> GridKey {
        GridKey::new(self.lat, self.lon)
    }
}

/// Surface current components in m/s.
///
/// `u` is eastward, `v` is northward. Either may be missing when the
/// corresponding parameter batch failed or the cell is dry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentVector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
}

impl CurrentVector {
    /// Current speed in m/s, available only when both components are known.
    ///
    /// # Example
    /// ```
    /// use mackerel_lib::CurrentVector;
    ///
    /// let c = CurrentVector { u: Some(0.3), v: Some(0.4) };
    /// assert!((c.speed().unwrap() - 0.5).abs() < 1e-12);
    /// assert_eq!(CurrentVector { u: Some(0.3), v: None }.speed(), None);
    /// ```
    pub fn speed(&self) -> Option<f64> {
        let (u, v) = (self.u?, self.v?);
        Some(u.hypot(v))
    }

    /// Direction the water flows towards, in degrees clockwise from north,
    /// within `(-180, 180]` (west of north is negative).
    ///
    /// # Example
    /// ```
    /// use mackerel_lib::CurrentVector;
    ///
    /// let north = CurrentVector { u: Some(0.0), v: Some(1.0) };
    /// let east = CurrentVector { u: Some(1.0), v: Some(0.0) };
    /// let south_west = CurrentVector { u: Some(-1.0), v: Some(-1.0) };
    /// assert_eq!(north.heading_deg(), Some(0.0));
    /// assert!((east.heading_deg().unwrap() - 90.0).abs() < 1e-12);
    /// assert!((south_west.heading_deg().unwrap() + 135.0).abs() < 1e-12);
    /// assert_eq!(CurrentVector { u: None, v: Some(1.0) }.heading_deg(), None);
    /// ```
    pub fn heading_deg(&self) -> Option<f64> {
        let (u, v) = (self.u?, self.v?);
        Some(u.atan2(v).to_degrees())
    }

    /// Copy over the components that `other` knows about.
    pub fn absorb(&mut self, other: &CurrentVector) {
        if other.u.is_some() {
            self.u = other.u;
        }
        if other.v.is_some() {
            self.v = other.v;
        }
    }
}

/// Every parameter known at one point for one forecast step.
///
/// `time` is kept exactly as the provider wrote it: it is the key used to
/// line up readings coming from different batches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalReading {
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentVector>,
    /// Water temperature in °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Salinity in psu
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salinity: Option<f64>,
    /// Parameters without a dedicated field, stored under their provider name
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl EnvironmentalReading {
    pub fn new(time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            ..Self::default()
        }
    }

    pub fn current_speed(&self) -> Option<f64> {
        self.current.as_ref().and_then(CurrentVector::speed)
    }

    /// Copy every field present in `other` onto `self`; `current` is merged
    /// component by component.
    pub fn absorb(&mut self, other: &EnvironmentalReading) {
        if let Some(current) = &other.current {
            self.current.get_or_insert_with(CurrentVector::default).absorb(current);
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.salinity.is_some() {
            self.salinity = other.salinity;
        }
        for (name, value) in &other.extra {
            self.extra.insert(name.clone(), *value);
        }
    }
}

/// A geographic point with its chronological list of readings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
    /// Sorted ascending by time, one entry per distinct `time`
    pub data: Vec<EnvironmentalReading>,
}

impl GridPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            data: Vec::new(),
        }
    }

    pub fn key(&self) -> GridKey {
        GridKey::new(self.lat, self.lon)
    }

    pub fn reading_at(&self, time: &str) -> Option<&EnvironmentalReading> {
        self.data.iter().find(|r| r.time == time)
    }
}

/// Combined observation handed to the suitability engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalPoint {
    pub lat: f64,
    pub lon: f64,
    pub temperature: f64,
    pub salinity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_speed: Option<f64>,
}
