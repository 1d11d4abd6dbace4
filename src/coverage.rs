//! # CoverageJSON Boundary Types
//!
//! The forecast API answers both area (`cube`) and point (`position`) queries
//! with a CoverageJSON document. Only the parts the pipeline reads are modelled
//! here; everything else in the document is ignored during deserialization.
//!
//! ## Value Layout
//!
//! Every range holds a flat array ordered `(t, y, x)`:
//!
//! ```text
//! index = t * (Y * X) + y * X + x
//! ```
//!
//! ## Spatial Axes
//!
//! The provider describes the horizontal axes in one of three ways, resolved
//! once into [`SpatialAxes`]:
//! - a regular `Grid` domain with `start`/`stop`/`num` on `x` and `y`
//! - explicit coordinate arrays under `x`/`y`
//! - explicit coordinate arrays under `lon`/`lat`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Structural problems in a provider response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    #[error("coverage has no domain")]
    MissingDomain,

    #[error("coverage has no ranges")]
    MissingRanges,

    #[error("coverage has no timestamps")]
    EmptyTimeAxis,

    #[error("coverage has no usable x/y coordinates")]
    MissingCoordinates,
}

/// CoverageJSON document as returned by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageResponse {
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub ranges: Option<BTreeMap<String, Range>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "domainType", default)]
    pub domain_type: Option<String>,
    #[serde(default)]
    pub axes: Axes,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    #[serde(default)]
    pub t: Option<TimeAxis>,
    #[serde(default)]
    pub x: Option<Axis>,
    #[serde(default)]
    pub y: Option<Axis>,
    #[serde(default)]
    pub lon: Option<Axis>,
    #[serde(default)]
    pub lat: Option<Axis>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    #[serde(default)]
    pub values: Vec<String>,
}

/// One spatial axis, either explicit or regular.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
    #[serde(default)]
    pub num: Option<usize>,
}

impl Axis {
    fn explicit(&self) -> Option<&[f64]> {
        self.values.as_deref().filter(|v| !v.is_empty())
    }

    fn regular(&self) -> Option<RegularAxis> {
        Some(RegularAxis {
            start: self.start?,
            stop: self.stop?,
            num: self.num.filter(|&n| n > 0)?,
        })
    }
}

/// Flat parameter values; `None` where the provider wrote `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

impl CoverageResponse {
    /// Time axis values, empty when absent.
    pub fn timestamps(&self) -> &[String] {
        self.domain
            .as_ref()
            .and_then(|d| d.axes.t.as_ref())
            .map(|t| t.values.as_slice())
            .unwrap_or_default()
    }

    /// Flat values of one parameter, if the response carries it.
    pub fn range_values(&self, parameter: &str) -> Option<&[Option<f64>]> {
        self.ranges
            .as_ref()?
            .get(parameter)
            .map(|r| r.values.as_slice())
    }
}

/// Regular axis description: `num` evenly spaced values from `start` to `stop`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegularAxis {
    pub start: f64,
    pub stop: f64,
    pub num: usize,
}

impl RegularAxis {
    pub fn values(&self) -> Vec<f64> {
        if self.num == 1 {
            return vec![self.start];
        }
        let step = (self.stop - self.start) / (self.num - 1) as f64;
        (0..self.num)
            .map(|i| self.start + i as f64 * step)
            .collect()
    }
}

/// Horizontal axes of a coverage, resolved once at parse time.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialAxes {
    ExplicitXY { x: Vec<f64>, y: Vec<f64> },
    ExplicitLonLat { lon: Vec<f64>, lat: Vec<f64> },
    RegularGrid { x: RegularAxis, y: RegularAxis },
}

impl SpatialAxes {
    /// Pick the encoding used by `domain`.
    ///
    /// A `Grid` domain with `start`/`stop`/`num` on both axes wins; otherwise
    /// explicit `x`/`y` arrays, then explicit `lon`/`lat` arrays.
    pub fn resolve(domain: &Domain) -> Result<Self, CoverageError> {
        let axes = &domain.axes;

        if domain.domain_type.as_deref() == Some("Grid") {
            let regular = axes
                .x
                .as_ref()
                .and_then(Axis::regular)
                .zip(axes.y.as_ref().and_then(Axis::regular));
            if let Some((x, y)) = regular {
                return Ok(Self::RegularGrid { x, y });
            }
        }

        let explicit = |a: &Option<Axis>| a.as_ref().and_then(|a| a.explicit()).map(<[f64]>::to_vec);

        if let (Some(x), Some(y)) = (explicit(&axes.x), explicit(&axes.y)) {
            return Ok(Self::ExplicitXY { x, y });
        }
        if let (Some(lon), Some(lat)) = (explicit(&axes.lon), explicit(&axes.lat)) {
            return Ok(Self::ExplicitLonLat { lon, lat });
        }

        Err(CoverageError::MissingCoordinates)
    }

    /// Longitudes (x) and latitudes (y) in axis order.
    pub fn coordinates(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Self::ExplicitXY { x, y } => (x.clone(), y.clone()),
            Self::ExplicitLonLat { lon, lat } => (lon.clone(), lat.clone()),
            Self::RegularGrid { x, y } => (x.values(), y.values()),
        }
    }
}
