//! # Water Mask Sampling
//!
//! Generates candidate sampling locations on water by laying a regular lat/lon
//! grid over the bounding box of a polygon mask and keeping the nodes that fall
//! inside at least one polygon.
//!
//! Cost is `O(nodes × vertices)`; halving the step quadruples the node count,
//! so keep steps coarse (0.05° covers the Swedish coast in a few thousand nodes).

use crate::SamplePoint;
use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use std::{fs, io, path::Path};
use thiserror::Error;

/// Tolerance absorbing float error when counting grid steps.
const STEP_EPSILON: f64 = 1e-9;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("mask IO: {0}")]
    Io(#[from] io::Error),

    #[error("mask JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mask is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,
}

/// Set of polygons describing water. Coordinates are `x = lon`, `y = lat`.
#[derive(Clone, Debug, PartialEq)]
pub struct WaterMask {
    polygons: MultiPolygon<f64>,
}

impl Default for WaterMask {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WaterMask {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        Self {
            polygons: MultiPolygon::new(polygons),
        }
    }

    /// Read a GeoJSON mask from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MaskError> {
        let raw = fs::read_to_string(path)?;
        Self::from_geojson(&raw)
    }

    /// Parse a GeoJSON `FeatureCollection`.
    ///
    /// `Polygon` and `MultiPolygon` features contribute to the mask; any other
    /// geometry is ignored.
    pub fn from_geojson(raw: &str) -> Result<Self, MaskError> {
        let doc: Value = serde_json::from_str(raw)?;
        if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(MaskError::NotFeatureCollection);
        }

        let mut polygons = Vec::new();
        let features = doc.get("features").and_then(Value::as_array);
        for geometry in features.into_iter().flatten().filter_map(|f| f.get("geometry")) {
            let coordinates = geometry.get("coordinates");
            match geometry.get("type").and_then(Value::as_str) {
                Some("Polygon") => polygons.extend(coordinates.and_then(parse_polygon)),
                Some("MultiPolygon") => polygons.extend(
                    coordinates
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(parse_polygon),
                ),
                _ => {}
            }
        }

        Ok(Self::new(polygons))
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons.0
    }

    /// True if the location lies inside or on the edge of any polygon.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let point = Point::new(lon, lat);
        self.polygons.iter().any(|polygon| point.intersects(polygon))
    }
}

/// Rings are `[[lon, lat], ...]`; the first ring is the exterior, the rest holes.
fn parse_polygon(rings: &Value) -> Option<Polygon<f64>> {
    let mut rings = rings.as_array()?.iter().filter_map(parse_ring);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn parse_ring(ring: &Value) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = ring
        .as_array()?
        .iter()
        .filter_map(|position| {
            let position = position.as_array()?;
            Some(Coord {
                x: position.first()?.as_f64()?,
                y: position.get(1)?.as_f64()?,
            })
        })
        .collect();
    (!coords.is_empty()).then(|| LineString::new(coords))
}

/// Sample water locations on a regular grid of `step_degrees`.
///
/// Rows run from south to north, each row from west to east. Output points
/// are rounded to 4 decimals. An empty mask, or a step that is not a positive
/// finite number, yields no points.
pub fn sample(mask: &WaterMask, step_degrees: f64) -> Vec<SamplePoint> {
    if !(step_degrees.is_finite() && step_degrees > 0.0) {
        return Vec::new();
    }
    let Some(bbox) = mask.polygons.bounding_rect() else {
        return Vec::new();
    };
    let (min, max) = (bbox.min(), bbox.max());

    let lat_steps = steps_between(min.y, max.y, step_degrees);
    let lon_steps = steps_between(min.x, max.x, step_degrees);

    let mut points = Vec::new();
    for i in 0..=lat_steps {
        let lat = min.y + i as f64 * step_degrees;
        for j in 0..=lon_steps {
            let lon = min.x + j as f64 * step_degrees;
            if mask.contains(lat, lon) {
                points.push(SamplePoint::new(lat, lon));
            }
        }
    }

    log::debug!(
        "sampled {} water points from {} grid nodes",
        points.len(),
        (lat_steps + 1) * (lon_steps + 1)
    );
    points
}

fn steps_between(lo: f64, hi: f64, step: f64) -> usize {
    ((hi - lo) / step + STEP_EPSILON).floor().max(0.0) as usize
}
