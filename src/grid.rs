//! # Grid Assembly and Merging
//!
//! Converts CoverageJSON cubes into a point-indexed structure and combines the
//! cubes fetched in separate parameter batches.
//!
//! ## Merge Keys
//!
//! Batches are fetched independently, so nothing guarantees that two responses
//! list their points in the same order. Merging therefore matches points by
//! [`GridKey`] and readings by their `time` string. Points or timesteps that
//! exist only in the addition are dropped: the first batch defines the grid.

use crate::coverage::{CoverageError, CoverageResponse, SpatialAxes};
use crate::{CurrentVector, EnvironmentalPoint, EnvironmentalReading, GridKey, GridPoint};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Provider parameter names and where their values land in a reading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parameter {
    CurrentU,
    CurrentV,
    WaterTemperature,
    Salinity,
    Other(String),
}

impl Parameter {
    pub fn from_name(name: &str) -> Self {
        match name {
            "current-u" => Self::CurrentU,
            "current-v" => Self::CurrentV,
            "water-temperature" => Self::WaterTemperature,
            "salinity" => Self::Salinity,
            other => Self::Other(other.to_string()),
        }
    }

    /// Store `value` in the matching field of `reading`.
    pub fn assign(&self, reading: &mut EnvironmentalReading, value: f64) {
        match self {
            Self::CurrentU => {
                reading.current.get_or_insert_with(CurrentVector::default).u = Some(value)
            }
            Self::CurrentV => {
                reading.current.get_or_insert_with(CurrentVector::default).v = Some(value)
            }
            Self::WaterTemperature => reading.temperature = Some(value),
            Self::Salinity => reading.salinity = Some(value),
            Self::Other(name) => {
                reading.extra.insert(name.clone(), value);
            }
        }
    }
}

/// Forecast cube reorganised per geographic point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledGrid {
    /// Time axis of the first assembled batch, as sent by the provider
    pub timestamps: Vec<String>,
    pub points: Vec<GridPoint>,
}

/// Build an [`AssembledGrid`] from one coverage response.
///
/// Points are emitted row-major (latitude outer, longitude inner) to match the
/// `(t, y, x)` layout of the value arrays. Only `parameter_names` are read;
/// names missing from `ranges` leave their field empty.
pub fn assemble<S: AsRef<str>>(
    response: &CoverageResponse,
    parameter_names: &[S],
) -> Result<AssembledGrid, CoverageError> {
    let domain = response.domain.as_ref().ok_or(CoverageError::MissingDomain)?;
    let ranges = response.ranges.as_ref().ok_or(CoverageError::MissingRanges)?;

    let times = response.timestamps();
    if times.is_empty() {
        return Err(CoverageError::EmptyTimeAxis);
    }

    let (xs, ys) = SpatialAxes::resolve(domain)?.coordinates();
    let (nx, ny) = (xs.len(), ys.len());

    let parameters: Vec<(Parameter, &[Option<f64>])> = parameter_names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            ranges
                .get(name)
                .map(|range| (Parameter::from_name(name), range.values.as_slice()))
        })
        .collect();

    let mut index: HashMap<GridKey, usize> = HashMap::with_capacity(nx * ny);
    let mut points: Vec<GridPoint> = Vec::with_capacity(nx * ny);

    for (yi, &lat) in ys.iter().enumerate() {
        for (xi, &lon) in xs.iter().enumerate() {
            let slot = *index.entry(GridKey::new(lat, lon)).or_insert_with(|| {
                points.push(GridPoint::new(lat, lon));
                points.len() - 1
            });
            let point = &mut points[slot];

            for (ti, time) in times.iter().enumerate() {
                let flat = ti * ny * nx + yi * nx + xi;
                let reading = reading_mut(point, time);
                for (parameter, values) in &parameters {
                    if let Some(value) = values.get(flat).copied().flatten() {
                        parameter.assign(reading, value);
                    }
                }
            }

            sort_readings(&mut point.data);
        }
    }

    Ok(AssembledGrid {
        timestamps: times.to_vec(),
        points,
    })
}

/// Merge `addition` into `base`, returning the combined grid.
pub fn merge(mut base: AssembledGrid, addition: &AssembledGrid) -> AssembledGrid {
    base.merge_from(addition);
    base
}

impl AssembledGrid {
    /// Copy every value present in `addition` onto the matching point and time
    /// of this grid.
    pub fn merge_from(&mut self, addition: &AssembledGrid) {
        let incoming: HashMap<GridKey, &GridPoint> =
            addition.points.iter().map(|p| (p.key(), p)).collect();

        for point in &mut self.points {
            let Some(other) = incoming.get(&point.key()) else {
                continue;
            };
            let by_time: HashMap<&str, &EnvironmentalReading> =
                other.data.iter().map(|r| (r.time.as_str(), r)).collect();

            for reading in &mut point.data {
                if let Some(update) = by_time.get(reading.time.as_str()) {
                    reading.absorb(update);
                }
            }
        }
    }

    /// Look up a point by coordinates (matched at 4 decimals).
    pub fn point(&self, lat: f64, lon: f64) -> Option<&GridPoint> {
        let key = GridKey::new(lat, lon);
        self.points.iter().find(|p| p.key() == key)
    }

    /// Per-point inputs for the suitability engine at one forecast step.
    ///
    /// Points lacking temperature or salinity at `time` are left out. Current
    /// speed is attached when both components are known.
    pub fn snapshot_at(&self, time: &str) -> Vec<EnvironmentalPoint> {
        self.points
            .iter()
            .filter_map(|point| {
                let reading = point.reading_at(time)?;
                Some(EnvironmentalPoint {
                    lat: point.lat,
                    lon: point.lon,
                    temperature: reading.temperature?,
                    salinity: reading.salinity?,
                    current_speed: reading.current_speed(),
                })
            })
            .collect()
    }
}

/// A single-parameter observation as returned by flat point lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub lat: f64,
    pub lon: f64,
    pub time: String,
    pub value: f64,
}

/// Join temperature and salinity observations on coordinates and time.
///
/// Only pairs where both values exist are returned, in temperature order.
pub fn combine_readings(
    temperature: &[Observation],
    salinity: &[Observation],
) -> Vec<EnvironmentalPoint> {
    let salinity_by_key: HashMap<(GridKey, &str), f64> = salinity
        .iter()
        .map(|o| ((GridKey::new(o.lat, o.lon), o.time.as_str()), o.value))
        .collect();

    temperature
        .iter()
        .filter_map(|t| {
            let salinity = salinity_by_key.get(&(GridKey::new(t.lat, t.lon), t.time.as_str()))?;
            Some(EnvironmentalPoint {
                lat: t.lat,
                lon: t.lon,
                temperature: t.value,
                salinity: *salinity,
                current_speed: None,
            })
        })
        .collect()
}

fn reading_mut<'a>(point: &'a mut GridPoint, time: &str) -> &'a mut EnvironmentalReading {
    let pos = match point.data.iter().position(|r| r.time == time) {
        Some(pos) => pos,
        None => {
            point.data.push(EnvironmentalReading::new(time));
            point.data.len() - 1
        }
    };
    &mut point.data[pos]
}

/// Parse a provider timestamp.
///
/// Accepts RFC 3339 and the minute-precision form `2024-01-01T00:00Z`.
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = value.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Sort readings ascending by parsed time; unparseable times go last.
pub fn sort_readings(readings: &mut [EnvironmentalReading]) {
    readings.sort_by(|a, b| match (parse_time(&a.time), parse_time(&b.time)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{Axes, Axis, Domain, Range, TimeAxis};
    use std::collections::BTreeMap;

    fn explicit_coverage(
        lons: &[f64],
        lats: &[f64],
        times: &[&str],
        ranges: &[(&str, Vec<Option<f64>>)],
    ) -> CoverageResponse {
        CoverageResponse {
            domain: Some(Domain {
                domain_type: None,
                axes: Axes {
                    t: Some(TimeAxis {
                        values: times.iter().map(|t| t.to_string()).collect(),
                    }),
                    x: Some(Axis {
                        values: Some(lons.to_vec()),
                        ..Axis::default()
                    }),
                    y: Some(Axis {
                        values: Some(lats.to_vec()),
                        ..Axis::default()
                    }),
                    ..Axes::default()
                },
            }),
            ranges: Some(
                ranges
                    .iter()
                    .map(|(name, values)| {
                        (
                            name.to_string(),
                            Range {
                                values: values.clone(),
                            },
                        )
                    })
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }

    #[test]
    fn maps_parameter_names_onto_fields() {
        let response = explicit_coverage(
            &[12.0],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[
                ("current-u", vec![Some(0.1)]),
                ("current-v", vec![Some(-0.2)]),
                ("water-temperature", vec![Some(14.5)]),
                ("salinity", vec![Some(31.0)]),
                ("sea-mean-deviation", vec![Some(0.4)]),
            ],
        );
        let names = [
            "current-u",
            "current-v",
            "water-temperature",
            "salinity",
            "sea-mean-deviation",
        ];
        let grid = assemble(&response, &names).unwrap();
        let reading = &grid.points[0].data[0];

        assert_eq!(
            reading.current,
            Some(CurrentVector {
                u: Some(0.1),
                v: Some(-0.2)
            })
        );
        assert_eq!(reading.temperature, Some(14.5));
        assert_eq!(reading.salinity, Some(31.0));
        assert_eq!(reading.extra.get("sea-mean-deviation"), Some(&0.4));
    }

    #[test]
    fn null_and_unrequested_values_stay_absent() {
        let response = explicit_coverage(
            &[12.0, 12.1],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[
                ("water-temperature", vec![None, Some(9.0)]),
                ("salinity", vec![Some(20.0), Some(21.0)]),
            ],
        );
        let grid = assemble(&response, &["water-temperature"]).unwrap();

        assert_eq!(grid.points[0].data[0].temperature, None);
        assert_eq!(grid.points[1].data[0].temperature, Some(9.0));
        assert!(grid.points.iter().all(|p| p.data[0].salinity.is_none()));
    }

    #[test]
    fn readings_are_sorted_by_time() {
        let response = explicit_coverage(
            &[12.0],
            &[56.0],
            &["2024-06-01T02:00:00Z", "2024-06-01T00:00Z", "2024-06-01T01:00:00+00:00"],
            &[("salinity", vec![Some(3.0), Some(1.0), Some(2.0)])],
        );
        let grid = assemble(&response, &["salinity"]).unwrap();
        let values: Vec<_> = grid.points[0].data.iter().map(|r| r.salinity).collect();

        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
        // the time axis itself keeps provider order
        assert_eq!(grid.timestamps[0], "2024-06-01T02:00:00Z");
    }

    #[test]
    fn malformed_responses_are_rejected() {
        let no_domain = CoverageResponse {
            domain: None,
            ranges: Some(BTreeMap::new()),
        };
        assert_eq!(
            assemble(&no_domain, &["salinity"]),
            Err(CoverageError::MissingDomain)
        );

        let mut no_ranges = explicit_coverage(&[12.0], &[56.0], &["2024-06-01T00:00:00Z"], &[]);
        no_ranges.ranges = None;
        assert_eq!(
            assemble(&no_ranges, &["salinity"]),
            Err(CoverageError::MissingRanges)
        );

        let no_times = explicit_coverage(&[12.0], &[56.0], &[], &[]);
        assert_eq!(
            assemble(&no_times, &["salinity"]),
            Err(CoverageError::EmptyTimeAxis)
        );

        let no_coords = explicit_coverage(&[], &[56.0], &["2024-06-01T00:00:00Z"], &[]);
        assert_eq!(
            assemble(&no_coords, &["salinity"]),
            Err(CoverageError::MissingCoordinates)
        );
    }

    #[test]
    fn merge_into_itself_changes_nothing() {
        let response = explicit_coverage(
            &[12.0, 12.5],
            &[56.0],
            &["2024-06-01T00:00:00Z", "2024-06-01T01:00:00Z"],
            &[
                ("current-u", vec![Some(0.1), Some(0.2), Some(0.3), Some(0.4)]),
                ("current-v", vec![Some(0.5), None, Some(0.7), Some(0.8)]),
                ("salinity", vec![Some(30.0), Some(31.0), Some(32.0), Some(33.0)]),
            ],
        );
        let grid = assemble(&response, &["current-u", "current-v", "salinity"]).unwrap();
        let merged = merge(grid.clone(), &grid);

        assert_eq!(merged, grid);
    }

    #[test]
    fn merge_matches_points_by_key_not_position() {
        let base = explicit_coverage(
            &[12.0, 12.5],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[("water-temperature", vec![Some(10.0), Some(11.0)])],
        );
        // same points listed in reverse order
        let addition = explicit_coverage(
            &[12.5, 12.0],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[("salinity", vec![Some(25.0), Some(32.0)])],
        );

        let base = assemble(&base, &["water-temperature"]).unwrap();
        let addition = assemble(&addition, &["salinity"]).unwrap();
        let merged = merge(base, &addition);

        let west = merged.point(56.0, 12.0).unwrap();
        let east = merged.point(56.0, 12.5).unwrap();
        assert_eq!(west.data[0].temperature, Some(10.0));
        assert_eq!(west.data[0].salinity, Some(32.0));
        assert_eq!(east.data[0].temperature, Some(11.0));
        assert_eq!(east.data[0].salinity, Some(25.0));
    }

    #[test]
    fn merge_deep_merges_current_and_drops_unknown_points() {
        let base = explicit_coverage(
            &[12.0],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[("current-u", vec![Some(0.3)])],
        );
        let addition = explicit_coverage(
            &[12.0, 13.0],
            &[56.0],
            &["2024-06-01T00:00:00Z", "2024-06-01T01:00:00Z"],
            &[("current-v", vec![Some(0.4), Some(9.0), Some(0.1), Some(9.0)])],
        );

        let base = assemble(&base, &["current-u"]).unwrap();
        let addition = assemble(&addition, &["current-v"]).unwrap();
        let merged = merge(base, &addition);

        assert_eq!(merged.points.len(), 1);
        assert_eq!(merged.points[0].data.len(), 1);
        let current = merged.points[0].data[0].current.unwrap();
        assert_eq!(current.u, Some(0.3));
        assert_eq!(current.v, Some(0.4));
        assert!((merged.points[0].data[0].current_speed().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn snapshot_requires_temperature_and_salinity() {
        let response = explicit_coverage(
            &[12.0, 12.5],
            &[56.0],
            &["2024-06-01T00:00:00Z"],
            &[
                ("water-temperature", vec![Some(14.0), Some(15.0)]),
                ("salinity", vec![Some(31.0), None]),
                ("current-u", vec![Some(0.3), Some(0.3)]),
                ("current-v", vec![Some(0.4), Some(0.4)]),
            ],
        );
        let names = ["water-temperature", "salinity", "current-u", "current-v"];
        let grid = assemble(&response, &names).unwrap();

        let points = grid.snapshot_at("2024-06-01T00:00:00Z");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lon, 12.0);
        assert!((points[0].current_speed.unwrap() - 0.5).abs() < 1e-12);

        assert!(grid.snapshot_at("2030-01-01T00:00:00Z").is_empty());
    }

    #[test]
    fn combine_joins_on_rounded_coordinates_and_time() {
        let temperature = vec![
            Observation {
                lat: 56.000_01,
                lon: 12.0,
                time: "t0".into(),
                value: 13.0,
            },
            Observation {
                lat: 56.0,
                lon: 12.0,
                time: "t1".into(),
                value: 14.0,
            },
        ];
        let salinity = vec![Observation {
            lat: 56.0,
            lon: 12.000_02,
            time: "t0".into(),
            value: 30.5,
        }];

        let combined = combine_readings(&temperature, &salinity);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].temperature, 13.0);
        assert_eq!(combined[0].salinity, 30.5);
    }

    #[test]
    fn parses_minute_precision_timestamps() {
        let a = parse_time("2024-01-01T00:00Z").unwrap();
        let b = parse_time("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_time("not a time").is_none());
    }
}
