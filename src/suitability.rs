//! # Mackerel Habitat Suitability
//!
//! Habitat suitability index for Atlantic mackerel (*Scomber scombrus*) in the
//! Skagerrak, Kattegat, Öresund and southern Baltic.
//!
//! ## Scoring Model
//!
//! Hard limits first: salinity below 20 psu, or temperature outside 8–22 °C,
//! scores zero. Otherwise four independent components are weighted:
//!
//! | Component   | Weight | Shape                                           |
//! |-------------|--------|-------------------------------------------------|
//! | Temperature | 0.40   | Gaussian around 14 °C, zero beyond ±6 °C        |
//! | Salinity    | 0.40   | 1 above 30 psu, linear ramp from 25, weak below |
//! | Current     | 0.15   | best at 0.1–0.5 m/s                             |
//! | Season      | 0.05   | peak June–August                                |
//!
//! Confidence is classified from the raw inputs, independently of the
//! component breakdown.

use crate::EnvironmentalPoint;
use serde::{Deserialize, Serialize};

const TEMP_OPTIMUM: f64 = 14.0;
const TEMP_TOLERANCE: f64 = 6.0;

const WEIGHT_TEMPERATURE: f64 = 0.4;
const WEIGHT_SALINITY: f64 = 0.4;
const WEIGHT_CURRENT: f64 = 0.15;
const WEIGHT_SEASON: f64 = 0.05;

/// Minimum suitability for a point to count as a hotspot by default.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Environmental conditions at one location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MackerelSuitabilityInput {
    /// Water temperature in °C
    pub temperature: f64,
    /// Salinity in psu
    pub salinity: f64,
    /// Current speed in m/s
    #[serde(default)]
    pub current_speed: Option<f64>,
    /// Depth in metres (not used by the score)
    #[serde(default)]
    pub depth: Option<f64>,
    /// Month 1-12
    #[serde(default)]
    pub month: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A scored location above the hotspot threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MackerelHotspot {
    pub lat: f64,
    pub lon: f64,
    pub suitability: f64,
    pub temperature: f64,
    pub salinity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_speed: Option<f64>,
    pub confidence: Confidence,
}

/// Suitability score in `[0, 1]`.
///
/// # Example
/// ```
/// use mackerel_lib::suitability::{score, MackerelSuitabilityInput};
///
/// let ideal = MackerelSuitabilityInput {
///     temperature: 14.0,
///     salinity: 32.0,
///     current_speed: Some(0.3),
///     month: Some(7),
///     ..Default::default()
/// };
/// assert!((score(&ideal) - 1.0).abs() < 1e-12);
///
/// let too_cold = MackerelSuitabilityInput { temperature: 7.0, salinity: 30.0, ..Default::default() };
/// assert_eq!(score(&too_cold), 0.0);
/// ```
pub fn score(input: &MackerelSuitabilityInput) -> f64 {
    let t = input.temperature;
    let s = input.salinity;

    if s < 20.0 || t < 8.0 || t > 22.0 {
        return 0.0;
    }

    let total = temperature_score(t) * WEIGHT_TEMPERATURE
        + salinity_score(s) * WEIGHT_SALINITY
        + current_score(input.current_speed) * WEIGHT_CURRENT
        + season_score(input.month) * WEIGHT_SEASON;

    total.clamp(0.0, 1.0)
}

fn temperature_score(t: f64) -> f64 {
    let diff = (t - TEMP_OPTIMUM).abs();
    if diff > TEMP_TOLERANCE {
        return 0.0;
    }
    (-(diff / (TEMP_TOLERANCE / 2.0)).powi(2)).exp()
}

fn salinity_score(s: f64) -> f64 {
    if s >= 30.0 {
        1.0
    } else if s >= 25.0 {
        (s - 25.0) / 5.0
    } else {
        ((s - 20.0) / 5.0).max(0.0) * 0.3
    }
}

fn current_score(speed: Option<f64>) -> f64 {
    match speed {
        None => 0.75,
        Some(v) if (0.1..=0.5).contains(&v) => 1.0,
        Some(v) if v < 0.1 => 0.5,
        Some(v) if v <= 1.0 => 0.7,
        Some(_) => 0.3,
    }
}

fn season_score(month: Option<u32>) -> f64 {
    match month {
        None | Some(6..=8) => 1.0,
        Some(5 | 9) => 0.8,
        Some(4 | 10) => 0.4,
        Some(_) => 0.1,
    }
}

/// Classify how much to trust a score, from the raw inputs.
pub fn confidence(input: &MackerelSuitabilityInput, suitability: f64) -> Confidence {
    let t = input.temperature;
    let s = input.salinity;

    if suitability > 0.7 && (12.0..=16.0).contains(&t) && s >= 30.0 {
        Confidence::High
    } else if suitability > 0.4 && (10.0..=18.0).contains(&t) && s >= 25.0 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Score every point and keep those at or above `threshold`, best first.
///
/// Order among exactly equal scores is unspecified.
pub fn generate_hotspots(
    points: &[EnvironmentalPoint],
    threshold: f64,
    month: Option<u32>,
) -> Vec<MackerelHotspot> {
    let mut hotspots: Vec<MackerelHotspot> = points
        .iter()
        .filter_map(|point| {
            let input = MackerelSuitabilityInput {
                temperature: point.temperature,
                salinity: point.salinity,
                current_speed: point.current_speed,
                depth: None,
                month,
            };
            let suitability = score(&input);
            (suitability >= threshold).then(|| MackerelHotspot {
                lat: point.lat,
                lon: point.lon,
                suitability,
                temperature: point.temperature,
                salinity: point.salinity,
                current_speed: point.current_speed,
                confidence: confidence(&input, suitability),
            })
        })
        .collect();

    hotspots.sort_unstable_by(|a, b| b.suitability.total_cmp(&a.suitability));
    hotspots
}

/// Display class of a hotspot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotStrength {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HotspotStrength {
    pub fn classify(suitability: f64) -> Self {
        if suitability >= 0.8 {
            Self::Excellent
        } else if suitability >= 0.65 {
            Self::Good
        } else if suitability >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Aggregate figures reported alongside a hotspot list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotSummary {
    pub total_hotspots: usize,
    pub high_confidence_hotspots: usize,
    pub average_suitability: f64,
}

impl HotspotSummary {
    pub fn from_hotspots(hotspots: &[MackerelHotspot]) -> Self {
        let total = hotspots.len();
        let average = if total == 0 {
            0.0
        } else {
            hotspots.iter().map(|h| h.suitability).sum::<f64>() / total as f64
        };
        Self {
            total_hotspots: total,
            high_confidence_hotspots: hotspots
                .iter()
                .filter(|h| h.confidence == Confidence::High)
                .count(),
            average_suitability: average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(temperature: f64, salinity: f64) -> MackerelSuitabilityInput {
        MackerelSuitabilityInput {
            temperature,
            salinity,
            ..Default::default()
        }
    }

    fn point(lat: f64, temperature: f64, salinity: f64, speed: Option<f64>) -> EnvironmentalPoint {
        EnvironmentalPoint {
            lat,
            lon: 12.0,
            temperature,
            salinity,
            current_speed: speed,
        }
    }

    #[test]
    fn hard_cutoffs_score_zero() {
        assert_eq!(score(&input(7.0, 30.0)), 0.0);
        assert_eq!(score(&input(23.0, 30.0)), 0.0);
        assert_eq!(score(&input(14.0, 19.99)), 0.0);
        assert_eq!(score(&input(7.999, 35.0)), 0.0);
        assert_eq!(score(&input(22.001, 35.0)), 0.0);
    }

    #[test]
    fn salinity_twenty_is_not_cut_off() {
        // exactly 20 passes the cutoff; the salinity component is zero but
        // temperature, current and season still contribute
        let s = score(&input(14.0, 20.0));
        assert!((s - (0.4 + 0.15 * 0.75 + 0.05)).abs() < 1e-12, "score {s}");
    }

    #[test]
    fn temperature_boundaries_are_inclusive() {
        assert!(score(&input(8.0, 30.0)) > 0.0);
        assert!(score(&input(22.0, 30.0)) > 0.0);
        // 8 and 20 are exactly the tolerance edge: exp(-4)
        let edge = temperature_score(8.0);
        assert!((edge - (-4.0f64).exp()).abs() < 1e-12);
        assert_eq!(temperature_score(21.0), 0.0);
    }

    #[test]
    fn score_increases_towards_optimum() {
        let at = |t| {
            score(&MackerelSuitabilityInput {
                temperature: t,
                salinity: 32.0,
                current_speed: Some(0.3),
                month: Some(7),
                ..Default::default()
            })
        };
        assert!(at(14.0) > at(10.0));
        assert!(at(10.0) > at(8.5));
        assert!((at(14.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn salinity_component_shape() {
        assert_eq!(salinity_score(35.0), 1.0);
        assert_eq!(salinity_score(30.0), 1.0);
        assert!((salinity_score(27.5) - 0.5).abs() < 1e-12);
        assert!((salinity_score(22.5) - 0.15).abs() < 1e-12);
        assert_eq!(salinity_score(20.0), 0.0);
    }

    #[test]
    fn current_and_season_components() {
        assert_eq!(current_score(None), 0.75);
        assert_eq!(current_score(Some(0.1)), 1.0);
        assert_eq!(current_score(Some(0.5)), 1.0);
        assert_eq!(current_score(Some(0.05)), 0.5);
        assert_eq!(current_score(Some(0.8)), 0.7);
        assert_eq!(current_score(Some(1.0)), 0.7);
        assert_eq!(current_score(Some(1.5)), 0.3);

        assert_eq!(season_score(None), 1.0);
        assert_eq!(season_score(Some(7)), 1.0);
        assert_eq!(season_score(Some(9)), 0.8);
        assert_eq!(season_score(Some(4)), 0.4);
        assert_eq!(season_score(Some(1)), 0.1);
    }

    #[test]
    fn confidence_levels() {
        let ideal = input(14.0, 32.0);
        assert_eq!(confidence(&ideal, 0.9), Confidence::High);
        assert_eq!(confidence(&ideal, 0.6), Confidence::Medium);
        assert_eq!(confidence(&input(17.0, 32.0), 0.9), Confidence::Medium);
        assert_eq!(confidence(&input(14.0, 27.0), 0.9), Confidence::Medium);
        assert_eq!(confidence(&input(19.0, 32.0), 0.9), Confidence::Low);
        assert_eq!(confidence(&ideal, 0.4), Confidence::Low);
    }

    #[test]
    fn hotspots_are_filtered_and_sorted() {
        // ~0.40 (cool, brackish), 1.0 (optimal), ~0.68 (salinity ramp)
        let points = vec![
            point(56.0, 11.0, 22.0, Some(0.3)),
            point(57.0, 14.0, 32.0, Some(0.3)),
            point(58.0, 14.0, 26.0, Some(0.3)),
        ];
        let hotspots = generate_hotspots(&points, 0.5, Some(7));

        assert_eq!(hotspots.len(), 2);
        assert_eq!(hotspots[0].lat, 57.0);
        assert_eq!(hotspots[1].lat, 58.0);
        assert!(hotspots[0].suitability > hotspots[1].suitability);
        assert_eq!(hotspots[0].confidence, Confidence::High);
        assert!(hotspots.iter().all(|h| h.suitability >= 0.5));
    }

    #[test]
    fn threshold_is_inclusive() {
        let points = vec![point(56.0, 14.0, 32.0, Some(0.3))];
        let exact = score(&MackerelSuitabilityInput {
            temperature: 14.0,
            salinity: 32.0,
            current_speed: Some(0.3),
            month: Some(1),
            ..Default::default()
        });
        assert_eq!(generate_hotspots(&points, exact, Some(1)).len(), 1);
    }

    #[test]
    fn strength_and_summary() {
        assert_eq!(HotspotStrength::classify(0.85), HotspotStrength::Excellent);
        assert_eq!(HotspotStrength::classify(0.7), HotspotStrength::Good);
        assert_eq!(HotspotStrength::classify(0.5), HotspotStrength::Fair);
        assert_eq!(HotspotStrength::classify(0.2), HotspotStrength::Poor);

        let empty = HotspotSummary::from_hotspots(&[]);
        assert_eq!(empty.total_hotspots, 0);
        assert_eq!(empty.average_suitability, 0.0);

        let points = vec![point(57.0, 14.0, 32.0, Some(0.3)), point(58.0, 14.0, 26.0, Some(0.3))];
        let hotspots = generate_hotspots(&points, 0.0, Some(7));
        let summary = HotspotSummary::from_hotspots(&hotspots);
        assert_eq!(summary.total_hotspots, 2);
        assert_eq!(summary.high_confidence_hotspots, 1);
        assert!(summary.average_suitability > 0.5 && summary.average_suitability < 1.0);
    }
}
