//! # Forecast Time Alignment
//!
//! The time slider works in whole hours relative to "now", but forecast steps
//! are sparse: hourly near the analysis time, wider apart further out, with
//! gaps. This module maps between the two.

use crate::grid::parse_time;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Hour offsets for which forecast data exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBounds {
    pub min_hour: i64,
    pub max_hour: i64,
    /// Start of the current UTC hour when the bounds were computed
    pub base_time: DateTime<Utc>,
    /// Offset of every timestamp, in input order; not necessarily contiguous
    pub available_hours: Vec<i64>,
}

impl TimeBounds {
    /// Limit `hour` to `[min_hour, max_hour]`.
    ///
    /// The result may still fall in a gap between forecast steps; use
    /// [`TimeBounds::snap`] to land on an hour with data.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use mackerel_lib::timeline::compute_bounds;
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    /// let steps = ["2024-06-01T09:00:00Z", "2024-06-01T12:00:00Z", "2024-06-01T18:00:00Z"];
    /// let bounds = compute_bounds(&steps, Some(now)).unwrap();
    ///
    /// assert_eq!(bounds.clamp(-5), -1);
    /// assert_eq!(bounds.clamp(48), 8);
    /// assert_eq!(bounds.clamp(4), 4);
    /// assert_eq!(bounds.snap(bounds.clamp(4)), 2);
    /// ```
    pub fn clamp(&self, hour: i64) -> i64 {
        hour.clamp(self.min_hour.min(self.max_hour), self.max_hour.max(self.min_hour))
    }

    /// Nearest hour with data.
    pub fn snap(&self, hour: i64) -> i64 {
        snap_to_available(hour, &self.available_hours)
    }

    /// Absolute time of an hour offset: `base_time + hour` hours.
    ///
    /// Use [`nearest_timestamp`] to turn the instant back into one of the
    /// provider's timestamp strings.
    pub fn instant_at(&self, hour: i64) -> DateTime<Utc> {
        self.base_time + Duration::hours(hour)
    }
}

/// Compute hour offsets of `timestamps` relative to the current UTC hour.
///
/// `timestamps` are expected in ascending order. If `now` is `None`, the wall
/// clock is used. Timestamps that do not parse are skipped; returns `None`
/// when nothing is left.
pub fn compute_bounds<S: AsRef<str>>(
    timestamps: &[S],
    now: Option<DateTime<Utc>>,
) -> Option<TimeBounds> {
    let base_time = truncate_to_hour(now.unwrap_or_else(Utc::now));

    let available_hours: Vec<i64> = timestamps
        .iter()
        .filter_map(|ts| parse_time(ts.as_ref()))
        .map(|ts| {
            let hours = (ts - base_time).num_milliseconds() as f64 / MILLIS_PER_HOUR;
            // half-hours round up, also for negative offsets
            (hours + 0.5).floor() as i64
        })
        .collect();

    Some(TimeBounds {
        min_hour: *available_hours.first()?,
        max_hour: *available_hours.last()?,
        base_time,
        available_hours,
    })
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(t)
}

/// Entry of `available` closest to `requested`.
///
/// On an exact tie the earlier entry wins. An empty list returns `requested`
/// unchanged.
///
/// # Example
/// ```
/// use mackerel_lib::timeline::snap_to_available;
///
/// assert_eq!(snap_to_available(4, &[-48, -24, 0, 6, 12]), 6);
/// assert_eq!(snap_to_available(0, &[-10, 10]), -10);
/// assert_eq!(snap_to_available(7, &[]), 7);
/// ```
pub fn snap_to_available(requested: i64, available: &[i64]) -> i64 {
    let mut best: Option<i64> = None;
    for &hour in available {
        match best {
            Some(b) if (hour - requested).abs() >= (b - requested).abs() => {}
            _ => best = Some(hour),
        }
    }
    best.unwrap_or(requested)
}

/// Timestamp string in `timestamps` closest to `target`; earlier entry wins
/// ties. Unparseable entries are ignored.
pub fn nearest_timestamp<S: AsRef<str>>(timestamps: &[S], target: DateTime<Utc>) -> Option<&str> {
    let mut best: Option<(&str, i64)> = None;
    for ts in timestamps {
        let Some(parsed) = parse_time(ts.as_ref()) else {
            continue;
        };
        let diff = (parsed - target).num_milliseconds().abs();
        if best.map_or(true, |(_, d)| diff < d) {
            best = Some((ts.as_ref(), diff));
        }
    }
    best.map(|(ts, _)| ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 42, 17).unwrap()
    }

    #[test]
    fn bounds_are_relative_to_current_hour() {
        let timestamps = [
            "2024-06-01T08:00:00Z",
            "2024-06-01T10:00:00Z",
            "2024-06-01T16:00:00Z",
            "2024-06-02T10:00:00Z",
        ];
        let bounds = compute_bounds(&timestamps, Some(now())).unwrap();

        assert_eq!(
            bounds.base_time,
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(bounds.available_hours, vec![-2, 0, 6, 24]);
        assert_eq!(bounds.min_hour, -2);
        assert_eq!(bounds.max_hour, 24);
    }

    #[test]
    fn offsets_round_to_nearest_hour() {
        let timestamps = ["2024-06-01T10:29:00Z", "2024-06-01T10:30:00Z", "2024-06-01T09:30:00Z"];
        let bounds = compute_bounds(&timestamps, Some(now())).unwrap();
        assert_eq!(bounds.available_hours, vec![0, 1, 0]);
    }

    #[test]
    fn empty_or_unparseable_gives_none() {
        let empty: [&str; 0] = [];
        assert!(compute_bounds(&empty, Some(now())).is_none());
        assert!(compute_bounds(&["garbage"], Some(now())).is_none());
    }

    #[test]
    fn snap_picks_nearest() {
        let hours = [-48, -24, 0, 6, 12];
        assert_eq!(snap_to_available(4, &hours), 6);
        assert_eq!(snap_to_available(-36, &hours), -48);
        assert_eq!(snap_to_available(100, &hours), 12);
        assert_eq!(snap_to_available(-30, &hours), -24);
    }

    #[test]
    fn snap_tie_prefers_first_candidate() {
        assert_eq!(snap_to_available(0, &[-10, 10]), -10);
        assert_eq!(snap_to_available(0, &[10, -10]), 10);
        assert_eq!(snap_to_available(5, &[]), 5);
    }

    #[test]
    fn bounds_helpers() {
        let bounds = compute_bounds(&["2024-06-01T10:00:00Z", "2024-06-01T13:00:00Z"], Some(now()))
            .unwrap();
        assert_eq!(bounds.clamp(-5), 0);
        assert_eq!(bounds.clamp(9), 3);
        assert_eq!(bounds.snap(2), 3);
        assert_eq!(
            bounds.instant_at(3),
            Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn nearest_timestamp_matches_target() {
        let timestamps = ["2024-06-01T00:00Z", "2024-06-01T03:00Z", "2024-06-01T06:00Z"];
        let target = Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();
        assert_eq!(nearest_timestamp(&timestamps, target), Some("2024-06-01T03:00Z"));

        let midpoint = Utc.with_ymd_and_hms(2024, 6, 1, 1, 30, 0).unwrap();
        assert_eq!(nearest_timestamp(&timestamps, midpoint), Some("2024-06-01T00:00Z"));

        let empty: [&str; 0] = [];
        assert_eq!(nearest_timestamp(&empty, target), None);
    }
}
