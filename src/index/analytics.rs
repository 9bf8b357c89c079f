use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::history::{PointRecord, Source};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("cell contains no points")]
    EmptyCell,
    #[error("timestamp {0} is outside the supported calendar range")]
    TimestampOutOfRange(i64),
}

/// Visit statistics for the points of one cell (or a merged cluster).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    /// Points with `source = visit`
    pub total_visits: usize,
    pub point_count: usize,
    /// Distinct UTC calendar dates
    pub unique_days: usize,
    /// Longest run of consecutive UTC dates
    pub longest_streak: usize,
    pub dominant_semantic_type: Option<String>,
    pub first_visit_ms: i64,
    pub last_visit_ms: i64,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
}

impl VisitStats {
    /// Computes statistics over the given points.
    ///
    /// Callers pass the points of the current view only; results are never
    /// reused across time filters.
    pub fn compute(points: &[&PointRecord]) -> Result<Self, AnalyticsError> {
        if points.is_empty() {
            return Err(AnalyticsError::EmptyCell);
        }

        let mut days = BTreeSet::new();
        let mut first_visit_ms = i64::MAX;
        let mut last_visit_ms = i64::MIN;
        let (mut lat_sum, mut lon_sum) = (0.0, 0.0);
        for point in points {
            days.insert(utc_date(point.timestamp_ms)?);
            first_visit_ms = first_visit_ms.min(point.timestamp_ms);
            last_visit_ms = last_visit_ms.max(point.timestamp_ms);
            lat_sum += point.latitude;
            lon_sum += point.longitude;
        }
        let n = points.len() as f64;

        Ok(Self {
            total_visits: points.iter().filter(|p| p.source == Source::Visit).count(),
            point_count: points.len(),
            unique_days: days.len(),
            longest_streak: longest_streak(&days),
            dominant_semantic_type: dominant_label(points),
            first_visit_ms,
            last_visit_ms,
            centroid_latitude: lat_sum / n,
            centroid_longitude: lon_sum / n,
        })
    }
}

fn utc_date(timestamp_ms: i64) -> Result<NaiveDate, AnalyticsError> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.date_naive())
        .ok_or(AnalyticsError::TimestampOutOfRange(timestamp_ms))
}

/// Length of the longest run of consecutive dates.
pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        current = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

/// Label with the highest positive probability; ties keep the earliest.
/// Without any probability, the first label in input order.
pub fn dominant_label(points: &[&PointRecord]) -> Option<String> {
    let mut best: Option<(&PointRecord, f64)> = None;
    for &point in points {
        let (Some(_), Some(p)) = (&point.semantic_type, point.probability) else {
            continue;
        };
        if p > best.map_or(0.0, |(_, bp)| bp) {
            best = Some((point, p));
        }
    }

    best.map(|(point, _)| point)
        .or_else(|| points.iter().copied().find(|p| p.semantic_type.is_some()))
        .and_then(PointRecord::display_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::timestamp::normalize_str;

    fn visit(date: &str, label: Option<&str>, probability: Option<f64>) -> PointRecord {
        PointRecord {
            latitude: 10.0,
            longitude: 20.0,
            timestamp_ms: normalize_str(date).unwrap(),
            place_id: Some("place".to_string()),
            semantic_type: label.map(str::to_string),
            probability,
            source: Source::Visit,
        }
    }

    #[test]
    fn test_streak_and_unique_days() {
        let points = [
            visit("2024-01-01T09:00:00Z", None, None),
            visit("2024-01-02T09:00:00Z", None, None),
            visit("2024-01-02T18:00:00Z", None, None),
            visit("2024-01-03T09:00:00Z", None, None),
            visit("2024-01-10T09:00:00Z", None, None),
        ];
        let refs: Vec<&PointRecord> = points.iter().collect();
        let stats = VisitStats::compute(&refs).unwrap();
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.unique_days, 4);
        assert_eq!(stats.total_visits, 5);
        assert_eq!(stats.first_visit_ms, points[0].timestamp_ms);
        assert_eq!(stats.last_visit_ms, points[4].timestamp_ms);
    }

    #[test]
    fn test_streak_across_month_and_utc_days() {
        let points = [
            visit("2024-01-31T23:30:00Z", None, None),
            // 2024-02-01 in UTC although the local offset says otherwise
            visit("2024-01-31T22:00:00-03:00", None, None),
        ];
        let refs: Vec<&PointRecord> = points.iter().collect();
        let stats = VisitStats::compute(&refs).unwrap();
        assert_eq!(stats.unique_days, 2);
        assert_eq!(stats.longest_streak, 2);
    }

    #[test]
    fn test_visit_count_ignores_other_sources() {
        let mut activity = visit("2024-01-01T09:00:00Z", Some("WALKING"), None);
        activity.source = Source::Activity;
        activity.place_id = None;
        let mut path = visit("2024-01-01T10:00:00Z", None, None);
        path.source = Source::Path;
        let home = visit("2024-01-01T11:00:00Z", None, None);

        let stats = VisitStats::compute(&[&activity, &path, &home]).unwrap();
        assert_eq!(stats.total_visits, 1);
        assert_eq!(stats.point_count, 3);
        assert_eq!(stats.dominant_semantic_type.as_deref(), Some("Activity (WALKING)"));
    }

    #[test]
    fn test_dominant_label_by_probability() {
        let a = visit("2024-01-01T00:00:00Z", Some("Work"), Some(0.4));
        let b = visit("2024-01-01T00:00:00Z", Some("Inferred Home"), Some(0.9));
        let c = visit("2024-01-01T00:00:00Z", Some("Gym"), Some(0.9));
        assert_eq!(dominant_label(&[&a, &b, &c]).as_deref(), Some("Inferred Home"));
        assert_eq!(dominant_label(&[&c, &b, &a]).as_deref(), Some("Gym"));
    }

    #[test]
    fn test_dominant_label_fallback() {
        let unlabeled = visit("2024-01-01T00:00:00Z", None, Some(0.99));
        let first = visit("2024-01-01T00:00:00Z", Some("Cafe"), None);
        let zero = visit("2024-01-01T00:00:00Z", Some("Store"), Some(0.0));
        assert_eq!(dominant_label(&[&unlabeled, &first, &zero]).as_deref(), Some("Cafe"));
        assert_eq!(dominant_label(&[&unlabeled]), None);
    }

    #[test]
    fn test_centroid() {
        let mut a = visit("2024-01-01T00:00:00Z", None, None);
        a.latitude = 1.0;
        a.longitude = 3.0;
        let mut b = visit("2024-01-01T00:00:00Z", None, None);
        b.latitude = 2.0;
        b.longitude = 5.0;
        let stats = VisitStats::compute(&[&a, &b]).unwrap();
        assert_eq!(stats.centroid_latitude, 1.5);
        assert_eq!(stats.centroid_longitude, 4.0);
    }

    #[test]
    fn test_empty_cell_is_an_error() {
        assert_eq!(VisitStats::compute(&[]), Err(AnalyticsError::EmptyCell));
    }

    #[test]
    fn test_out_of_range_timestamp() {
        let mut point = visit("2024-01-01T00:00:00Z", None, None);
        point.timestamp_ms = i64::MAX;
        assert_eq!(
            VisitStats::compute(&[&point]),
            Err(AnalyticsError::TimestampOutOfRange(i64::MAX))
        );
    }
}
