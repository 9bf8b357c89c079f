use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;

use crate::error::{HistoryError, Result};
use crate::history::PointRecord;

/// Period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    #[default]
    Monthly,
    Yearly,
}

impl FromStr for Grouping {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Grouping::Monthly),
            "yearly" | "year" => Ok(Grouping::Yearly),
            other => Err(HistoryError::config(format!(
                "unknown time grouping '{other}', expected monthly or yearly"
            ))),
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Monthly => f.write_str("monthly"),
            Grouping::Yearly => f.write_str("yearly"),
        }
    }
}

/// A calendar month or year in UTC. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    pub year: i32,
    /// `None` for yearly periods
    pub month: Option<u32>,
}

impl PeriodKey {
    pub fn month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
        }
    }

    pub fn year(year: i32) -> Self {
        Self { year, month: None }
    }

    /// The period containing `timestamp_ms`, if it is a representable date.
    pub fn of(timestamp_ms: i64, grouping: Grouping) -> Option<Self> {
        let date = DateTime::from_timestamp_millis(timestamp_ms)?.date_naive();
        Some(match grouping {
            Grouping::Monthly => Self::month(date.year(), date.month()),
            Grouping::Yearly => Self::year(date.year()),
        })
    }

    pub fn grouping(&self) -> Grouping {
        match self.month {
            Some(_) => Grouping::Monthly,
            None => Grouping::Yearly,
        }
    }

    /// The period immediately after this one.
    pub fn next(&self) -> Self {
        match self.month {
            Some(12) => Self::month(self.year.saturating_add(1), 1),
            Some(m) => Self::month(self.year, m + 1),
            None => Self::year(self.year.saturating_add(1)),
        }
    }

    /// First millisecond of the period (inclusive).
    pub fn start_ms(&self) -> i64 {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(i64::MAX, |dt| dt.and_utc().timestamp_millis())
    }

    /// First millisecond of the next period (exclusive).
    pub fn end_ms(&self) -> i64 {
        self.next().start_ms()
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        (self.start_ms()..self.end_ms()).contains(&timestamp_ms)
    }

    /// "MM/YYYY" for months, "YYYY" for years.
    pub fn label(&self) -> String {
        match self.month {
            Some(m) => format!("{m:02}/{:04}", self.year),
            None => format!("{:04}", self.year),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for PeriodKey {
    type Err = HistoryError;

    /// Accepts "YYYY", "YYYY-MM" and "MM/YYYY".
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || HistoryError::InvalidRange(format!("cannot parse period '{s}'"));
        let number = |part: &str| part.parse::<i32>().map_err(|_| invalid());

        let (year, month) = if let Some((year, month)) = s.split_once('-') {
            (number(year)?, Some(number(month)?))
        } else if let Some((month, year)) = s.split_once('/') {
            (number(year)?, Some(number(month)?))
        } else {
            (number(s)?, None)
        };

        if !(NaiveDate::MIN.year()..=NaiveDate::MAX.year()).contains(&year) {
            return Err(HistoryError::InvalidRange(format!(
                "year {year} is outside the supported calendar range"
            )));
        }

        match month {
            Some(m) if (1..=12).contains(&m) => Ok(Self::month(year, m as u32)),
            Some(_) => Err(invalid()),
            None => Ok(Self::year(year)),
        }
    }
}

/// Points falling in one period.
#[derive(Debug, Clone)]
pub struct PeriodBucket<'a> {
    pub key: PeriodKey,
    pub label: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub points: Vec<&'a PointRecord>,
}

impl<'a> PeriodBucket<'a> {
    fn empty(key: PeriodKey) -> Self {
        Self {
            key,
            label: key.label(),
            start_ms: key.start_ms(),
            end_ms: key.end_ms(),
            points: Vec::new(),
        }
    }

    pub fn summary(&self) -> PeriodSummary {
        let first_ms = self.points.iter().map(|p| p.timestamp_ms).min();
        let last_ms = self.points.iter().map(|p| p.timestamp_ms).max();
        let range_label = match (first_ms, last_ms) {
            (Some(first), Some(last)) => format!("{} to {}", day(first), day(last)),
            _ => "no data".to_string(),
        };
        PeriodSummary {
            label: self.label.clone(),
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            count: self.points.len(),
            first_ms,
            last_ms,
            range_label,
        }
    }
}

fn day(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Serializable description of a bucket, without its points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub label: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub count: usize,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
    pub range_label: String,
}

/// Chronologically ordered, non-empty period buckets.
///
/// Built from scratch for every grouping; switching between monthly and
/// yearly never derives one index from the other.
#[derive(Debug, Clone)]
pub struct PeriodIndex<'a> {
    grouping: Grouping,
    buckets: Vec<PeriodBucket<'a>>,
}

impl<'a> PeriodIndex<'a> {
    pub fn build(points: impl IntoIterator<Item = &'a PointRecord>, grouping: Grouping) -> Self {
        let mut groups: BTreeMap<PeriodKey, Vec<&'a PointRecord>> = BTreeMap::new();
        for point in points {
            match PeriodKey::of(point.timestamp_ms, grouping) {
                Some(key) => groups.entry(key).or_default().push(point),
                None => warn!(
                    timestamp_ms = point.timestamp_ms,
                    "timestamp outside the calendar range, left out of the period index"
                ),
            }
        }

        let buckets = groups
            .into_iter()
            .map(|(key, points)| PeriodBucket {
                points,
                ..PeriodBucket::empty(key)
            })
            .collect();
        Self { grouping, buckets }
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn buckets(&self) -> &[PeriodBucket<'a>] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Earliest and latest non-empty periods.
    pub fn bounds(&self) -> Option<(PeriodKey, PeriodKey)> {
        Some((self.buckets.first()?.key, self.buckets.last()?.key))
    }

    pub fn position(&self, key: &PeriodKey) -> Option<usize> {
        self.buckets.binary_search_by(|b| b.key.cmp(key)).ok()
    }

    /// Exactly the points of the bucket at `position`.
    pub fn window(&self, position: usize) -> Option<&[&'a PointRecord]> {
        self.buckets.get(position).map(|b| b.points.as_slice())
    }

    /// Points of a contiguous run of buckets, combined into one view.
    pub fn range(&self, positions: RangeInclusive<usize>) -> Result<Vec<&'a PointRecord>> {
        let (start, end) = (*positions.start(), *positions.end());
        if start > end || end >= self.buckets.len() {
            return Err(HistoryError::InvalidRange(format!(
                "periods {start}..={end} with {} buckets available",
                self.buckets.len()
            )));
        }
        Ok(self.buckets[start..=end]
            .iter()
            .flat_map(|b| b.points.iter().copied())
            .collect())
    }

    /// Every period between the bounds, with empty buckets for gaps.
    pub fn dense(&self) -> Vec<PeriodBucket<'a>> {
        let Some((first, last)) = self.bounds() else {
            return Vec::new();
        };
        let mut filled = Vec::new();
        let mut present = self.buckets.iter().peekable();
        let mut key = first;
        while key <= last {
            match present.next_if(|b| b.key == key) {
                Some(bucket) => filled.push(bucket.clone()),
                None => filled.push(PeriodBucket::empty(key)),
            }
            key = key.next();
        }
        filled
    }

    pub fn summaries(&self) -> Vec<PeriodSummary> {
        self.buckets.iter().map(PeriodBucket::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(s: &str) -> i64 {
        crate::history::timestamp::normalize_str(s).unwrap()
    }

    #[test]
    fn test_period_key_bounds() {
        let jan = PeriodKey::month(2024, 1);
        assert_eq!(jan.start_ms(), ms("2024-01-01T00:00:00Z"));
        assert_eq!(jan.end_ms(), ms("2024-02-01T00:00:00Z"));
        assert_eq!(PeriodKey::month(2023, 12).next(), PeriodKey::month(2024, 1));
        assert_eq!(PeriodKey::year(2023).end_ms(), ms("2024-01-01T00:00:00Z"));
        assert_eq!(jan.label(), "01/2024");
        assert_eq!(PeriodKey::year(2024).label(), "2024");
    }

    #[test]
    fn test_month_boundary_exactness() {
        let last_of_jan = PointRecord::path(0.0, 0.0, ms("2024-02-01T00:00:00Z") - 1);
        let first_of_feb = PointRecord::path(0.0, 0.0, ms("2024-02-01T00:00:00Z"));
        let points = [last_of_jan, first_of_feb];
        let index = PeriodIndex::build(&points, Grouping::Monthly);

        assert_eq!(index.len(), 2);
        let jan = index.position(&PeriodKey::month(2024, 1)).unwrap();
        let feb = index.position(&PeriodKey::month(2024, 2)).unwrap();
        assert_eq!(index.window(jan).unwrap().len(), 1);
        assert_eq!(index.window(jan).unwrap()[0].timestamp_ms, points[0].timestamp_ms);
        assert_eq!(index.window(feb).unwrap()[0].timestamp_ms, points[1].timestamp_ms);
        for bucket in index.buckets() {
            assert!(bucket.points.iter().all(|p| bucket.key.contains(p.timestamp_ms)));
        }
    }

    #[test]
    fn test_buckets_sorted_and_gaps_omitted() {
        let points = [
            PointRecord::path(0.0, 0.0, ms("2024-05-10T00:00:00Z")),
            PointRecord::path(0.0, 0.0, ms("2023-11-02T00:00:00Z")),
            PointRecord::path(0.0, 0.0, ms("2024-01-15T00:00:00Z")),
            PointRecord::path(0.0, 0.0, ms("2024-05-20T00:00:00Z")),
        ];
        let index = PeriodIndex::build(&points, Grouping::Monthly);
        let labels: Vec<&str> = index.buckets().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["11/2023", "01/2024", "05/2024"]);
        assert_eq!(
            index.bounds(),
            Some((PeriodKey::month(2023, 11), PeriodKey::month(2024, 5)))
        );

        let dense = index.dense();
        assert_eq!(dense.len(), 7);
        assert_eq!(dense[1].label, "12/2023");
        assert!(dense[1].points.is_empty());
        assert_eq!(dense[6].points.len(), 2);

        let yearly = PeriodIndex::build(&points, Grouping::Yearly);
        let labels: Vec<&str> = yearly.buckets().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2023", "2024"]);
        assert_eq!(yearly.window(1).unwrap().len(), 3);
    }

    #[test]
    fn test_range_composes_buckets() {
        let points: Vec<PointRecord> = ["2024-01-05", "2024-02-05", "2024-03-05", "2024-04-05"]
            .iter()
            .map(|d| PointRecord::path(0.0, 0.0, ms(d)))
            .collect();
        let index = PeriodIndex::build(&points, Grouping::Monthly);
        assert_eq!(index.range(1..=2).unwrap().len(), 2);
        assert_eq!(index.range(0..=3).unwrap().len(), 4);
        assert!(matches!(index.range(2..=5), Err(HistoryError::InvalidRange(_))));
    }

    #[test]
    fn test_summary() {
        let points = [
            PointRecord::path(0.0, 0.0, ms("2024-01-28T10:00:00Z")),
            PointRecord::path(0.0, 0.0, ms("2024-01-03T10:00:00Z")),
        ];
        let index = PeriodIndex::build(&points, Grouping::Monthly);
        let summary = &index.summaries()[0];
        assert_eq!(summary.count, 2);
        assert_eq!(summary.range_label, "2024-01-03 to 2024-01-28");
        assert_eq!(summary.first_ms, Some(ms("2024-01-03T10:00:00Z")));
        assert!(PeriodIndex::build(&[], Grouping::Yearly).dense().is_empty());
    }

    #[test]
    fn test_parse_period_key() {
        assert_eq!("2024-03".parse::<PeriodKey>().unwrap(), PeriodKey::month(2024, 3));
        assert_eq!("03/2024".parse::<PeriodKey>().unwrap(), PeriodKey::month(2024, 3));
        assert_eq!("2024".parse::<PeriodKey>().unwrap(), PeriodKey::year(2024));
        assert!("2024-13".parse::<PeriodKey>().is_err());
        assert!("march".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn test_parse_rejects_years_outside_calendar() {
        for input in ["2147483647", "12/2147483647", "-2147483648-01", "300000"] {
            assert!(
                matches!(input.parse::<PeriodKey>(), Err(HistoryError::InvalidRange(_))),
                "{input} should be rejected"
            );
        }
        let last = NaiveDate::MAX.year();
        assert_eq!(last.to_string().parse::<PeriodKey>().unwrap(), PeriodKey::year(last));
        assert_eq!(PeriodKey::year(i32::MAX).next(), PeriodKey::year(i32::MAX));
        assert_eq!(PeriodKey::month(i32::MAX, 12).end_ms(), i64::MAX);
    }

    #[test]
    fn test_parse_grouping() {
        assert_eq!("Yearly".parse::<Grouping>().unwrap(), Grouping::Yearly);
        assert!("weekly".parse::<Grouping>().is_err());
    }
}
