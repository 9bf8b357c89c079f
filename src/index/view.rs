use chrono::DateTime;

use super::temporal::PeriodKey;
use crate::error::{HistoryError, Result};
use crate::history::{LocationHistory, PointRecord};

/// Which slice of the history a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFilter {
    #[default]
    All,
    Period(PeriodKey),
    /// Inclusive run of periods of the same grouping
    Periods { from: PeriodKey, to: PeriodKey },
    /// `start_ms <= t < end_ms`
    Between { start_ms: i64, end_ms: i64 },
}

impl TimeFilter {
    /// Half-open millisecond bounds, `None` for the whole history.
    pub fn bounds(&self) -> Result<Option<(i64, i64)>> {
        match *self {
            TimeFilter::All => Ok(None),
            TimeFilter::Period(key) => Ok(Some((key.start_ms(), key.end_ms()))),
            TimeFilter::Periods { from, to } => {
                if from.grouping() != to.grouping() {
                    return Err(HistoryError::InvalidRange(format!(
                        "cannot mix {} and {} periods",
                        from.grouping(),
                        to.grouping()
                    )));
                }
                if to < from {
                    return Err(HistoryError::InvalidRange(format!("{from} is after {to}")));
                }
                Ok(Some((from.start_ms(), to.end_ms())))
            }
            TimeFilter::Between { start_ms, end_ms } => {
                if end_ms < start_ms {
                    return Err(HistoryError::InvalidRange(format!(
                        "end {end_ms} precedes start {start_ms}"
                    )));
                }
                Ok(Some((start_ms, end_ms)))
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            TimeFilter::All => "All Time".to_string(),
            TimeFilter::Period(key) => key.label(),
            TimeFilter::Periods { from, to } if from == to => from.label(),
            TimeFilter::Periods { from, to } => format!("{from} - {to}"),
            TimeFilter::Between { start_ms, end_ms } => {
                format!("{} - {}", day(*start_ms), day(*end_ms))
            }
        }
    }
}

fn day(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map_or_else(|| timestamp_ms.to_string(), |dt| dt.format("%Y-%m-%d").to_string())
}

/// Read-only selection of points from one snapshot.
///
/// A fresh view is built for every filter change; nothing derived from an
/// earlier view is reused.
#[derive(Debug, Clone)]
pub struct View<'a> {
    pub label: String,
    pub filter: TimeFilter,
    pub points: Vec<&'a PointRecord>,
}

impl<'a> View<'a> {
    pub fn new(history: &'a LocationHistory, filter: TimeFilter) -> Result<Self> {
        let slice = match filter.bounds()? {
            None => history.points(),
            Some((start_ms, end_ms)) => history.between(start_ms, end_ms),
        };
        Ok(Self {
            label: filter.label(),
            filter,
            points: slice.iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `[latitude, longitude]` pairs for the heat layer.
    pub fn heatmap(&self) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|p| [p.latitude, p.longitude])
            .collect()
    }
}
