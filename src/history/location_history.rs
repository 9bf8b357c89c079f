// Location History Module
// Immutable, time-sorted snapshot of the unified point stream produced by a run.

use std::sync::Arc;

use super::point::{PointRecord, Source};

/// Holds a sorted collection of `PointRecord` instances for efficient querying.
///
/// Cloning is cheap; every clone shares the same read-only points, so filter
/// passes running against one snapshot always observe the same data.
#[derive(Debug, Clone)]
pub struct LocationHistory {
    /// Guaranteed to be sorted by `timestamp_ms`; ties keep extraction order.
    data: Arc<[PointRecord]>,
}

impl Default for LocationHistory {
    fn default() -> Self {
        Self::from_points(Vec::new())
    }
}

impl LocationHistory {
    pub fn from_points(mut points: Vec<PointRecord>) -> Self {
        // Input is not assumed sorted. A stable sort keeps runs deterministic.
        points.sort_by_key(|p| p.timestamp_ms);
        Self {
            data: points.into(),
        }
    }

    /// Combines snapshots from several files into one.
    pub fn merge(histories: impl IntoIterator<Item = LocationHistory>) -> Self {
        let points: Vec<PointRecord> = histories
            .into_iter()
            .flat_map(|h| h.data.to_vec())
            .collect();
        Self::from_points(points)
    }

    pub fn points(&self) -> &[PointRecord] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Points with `start_ms <= timestamp < end_ms`.
    pub fn between(&self, start_ms: i64, end_ms: i64) -> &[PointRecord] {
        if end_ms <= start_ms {
            return &[];
        }
        let lo = self.data.partition_point(|p| p.timestamp_ms < start_ms);
        let hi = self.data.partition_point(|p| p.timestamp_ms < end_ms);
        &self.data[lo..hi]
    }

    /// Earliest and latest timestamps in the snapshot.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        Some((self.data.first()?.timestamp_ms, self.data.last()?.timestamp_ms))
    }

    pub fn count_by_source(&self, source: Source) -> usize {
        self.data.iter().filter(|p| p.source == source).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_history() -> LocationHistory {
        LocationHistory::from_points(vec![
            PointRecord::path(3.0, 3.0, 300),
            PointRecord::path(1.0, 1.0, 100),
            PointRecord::path(4.0, 4.0, 400),
            PointRecord::path(2.0, 2.0, 200),
        ])
    }

    #[test]
    fn test_points_are_sorted() {
        let history = create_test_history();
        let timestamps: Vec<i64> = history.points().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, vec![100, 200, 300, 400]);
        assert_eq!(history.time_span(), Some((100, 400)));
    }

    #[test]
    fn test_stable_order_for_equal_timestamps() {
        let history = LocationHistory::from_points(vec![
            PointRecord::path(1.0, 0.0, 50),
            PointRecord::path(2.0, 0.0, 50),
            PointRecord::path(3.0, 0.0, 10),
        ]);
        let lats: Vec<f64> = history.points().iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_between_is_half_open() {
        let history = create_test_history();
        let ts = |slice: &[PointRecord]| slice.iter().map(|p| p.timestamp_ms).collect::<Vec<_>>();
        assert_eq!(ts(history.between(200, 400)), vec![200, 300]);
        assert_eq!(ts(history.between(0, 101)), vec![100]);
        assert_eq!(ts(history.between(401, 1000)), Vec::<i64>::new());
        assert!(history.between(300, 300).is_empty());
        assert!(history.between(400, 100).is_empty());
    }

    #[test]
    fn test_empty_history() {
        let history = LocationHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.time_span(), None);
        assert!(history.between(0, 10).is_empty());
    }

    #[test]
    fn test_merge() {
        let a = LocationHistory::from_points(vec![PointRecord::path(1.0, 1.0, 300)]);
        let b = LocationHistory::from_points(vec![
            PointRecord::path(2.0, 2.0, 100),
            PointRecord::path(3.0, 3.0, 200),
        ]);
        let merged = LocationHistory::merge([a, b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.points()[0].timestamp_ms, 100);
        assert_eq!(merged.count_by_source(Source::Path), 3);
    }
}
