use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::history::PointRecord;

/// Grid cell identifier: coordinates rounded to `precision` decimal places.
///
/// Orders by latitude, then longitude, which gives the stable cell order
/// used for decimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    lat: i64,
    lon: i64,
    precision: u32,
}

impl CellKey {
    pub fn new(latitude: f64, longitude: f64, precision: u32) -> Self {
        let scale = scale(precision);
        Self {
            lat: (latitude * scale).round() as i64,
            lon: (longitude * scale).round() as i64,
            precision,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.lat as f64 / scale(self.precision)
    }

    pub fn longitude(&self) -> f64 {
        self.lon as f64 / scale(self.precision)
    }
}

fn scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.precision as usize;
        write!(f, "{:.p$},{:.p$}", self.latitude(), self.longitude())
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Points of several cells merged for a cluster popup.
#[derive(Debug, Clone)]
pub struct Aggregate<'a> {
    pub points: Vec<&'a PointRecord>,
    /// Number of non-empty cells that contributed
    pub cells: usize,
    /// Points left out because the cap was reached
    pub omitted: usize,
}

/// Coarse grid over a point set. Insert and lookup are O(1) amortized.
#[derive(Debug, Clone)]
pub struct SpatialIndex<'a> {
    precision: u32,
    cells: HashMap<CellKey, Vec<&'a PointRecord>>,
}

impl<'a> SpatialIndex<'a> {
    pub fn new(precision: u32) -> Self {
        Self {
            precision,
            cells: HashMap::new(),
        }
    }

    pub fn build(points: impl IntoIterator<Item = &'a PointRecord>, precision: u32) -> Self {
        let mut index = Self::new(precision);
        for point in points {
            index.insert(point);
        }
        index
    }

    pub fn insert(&mut self, point: &'a PointRecord) {
        let key = self.key_for(point.latitude, point.longitude);
        self.cells.entry(key).or_default().push(point);
    }

    pub fn key_for(&self, latitude: f64, longitude: f64) -> CellKey {
        CellKey::new(latitude, longitude, self.precision)
    }

    pub fn get(&self, key: &CellKey) -> Option<&[&'a PointRecord]> {
        self.cells.get(key).map(Vec::as_slice)
    }

    /// Points sharing the cell of the given coordinate.
    pub fn near(&self, latitude: f64, longitude: f64) -> &[&'a PointRecord] {
        self.get(&self.key_for(latitude, longitude)).unwrap_or(&[])
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn sorted_keys(&self) -> Vec<CellKey> {
        let mut keys: Vec<CellKey> = self.cells.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Unions the points of `keys` in the given order, stopping at `cap`.
    pub fn aggregate(&self, keys: &[CellKey], cap: usize) -> Aggregate<'a> {
        let mut points = Vec::new();
        let mut cells = 0;
        let mut omitted = 0;
        for key in keys {
            let Some(cell) = self.cells.get(key) else {
                continue;
            };
            cells += 1;
            let room = cap.saturating_sub(points.len());
            let taken = room.min(cell.len());
            points.extend_from_slice(&cell[..taken]);
            omitted += cell.len() - taken;
        }
        Aggregate {
            points,
            cells,
            omitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_points_share_a_cell() {
        let a = PointRecord::path(40.71231, -74.00602, 0);
        let b = PointRecord::path(40.71234, -74.00598, 0);
        assert!((a.latitude - b.latitude).abs() < 0.00005);
        let index = SpatialIndex::build([&a, &b], 4);
        assert_eq!(index.len(), 1);
        assert_eq!(index.near(40.7123, -74.0060).len(), 2);
    }

    #[test]
    fn test_points_a_cell_apart_differ() {
        let base = PointRecord::path(40.71231, -74.00602, 0);
        let north = PointRecord::path(40.71231 + 0.0001, -74.00602, 0);
        let east = PointRecord::path(40.71231, -74.00602 + 0.00012, 0);
        let index = SpatialIndex::build([&base, &north, &east], 4);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_key_display_and_coordinates() {
        let key = CellKey::new(-23.550_52, -46.633_308, 4);
        assert_eq!(key.to_string(), "-23.5505,-46.6333");
        assert!((key.latitude() + 23.5505).abs() < 1e-9);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"-23.5505,-46.6333\"");

        let coarse = CellKey::new(1.26, 2.0, 1);
        assert_eq!(coarse.to_string(), "1.3,2.0");
    }

    #[test]
    fn test_sorted_keys_are_stable() {
        let points: Vec<PointRecord> = [(3.0, 1.0), (1.0, 2.0), (1.0, 1.0), (2.0, 5.0)]
            .iter()
            .map(|&(lat, lon)| PointRecord::path(lat, lon, 0))
            .collect();
        let index = SpatialIndex::build(&points, 4);
        let order: Vec<(f64, f64)> = index
            .sorted_keys()
            .iter()
            .map(|k| (k.latitude(), k.longitude()))
            .collect();
        assert_eq!(order, vec![(1.0, 1.0), (1.0, 2.0), (2.0, 5.0), (3.0, 1.0)]);
        assert_eq!(index.point_count(), 4);
    }

    #[test]
    fn test_aggregate_respects_cap() {
        let points: Vec<PointRecord> = (0..5)
            .map(|i| PointRecord::path(10.0, 10.0, i))
            .chain((0..4).map(|i| PointRecord::path(20.0, 20.0, i)))
            .collect();
        let index = SpatialIndex::build(&points, 4);
        let keys = index.sorted_keys();

        let all = index.aggregate(&keys, 100);
        assert_eq!(all.points.len(), 9);
        assert_eq!(all.cells, 2);
        assert_eq!(all.omitted, 0);

        let capped = index.aggregate(&keys, 7);
        assert_eq!(capped.points.len(), 7);
        assert_eq!(capped.omitted, 2);
        assert_eq!(capped.cells, 2);

        let missing = index.aggregate(&[CellKey::new(0.0, 0.0, 4)], 7);
        assert!(missing.points.is_empty());
        assert_eq!(missing.cells, 0);
    }
}
