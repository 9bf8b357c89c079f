use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use super::analytics::{AnalyticsError, VisitStats};
use super::spatial::{CellKey, SpatialIndex};
use crate::config::Config;
use crate::history::{PointRecord, Source};

/// One clickable marker per selected cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub cell: CellKey,
    pub latitude: f64,
    pub longitude: f64,
    pub stats: VisitStats,
}

/// Popup content for an expanded cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub label: String,
    pub locations: usize,
    pub stats: VisitStats,
    pub omitted_points: usize,
}

/// Keeps every k-th item, `k = ceil(len / max)`, so at most `max` remain.
///
/// The caller supplies a stable order, which makes the selection
/// identical across runs on the same input.
pub fn decimate<T: Clone>(items: &[T], max: usize) -> Vec<T> {
    if items.len() <= max {
        return items.to_vec();
    }
    let step = items.len().div_ceil(max.max(1));
    items.iter().step_by(step).cloned().collect()
}

/// Marker set for one view of the data.
#[derive(Debug, Clone)]
pub struct MarkerLayer<'a> {
    index: SpatialIndex<'a>,
    markers: Vec<Marker>,
    /// Non-empty cells before decimation
    pub total_cells: usize,
    /// Cells dropped for having fewer than `marker_min_visits` points
    pub below_min_visits: usize,
    /// Cells whose statistics could not be computed
    pub failed_cells: usize,
}

impl<'a> MarkerLayer<'a> {
    pub fn build(points: &[&'a PointRecord], config: &Config) -> Self {
        let index = SpatialIndex::build(
            points
                .iter()
                .copied()
                .filter(|p| config.include_path_in_markers || p.source != Source::Path),
            config.spatial_precision,
        );

        let keys = index.sorted_keys();
        let total_cells = keys.len();
        let selected = decimate(&keys, config.max_markers);
        if selected.len() < total_cells {
            debug!(
                total_cells,
                kept = selected.len(),
                "decimated marker cells"
            );
        }

        let results: Vec<(CellKey, Option<Result<VisitStats, AnalyticsError>>)> = selected
            .par_iter()
            .map(|key| {
                let cell = index.get(key).unwrap_or(&[]);
                if cell.len() < config.marker_min_visits {
                    (*key, None)
                } else {
                    (*key, Some(VisitStats::compute(cell)))
                }
            })
            .collect();

        let mut markers = Vec::with_capacity(results.len());
        let mut below_min_visits = 0;
        let mut failed_cells = 0;
        for (cell, result) in results {
            match result {
                None => below_min_visits += 1,
                Some(Ok(stats)) => markers.push(Marker {
                    cell,
                    latitude: stats.centroid_latitude,
                    longitude: stats.centroid_longitude,
                    stats,
                }),
                Some(Err(err)) => {
                    failed_cells += 1;
                    warn!(%cell, "skipping marker: {err}");
                }
            }
        }

        Self {
            index,
            markers,
            total_cells,
            below_min_visits,
            failed_cells,
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn index(&self) -> &SpatialIndex<'a> {
        &self.index
    }

    /// Merges the cells under an expanded cluster into one summary.
    pub fn aggregate_cluster(
        &self,
        cells: &[CellKey],
        cap: usize,
    ) -> Result<ClusterSummary, AnalyticsError> {
        let aggregate = self.index.aggregate(cells, cap);
        let stats = VisitStats::compute(&aggregate.points)?;
        Ok(ClusterSummary {
            label: format!("{} Locations", aggregate.cells),
            locations: aggregate.cells,
            stats,
            omitted_points: aggregate.omitted,
        })
    }
}
