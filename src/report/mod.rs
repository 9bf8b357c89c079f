use camino::Utf8Path;
use serde::Serialize;
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::history::LocationHistory;
use crate::index::{Grouping, Marker, MarkerLayer, PeriodIndex, PeriodSummary, TimeFilter, View};
use crate::pipeline::RunSummary;

/// Marker bookkeeping for the selected view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerCounts {
    pub cells: usize,
    pub shown: usize,
    pub below_min_visits: usize,
    pub failed: usize,
}

/// Everything a map front end needs for one view of the merged history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub runs: Vec<RunSummary>,
    pub grouping: Grouping,
    /// Every period in the data span, empty ones included
    pub periods: Vec<PeriodSummary>,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub view: String,
    pub point_count: usize,
    /// `[latitude, longitude]` per point in the view
    pub heatmap: Vec<[f64; 2]>,
    pub markers: Vec<Marker>,
    pub marker_counts: MarkerCounts,
}

impl Report {
    pub fn build(
        runs: Vec<RunSummary>,
        history: &LocationHistory,
        config: &Config,
        filter: TimeFilter,
    ) -> Result<Self> {
        let periods = PeriodIndex::build(history.points(), config.time_grouping);
        let view = View::new(history, filter)?;
        let layer = MarkerLayer::build(&view.points, config);

        let (first_period, last_period) = match periods.bounds() {
            Some((first, last)) => (Some(first.label()), Some(last.label())),
            None => (None, None),
        };

        info!(
            view = %view.label,
            points = view.len(),
            markers = layer.markers().len(),
            "built report"
        );

        Ok(Self {
            runs,
            grouping: periods.grouping(),
            periods: periods.dense().iter().map(|b| b.summary()).collect(),
            first_period,
            last_period,
            point_count: view.len(),
            heatmap: view.heatmap(),
            marker_counts: MarkerCounts {
                cells: layer.total_cells,
                shown: layer.markers().len(),
                below_min_visits: layer.below_min_visits,
                failed: layer.failed_cells,
            },
            markers: layer.markers().to_vec(),
            view: view.label,
        })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn write_json(&self, path: &Utf8Path, pretty: bool) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json(pretty)?)?;
        Ok(())
    }
}
