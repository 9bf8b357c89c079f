use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{HistoryError, Result};
use crate::index::Grouping;

/// Upper bound for `spatial_precision`; finer grids exceed GPS accuracy.
pub const MAX_SPATIAL_PRECISION: u32 = 8;

/// Settings for one processing run.
///
/// Passed by reference into every component; nothing reads settings from
/// global state, so two files can be processed with different settings at
/// the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Period granularity for the temporal index
    pub time_grouping: Grouping,
    /// Maximum number of markers before decimation kicks in
    pub max_markers: usize,
    /// Cells with fewer points than this get no marker (heatmap unaffected)
    pub marker_min_visits: usize,
    /// Whether raw path fixes contribute to marker placement
    pub include_path_in_markers: bool,
    /// Fill missing path timestamps from segment boundaries and neighbours
    pub interpolate_missing_timestamps: bool,
    /// Decimal places used when rounding coordinates into cells
    pub spatial_precision: u32,

    pub include_visits: bool,
    pub include_activities: bool,
    pub include_raw_path: bool,
    /// Records per extraction batch
    pub batch_size: usize,
    /// Maximum number of points merged when a marker cluster is expanded
    pub cluster_aggregation_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_grouping: Grouping::Monthly,
            max_markers: 5000,
            marker_min_visits: 1,
            include_path_in_markers: false,
            interpolate_missing_timestamps: true,
            spatial_precision: 4,
            include_visits: true,
            include_activities: true,
            include_raw_path: true,
            batch_size: 10_000,
            cluster_aggregation_cap: 500,
        }
    }
}

impl Config {
    /// Loads a YAML configuration file. Keys not present keep their defaults.
    pub fn from_yaml_file(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_markers == 0 {
            return Err(HistoryError::config("maxMarkers must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(HistoryError::config("batchSize must be at least 1"));
        }
        if self.cluster_aggregation_cap == 0 {
            return Err(HistoryError::config(
                "clusterAggregationCap must be at least 1",
            ));
        }
        if self.spatial_precision > MAX_SPATIAL_PRECISION {
            return Err(HistoryError::config(format!(
                "spatialPrecision must be at most {MAX_SPATIAL_PRECISION}, got {}",
                self.spatial_precision
            )));
        }
        if !(self.include_visits || self.include_activities || self.include_raw_path) {
            return Err(HistoryError::config(
                "at least one of includeVisits, includeActivities, includeRawPath must be enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str("timeGrouping: yearly\nmaxMarkers: 20\n").unwrap();
        assert_eq!(config.time_grouping, Grouping::Yearly);
        assert_eq!(config.max_markers, 20);
        assert_eq!(config.spatial_precision, 4);
        assert!(config.interpolate_missing_timestamps);
        assert!(!config.include_path_in_markers);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = Config::from_yaml_str("maxMarker: 20\n");
        assert!(matches!(result, Err(HistoryError::Yaml(_))));
    }

    #[test]
    fn test_validation() {
        let config = Config {
            spatial_precision: 12,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HistoryError::Config(_))));

        let config = Config {
            max_markers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            include_visits: false,
            include_activities: false,
            include_raw_path: false,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "spatialPrecision: 3").unwrap();
        writeln!(file, "includePathInMarkers: true").unwrap();

        let path = Utf8Path::from_path(file.path()).unwrap();
        let config = Config::from_yaml_file(path).unwrap();
        assert_eq!(config.spatial_precision, 3);
        assert!(config.include_path_in_markers);
    }

    #[test]
    fn test_from_yaml_file_not_found() {
        let result = Config::from_yaml_file(Utf8Path::new("test_data/no_such_config.yaml"));
        assert!(matches!(result, Err(HistoryError::Io(_))));
    }
}
