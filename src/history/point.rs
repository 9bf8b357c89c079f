use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of a point record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Visit,
    Activity,
    Path,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Visit => "visit",
            Source::Activity => "activity",
            Source::Path => "path",
        };
        f.write_str(name)
    }
}

/// A single geolocated, timestamped fix from the location history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    pub source: Source,
}

impl PointRecord {
    pub fn path(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            place_id: None,
            semantic_type: None,
            probability: None,
            source: Source::Path,
        }
    }

    /// The label shown for this point, if any.
    ///
    /// Activity endpoints carry their raw activity type and are rendered as
    /// `Activity (<type>)`.
    pub fn display_label(&self) -> Option<String> {
        let label = self.semantic_type.as_deref()?;
        if self.source == Source::Activity
            && self.place_id.is_none()
            && !label.starts_with("Activity (")
        {
            Some(format!("Activity ({label})"))
        } else {
            Some(label.to_string())
        }
    }
}

/// Semantic metadata shared by every point derived from one segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Semantics {
    pub place_id: Option<String>,
    pub semantic_type: Option<String>,
    pub probability: Option<f64>,
}

impl Semantics {
    pub fn attach(&self, mut point: PointRecord) -> PointRecord {
        point.place_id = self.place_id.clone();
        point.semantic_type = self.semantic_type.clone();
        point.probability = self.probability;
        point
    }
}

/// Reads a confidence score given as a number or numeric string.
/// Percentages (values above 1) are scaled down to [0, 1].
pub fn probability_value(value: &serde_json::Value) -> Option<f64> {
    let p = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !p.is_finite() || p < 0.0 {
        return None;
    }
    let p = if p > 1.0 { p / 100.0 } else { p };
    Some(p.min(1.0))
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label_for_activity() {
        let mut point = PointRecord::path(1.0, 2.0, 0);
        assert_eq!(point.display_label(), None);

        point.source = Source::Activity;
        point.semantic_type = Some("WALKING".to_string());
        assert_eq!(point.display_label().unwrap(), "Activity (WALKING)");

        point.semantic_type = Some("Activity (CYCLING)".to_string());
        assert_eq!(point.display_label().unwrap(), "Activity (CYCLING)");

        point.source = Source::Visit;
        point.semantic_type = Some("Work".to_string());
        assert_eq!(point.display_label().unwrap(), "Work");
    }

    #[test]
    fn test_semantics_attach() {
        let semantics = Semantics {
            place_id: Some("ChIJ123".to_string()),
            semantic_type: Some("Inferred Home".to_string()),
            probability: Some(0.8),
        };
        let point = semantics.attach(PointRecord::path(1.0, 2.0, 3));
        assert_eq!(point.place_id.as_deref(), Some("ChIJ123"));
        assert_eq!(point.probability, Some(0.8));
        // Source is left for the caller to set.
        assert_eq!(point.source, Source::Path);
    }

    #[test]
    fn test_valid_coordinates() {
        assert!(valid_coordinates(90.0, -180.0));
        assert!(!valid_coordinates(90.1, 0.0));
        assert!(!valid_coordinates(0.0, 180.5));
        assert!(!valid_coordinates(f64::NAN, 0.0));
    }

    #[test]
    fn test_probability_value() {
        use serde_json::json;
        assert_eq!(probability_value(&json!(0.75)), Some(0.75));
        assert_eq!(probability_value(&json!("0.5")), Some(0.5));
        assert_eq!(probability_value(&json!(80)), Some(0.8));
        assert_eq!(probability_value(&json!(250)), Some(1.0));
        assert_eq!(probability_value(&json!(-1)), None);
        assert_eq!(probability_value(&json!("high")), None);
    }

    #[test]
    fn test_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Activity).unwrap(), "\"activity\"");
        assert_eq!(Source::Path.to_string(), "path");
    }
}
