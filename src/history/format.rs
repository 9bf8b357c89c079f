use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use super::point::{PointRecord, Semantics, Source, valid_coordinates};
use super::segment::Segment;
use super::timestamp::UnparsableTimestamp;
use super::{locations, semantic, timeline};
use crate::config::Config;
use crate::error::{HistoryError, Result};

/// The known export schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// `{"locations": [...]}` raw fixes with E7 coordinates
    Locations,
    /// `{"semanticSegments": [...]}` newer on-device export
    SemanticSegments,
    /// `{"timelineObjects": [...]}` per-month Takeout files
    TimelineObjects,
    /// A bare array of visit/activity entries
    RootArray,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Locations => "locations-format",
            Format::SemanticSegments => "semantic-segments-format",
            Format::TimelineObjects => "timeline-objects-format",
            Format::RootArray => "root-array-format",
        };
        f.write_str(name)
    }
}

/// Inspects the top-level shape of a parsed document.
pub fn detect(doc: &Value) -> Result<Format> {
    match doc {
        Value::Object(map) => {
            if map.get("locations").is_some_and(Value::is_array) {
                Ok(Format::Locations)
            } else if map.contains_key("semanticSegments") {
                Ok(Format::SemanticSegments)
            } else if map.contains_key("timelineObjects") {
                Ok(Format::TimelineObjects)
            } else {
                let keys: Vec<&str> = map.keys().map(String::as_str).take(5).collect();
                Err(HistoryError::UnknownFormat(format!(
                    "object with keys [{}]",
                    keys.join(", ")
                )))
            }
        }
        Value::Array(items) => {
            let has_entries = items.iter().any(|item| {
                item.get("visit").is_some() || item.get("activity").is_some()
            });
            if has_entries {
                Ok(Format::RootArray)
            } else {
                Err(HistoryError::UnknownFormat(format!(
                    "array of {} items without visit or activity entries",
                    items.len()
                )))
            }
        }
        other => Err(HistoryError::UnknownFormat(format!(
            "top-level {} value",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Which record families to extract and whether to interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub include_visits: bool,
    pub include_activities: bool,
    pub include_raw_path: bool,
    pub interpolate: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ExtractOptions {
    fn from(config: &Config) -> Self {
        Self {
            include_visits: config.include_visits,
            include_activities: config.include_activities,
            include_raw_path: config.include_raw_path,
            interpolate: config.interpolate_missing_timestamps,
        }
    }
}

/// Why a record was left out of the point stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    MissingCoordinates,
    InvalidCoordinates,
    MissingTimestamp,
    UnparsableTimestamp,
    MalformedEntry,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::MissingCoordinates => "missing coordinates",
            SkipReason::InvalidCoordinates => "coordinates out of range",
            SkipReason::MissingTimestamp => "missing timestamp",
            SkipReason::UnparsableTimestamp => "unparsable timestamp",
            SkipReason::MalformedEntry => "malformed entry",
        };
        f.write_str(text)
    }
}

/// A skipped record and the index of the entry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub entry: usize,
    pub reason: SkipReason,
    pub detail: String,
}

pub type Extracted = std::result::Result<PointRecord, Skip>;

impl Format {
    /// Lazily extracts point records from a document of this format.
    pub fn records<'a>(
        self,
        doc: &'a Value,
        options: ExtractOptions,
    ) -> Box<dyn Iterator<Item = Extracted> + Send + 'a> {
        let (key, entries) = match self {
            Format::Locations => ("locations", doc.get("locations")),
            Format::SemanticSegments => ("semanticSegments", doc.get("semanticSegments")),
            Format::TimelineObjects => ("timelineObjects", doc.get("timelineObjects")),
            Format::RootArray => ("root", Some(doc)),
        };

        let Some(entries) = entries.and_then(Value::as_array) else {
            warn!("{key} is not an array, nothing to extract");
            return Box::new(std::iter::once(Err(Skip {
                entry: 0,
                reason: SkipReason::MalformedEntry,
                detail: format!("{key} is not an array"),
            })));
        };

        let extract: fn(usize, &Value, &ExtractOptions) -> Vec<Extracted> = match self {
            Format::Locations => locations::extract_entry,
            Format::SemanticSegments | Format::RootArray => semantic::extract_entry,
            Format::TimelineObjects => timeline::extract_entry,
        };

        Box::new(
            entries
                .iter()
                .enumerate()
                .flat_map(move |(index, entry)| extract(index, entry, &options)),
        )
    }
}

/// Collects the records produced from one entry.
pub(crate) struct EntryOutput {
    entry: usize,
    records: Vec<Extracted>,
}

impl EntryOutput {
    pub(crate) fn new(entry: usize) -> Self {
        Self {
            entry,
            records: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, reason: SkipReason, detail: impl Into<String>) {
        let detail = detail.into();
        if reason == SkipReason::MalformedEntry {
            warn!(entry = self.entry, "skipping malformed entry: {detail}");
        } else {
            debug!(entry = self.entry, %reason, "skipping record: {detail}");
        }
        self.records.push(Err(Skip {
            entry: self.entry,
            reason,
            detail,
        }));
    }

    /// Emits a single timestamped point, or the reason it can't be emitted.
    pub(crate) fn point(
        &mut self,
        what: &str,
        coords: Option<(f64, f64)>,
        time: Option<std::result::Result<i64, UnparsableTimestamp>>,
        source: Source,
        semantics: &Semantics,
    ) {
        let Some((latitude, longitude)) = coords else {
            self.skip(SkipReason::MissingCoordinates, format!("{what} has no coordinates"));
            return;
        };
        if !valid_coordinates(latitude, longitude) {
            self.skip(
                SkipReason::InvalidCoordinates,
                format!("{what} at ({latitude}, {longitude})"),
            );
            return;
        }
        let timestamp_ms = match time {
            Some(Ok(ts)) => ts,
            Some(Err(err)) => {
                self.skip(SkipReason::UnparsableTimestamp, format!("{what}: {err}"));
                return;
            }
            None => {
                self.skip(SkipReason::MissingTimestamp, format!("{what} has no timestamp"));
                return;
            }
        };

        let mut point = semantics.attach(PointRecord::path(latitude, longitude, timestamp_ms));
        point.source = source;
        self.records.push(Ok(point));
    }

    /// Emits the path fixes of a segment as plain `path` points.
    pub(crate) fn path(&mut self, segment: &Segment, interpolate: bool) {
        let times = segment.resolve_times(interpolate);
        for (fix, time) in segment.path.iter().zip(times) {
            if !valid_coordinates(fix.latitude, fix.longitude) {
                self.skip(
                    SkipReason::InvalidCoordinates,
                    format!("path fix at ({}, {})", fix.latitude, fix.longitude),
                );
                continue;
            }
            match time {
                Some(ts) => self
                    .records
                    .push(Ok(PointRecord::path(fix.latitude, fix.longitude, ts))),
                None => self.skip(
                    SkipReason::MissingTimestamp,
                    "path fix without timestamp context",
                ),
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn finish(self) -> Vec<Extracted> {
        self.records
    }
}
