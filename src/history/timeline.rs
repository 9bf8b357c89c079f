// Adapter for `timelineObjects` entries (placeVisit / activitySegment).

use serde_json::Value;

use super::coords::e7_pair;
use super::format::{EntryOutput, ExtractOptions, Extracted, SkipReason};
use super::point::{Semantics, Source, probability_value};
use super::segment::{PathFix, Segment};
use super::timestamp::first_field;

const START_KEYS: &[&str] = &["startTimestamp", "startTimestampMs"];
const END_KEYS: &[&str] = &["endTimestamp", "endTimestampMs"];

pub(crate) fn extract_entry(index: usize, entry: &Value, options: &ExtractOptions) -> Vec<Extracted> {
    let mut out = EntryOutput::new(index);

    if let Some(visit) = entry.get("placeVisit") {
        if options.include_visits {
            extract_place_visit(&mut out, visit);
        }
    } else if let Some(segment) = entry.get("activitySegment") {
        extract_activity_segment(&mut out, segment, options);
    } else {
        out.skip(
            SkipReason::MalformedEntry,
            "timeline object has neither placeVisit nor activitySegment",
        );
    }
    out.finish()
}

fn extract_place_visit(out: &mut EntryOutput, visit: &Value) {
    let location = visit.get("location").unwrap_or(&Value::Null);
    let duration = visit.get("duration").unwrap_or(&Value::Null);

    let semantics = Semantics {
        place_id: string_field(location, "placeId").or_else(|| string_field(visit, "placeId")),
        semantic_type: string_field(location, "semanticType")
            .or_else(|| string_field(visit, "semanticType")),
        probability: location
            .get("locationConfidence")
            .and_then(probability_value),
    };
    out.point(
        "placeVisit",
        e7_pair(location, "latitudeE7", "longitudeE7"),
        first_field(duration, START_KEYS),
        Source::Visit,
        &semantics,
    );
}

fn extract_activity_segment(out: &mut EntryOutput, segment: &Value, options: &ExtractOptions) {
    let duration = segment.get("duration").unwrap_or(&Value::Null);
    let start = first_field(duration, START_KEYS);
    let end = first_field(duration, END_KEYS);

    if options.include_activities {
        let activity_type = string_field(segment, "activityType");
        let semantics = Semantics {
            place_id: None,
            probability: activity_type
                .as_deref()
                .and_then(|kind| activity_probability(segment, kind)),
            semantic_type: Some(activity_type.unwrap_or_else(|| "Unknown".to_string())),
        };
        for (key, time) in [("startLocation", start.clone()), ("endLocation", end.clone())] {
            let coords = segment
                .get(key)
                .and_then(|loc| e7_pair(loc, "latitudeE7", "longitudeE7"));
            out.point(key, coords, time, Source::Activity, &semantics);
        }
    }

    if options.include_raw_path {
        let fixes = segment
            .get("simplifiedRawPath")
            .and_then(|raw| raw.get("points"))
            .or_else(|| {
                segment
                    .get("waypointPath")
                    .and_then(|path| path.get("waypoints"))
            })
            .and_then(Value::as_array);
        if let Some(fixes) = fixes {
            let mut path = Segment::new(
                start.and_then(Result::ok),
                end.and_then(Result::ok),
            );
            for fix in fixes {
                let Some((latitude, longitude)) = e7_pair(fix, "latE7", "lngE7") else {
                    out.skip(SkipReason::MissingCoordinates, "raw path point has no latE7/lngE7");
                    continue;
                };
                let timestamp_ms = match first_field(fix, &["timestamp", "timestampMs"]) {
                    Some(Ok(ts)) => Some(ts),
                    Some(Err(err)) => {
                        out.skip(SkipReason::UnparsableTimestamp, format!("raw path point: {err}"));
                        continue;
                    }
                    None => None,
                };
                path.path.push(PathFix {
                    latitude,
                    longitude,
                    timestamp_ms,
                });
            }
            out.path(&path, options.interpolate);
        }
    }
}

/// Confidence of the segment's chosen activity type among its candidates.
fn activity_probability(segment: &Value, kind: &str) -> Option<f64> {
    segment
        .get("activities")?
        .as_array()?
        .iter()
        .find(|candidate| candidate.get("activityType").and_then(Value::as_str) == Some(kind))
        .and_then(|candidate| candidate.get("probability"))
        .and_then(probability_value)
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}
