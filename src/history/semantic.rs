// Adapter for semantic segment entries.
// Used for both the `semanticSegments` export and the bare root-array export,
// whose entries share the same visit / activity / timelinePath structure.

use serde_json::Value;

use super::coords::lat_lng_value;
use super::format::{EntryOutput, ExtractOptions, Extracted, SkipReason};
use super::point::{Semantics, Source, probability_value};
use super::segment::{PathFix, Segment};
use super::timestamp::{UnparsableTimestamp, first_field};

type TimeResult = Option<Result<i64, UnparsableTimestamp>>;

pub(crate) fn extract_entry(index: usize, entry: &Value, options: &ExtractOptions) -> Vec<Extracted> {
    let mut out = EntryOutput::new(index);
    if !entry.is_object() {
        out.skip(SkipReason::MalformedEntry, "segment is not an object");
        return out.finish();
    }

    let start = first_field(entry, &["startTime"]);
    let end = first_field(entry, &["endTime"]);
    let mut recognized = false;

    if let Some(visit) = entry.get("visit") {
        recognized = true;
        if options.include_visits {
            extract_visit(&mut out, visit, start.clone());
        }
    }
    if let Some(activity) = entry.get("activity") {
        recognized = true;
        if options.include_activities {
            extract_activity(&mut out, activity, start.clone(), end.clone());
        }
    }
    if let Some(path) = entry.get("timelinePath") {
        recognized = true;
        if options.include_raw_path {
            extract_path(&mut out, path, start, end, options.interpolate);
        }
    }

    if !recognized {
        out.skip(
            SkipReason::MalformedEntry,
            "segment has no visit, activity or timelinePath",
        );
    }
    out.finish()
}

fn extract_visit(out: &mut EntryOutput, visit: &Value, segment_start: TimeResult) {
    let candidate = visit.get("topCandidate").unwrap_or(&Value::Null);
    let coords = candidate.get("placeLocation").and_then(lat_lng_value);
    let time = first_field(visit, &["startTime"]).or(segment_start);

    let semantics = Semantics {
        place_id: string_field(candidate, &["placeId", "placeID"]),
        semantic_type: string_field(candidate, &["semanticType"]),
        probability: candidate
            .get("probability")
            .or_else(|| visit.get("probability"))
            .and_then(probability_value),
    };
    out.point("visit", coords, time, Source::Visit, &semantics);
}

fn extract_activity(
    out: &mut EntryOutput,
    activity: &Value,
    segment_start: TimeResult,
    segment_end: TimeResult,
) {
    let candidate = activity.get("topCandidate").unwrap_or(&Value::Null);
    let semantics = Semantics {
        place_id: None,
        semantic_type: Some(
            string_field(candidate, &["type"]).unwrap_or_else(|| "Unknown".to_string()),
        ),
        probability: candidate.get("probability").and_then(probability_value),
    };

    for (side, time_key, fallback) in [
        ("start", "startTime", segment_start),
        ("end", "endTime", segment_end),
    ] {
        let endpoint = activity.get(side);
        let coords = endpoint.and_then(lat_lng_value);
        let time = endpoint
            .and_then(|e| first_field(e, &["time"]))
            .or_else(|| first_field(activity, &[time_key]))
            .or(fallback);
        out.point(
            &format!("activity {side}"),
            coords,
            time,
            Source::Activity,
            &semantics,
        );
    }
}

fn extract_path(
    out: &mut EntryOutput,
    path: &Value,
    start: TimeResult,
    end: TimeResult,
    interpolate: bool,
) {
    let Some(fixes) = path.as_array() else {
        out.skip(SkipReason::MalformedEntry, "timelinePath is not an array");
        return;
    };

    let start_ms = start.and_then(Result::ok);
    let mut segment = Segment::new(start_ms, end.and_then(Result::ok));
    for fix in fixes {
        let Some((latitude, longitude)) = fix.get("point").and_then(lat_lng_value) else {
            out.skip(SkipReason::MissingCoordinates, "path fix has no point");
            continue;
        };
        let timestamp_ms = match first_field(fix, &["time", "timestamp"]) {
            Some(Ok(ts)) => Some(ts),
            Some(Err(err)) => {
                out.skip(SkipReason::UnparsableTimestamp, format!("path fix: {err}"));
                continue;
            }
            None => offset_from_start(fix, start_ms),
        };
        segment.path.push(PathFix {
            latitude,
            longitude,
            timestamp_ms,
        });
    }
    out.path(&segment, interpolate);
}

/// Android exports store path times as minutes after the segment start.
fn offset_from_start(fix: &Value, start_ms: Option<i64>) -> Option<i64> {
    let offset = fix.get("durationMinutesOffsetFromStartTime")?;
    let minutes = match offset {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let offset_ms = (minutes * 60_000.0).round();
    if !offset_ms.is_finite() || offset_ms < 0.0 || offset_ms >= i64::MAX as f64 {
        return None;
    }
    start_ms?.checked_add(offset_ms as i64)
}

fn string_field(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find_map(Value::as_str)
        .map(str::to_string)
}
