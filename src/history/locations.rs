// Adapter for the raw `locations` export: one fix per entry, no semantics.

use serde_json::Value;

use super::coords::e7_pair;
use super::format::{EntryOutput, ExtractOptions, Extracted, SkipReason};
use super::point::{Semantics, Source};
use super::timestamp::first_field;

pub(crate) fn extract_entry(index: usize, entry: &Value, options: &ExtractOptions) -> Vec<Extracted> {
    let mut out = EntryOutput::new(index);
    if !entry.is_object() {
        out.skip(SkipReason::MalformedEntry, "location entry is not an object");
        return out.finish();
    }
    if !options.include_raw_path {
        return out.finish();
    }

    let coords = e7_pair(entry, "latitudeE7", "longitudeE7").or_else(|| {
        let lat = entry.get("latitude")?.as_f64()?;
        let lng = entry.get("longitude")?.as_f64()?;
        Some((lat, lng))
    });
    let time = first_field(entry, &["timestampMs", "timestamp"]);

    out.point("location", coords, time, Source::Path, &Semantics::default());
    out.finish()
}
