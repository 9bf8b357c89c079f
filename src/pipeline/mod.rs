use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{HistoryError, Result};
use crate::history::{
    ExtractOptions, Extracted, Format, LocationHistory, PointRecord, Skip, SkipReason, Source,
    detect,
};

/// Skipped records kept verbatim in the run summary.
pub const SAMPLE_LIMIT: usize = 5;

/// Shared flag checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Up to `batch_size` extracted records.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub index: usize,
    pub points: Vec<PointRecord>,
    pub skipped: Vec<Skip>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.points.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a lazy record stream into fixed-size batches.
pub struct Batches<'a> {
    records: Box<dyn Iterator<Item = Extracted> + Send + 'a>,
    size: usize,
    next_index: usize,
}

impl<'a> Batches<'a> {
    pub fn new(records: Box<dyn Iterator<Item = Extracted> + Send + 'a>, size: usize) -> Self {
        Self {
            records,
            size: size.max(1),
            next_index: 0,
        }
    }
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let mut batch = Batch {
            index: self.next_index,
            ..Default::default()
        };
        for record in self.records.by_ref().take(self.size) {
            match record {
                Ok(point) => batch.points.push(point),
                Err(skip) => batch.skipped.push(skip),
            }
        }
        if batch.is_empty() {
            return None;
        }
        self.next_index += 1;
        Some(batch)
    }
}

/// What happened while processing one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub source: String,
    pub format: Format,
    pub points: usize,
    pub by_source: BTreeMap<Source, usize>,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// First few skipped records
    pub samples: Vec<Skip>,
    pub batches: usize,
}

impl RunSummary {
    fn new(source: &str, format: Format) -> Self {
        Self {
            source: source.to_string(),
            format,
            points: 0,
            by_source: BTreeMap::new(),
            skipped: BTreeMap::new(),
            samples: Vec::new(),
            batches: 0,
        }
    }

    fn record(&mut self, batch: &Batch) {
        self.batches += 1;
        self.points += batch.points.len();
        for point in &batch.points {
            *self.by_source.entry(point.source).or_default() += 1;
        }
        for skip in &batch.skipped {
            *self.skipped.entry(skip.reason).or_default() += 1;
            if self.samples.len() < SAMPLE_LIMIT {
                self.samples.push(skip.clone());
            }
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn count(&self, source: Source) -> usize {
        self.by_source.get(&source).copied().unwrap_or(0)
    }

    pub fn unparsable_timestamps(&self) -> usize {
        self.skipped
            .get(&SkipReason::UnparsableTimestamp)
            .copied()
            .unwrap_or(0)
    }
}

/// A finished run: the immutable snapshot and its summary.
#[derive(Debug, Clone)]
pub struct Run {
    pub history: LocationHistory,
    pub summary: RunSummary,
}

/// Accumulates batches until the run is complete or abandoned.
struct Collector {
    points: Vec<PointRecord>,
    summary: RunSummary,
}

impl Collector {
    fn new(source: &str, format: Format) -> Self {
        Self {
            points: Vec::new(),
            summary: RunSummary::new(source, format),
        }
    }

    fn absorb(&mut self, batch: Batch) {
        debug!(
            batch = batch.index,
            points = batch.points.len(),
            skipped = batch.skipped.len(),
            "processed batch"
        );
        self.summary.record(&batch);
        self.points.extend(batch.points);
    }

    fn finish(self) -> Result<Run> {
        let summary = self.summary;
        if self.points.is_empty() {
            warn!(source = %summary.source, "no points extracted");
            return Err(HistoryError::NoPoints {
                skipped: summary.total_skipped(),
            });
        }
        info!(
            source = %summary.source,
            format = %summary.format,
            points = summary.points,
            skipped = summary.total_skipped(),
            "extraction finished"
        );
        if summary.unparsable_timestamps() > 0 {
            warn!(
                source = %summary.source,
                count = summary.unparsable_timestamps(),
                "records with unparsable timestamps were skipped"
            );
        }
        Ok(Run {
            history: LocationHistory::from_points(self.points),
            summary,
        })
    }
}

/// Drives format detection, extraction and batching for one document.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parse_str(content: &str) -> Result<Value> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn parse_bytes(content: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(content)?)
    }

    pub fn parse_reader(reader: impl Read) -> Result<Value> {
        Ok(serde_json::from_reader(reader)?)
    }

    fn read_file(path: &Utf8Path) -> Result<Value> {
        let file = File::open(path)?;
        Self::parse_reader(BufReader::new(file))
    }

    /// Detects the format and returns the batch stream over `doc`.
    pub fn batches<'a>(&self, doc: &'a Value) -> Result<(Format, Batches<'a>)> {
        let format = detect(doc)?;
        let records = format.records(doc, ExtractOptions::from(&self.config));
        Ok((format, Batches::new(records, self.config.batch_size)))
    }

    pub fn process_document(&self, source: &str, doc: &Value, cancel: &CancelToken) -> Result<Run> {
        let (format, batches) = self.batches(doc)?;
        info!(source, %format, "detected format");

        let mut collector = Collector::new(source, format);
        for batch in batches {
            if cancel.is_cancelled() {
                info!(source, "run cancelled");
                return Err(HistoryError::Cancelled);
            }
            collector.absorb(batch);
        }
        collector.finish()
    }

    /// Same as [`Pipeline::process_document`], yielding to the runtime
    /// between batches.
    pub async fn process_document_async(
        &self,
        source: &str,
        doc: &Value,
        cancel: &CancelToken,
    ) -> Result<Run> {
        let (format, batches) = self.batches(doc)?;
        info!(source, %format, "detected format");

        let mut collector = Collector::new(source, format);
        for batch in batches {
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                info!(source, "run cancelled");
                return Err(HistoryError::Cancelled);
            }
            collector.absorb(batch);
        }
        collector.finish()
    }

    pub fn process_str(&self, source: &str, content: &str, cancel: &CancelToken) -> Result<Run> {
        let doc = Self::parse_str(content)?;
        self.process_document(source, &doc, cancel)
    }

    pub fn process_bytes(&self, source: &str, content: &[u8], cancel: &CancelToken) -> Result<Run> {
        let doc = Self::parse_bytes(content)?;
        self.process_document(source, &doc, cancel)
    }

    pub fn process_file(&self, path: &Utf8Path, cancel: &CancelToken) -> Result<Run> {
        let doc = Self::read_file(path)?;
        self.process_document(path.as_str(), &doc, cancel)
    }

    pub async fn process_file_async(&self, path: &Utf8Path, cancel: &CancelToken) -> Result<Run> {
        let owned = path.to_owned();
        let doc = tokio::task::spawn_blocking(move || Self::read_file(&owned))
            .await
            .map_err(|e| HistoryError::Io(std::io::Error::other(e)))??;
        self.process_document_async(path.as_str(), &doc, cancel)
            .await
    }
}
