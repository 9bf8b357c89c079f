//! Location history normalization and spatial/temporal indexing.
//!
//! A run parses one export document, detects its schema, extracts a unified
//! stream of [`history::PointRecord`]s in batches and freezes them into a
//! time-sorted [`history::LocationHistory`]. Views over that snapshot feed
//! the period index, marker layer and per-cell visit statistics.

pub mod config;
pub mod error;
pub mod history;
pub mod index;
pub mod pipeline;
pub mod report;

pub use config::Config;
pub use error::{HistoryError, Result};
