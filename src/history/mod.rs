pub mod coords;
pub mod format;
pub mod location_history;
mod locations;
pub mod point;
pub mod segment;
mod semantic;
mod timeline;
pub mod timestamp;

pub use format::{ExtractOptions, Extracted, Format, Skip, SkipReason, detect};
pub use location_history::LocationHistory;
pub use point::{PointRecord, Source};
pub use timestamp::UnparsableTimestamp;
