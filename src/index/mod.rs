pub mod analytics;
pub mod markers;
pub mod playback;
pub mod spatial;
pub mod temporal;
pub mod view;

pub use analytics::{AnalyticsError, VisitStats};
pub use markers::{ClusterSummary, Marker, MarkerLayer, decimate};
pub use playback::{BLEND_FRAMES, Playback, blend, transition};
pub use spatial::{CellKey, SpatialIndex};
pub use temporal::{Grouping, PeriodBucket, PeriodIndex, PeriodKey, PeriodSummary};
pub use view::{TimeFilter, View};
