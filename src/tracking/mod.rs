//! Temporal tracking of detected blobs into stable player positions

pub mod pipeline;
pub mod tracker;

pub use pipeline::{SkipReason, TickOutcome, TrackingError, TrackingPipeline, VisionConfig};
pub use tracker::{PositionTracker, TrackOutcome, TrackState, TrackerConfig};
