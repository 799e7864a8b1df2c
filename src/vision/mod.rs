//! Color blob localization: pixel matching, frame scanning and clustering

pub mod cluster;
pub mod color;
pub mod frame;
pub mod scanner;

pub use cluster::{Cluster, ClusterLocator};
pub use color::{ColorMatcher, Rgb};
pub use frame::{Frame, FrameBuilder, FrameError};
pub use scanner::{ColorMatch, FrameScanner};

use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move `t` of the way toward `target`
    pub fn lerp(&self, target: &Position, t: f32) -> Position {
        Position {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }
}
