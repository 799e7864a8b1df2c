//! Application state shared across routes

use std::sync::Arc;

use crate::capture::SharedFrameSource;
use crate::config::Config;
use crate::game::{GameEngine, GameHandle};
use crate::tracking::PositionTracker;
use crate::util::rate_limit::{create_limiter, Limiter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: GameHandle,
    pub frame_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Latest camera frame, fed by the capture client
        let frames = Arc::new(SharedFrameSource::new(
            config.frame_width,
            config.frame_height,
        ));

        // Per-player track table, shared by the engine and registry calls
        let tracker = Arc::new(PositionTracker::new(config.tracker_config()));

        let game = GameHandle::new(config.round_config(), tracker, frames);
        let frame_limiter = create_limiter(config.frame_ingest_rate);

        Self {
            config,
            game,
            frame_limiter,
        }
    }

    /// Build the engine that drives this state's game
    pub fn engine(&self) -> GameEngine {
        GameEngine::new(
            self.game.clone(),
            self.config.vision_config(),
            self.config.timer_tick(),
            self.config.tracking_period(),
            self.config.snapshot_interval_ticks,
        )
    }
}
