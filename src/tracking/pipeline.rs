//! Per-tick perception pipeline: scan -> cluster -> track -> publish

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::capture::FrameSource;
use crate::game::round::GameState;
use crate::vision::cluster::{DEFAULT_CLUSTER_RADIUS, MIN_MATCHES};
use crate::vision::color::DEFAULT_MATCH_THRESHOLD;
use crate::vision::scanner::{DEFAULT_PROXIMITY_BONUS, DEFAULT_STRIDE, DEFAULT_WINDOW_RADIUS};
use crate::vision::{ClusterLocator, ColorMatcher, Frame, FrameScanner, Position, Rgb};

use super::tracker::{PositionTracker, TrackOutcome};

/// Detection tunables
#[derive(Debug, Clone, Copy)]
pub struct VisionConfig {
    /// Default color distance threshold
    pub color_threshold: f32,
    /// Sampling stride in pixels
    pub stride: u32,
    /// Local search radius around the previous position
    pub window_radius: f32,
    /// Weight multiplier inside the local window
    pub proximity_bonus: f32,
    /// Cluster join radius
    pub cluster_radius: f32,
    /// Minimum matches for a detection
    pub min_matches: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            color_threshold: DEFAULT_MATCH_THRESHOLD,
            stride: DEFAULT_STRIDE,
            window_radius: DEFAULT_WINDOW_RADIUS,
            proximity_bonus: DEFAULT_PROXIMITY_BONUS,
            cluster_radius: DEFAULT_CLUSTER_RADIUS,
            min_matches: MIN_MATCHES,
        }
    }
}

/// Errors isolated to a single tracking tick
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking tick panicked: {0}")]
    Panicked(String),
}

/// Why a tick did no work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Capture source not ready
    NotReady,
    /// Same frame as the previous tick
    DuplicateFrame,
    /// Nobody to track
    NoPlayers,
    /// Game was reset or a player removed/recolored while scanning
    StaleState,
}

/// What one tick accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Processed {
        frame_seq: u64,
        /// Players whose position was published
        updated: usize,
        /// Players with no detection and no prior
        lost: usize,
    },
}

/// One player's tracking target for this tick
#[derive(Debug, Clone, Copy)]
struct Target {
    id: Uuid,
    color: Rgb,
    threshold: f32,
}

/// Targets read under one lock, tagged with the state generation they belong to
struct Plan {
    generation: u64,
    targets: Vec<Target>,
}

/// Turns frames into published player positions
pub struct TrackingPipeline {
    config: VisionConfig,
    scanner: FrameScanner,
    locator: ClusterLocator,
    tracker: Arc<PositionTracker>,
    last_frame_seq: Option<u64>,
}

impl TrackingPipeline {
    pub fn new(config: VisionConfig, tracker: Arc<PositionTracker>) -> Self {
        Self {
            config,
            scanner: FrameScanner::new(
                config.stride,
                config.window_radius,
                config.proximity_bonus,
                config.min_matches,
            ),
            locator: ClusterLocator::new(config.cluster_radius, config.min_matches),
            tracker,
            last_frame_seq: None,
        }
    }

    pub fn tracker(&self) -> &Arc<PositionTracker> {
        &self.tracker
    }

    /// Raw blob center for one color, or `None`
    pub fn detect(
        &self,
        frame: &Frame,
        color: Rgb,
        threshold: f32,
        previous: Option<Position>,
    ) -> Option<Position> {
        let matcher = ColorMatcher::new(color, threshold);
        let scan = self.scanner.scan(frame, &matcher, previous);
        let found = self.locator.locate(&scan.matches);
        trace!(
            color = %color.to_hex(),
            matches = scan.matches.len(),
            sampled = scan.sampled,
            pass = ?scan.pass,
            found = found.is_some(),
            "Scanned frame"
        );
        found
    }

    /// Process one frame against every player in play
    pub fn process(&mut self, frame: Option<Frame>, game: &RwLock<GameState>) -> TickOutcome {
        let Some(frame) = frame else {
            return TickOutcome::Skipped(SkipReason::NotReady);
        };
        if self.last_frame_seq == Some(frame.seq) {
            return TickOutcome::Skipped(SkipReason::DuplicateFrame);
        }
        self.last_frame_seq = Some(frame.seq);

        let plan = self.plan(game);
        if plan.targets.is_empty() {
            return TickOutcome::Skipped(SkipReason::NoPlayers);
        }

        trace!(
            frame_seq = frame.seq,
            age_ms = (Utc::now() - frame.captured_at).num_milliseconds(),
            targets = plan.targets.len(),
            "Processing frame"
        );

        // Detection runs without holding the game lock
        let detections = self.detect_targets(&frame, &plan.targets);

        match self.commit(game, plan.generation, detections) {
            Some((updated, lost)) => TickOutcome::Processed {
                frame_seq: frame.seq,
                updated,
                lost,
            },
            None => TickOutcome::Skipped(SkipReason::StaleState),
        }
    }

    fn plan(&self, game: &RwLock<GameState>) -> Plan {
        let state = game.read();
        let targets = state
            .players()
            .iter()
            .filter(|p| p.in_play())
            .map(|p| Target {
                id: p.id,
                color: p.color,
                threshold: p.match_threshold.unwrap_or(self.config.color_threshold),
            })
            .collect();
        Plan {
            generation: state.generation(),
            targets,
        }
    }

    fn detect_targets(&self, frame: &Frame, targets: &[Target]) -> Vec<(Uuid, Option<Position>)> {
        targets
            .iter()
            .map(|t| {
                let previous = self.tracker.previous(&t.id);
                (t.id, self.detect(frame, t.color, t.threshold, previous))
            })
            .collect()
    }

    /// Feed detections to the tracker and publish positions. Both happen under
    /// the game write lock, and nothing is applied if the state generation moved
    /// since the targets were read. Returns `(updated, lost)`.
    fn commit(
        &self,
        game: &RwLock<GameState>,
        generation: u64,
        detections: Vec<(Uuid, Option<Position>)>,
    ) -> Option<(usize, usize)> {
        let mut state = game.write();
        if state.generation() != generation {
            debug!(
                planned = generation,
                current = state.generation(),
                "Discarding tracking results from before a state change"
            );
            return None;
        }

        let mut updated = 0;
        let mut lost = 0;
        for (id, detection) in detections {
            match self.tracker.update(id, detection) {
                TrackOutcome::Lost => lost += 1,
                outcome => {
                    if let Some(p) = outcome.position() {
                        if state.apply_tracked_position(&id, p) {
                            updated += 1;
                        }
                    }
                }
            }
        }
        Some((updated, lost))
    }

    /// Run one tick with panic isolation so a bad frame cannot stop the loop
    pub fn tick(
        &mut self,
        source: &dyn FrameSource,
        game: &RwLock<GameState>,
    ) -> Result<TickOutcome, TrackingError> {
        catch_unwind(AssertUnwindSafe(|| {
            let frame = source.latest();
            self.process(frame, game)
        }))
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TrackingError::Panicked(message)
        })
    }
}
