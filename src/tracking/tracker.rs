//! Per-player temporal smoothing with an outlier jump guard

use dashmap::DashMap;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::vision::Position;

/// Smoothing and outlier-rejection tunables
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Blend factor toward the new detection (lower = smoother)
    pub alpha: f32,
    /// Largest smoothed step accepted per frame, in pixels
    pub max_jump: f32,
    /// Fraction of the way to move toward a rejected detection
    pub reject_nudge: f32,
    /// Distance under which the track snaps onto the detection
    pub snap_distance: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.22,
            max_jump: 120.0,
            reject_nudge: 0.05,
            snap_distance: 0.5,
        }
    }
}

/// Tracking memory for one player
#[derive(Debug, Clone, Default)]
pub struct TrackState {
    pub previous_position: Option<Position>,
    pub accepted: u64,
    pub rejected: u64,
    pub missed: u64,
}

/// Result of feeding one detection (or its absence) to the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackOutcome {
    /// First detection accepted as-is
    ColdStart(Position),
    /// Detection blended into the prior position
    Smoothed(Position),
    /// Detection treated as an outlier; position nudged toward it
    Rejected { position: Position, raw: Position },
    /// No detection; prior position kept
    Held(Position),
    /// No detection and no prior: nothing to report
    Lost,
}

impl TrackOutcome {
    /// The position to publish, if any
    pub fn position(&self) -> Option<Position> {
        match *self {
            TrackOutcome::ColdStart(p)
            | TrackOutcome::Smoothed(p)
            | TrackOutcome::Held(p)
            | TrackOutcome::Rejected { position: p, .. } => Some(p),
            TrackOutcome::Lost => None,
        }
    }
}

/// Owns the per-player `TrackState` table
pub struct PositionTracker {
    config: TrackerConfig,
    tracks: DashMap<Uuid, TrackState>,
}

impl PositionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: DashMap::new(),
        }
    }

    /// Prior smoothed position for a player
    pub fn previous(&self, player_id: &Uuid) -> Option<Position> {
        self.tracks
            .get(player_id)
            .and_then(|t| t.value().previous_position)
    }

    pub fn state(&self, player_id: &Uuid) -> Option<TrackState> {
        self.tracks.get(player_id).map(|t| t.value().clone())
    }

    /// Advance one player's track with this tick's detection
    pub fn update(&self, player_id: Uuid, detection: Option<Position>) -> TrackOutcome {
        let prior = self.previous(&player_id);
        let outcome = step(&self.config, prior, detection);

        match outcome {
            TrackOutcome::Lost => {
                trace!(player_id = %player_id, "No detection and no prior position");
            }
            TrackOutcome::Held(_) => {
                if let Some(mut track) = self.tracks.get_mut(&player_id) {
                    track.missed += 1;
                }
            }
            TrackOutcome::ColdStart(p) | TrackOutcome::Smoothed(p) => {
                let mut track = self.tracks.entry(player_id).or_default();
                track.previous_position = Some(p);
                track.accepted += 1;
            }
            TrackOutcome::Rejected { position, raw } => {
                debug!(
                    player_id = %player_id,
                    raw_x = raw.x,
                    raw_y = raw.y,
                    "Rejected implausible jump"
                );
                let mut track = self.tracks.entry(player_id).or_default();
                track.previous_position = Some(position);
                track.rejected += 1;
            }
        }

        outcome
    }

    /// Forget a player's track (player removed)
    pub fn remove(&self, player_id: &Uuid) {
        self.tracks.remove(player_id);
    }

    /// Forget all tracks (game reset)
    pub fn clear(&self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

/// Pure transition function for one tracking step
pub fn step(
    config: &TrackerConfig,
    prior: Option<Position>,
    detection: Option<Position>,
) -> TrackOutcome {
    match (prior, detection) {
        (None, Some(raw)) => TrackOutcome::ColdStart(raw),
        (Some(prior), None) => TrackOutcome::Held(prior),
        (None, None) => TrackOutcome::Lost,
        (Some(prior), Some(raw)) => {
            let smoothed = prior.lerp(&raw, config.alpha);

            if prior.distance_to(&smoothed) > config.max_jump {
                return TrackOutcome::Rejected {
                    position: prior.lerp(&raw, config.reject_nudge),
                    raw,
                };
            }

            if smoothed.distance_to(&raw) < config.snap_distance {
                TrackOutcome::Smoothed(raw)
            } else {
                TrackOutcome::Smoothed(smoothed)
            }
        }
    }
}
