//! Game handle and the scheduler driving the timer and tracking ticks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::capture::{CaptureStatus, FrameSource, SharedFrameSource};
use crate::tracking::{PositionTracker, TrackingPipeline, VisionConfig};
use crate::vision::Rgb;
use crate::ws::protocol::{GameEvent, GameSnapshot, ServerMsg};

use super::phase::Difficulty;
use super::player::Player;
use super::round::{check_match_threshold, GameError, GameState, RoundConfig};
use super::snapshot::{snapshot, SnapshotBuilder};

/// Default patch radius for color calibration
pub const CALIBRATION_RADIUS: u32 = 6;

/// Enables and cancels the per-frame tracking callback
#[derive(Clone)]
pub struct TrackingControl {
    enabled: Arc<watch::Sender<bool>>,
}

impl TrackingControl {
    pub fn new(enabled: bool) -> Self {
        let (tx, _) = watch::channel(enabled);
        Self {
            enabled: Arc::new(tx),
        }
    }

    pub fn start(&self) {
        self.enabled.send_replace(true);
    }

    /// Cancel tracking; no frame is processed by a tick that starts after this
    pub fn stop(&self) {
        self.enabled.send_replace(false);
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }
}

/// Errors from player calibration
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("No camera frame available")]
    NoFrame,

    #[error("Point ({x}, {y}) is outside the frame")]
    OutOfFrame { x: u32, y: u32 },
}

/// Shared, cloneable access to the game for the HTTP/WS layer and the engine
#[derive(Clone)]
pub struct GameHandle {
    state: Arc<RwLock<GameState>>,
    tracker: Arc<PositionTracker>,
    frames: Arc<SharedFrameSource>,
    tracking: TrackingControl,
    msg_tx: broadcast::Sender<ServerMsg>,
    tick: Arc<AtomicU64>,
}

impl GameHandle {
    pub fn new(
        round_config: RoundConfig,
        tracker: Arc<PositionTracker>,
        frames: Arc<SharedFrameSource>,
    ) -> Self {
        let (msg_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(GameState::new(round_config))),
            tracker,
            frames,
            tracking: TrackingControl::new(true),
            msg_tx,
            tick: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> &Arc<RwLock<GameState>> {
        &self.state
    }

    pub fn tracker(&self) -> &Arc<PositionTracker> {
        &self.tracker
    }

    pub fn frames(&self) -> &Arc<SharedFrameSource> {
        &self.frames
    }

    pub fn tracking(&self) -> &TrackingControl {
        &self.tracking
    }

    /// Subscribe to snapshots and events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.msg_tx.subscribe()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let state = self.state.read();
        snapshot(
            self.tick.load(Ordering::Relaxed),
            &state,
            self.frames.status(),
            self.tracking.is_enabled(),
        )
    }

    pub(crate) fn publish(&self, events: Vec<GameEvent>) {
        for event in events {
            // No receivers is fine
            let _ = self.msg_tx.send(ServerMsg::Event { event });
        }
    }

    pub(crate) fn publish_msg(&self, msg: ServerMsg) {
        let _ = self.msg_tx.send(msg);
    }

    // ------------------------------------------------------------------
    // Player registry
    // ------------------------------------------------------------------

    pub fn add_player(&self, id: Uuid, name: String, color: Rgb) -> Result<Player, GameError> {
        self.register_player(id, name, color, None)
    }

    /// Add a player with an optional threshold override. Nothing is registered
    /// if the threshold is invalid.
    pub fn register_player(
        &self,
        id: Uuid,
        name: String,
        color: Rgb,
        match_threshold: Option<f32>,
    ) -> Result<Player, GameError> {
        check_match_threshold(match_threshold)?;
        let mut state = self.state.write();
        state.add_player(id, name, color)?;
        state.set_player_match_threshold(&id, match_threshold)?;
        state.player(&id).cloned().ok_or(GameError::PlayerNotFound(id))
    }

    pub fn remove_player(&self, id: &Uuid) -> Result<Player, GameError> {
        let mut state = self.state.write();
        let removed = state.remove_player(id)?;
        self.tracker.remove(id);
        Ok(removed)
    }

    pub fn set_player_match_threshold(
        &self,
        id: &Uuid,
        threshold: Option<f32>,
    ) -> Result<(), GameError> {
        self.state.write().set_player_match_threshold(id, threshold)
    }

    /// Sample the player's color from the current frame around (x, y)
    pub fn calibrate_player(
        &self,
        id: &Uuid,
        x: u32,
        y: u32,
        radius: Option<u32>,
    ) -> Result<Rgb, CalibrationError> {
        let frame = self.frames.latest().ok_or(CalibrationError::NoFrame)?;
        if x >= frame.width || y >= frame.height {
            return Err(CalibrationError::OutOfFrame { x, y });
        }
        let color = frame
            .average_color(x, y, radius.unwrap_or(CALIBRATION_RADIUS))
            .ok_or(CalibrationError::OutOfFrame { x, y })?;

        {
            let mut state = self.state.write();
            state.set_player_color(id, color)?;
            // Old track was locked to the previous color
            self.tracker.remove(id);
        }
        info!(player_id = %id, color = %color.to_hex(), "Player color calibrated");
        Ok(color)
    }

    pub fn set_difficulty(&self, difficulty: Difficulty) -> Result<(), GameError> {
        self.state.write().set_difficulty(difficulty)
    }

    pub fn set_detection_threshold(&self, px: f32) -> Result<(), GameError> {
        self.state.write().set_detection_threshold(px)
    }

    // ------------------------------------------------------------------
    // Game control
    // ------------------------------------------------------------------

    pub fn start_game(&self) -> Result<(), GameError> {
        let events = self.state.write().start_game()?;
        self.publish(events);
        Ok(())
    }

    pub fn reset_game(&self) {
        let event = {
            let mut state = self.state.write();
            let event = state.reset_game();
            self.tracker.clear();
            event
        };
        self.publish(vec![event]);
    }

    /// Advance the phase countdown by one timer tick
    pub fn tick_timer(&self, elapsed_ms: u64) -> Vec<GameEvent> {
        self.tick.fetch_add(1, Ordering::Relaxed);
        let events = self.state.write().tick_timer(elapsed_ms);
        if !events.is_empty() {
            self.publish(events.clone());
        }
        events
    }
}

/// Scheduler for one game: timer ticks and tracking ticks on one task
pub struct GameEngine {
    handle: GameHandle,
    pipeline: TrackingPipeline,
    timer_tick: Duration,
    tracking_period: Duration,
    snapshot_builder: SnapshotBuilder,
}

impl GameEngine {
    pub fn new(
        handle: GameHandle,
        vision: VisionConfig,
        timer_tick: Duration,
        tracking_period: Duration,
        snapshot_interval_ticks: u32,
    ) -> Self {
        let pipeline = TrackingPipeline::new(vision, handle.tracker().clone());
        Self {
            handle,
            pipeline,
            timer_tick,
            tracking_period,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval_ticks),
        }
    }

    /// Run until `shutdown` fires
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            timer_tick_ms = self.timer_tick.as_millis() as u64,
            tracking_period_ms = self.tracking_period.as_millis() as u64,
            "Game engine started"
        );

        let tick_ms = self.timer_tick.as_millis() as u64;
        // First countdown step lands one full tick after start
        let mut timer_interval = interval_at(Instant::now() + self.timer_tick, self.timer_tick);
        // Missed countdown ticks are caught up so the clock stays monotonic
        timer_interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut tracking_interval = interval(self.tracking_period);
        tracking_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tracking_rx = self.handle.tracking().subscribe();
        let mut tracking_enabled = *tracking_rx.borrow_and_update();
        let mut last_capture = self.handle.frames().status();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Game engine shutting down");
                    break;
                }

                changed = tracking_rx.changed() => {
                    if changed.is_err() {
                        // Control dropped; keep the timer running without tracking
                        tracking_enabled = false;
                        continue;
                    }
                    tracking_enabled = *tracking_rx.borrow_and_update();
                    if tracking_enabled {
                        tracking_interval.reset();
                    }
                    info!(enabled = tracking_enabled, "Tracking toggled");
                }

                _ = timer_interval.tick() => {
                    let events = self.handle.tick_timer(tick_ms);
                    if !events.is_empty() {
                        self.snapshot_builder.force_next();
                    }

                    let capture = self.handle.frames().status();
                    if capture != last_capture {
                        self.handle.publish(vec![GameEvent::CaptureChanged { status: capture.clone() }]);
                        self.snapshot_builder.force_next();
                        last_capture = capture;
                    }

                    if self.snapshot_builder.should_send() {
                        let msg = {
                            let state = self.handle.state().read();
                            self.snapshot_builder.build(
                                self.handle.tick.load(Ordering::Relaxed),
                                &state,
                                last_capture.clone(),
                                tracking_enabled,
                            )
                        };
                        self.handle.publish_msg(msg);
                    }
                }

                _ = tracking_interval.tick(), if tracking_enabled => {
                    self.tracking_tick();
                }
            }
        }
    }

    /// One isolated tracking tick; never propagates failures into the loop
    pub fn tracking_tick(&mut self) {
        // Re-check at execution time so stop() is honoured immediately
        if !self.handle.tracking().is_enabled() {
            return;
        }
        if let CaptureStatus::Unavailable { .. } = self.handle.frames().status() {
            return;
        }

        let frames = self.handle.frames().clone();
        match self.pipeline.tick(frames.as_ref(), self.handle.state()) {
            Ok(outcome) => debug!(?outcome, "Tracking tick"),
            Err(e) => error!(error = %e, "Tracking tick failed, continuing"),
        }
    }
}
