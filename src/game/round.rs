//! Round state machine: SETUP -> MOVE <-> FREEZE -> GAME_OVER

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::vision::{Position, Rgb};
use crate::ws::protocol::GameEvent;

use super::motion::{MotionEvaluator, DEFAULT_SURVIVAL_AWARD};
use super::phase::{Difficulty, GamePhase, PhaseTimer};
use super::player::Player;

/// Round timing and scoring configuration
#[derive(Debug, Clone, Copy)]
pub struct RoundConfig {
    /// Green light duration
    pub move_duration_ms: u64,
    /// Red light duration
    pub freeze_duration_ms: u64,
    /// Flat score for surviving a freeze check
    pub survival_award: u32,
    /// Round counter wraps back to 1 after this
    pub max_rounds: u32,
    /// Difficulty after a fresh start
    pub default_difficulty: Difficulty,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            move_duration_ms: 5_000,
            freeze_duration_ms: 3_000,
            survival_award: DEFAULT_SURVIVAL_AWARD,
            max_rounds: 20,
            default_difficulty: Difficulty::Medium,
        }
    }
}

/// Rejected game operations. A rejected call never changes state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Operation not allowed during {0:?}")]
    WrongPhase(GamePhase),

    #[error("Cannot start a game without players")]
    NoPlayers,

    #[error("Player {0} is already registered")]
    DuplicatePlayer(Uuid),

    #[error("Player {0} not found")]
    PlayerNotFound(Uuid),

    #[error("Invalid threshold {0}: must be a positive number")]
    InvalidThreshold(f32),
}

/// Authoritative game state (single owner, injected where needed)
#[derive(Debug, Clone)]
pub struct GameState {
    config: RoundConfig,
    phase: GamePhase,
    timer: PhaseTimer,
    round: u32,
    players: Vec<Player>,
    difficulty: Difficulty,
    threshold_override: Option<f32>,
    winner: Option<Uuid>,
    /// Bumped whenever in-flight tracking results become stale
    generation: u64,
}

impl GameState {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config,
            phase: GamePhase::Setup,
            timer: PhaseTimer::default(),
            round: 0,
            players: Vec::new(),
            difficulty: config.default_difficulty,
            threshold_override: None,
            winner: None,
            generation: 0,
        }
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn time_remaining_ms(&self) -> u64 {
        self.timer.remaining_ms()
    }

    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    /// Whether a round is running
    pub fn game_active(&self) -> bool {
        self.phase.in_round()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Effective elimination threshold in pixels
    pub fn detection_threshold(&self) -> f32 {
        self.threshold_override
            .unwrap_or_else(|| self.difficulty.detection_threshold())
    }

    pub fn winner(&self) -> Option<Uuid> {
        self.winner
    }

    /// Changes on reset, player removal and recolor. Tracking work started
    /// under an older generation must be discarded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.in_play()).count()
    }

    /// Highest-scoring player still in play; ties go to the earliest registered
    pub fn leading_player(&self) -> Option<Uuid> {
        let mut best: Option<&Player> = None;
        for p in self.players.iter().filter(|p| p.in_play()) {
            if best.map_or(true, |b| p.score > b.score) {
                best = Some(p);
            }
        }
        best.map(|p| p.id)
    }

    // ------------------------------------------------------------------
    // Player registry (SETUP / GAME_OVER only)
    // ------------------------------------------------------------------

    fn ensure_registry_open(&self) -> Result<(), GameError> {
        if self.phase.accepts_registry_changes() {
            Ok(())
        } else {
            Err(GameError::WrongPhase(self.phase))
        }
    }

    fn player_mut(&mut self, id: &Uuid) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or(GameError::PlayerNotFound(*id))
    }

    pub fn add_player(&mut self, id: Uuid, name: String, color: Rgb) -> Result<&Player, GameError> {
        self.ensure_registry_open()?;
        if self.player(&id).is_some() {
            return Err(GameError::DuplicatePlayer(id));
        }

        info!(player_id = %id, color = %color.to_hex(), "Player added");
        self.players.push(Player::new(id, name, color));
        Ok(&self.players[self.players.len() - 1])
    }

    pub fn remove_player(&mut self, id: &Uuid) -> Result<Player, GameError> {
        self.ensure_registry_open()?;
        let idx = self
            .players
            .iter()
            .position(|p| &p.id == id)
            .ok_or(GameError::PlayerNotFound(*id))?;

        info!(player_id = %id, "Player removed");
        self.generation += 1;
        Ok(self.players.remove(idx))
    }

    /// Replace a player's reference color (e.g. after calibration)
    pub fn set_player_color(&mut self, id: &Uuid, color: Rgb) -> Result<(), GameError> {
        self.ensure_registry_open()?;
        self.player_mut(id)?.color = color;
        self.generation += 1;
        Ok(())
    }

    /// Per-player color matcher threshold; `None` restores the default
    pub fn set_player_match_threshold(
        &mut self,
        id: &Uuid,
        threshold: Option<f32>,
    ) -> Result<(), GameError> {
        self.ensure_registry_open()?;
        check_match_threshold(threshold)?;
        self.player_mut(id)?.match_threshold = threshold;
        Ok(())
    }

    /// Select a preset; clears any operator-set threshold
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), GameError> {
        self.ensure_registry_open()?;
        self.difficulty = difficulty;
        self.threshold_override = None;
        info!(?difficulty, threshold = self.detection_threshold(), "Difficulty set");
        Ok(())
    }

    /// Operator-set elimination threshold overriding the preset
    pub fn set_detection_threshold(&mut self, px: f32) -> Result<(), GameError> {
        self.ensure_registry_open()?;
        if !px.is_finite() || px <= 0.0 {
            return Err(GameError::InvalidThreshold(px));
        }
        self.threshold_override = Some(px);
        info!(threshold = px, "Detection threshold set");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tracking writes
    // ------------------------------------------------------------------

    /// Publish a tracked position. Eliminated players stay frozen.
    pub fn apply_tracked_position(&mut self, id: &Uuid, position: Position) -> bool {
        match self.players.iter_mut().find(|p| &p.id == id) {
            Some(p) if !p.eliminated => {
                p.observe(position);
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    /// SETUP -> MOVE
    pub fn start_game(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != GamePhase::Setup {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.players.is_empty() {
            return Err(GameError::NoPlayers);
        }

        self.round = 1;
        self.winner = None;
        info!(players = self.players.len(), "Game started");
        Ok(vec![self.enter(GamePhase::Move)])
    }

    /// Any phase -> SETUP; players stay registered with fresh state
    pub fn reset_game(&mut self) -> GameEvent {
        info!(from = ?self.phase, "Game reset");
        self.phase = GamePhase::Setup;
        self.timer.clear();
        self.round = 0;
        self.winner = None;
        self.generation += 1;
        for p in &mut self.players {
            p.reset();
        }
        GameEvent::GameReset
    }

    /// Advance the countdown; runs at most one transition per call
    pub fn tick_timer(&mut self, elapsed_ms: u64) -> Vec<GameEvent> {
        if !self.game_active() {
            return Vec::new();
        }
        if !self.timer.tick(elapsed_ms) {
            return Vec::new();
        }

        match self.phase {
            GamePhase::Move => vec![self.enter(GamePhase::Freeze)],
            GamePhase::Freeze => self.finish_freeze(),
            other => {
                warn!(phase = ?other, "Timer expired outside a round");
                Vec::new()
            }
        }
    }

    /// Judge the freeze window and either end the game or start the next round
    fn finish_freeze(&mut self) -> Vec<GameEvent> {
        let evaluator = MotionEvaluator::new(self.detection_threshold(), self.config.survival_award);
        let report = evaluator.evaluate(&mut self.players);

        let mut events: Vec<GameEvent> = report
            .eliminated()
            .map(|v| GameEvent::PlayerEliminated {
                player_id: v.player_id,
                displacement: v.displacement,
                threshold: evaluator.threshold(),
            })
            .collect();

        if report.remaining_active <= 1 {
            self.phase = GamePhase::GameOver;
            self.timer.clear();
            self.winner = self.players.iter().find(|p| p.in_play()).map(|p| p.id);
            info!(winner = ?self.winner, round = self.round, "Game over");
            events.push(GameEvent::GameOver {
                winner: self.winner,
                round: self.round,
            });
            return events;
        }

        events.push(GameEvent::RoundSurvived {
            round: self.round,
            survivors: report.survivors().map(|v| v.player_id).collect(),
            award: self.config.survival_award,
        });

        self.round = if self.round >= self.config.max_rounds {
            1
        } else {
            self.round + 1
        };
        events.push(self.enter(GamePhase::Move));
        events
    }

    /// Enter MOVE or FREEZE: snapshot baselines and restart the countdown
    fn enter(&mut self, phase: GamePhase) -> GameEvent {
        let duration_ms = match phase {
            GamePhase::Move => self.config.move_duration_ms,
            GamePhase::Freeze => self.config.freeze_duration_ms,
            _ => 0,
        };

        for p in self.players.iter_mut().filter(|p| p.in_play()) {
            p.snapshot_baseline();
        }

        self.phase = phase;
        self.timer.start(duration_ms);
        debug!(?phase, round = self.round, duration_ms, "Phase entered");

        GameEvent::PhaseChanged {
            phase,
            round: self.round,
            duration_ms,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(RoundConfig::default())
    }
}

/// Per-player thresholds must be positive and finite
pub fn check_match_threshold(threshold: Option<f32>) -> Result<(), GameError> {
    match threshold {
        Some(t) if !t.is_finite() || t <= 0.0 => Err(GameError::InvalidThreshold(t)),
        _ => Ok(()),
    }
}
