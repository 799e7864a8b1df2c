//! Game phases, difficulty presets and the phase countdown

use serde::{Deserialize, Serialize};

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Registering players, no timer
    Setup,
    /// Green light: players may move
    Move,
    /// Red light: movement is judged when the countdown ends
    Freeze,
    /// Terminal until reset
    GameOver,
}

impl GamePhase {
    /// Whether a round is running
    pub fn in_round(&self) -> bool {
        matches!(self, GamePhase::Move | GamePhase::Freeze)
    }

    /// Whether the player registry may be edited
    pub fn accepts_registry_changes(&self) -> bool {
        matches!(self, GamePhase::Setup | GamePhase::GameOver)
    }
}

/// Difficulty preset selecting the elimination threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Allowed displacement during a freeze, in pixels
    pub fn detection_threshold(&self) -> f32 {
        match self {
            Difficulty::Easy => 50.0,
            Difficulty::Medium => 30.0,
            Difficulty::Hard => 15.0,
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Monotonic phase countdown in milliseconds
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimer {
    remaining_ms: u64,
    active: bool,
}

impl PhaseTimer {
    pub fn start(&mut self, duration_ms: u64) {
        self.remaining_ms = duration_ms;
        self.active = duration_ms > 0;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn clear(&mut self) {
        self.remaining_ms = 0;
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Count down by `elapsed_ms`, clamping at zero.
    ///
    /// Returns `true` exactly once: on the tick that reaches zero. The timer is
    /// already inactive when this returns, so the caller's transition cannot
    /// be re-triggered by a later tick.
    pub fn tick(&mut self, elapsed_ms: u64) -> bool {
        if !self.active {
            return false;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
        if self.remaining_ms == 0 {
            self.active = false;
            return true;
        }
        false
    }
}
