//! WebSocket protocol message definitions
//! These are the wire types between the game core and the render/UI layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CaptureStatus;
use crate::game::phase::{Difficulty, GamePhase};
use crate::vision::Position;

/// Messages sent from the UI to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask for a full snapshot right away
    RequestSnapshot,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from the server to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { server_time: u64 },

    /// Game state snapshot (sent at regular intervals)
    Snapshot(GameSnapshot),

    /// Discrete game event
    Event { event: GameEvent },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Full read-only view of the game for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Game loop tick number
    pub tick: u64,
    pub phase: GamePhase,
    pub round: u32,
    pub time_remaining_ms: u64,
    /// Countdown as shown to players, rounded up
    pub seconds_remaining: u64,
    pub timer_active: bool,
    pub difficulty: Difficulty,
    pub detection_threshold: f32,
    pub players: Vec<PlayerSnapshot>,
    pub leading_player: Option<Uuid>,
    pub winner: Option<Uuid>,
    pub capture: CaptureStatus,
    pub tracking_enabled: bool,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    /// Reference color as `#rrggbb`
    pub color: String,
    pub position: Position,
    pub last_position: Position,
    pub tracked: bool,
    pub active: bool,
    pub eliminated: bool,
    pub score: u32,
}

/// Game events (phase changes, eliminations, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Phase transition
    PhaseChanged {
        phase: GamePhase,
        round: u32,
        duration_ms: u64,
    },

    /// Player caught moving during a freeze
    PlayerEliminated {
        player_id: Uuid,
        displacement: f32,
        threshold: f32,
    },

    /// Freeze check passed without ending the game
    RoundSurvived {
        round: u32,
        survivors: Vec<Uuid>,
        award: u32,
    },

    /// Game finished
    GameOver { winner: Option<Uuid>, round: u32 },

    /// Game reset to setup
    GameReset,

    /// Camera readiness changed
    CaptureChanged { status: CaptureStatus },
}
