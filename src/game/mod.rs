//! Game rules: players, phases, motion judging and the round state machine

pub mod engine;
pub mod motion;
pub mod phase;
pub mod player;
pub mod round;
pub mod snapshot;

pub use engine::{CalibrationError, GameEngine, GameHandle, TrackingControl};
pub use motion::{MotionEvaluator, MotionReport, MotionVerdict};
pub use phase::{Difficulty, GamePhase, PhaseTimer};
pub use player::Player;
pub use round::{GameError, GameState, RoundConfig};
