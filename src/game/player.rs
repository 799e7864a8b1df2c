//! Player registry entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vision::{Position, Rgb};

/// Player state (authoritative)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    /// Reference color the camera looks for
    pub color: Rgb,
    /// Color matcher threshold override for this player's target
    pub match_threshold: Option<f32>,

    // Game status
    pub active: bool,
    pub eliminated: bool,
    pub score: u32,

    // Tracking
    pub position: Position,
    /// Baseline captured at the start of the current phase window
    pub last_position: Position,
    /// Whether `position` has ever come from a real detection
    pub has_position: bool,
}

impl Player {
    pub fn new(id: Uuid, name: String, color: Rgb) -> Self {
        Self {
            id,
            name,
            color,
            match_threshold: None,
            active: true,
            eliminated: false,
            score: 0,
            position: Position::ORIGIN,
            last_position: Position::ORIGIN,
            has_position: false,
        }
    }

    /// In play: active and not yet eliminated
    pub fn in_play(&self) -> bool {
        self.active && !self.eliminated
    }

    /// Distance moved since the phase baseline; zero until first observed
    pub fn displacement(&self) -> f32 {
        if !self.has_position {
            return 0.0;
        }
        self.position.distance_to(&self.last_position)
    }

    /// Record a tracked position. The first observation also becomes the
    /// baseline, so a marker that appears mid-phase is not judged against
    /// the origin placeholder.
    pub(crate) fn observe(&mut self, position: Position) {
        if !self.has_position {
            self.last_position = position;
            self.has_position = true;
        }
        self.position = position;
    }

    pub(crate) fn eliminate(&mut self) {
        self.eliminated = true;
        self.active = false;
    }

    pub(crate) fn snapshot_baseline(&mut self) {
        self.last_position = self.position;
    }

    /// Back to a fresh, game-startable state
    pub(crate) fn reset(&mut self) {
        self.active = true;
        self.eliminated = false;
        self.score = 0;
        self.position = Position::ORIGIN;
        self.last_position = Position::ORIGIN;
        self.has_position = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elimination_deactivates() {
        let mut p = Player::new(Uuid::new_v4(), "A".into(), Rgb::new(255, 0, 0));
        assert!(p.in_play());
        p.eliminate();
        assert!(p.eliminated);
        assert!(!p.active);
        assert!(!p.in_play());
    }

    #[test]
    fn reset_clears_everything_but_identity() {
        let mut p = Player::new(Uuid::new_v4(), "A".into(), Rgb::new(255, 0, 0));
        p.score = 30;
        p.position = Position::new(5.0, 5.0);
        p.snapshot_baseline();
        p.eliminate();
        p.reset();
        assert!(p.in_play());
        assert_eq!(p.score, 0);
        assert_eq!(p.position, Position::ORIGIN);
        assert_eq!(p.last_position, Position::ORIGIN);
        assert_eq!(p.color, Rgb::new(255, 0, 0));
    }

    #[test]
    fn first_observation_seeds_the_baseline() {
        let mut p = Player::new(Uuid::new_v4(), "A".into(), Rgb::new(255, 0, 0));
        assert_eq!(p.displacement(), 0.0);

        p.observe(Position::new(260.0, 180.0));
        assert!(p.has_position);
        assert_eq!(p.last_position, Position::new(260.0, 180.0));
        assert_eq!(p.displacement(), 0.0);

        p.observe(Position::new(270.0, 180.0));
        assert_eq!(p.displacement(), 10.0);
    }
}
