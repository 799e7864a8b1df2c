//! Freeze-window motion judging

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::player::Player;

/// Flat score awarded to every player who survives a freeze check
pub const DEFAULT_SURVIVAL_AWARD: u32 = 10;

/// Outcome for one judged player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionVerdict {
    pub player_id: Uuid,
    pub displacement: f32,
    pub eliminated: bool,
}

/// Result of one freeze check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionReport {
    pub verdicts: Vec<MotionVerdict>,
    /// Players still active after the check
    pub remaining_active: usize,
}

impl MotionReport {
    pub fn eliminated(&self) -> impl Iterator<Item = &MotionVerdict> {
        self.verdicts.iter().filter(|v| v.eliminated)
    }

    pub fn survivors(&self) -> impl Iterator<Item = &MotionVerdict> {
        self.verdicts.iter().filter(|v| !v.eliminated)
    }
}

/// Judges displacement against the freeze baseline
#[derive(Debug, Clone, Copy)]
pub struct MotionEvaluator {
    threshold: f32,
    survival_award: u32,
}

impl MotionEvaluator {
    pub fn new(threshold: f32, survival_award: u32) -> Self {
        Self {
            threshold,
            survival_award,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether a displacement exceeds the threshold (strictly)
    pub fn moved_too_much(&self, displacement: f32) -> bool {
        displacement > self.threshold
    }

    /// Judge every player in play. Each verdict depends only on that
    /// player's own displacement, so iteration order does not matter.
    pub fn evaluate(&self, players: &mut [Player]) -> MotionReport {
        let mut verdicts = Vec::new();

        for player in players.iter_mut().filter(|p| p.in_play()) {
            let displacement = player.displacement();
            let eliminated = self.moved_too_much(displacement);

            if eliminated {
                player.eliminate();
                info!(
                    player_id = %player.id,
                    displacement,
                    threshold = self.threshold,
                    "Player eliminated for moving"
                );
            } else {
                player.score = player.score.saturating_add(self.survival_award);
            }

            verdicts.push(MotionVerdict {
                player_id: player.id,
                displacement,
                eliminated,
            });
        }

        MotionReport {
            verdicts,
            remaining_active: players.iter().filter(|p| p.in_play()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Position, Rgb};

    fn player_moved(dx: f32) -> Player {
        let mut p = Player::new(Uuid::new_v4(), "p".into(), Rgb::new(200, 0, 0));
        p.observe(Position::new(100.0, 100.0));
        p.observe(Position::new(100.0 + dx, 100.0));
        p
    }

    #[test]
    fn zero_displacement_never_eliminates() {
        let eval = MotionEvaluator::new(0.0, 10);
        let mut players = vec![player_moved(0.0)];
        let report = eval.evaluate(&mut players);
        assert!(!players[0].eliminated);
        assert_eq!(report.remaining_active, 1);
    }

    #[test]
    fn threshold_boundary_is_strict() {
        let eval = MotionEvaluator::new(30.0, 10);
        let mut players = vec![player_moved(30.0), player_moved(30.5)];
        eval.evaluate(&mut players);
        assert!(!players[0].eliminated);
        assert!(players[1].eliminated);
        assert!(!players[1].active);
    }

    #[test]
    fn survivors_get_award_eliminated_do_not() {
        let eval = MotionEvaluator::new(30.0, 10);
        let mut players = vec![player_moved(5.0), player_moved(50.0)];
        let report = eval.evaluate(&mut players);
        assert_eq!(players[0].score, 10);
        assert_eq!(players[1].score, 0);
        assert_eq!(report.eliminated().count(), 1);
        assert_eq!(report.survivors().count(), 1);
        assert_eq!(report.remaining_active, 1);
    }

    #[test]
    fn already_eliminated_players_are_skipped() {
        let eval = MotionEvaluator::new(30.0, 10);
        let mut gone = player_moved(500.0);
        gone.eliminate();
        let mut players = vec![gone, player_moved(1.0)];
        let report = eval.evaluate(&mut players);
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(players[0].score, 0);
    }

    #[test]
    fn unobserved_player_is_not_judged_against_origin() {
        let eval = MotionEvaluator::new(15.0, 10);
        let mut hidden = Player::new(Uuid::new_v4(), "c".into(), Rgb::new(0, 0, 200));
        let mut players = vec![hidden.clone()];
        eval.evaluate(&mut players);
        assert!(!players[0].eliminated);

        // Seen for the first time far from the origin, then holds still
        hidden.observe(Position::new(260.0, 180.0));
        let mut players = vec![hidden];
        let report = eval.evaluate(&mut players);
        assert!(!players[0].eliminated);
        assert_eq!(report.verdicts[0].displacement, 0.0);
    }

    #[test]
    fn order_does_not_change_outcome() {
        let eval = MotionEvaluator::new(30.0, 10);
        let a = player_moved(10.0);
        let b = player_moved(40.0);
        let c = player_moved(29.0);

        let mut forward = vec![a.clone(), b.clone(), c.clone()];
        let mut reverse = vec![c, b, a];
        eval.evaluate(&mut forward);
        eval.evaluate(&mut reverse);

        for p in &forward {
            let q = reverse.iter().find(|q| q.id == p.id).unwrap();
            assert_eq!(p.eliminated, q.eliminated);
            assert_eq!(p.score, q.score);
        }
    }
}
