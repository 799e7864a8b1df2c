//! Snapshot building for the render/UI layer

use crate::capture::CaptureStatus;
use crate::util::time::display_seconds;
use crate::ws::protocol::{GameSnapshot, PlayerSnapshot, ServerMsg};

use super::player::Player;
use super::round::GameState;

/// Decides when to publish snapshots and builds them
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase changes and eliminations)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(
        &self,
        tick: u64,
        game: &GameState,
        capture: CaptureStatus,
        tracking_enabled: bool,
    ) -> ServerMsg {
        ServerMsg::Snapshot(snapshot(tick, game, capture, tracking_enabled))
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.to_hex(),
            position: p.position,
            last_position: p.last_position,
            tracked: p.has_position,
            active: p.active,
            eliminated: p.eliminated,
            score: p.score,
        }
    }
}

/// Read-only view of the game state
pub fn snapshot(
    tick: u64,
    game: &GameState,
    capture: CaptureStatus,
    tracking_enabled: bool,
) -> GameSnapshot {
    let players = game.players().iter().map(PlayerSnapshot::from).collect();

    GameSnapshot {
        tick,
        phase: game.phase(),
        round: game.round(),
        time_remaining_ms: game.time_remaining_ms(),
        seconds_remaining: display_seconds(game.time_remaining_ms()),
        timer_active: game.timer_active(),
        difficulty: game.difficulty(),
        detection_threshold: game.detection_threshold(),
        players,
        leading_player: game.leading_player(),
        winner: game.winner(),
        capture,
        tracking_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Rgb;
    use uuid::Uuid;

    #[test]
    fn sends_every_interval_and_on_force() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut game = GameState::default();
        let id = Uuid::new_v4();
        game.add_player(id, "Ann".into(), Rgb::new(255, 0, 128)).unwrap();

        let snap = snapshot(7, &game, CaptureStatus::Pending, false);
        assert_eq!(snap.tick, 7);
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].color, "#ff0080");
        assert_eq!(snap.leading_player, Some(id));
        assert!(!snap.players[0].tracked);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "SETUP");
        assert_eq!(json["capture"]["state"], "pending");
    }
}
