//! Bomb detonation: fuse scanning, blast geometry and damage

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::ws::protocol::ServerMsg;

use super::bomb::{Bomb, BombId};
use super::broadcast::broadcast_except;
use super::player::PlayerId;
use super::world::GameWorld;
use super::Position;

/// Longest blast ray a bomb may have
pub const MAX_FIRE_LENGTH: u32 = 64;

/// Tiles hit by a bomb: its own tile plus `fire_length` tiles along each
/// cardinal ray, capped at [`MAX_FIRE_LENGTH`]. Rays pass through blocking
/// tiles.
pub fn blast_points(center: Position, fire_length: u32) -> Vec<Position> {
    let reach = i32::try_from(fire_length.min(MAX_FIRE_LENGTH)).unwrap_or(0);
    let mut points = Vec::with_capacity(1 + 4 * reach as usize);
    points.push(center);
    for step in 1..=reach {
        points.push(center.offset(step, 0));
        points.push(center.offset(-step, 0));
        points.push(center.offset(0, step));
        points.push(center.offset(0, -step));
    }
    points
}

/// Outcome of one bomb going off
#[derive(Debug, Clone)]
pub struct Detonation {
    pub bomb_id: BombId,
    pub points: Vec<Position>,
    pub victims: Vec<PlayerId>,
}

/// Detonate every bomb whose fuse ran out at `now`.
///
/// A bomb is detonated only by the call that removed it from the registry, so
/// it goes off exactly once even if two scans overlap.
pub fn detonate_expired(world: &GameWorld, now: Instant) -> Vec<Detonation> {
    let mut detonations = Vec::new();

    for bomb in world.bombs.snapshot() {
        if !bomb.is_expired(now) {
            continue;
        }
        let Some(bomb) = world.bombs.remove(bomb.id) else {
            continue;
        };
        detonations.push(detonate(world, &bomb));
    }

    detonations
}

fn detonate(world: &GameWorld, bomb: &Bomb) -> Detonation {
    let points = blast_points(bomb.position, bomb.fire_length);
    let hit: HashSet<Position> = points.iter().copied().collect();

    let fired = ServerMsg::BombFired {
        id: bomb.id,
        x: bomb.position.x,
        y: bomb.position.y,
        fire_length: bomb.fire_length,
        points: points.iter().map(|p| [p.x, p.y]).collect(),
    };

    let mut victims = Vec::new();
    for player in world.players.snapshot() {
        let killed_at = {
            let mut state = player.lock();
            if state.alive && hit.contains(&state.position) {
                state.alive = false;
                state.online = false;
                Some(state.position)
            } else {
                None
            }
        };

        player.send_logged(fired.clone());

        if let Some(at) = killed_at {
            player.send_logged(ServerMsg::Dead);
            broadcast_except(
                &world.players,
                player.id(),
                &ServerMsg::PlayerDead {
                    id: player.id(),
                    x: at.x,
                    y: at.y,
                },
            );
            victims.push(player.id());
        }
    }

    info!(
        bomb_id = %bomb.id,
        owner = ?bomb.owner_id(),
        x = bomb.position.x,
        y = bomb.position.y,
        victims = victims.len(),
        "Bomb detonated"
    );

    Detonation {
        bomb_id: bomb.id,
        points,
        victims,
    }
}

/// Periodic task scanning for expired bombs
pub struct DetonationScheduler {
    world: Arc<GameWorld>,
    period: Duration,
}

impl DetonationScheduler {
    /// `period` is raised to 1 ms if zero; a tokio interval cannot tick at zero.
    pub fn new(world: Arc<GameWorld>, period: Duration) -> Self {
        Self {
            world,
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Run until the process exits
    pub async fn run(self) {
        info!(period_ms = self.period.as_millis() as u64, "Detonation scheduler started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let detonations = self.tick(Instant::now());
            if !detonations.is_empty() {
                debug!(count = detonations.len(), "Detonation tick");
            }
        }
    }

    pub fn tick(&self, now: Instant) -> Vec<Detonation> {
        detonate_expired(&self.world, now)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::game::broadcast::Outbound;
    use crate::game::player::{Player, PlayerState};
    use crate::game::world::GameRules;
    use crate::map::{MapStore, TileGrid};

    fn world() -> GameWorld {
        let mut maps = MapStore::new();
        maps.insert("001", TileGrid::from_rows(&["............"; 12]));
        GameWorld::new(maps, GameRules::default(), Some(1))
    }

    fn join(world: &GameWorld, x: i32, y: i32) -> (Arc<Player>, mpsc::Receiver<ServerMsg>) {
        let (outbound, rx) = Outbound::channel(16);
        let state = PlayerState::for_test(Position::new(x, y), Instant::now());
        let player = Arc::new(Player::new(Uuid::new_v4(), state, outbound));
        assert!(world.players.add(player.clone()));
        (player, rx)
    }

    fn place(world: &GameWorld, x: i32, y: i32, created_at: Instant) -> BombId {
        let bomb = Bomb {
            id: Uuid::new_v4(),
            position: Position::new(x, y),
            bomb_type: "001".to_string(),
            direction: 0,
            movement_delay: Duration::ZERO,
            created_at,
            fire_delay: Duration::from_millis(2000),
            fire_length: 3,
            owner: Weak::new(),
        };
        let id = bomb.id;
        world.bombs.add(Arc::new(bomb));
        id
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn blast_of_length_three_has_thirteen_points() {
        let center = Position::new(5, 5);
        let points: HashSet<Position> = blast_points(center, 3).into_iter().collect();
        assert_eq!(points.len(), 13);

        let mut expected = HashSet::from([center]);
        for k in 1..=3 {
            expected.insert(Position::new(5 + k, 5));
            expected.insert(Position::new(5 - k, 5));
            expected.insert(Position::new(5, 5 + k));
            expected.insert(Position::new(5, 5 - k));
        }
        assert_eq!(points, expected);
    }

    #[test]
    fn zero_length_blast_is_the_bomb_tile() {
        assert_eq!(blast_points(Position::new(1, 2), 0), vec![Position::new(1, 2)]);
    }

    #[test]
    fn bomb_waits_for_its_fuse() {
        let world = world();
        let t0 = Instant::now();
        place(&world, 5, 5, t0);

        assert!(detonate_expired(&world, t0 + Duration::from_millis(1500)).is_empty());
        assert!(detonate_expired(&world, t0 + Duration::from_millis(2000)).is_empty());
        assert_eq!(world.bombs.len(), 1);
    }

    #[test]
    fn blast_kills_in_range_and_spares_the_rest() {
        let world = world();
        let t0 = Instant::now();
        let (victim, mut victim_rx) = join(&world, 5, 8);
        let (survivor, mut survivor_rx) = join(&world, 5, 9);
        let bomb_id = place(&world, 5, 5, t0);

        let detonations = detonate_expired(&world, t0 + Duration::from_millis(2500));
        assert_eq!(detonations.len(), 1);
        assert_eq!(detonations[0].bomb_id, bomb_id);
        assert_eq!(detonations[0].victims, vec![victim.id()]);

        assert!(!victim.lock().alive);
        assert!(!victim.lock().online);
        assert!(survivor.lock().alive);

        let victim_msgs = drain(&mut victim_rx);
        assert_eq!(victim_msgs.len(), 2);
        assert!(matches!(victim_msgs[0], ServerMsg::BombFired { id, .. } if id == bomb_id));
        assert_eq!(victim_msgs[1], ServerMsg::Dead);

        let survivor_msgs = drain(&mut survivor_rx);
        assert_eq!(survivor_msgs.len(), 2);
        assert!(survivor_msgs.iter().any(|m| matches!(m, ServerMsg::BombFired { .. })));
        assert!(survivor_msgs.contains(&ServerMsg::PlayerDead {
            id: victim.id(),
            x: 5,
            y: 8
        }));
    }

    #[test]
    fn bomb_detonates_exactly_once() {
        let world = world();
        let t0 = Instant::now();
        let (_player, mut rx) = join(&world, 0, 0);
        place(&world, 10, 10, t0);

        let later = t0 + Duration::from_millis(2500);
        assert_eq!(detonate_expired(&world, later).len(), 1);
        assert!(world.bombs.is_empty());
        assert!(detonate_expired(&world, later + Duration::from_millis(500)).is_empty());

        let fired = drain(&mut rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::BombFired { .. }))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn dead_players_are_not_killed_twice() {
        let world = world();
        let t0 = Instant::now();
        let (player, mut rx) = join(&world, 5, 5);
        place(&world, 5, 5, t0);
        place(&world, 5, 6, t0);

        let detonations = detonate_expired(&world, t0 + Duration::from_secs(3));
        let victims: usize = detonations.iter().map(|d| d.victims.len()).sum();
        assert_eq!(victims, 1);
        assert!(!player.lock().alive);

        let deaths = drain(&mut rx)
            .into_iter()
            .filter(|m| *m == ServerMsg::Dead)
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn unreachable_player_does_not_stop_the_blast() {
        let world = world();
        let t0 = Instant::now();
        let (_gone, gone_rx) = join(&world, 5, 6);
        drop(gone_rx);
        let (other, _other_rx) = join(&world, 5, 7);
        place(&world, 5, 5, t0);

        let detonations = detonate_expired(&world, t0 + Duration::from_secs(3));
        assert_eq!(detonations[0].victims.len(), 2);
        assert!(!other.lock().alive);
    }

    #[test]
    fn oversized_fire_length_is_capped() {
        let points = blast_points(Position::new(0, 0), u32::MAX);
        assert_eq!(points.len(), 1 + 4 * MAX_FIRE_LENGTH as usize);
        assert!(points.contains(&Position::new(-(MAX_FIRE_LENGTH as i32), 0)));
        assert!(!points.contains(&Position::new(MAX_FIRE_LENGTH as i32 + 1, 0)));
    }

    #[tokio::test]
    async fn zero_period_scheduler_keeps_running() {
        let world = Arc::new(world());
        place(&world, 1, 1, Instant::now() - Duration::from_secs(5));

        let handle = tokio::spawn(DetonationScheduler::new(world.clone(), Duration::ZERO).run());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished());
        assert!(world.bombs.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn scheduler_tick_uses_the_shared_world() {
        let world = Arc::new(world());
        let t0 = Instant::now();
        place(&world, 1, 1, t0);

        let scheduler = DetonationScheduler::new(world.clone(), Duration::from_millis(500));
        assert!(scheduler.tick(t0).is_empty());
        assert_eq!(scheduler.tick(t0 + Duration::from_millis(2001)).len(), 1);
        assert!(world.bombs.is_empty());
    }
}
