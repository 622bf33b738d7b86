//! Player state and the player registry

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{PlayerView, ServerMsg};

use super::broadcast::{Outbound, SendError};
use super::Position;

pub type PlayerId = Uuid;

/// Mutable part of a player, guarded by the player's own lock
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub position: Position,
    /// Facing direction, 0..=3
    pub direction: u8,
    /// Cosmetic character tag
    pub char_type: String,
    pub map_id: String,

    pub movement_delay: Duration,
    pub bomb_delay: Duration,

    pub last_move: Option<Instant>,
    pub last_heartbeat: Instant,
    pub last_bomb: Option<Instant>,

    pub alive: bool,
    pub online: bool,
}

impl PlayerState {
    /// Fresh state for a player that has not moved or placed a bomb yet
    pub fn new(
        map_id: String,
        char_type: String,
        direction: u8,
        movement_delay: Duration,
        bomb_delay: Duration,
        now: Instant,
    ) -> Self {
        Self {
            position: Position::new(0, 0),
            direction,
            char_type,
            map_id,
            movement_delay,
            bomb_delay,
            last_move: None,
            last_heartbeat: now,
            last_bomb: None,
            alive: true,
            online: true,
        }
    }

    #[cfg(test)]
    pub fn for_test(position: Position, now: Instant) -> Self {
        Self {
            position,
            ..Self::new(
                "001".to_string(),
                "002".to_string(),
                3,
                Duration::from_millis(200),
                Duration::from_millis(500),
                now,
            )
        }
    }
}

/// A connected player
#[derive(Debug)]
pub struct Player {
    id: PlayerId,
    state: Mutex<PlayerState>,
    outbound: Outbound,
}

impl Player {
    pub fn new(id: PlayerId, state: PlayerState, outbound: Outbound) -> Self {
        Self {
            id,
            state: Mutex::new(state),
            outbound,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Lock the player's state. Never hold the guard across a send.
    pub fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> PlayerState {
        self.state.lock().clone()
    }

    pub fn view(&self) -> PlayerView {
        let state = self.state.lock();
        PlayerView {
            id: self.id,
            x: state.position.x,
            y: state.position.y,
            char_type: state.char_type.clone(),
            direction: state.direction,
            movement_delay: state.movement_delay.as_millis() as u64,
            map: state.map_id.clone(),
        }
    }

    pub fn send(&self, msg: ServerMsg) -> Result<(), SendError> {
        self.outbound.send(msg)
    }

    /// Send and log a failed delivery instead of returning it
    pub fn send_logged(&self, msg: ServerMsg) {
        if let Err(e) = self.send(msg) {
            debug!(player_id = %self.id, error = %e, "Send failed");
        }
    }
}

/// Registry of players visible in the game
///
/// A single registry-wide lock serializes all mutations; iteration works on a
/// snapshot so callbacks (which usually send) run without the lock held.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<Vec<Arc<Player>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player. Returns false if the identity is already present.
    pub fn add(&self, player: Arc<Player>) -> bool {
        let mut players = self.players.lock();
        if players.iter().any(|p| p.id == player.id) {
            return false;
        }
        players.push(player);
        true
    }

    /// Remove by identity; unknown identities are a no-op.
    pub fn remove(&self, id: PlayerId) -> Option<Arc<Player>> {
        let mut players = self.players.lock();
        let idx = players.iter().position(|p| p.id == id)?;
        Some(players.remove(idx))
    }

    pub fn get(&self, id: PlayerId) -> Option<Arc<Player>> {
        self.players.lock().iter().find(|p| p.id == id).cloned()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.lock().iter().any(|p| p.id == id)
    }

    pub fn snapshot(&self) -> Vec<Arc<Player>> {
        self.players.lock().clone()
    }

    pub fn for_each<F: FnMut(&Arc<Player>)>(&self, mut f: F) {
        for player in self.snapshot() {
            f(&player);
        }
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: i32, y: i32) -> Arc<Player> {
        let (outbound, _rx) = Outbound::channel(4);
        let state = PlayerState::for_test(Position::new(x, y), Instant::now());
        Arc::new(Player::new(Uuid::new_v4(), state, outbound))
    }

    #[test]
    fn duplicate_identity_is_refused() {
        let registry = PlayerRegistry::new();
        let player = player_at(1, 1);

        assert!(registry.add(player.clone()));
        assert!(!registry.add(player.clone()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_unknown_identity_is_a_no_op() {
        let registry = PlayerRegistry::new();
        registry.add(player_at(1, 1));

        assert!(registry.remove(Uuid::new_v4()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_then_lookup() {
        let registry = PlayerRegistry::new();
        let player = player_at(2, 3);
        let id = player.id();
        registry.add(player);

        assert!(registry.contains(id));
        assert_eq!(registry.get(id).map(|p| p.id()), Some(id));
        assert_eq!(registry.remove(id).map(|p| p.id()), Some(id));
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn for_each_may_mutate_the_registry() {
        let registry = PlayerRegistry::new();
        for i in 0..3 {
            registry.add(player_at(i, 0));
        }

        let mut visited = 0;
        registry.for_each(|p| {
            visited += 1;
            registry.remove(p.id());
        });

        assert_eq!(visited, 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_adds_keep_every_entry() {
        let registry = Arc::new(PlayerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.add(player_at(i, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 400);
    }

    #[test]
    fn view_reports_cooldown_in_millis() {
        let player = player_at(3, 4);
        let view = player.view();
        assert_eq!((view.x, view.y), (3, 4));
        assert_eq!(view.movement_delay, 200);
        assert_eq!(view.char_type, "002");
    }
}
