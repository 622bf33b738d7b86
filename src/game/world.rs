//! Shared game state handed to connection tasks and the detonation task

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::map::{MapStore, TileIndex};

use super::bomb::BombRegistry;
use super::player::{PlayerRegistry, PlayerState};
use super::Position;

/// Gameplay tuning
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Map new players spawn on
    pub default_map: String,
    pub char_type: String,
    pub spawn_direction: u8,
    /// Per-player movement cooldown is drawn from this inclusive range
    pub movement_delay_min: Duration,
    pub movement_delay_max: Duration,
    pub bomb_cooldown: Duration,
    pub bomb_type: String,
    pub fire_delay: Duration,
    pub fire_length: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            default_map: "001".to_string(),
            char_type: "002".to_string(),
            spawn_direction: 3,
            movement_delay_min: Duration::from_millis(50),
            movement_delay_max: Duration::from_millis(200),
            bomb_cooldown: Duration::from_millis(500),
            bomb_type: "001".to_string(),
            fire_delay: Duration::from_millis(2000),
            fire_length: 3,
        }
    }
}

/// Registries, maps and tuning for one running game
pub struct GameWorld {
    pub players: PlayerRegistry,
    pub bombs: BombRegistry,
    maps: MapStore,
    rules: GameRules,
    rng: Mutex<ChaCha8Rng>,
}

impl GameWorld {
    pub fn new(maps: MapStore, rules: GameRules, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            players: PlayerRegistry::new(),
            bombs: BombRegistry::new(),
            maps,
            rules,
            rng: Mutex::new(rng),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn tiles(&self) -> &dyn TileIndex {
        &self.maps
    }

    /// State for a freshly authenticated player (not yet spawned)
    pub fn new_player_state(&self, now: Instant) -> PlayerState {
        let min = self.rules.movement_delay_min.as_millis() as u64;
        let max = self.rules.movement_delay_max.as_millis() as u64;
        let delay_ms = self.rng.lock().gen_range(min..=max.max(min));

        PlayerState::new(
            self.rules.default_map.clone(),
            self.rules.char_type.clone(),
            self.rules.spawn_direction,
            Duration::from_millis(delay_ms),
            self.rules.bomb_cooldown,
            now,
        )
    }

    /// Random non-blocking tile on `map_id`
    pub fn spawn_point(&self, map_id: &str) -> Result<Position, SpawnError> {
        let grid = self
            .maps
            .get(map_id)
            .ok_or_else(|| SpawnError::UnknownMap(map_id.to_string()))?;

        let mut rng = self.rng.lock();
        grid.random_open_tile(&mut *rng)
            .map(|(x, y)| Position::new(x, y))
            .ok_or_else(|| SpawnError::NoOpenTile(map_id.to_string()))
    }
}

/// Spawn errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("Unknown map: {0}")]
    UnknownMap(String),

    #[error("Map {0} has no free tile")]
    NoOpenTile(String),
}
