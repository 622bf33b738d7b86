//! Bombs and the bomb registry

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::ws::protocol::BombView;

use super::player::{Player, PlayerId};
use super::Position;

pub type BombId = Uuid;

/// A placed bomb waiting for its fuse
#[derive(Debug)]
pub struct Bomb {
    pub id: BombId,
    pub position: Position,
    pub bomb_type: String,
    pub direction: u8,
    /// Reserved for moving bombs; a bomb at rest ignores it
    pub movement_delay: Duration,
    pub created_at: Instant,
    pub fire_delay: Duration,
    /// Blast reach in tiles along each axis
    pub fire_length: u32,
    /// Attribution only, the bomb outlives a disconnected owner
    pub owner: Weak<Player>,
}

impl Bomb {
    /// Whether the fuse has run out at `now` (strictly past the fire delay)
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.fire_delay
    }

    pub fn owner_id(&self) -> Option<PlayerId> {
        self.owner.upgrade().map(|owner| owner.id())
    }

    pub fn view(&self) -> BombView {
        BombView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            bomb_type: self.bomb_type.clone(),
            direction: self.direction,
            fire_delay: self.fire_delay.as_millis() as u64,
            fire_length: self.fire_length,
            owner_id: self.owner_id(),
        }
    }
}

/// Registry of live bombs, locked independently of the player registry
#[derive(Debug, Default)]
pub struct BombRegistry {
    bombs: Mutex<Vec<Arc<Bomb>>>,
}

impl BombRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bomb. Returns false if the identity is already present.
    pub fn add(&self, bomb: Arc<Bomb>) -> bool {
        let mut bombs = self.bombs.lock();
        if bombs.iter().any(|b| b.id == bomb.id) {
            return false;
        }
        bombs.push(bomb);
        true
    }

    /// Remove by identity. Only the caller that gets `Some` owns the removal.
    pub fn remove(&self, id: BombId) -> Option<Arc<Bomb>> {
        let mut bombs = self.bombs.lock();
        let idx = bombs.iter().position(|b| b.id == id)?;
        Some(bombs.remove(idx))
    }

    pub fn get(&self, id: BombId) -> Option<Arc<Bomb>> {
        self.bombs.lock().iter().find(|b| b.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<Bomb>> {
        self.bombs.lock().clone()
    }

    pub fn for_each<F: FnMut(&Arc<Bomb>)>(&self, mut f: F) {
        for bomb in self.snapshot() {
            f(&bomb);
        }
    }

    pub fn len(&self) -> usize {
        self.bombs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bombs.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bomb(created_at: Instant) -> Arc<Bomb> {
        Arc::new(Bomb {
            id: Uuid::new_v4(),
            position: Position::new(5, 5),
            bomb_type: "001".to_string(),
            direction: 0,
            movement_delay: Duration::ZERO,
            created_at,
            fire_delay: Duration::from_millis(2000),
            fire_length: 3,
            owner: Weak::new(),
        })
    }

    #[test]
    fn expiry_is_strictly_after_fire_delay() {
        let t0 = Instant::now();
        let b = bomb(t0);
        assert!(!b.is_expired(t0 + Duration::from_millis(1999)));
        assert!(!b.is_expired(t0 + Duration::from_millis(2000)));
        assert!(b.is_expired(t0 + Duration::from_millis(2001)));
    }

    #[test]
    fn remove_succeeds_once() {
        let registry = BombRegistry::new();
        let b = bomb(Instant::now());
        let id = b.id;
        assert!(registry.add(b));

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn ownerless_bomb_has_no_attribution() {
        let b = bomb(Instant::now());
        assert_eq!(b.owner_id(), None);
        assert_eq!(b.view().owner_id, None);
        assert_eq!(b.view().fire_delay, 2000);
    }

    #[test]
    fn for_each_visits_snapshot() {
        let registry = BombRegistry::new();
        registry.add(bomb(Instant::now()));
        registry.add(bomb(Instant::now()));

        let mut seen = 0;
        registry.for_each(|b| {
            seen += 1;
            registry.remove(b.id);
        });
        assert_eq!(seen, 2);
        assert_eq!(registry.len(), 0);
    }
}
