//! Shared game-state engine

pub mod bomb;
pub mod broadcast;
pub mod detonation;
pub mod player;
pub mod rules;
pub mod world;

pub use bomb::Bomb;
pub use broadcast::{broadcast, broadcast_except, Outbound};
pub use detonation::DetonationScheduler;
pub use player::{Player, PlayerId};
pub use world::{GameRules, GameWorld};

/// Integer tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance
    pub fn chebyshev(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn offset(self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}
