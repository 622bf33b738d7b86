//! Movement and bomb placement validation
//!
//! Pure checks against a player's state, the clock and the tile index. The
//! caller applies the accepted change while still holding the player's lock.

use std::time::Instant;

use crate::map::TileIndex;
use crate::util::time::cooldown_elapsed;

use super::player::PlayerState;
use super::Position;

/// Highest valid facing direction
pub const MAX_DIRECTION: u8 = 3;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("player is dead")]
    Dead,

    #[error("direction out of range")]
    InvalidDirection,

    #[error("cooldown still running")]
    Cooldown,

    #[error("tile is blocking")]
    Blocked,

    #[error("target is not adjacent")]
    OutOfReach,

    #[error("bombs can only be dropped underfoot")]
    NotUnderfoot,
}

/// Check a one-step move to `to` facing `direction` and return the facing to
/// store.
///
/// Order: liveness, direction, cooldown, blocking tile, adjacency (Chebyshev
/// distance of at most one, so diagonal steps are legal).
pub fn can_move_to(
    player: &PlayerState,
    to: Position,
    direction: i32,
    tiles: &dyn TileIndex,
    now: Instant,
) -> Result<u8, Rejection> {
    if !player.alive {
        return Err(Rejection::Dead);
    }
    let facing = u8::try_from(direction)
        .ok()
        .filter(|facing| *facing <= MAX_DIRECTION)
        .ok_or(Rejection::InvalidDirection)?;
    if !cooldown_elapsed(player.last_move, player.movement_delay, now) {
        return Err(Rejection::Cooldown);
    }
    if tiles.is_blocking(&player.map_id, to.x, to.y) {
        return Err(Rejection::Blocked);
    }
    if player.position.chebyshev(to) > 1 {
        return Err(Rejection::OutOfReach);
    }
    Ok(facing)
}

/// Check a bomb placement at `to`.
pub fn can_add_bomb_at(
    player: &PlayerState,
    to: Position,
    tiles: &dyn TileIndex,
    now: Instant,
) -> Result<(), Rejection> {
    if !player.alive {
        return Err(Rejection::Dead);
    }
    if !cooldown_elapsed(player.last_bomb, player.bomb_delay, now) {
        return Err(Rejection::Cooldown);
    }
    if tiles.is_blocking(&player.map_id, to.x, to.y) {
        return Err(Rejection::Blocked);
    }
    if player.position != to {
        return Err(Rejection::NotUnderfoot);
    }
    Ok(())
}
