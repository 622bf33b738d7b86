//! Outbound delivery and broadcast fan-out
//!
//! Every connection owns one bounded outbound queue drained by its writer
//! task, so all writes to a player go through a single ordered path. Fan-out
//! enqueues without waiting: delivery is at-most-once (a full or closed queue
//! drops the message) and there is no ordering between different recipients.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::ws::protocol::ServerMsg;

use super::player::{PlayerId, PlayerRegistry};

/// Sending half of a connection's outbound queue
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<ServerMsg>,
}

impl Outbound {
    /// Create a queue holding at most `capacity` undelivered messages
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting for the writer
    pub fn send(&self, msg: ServerMsg) -> Result<(), SendError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Outbound delivery errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("connection is closed")]
    Closed,
}

/// Send `msg` to every registered player. Returns how many accepted it.
pub fn broadcast(players: &PlayerRegistry, msg: &ServerMsg) -> usize {
    fan_out(players, None, msg)
}

/// Send `msg` to every registered player except `except`.
pub fn broadcast_except(players: &PlayerRegistry, except: PlayerId, msg: &ServerMsg) -> usize {
    fan_out(players, Some(except), msg)
}

fn fan_out(players: &PlayerRegistry, except: Option<PlayerId>, msg: &ServerMsg) -> usize {
    let mut delivered = 0;
    players.for_each(|player| {
        if Some(player.id()) == except {
            return;
        }
        match player.send(msg.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!(player_id = %player.id(), error = %e, "Broadcast delivery failed"),
        }
    });
    delivered
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use uuid::Uuid;

    use super::*;
    use crate::game::player::{Player, PlayerState};
    use crate::game::Position;

    fn register(players: &PlayerRegistry, capacity: usize) -> (PlayerId, mpsc::Receiver<ServerMsg>) {
        let (outbound, rx) = Outbound::channel(capacity);
        let id = Uuid::new_v4();
        let state = PlayerState::for_test(Position::new(0, 0), Instant::now());
        assert!(players.add(Arc::new(Player::new(id, state, outbound))));
        (id, rx)
    }

    #[test]
    fn full_queue_reports_error() {
        let (outbound, _rx) = Outbound::channel(1);
        assert_eq!(outbound.send(ServerMsg::Dead), Ok(()));
        assert_eq!(outbound.send(ServerMsg::Dead), Err(SendError::QueueFull));
    }

    #[test]
    fn closed_queue_reports_error() {
        let (outbound, rx) = Outbound::channel(4);
        drop(rx);
        assert_eq!(outbound.send(ServerMsg::Dead), Err(SendError::Closed));
    }

    #[test]
    fn broadcast_except_skips_origin() {
        let players = PlayerRegistry::new();
        let (a, mut rx_a) = register(&players, 4);
        let (_b, mut rx_b) = register(&players, 4);

        let delivered = broadcast_except(&players, a, &ServerMsg::PlayerRemoved { id: a });
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerMsg::PlayerRemoved { id: a });
    }

    #[test]
    fn failed_recipient_does_not_stop_fan_out() {
        let players = PlayerRegistry::new();
        let (_gone, rx_gone) = register(&players, 4);
        drop(rx_gone);
        let (_full, _rx_full) = register(&players, 1);
        let (_ok, mut rx_ok) = register(&players, 4);

        broadcast(&players, &ServerMsg::LoginOk);
        let delivered = broadcast(&players, &ServerMsg::Dead);

        assert_eq!(delivered, 1);
        assert_eq!(rx_ok.try_recv().unwrap(), ServerMsg::LoginOk);
        assert_eq!(rx_ok.try_recv().unwrap(), ServerMsg::Dead);
    }
}
