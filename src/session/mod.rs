//! Per-connection session protocol
//!
//! A `Session` owns one connection's view of the game and is driven by the
//! transport's read loop: every decoded client message goes through
//! [`Session::handle`], and the loop ends with [`Session::terminate`].
//!
//! ```text
//! Connected --login ok--> Authenticated --game-data--> Active
//!     |                        |                         |
//!     +--bad login/version-----+-----read error/close----+--> Terminated
//! ```

pub mod login;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::rules::{can_add_bomb_at, can_move_to};
use crate::game::{
    broadcast, broadcast_except, Bomb, GameWorld, Outbound, Player, PlayerId, Position,
};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

pub use login::{LoginOutcome, LoginPolicy};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not logged in
    Connected,
    /// Logged in, not yet spawned
    Authenticated,
    /// Spawned and registered, visible to others
    Active,
    /// Closed; no way back
    Terminated,
}

/// What the read loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Session {
    id: PlayerId,
    state: SessionState,
    world: Arc<GameWorld>,
    login: Arc<LoginPolicy>,
    outbound: Outbound,
    player: Option<Arc<Player>>,
}

impl Session {
    pub fn new(world: Arc<GameWorld>, login: Arc<LoginPolicy>, outbound: Outbound) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connected,
            world,
            login,
            outbound,
            player: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player(&self) -> Option<&Arc<Player>> {
        self.player.as_ref()
    }

    /// Decode one text frame and dispatch it. Undecodable frames are dropped.
    pub fn handle_text(&mut self, text: &str) -> Flow {
        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => self.handle(msg),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Failed to parse client message");
                Flow::Continue
            }
        }
    }

    pub fn handle(&mut self, msg: ClientMsg) -> Flow {
        if self.state == SessionState::Terminated {
            return Flow::Close;
        }

        match msg {
            ClientMsg::Ping { time } => self.on_ping(time),
            ClientMsg::Login {
                username,
                password,
                version,
            } => return self.on_login(&username, &password, &version),
            ClientMsg::GameData => return self.on_game_data(),
            ClientMsg::Move { x, y, direction } => self.on_move(Position::new(x, y), direction),
            ClientMsg::BombAdd { x, y } => self.on_bomb_add(Position::new(x, y)),
        }

        Flow::Continue
    }

    /// Leave the game: unregister and tell the remaining players.
    /// Safe to call more than once.
    pub fn terminate(&mut self) {
        if self.state == SessionState::Active {
            if let Some(player) = self.world.players.remove(self.id) {
                player.lock().online = false;
                broadcast_except(
                    &self.world.players,
                    self.id,
                    &ServerMsg::PlayerRemoved { id: self.id },
                );
            }
            info!(
                session_id = %self.id,
                players = self.world.players.len(),
                "Player left"
            );
        }
        self.state = SessionState::Terminated;
    }

    fn reply(&self, msg: ServerMsg) {
        if let Err(e) = self.outbound.send(msg) {
            debug!(session_id = %self.id, error = %e, "Reply dropped");
        }
    }

    fn on_ping(&self, time: Option<u64>) {
        if let Some(player) = &self.player {
            player.lock().last_heartbeat = Instant::now();
        }
        self.reply(ServerMsg::Pong {
            time: time.unwrap_or_else(unix_millis),
        });
    }

    fn on_login(&mut self, username: &str, password: &str, version: &str) -> Flow {
        if self.state != SessionState::Connected {
            warn!(session_id = %self.id, state = ?self.state, "Login on an authenticated session");
            return Flow::Continue;
        }

        match self.login.evaluate(username, password, version) {
            LoginOutcome::Accepted => {
                let state = self.world.new_player_state(Instant::now());
                self.player = Some(Arc::new(Player::new(self.id, state, self.outbound.clone())));
                self.state = SessionState::Authenticated;
                info!(session_id = %self.id, username, "Player logged in");
                self.reply(ServerMsg::LoginOk);
                Flow::Continue
            }
            LoginOutcome::VersionMismatch => {
                warn!(
                    session_id = %self.id,
                    version,
                    expected = self.login.version(),
                    "Client on a different protocol version"
                );
                self.reply(ServerMsg::VersionInvalid);
                self.terminate();
                Flow::Close
            }
            LoginOutcome::InvalidCredentials => {
                warn!(session_id = %self.id, username, "Invalid login");
                self.reply(ServerMsg::LoginInvalid);
                self.terminate();
                Flow::Close
            }
        }
    }

    /// Spawn the player and introduce it. A player that cannot be placed on
    /// its map would never become active, so the session is closed instead.
    fn on_game_data(&mut self) -> Flow {
        if self.state != SessionState::Authenticated {
            warn!(session_id = %self.id, state = ?self.state, "Game data requested out of order");
            return Flow::Continue;
        }
        let Some(player) = self.player.clone() else {
            return Flow::Continue;
        };

        let map_id = player.lock().map_id.clone();
        let spawn = match self.world.spawn_point(&map_id) {
            Ok(spawn) => spawn,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Cannot spawn player, closing session");
                self.terminate();
                return Flow::Close;
            }
        };
        {
            let mut state = player.lock();
            state.position = spawn;
            state.direction = self.world.rules().spawn_direction;
        }

        let view = player.view();
        self.reply(ServerMsg::PlayerData(view.clone()));

        if !self.world.players.add(player.clone()) {
            warn!(session_id = %self.id, "Player already registered");
            return Flow::Continue;
        }
        self.state = SessionState::Active;

        let introduced = ServerMsg::PlayerAdded(view);
        for peer in self.world.players.snapshot() {
            if peer.id() == self.id {
                continue;
            }
            player.send_logged(ServerMsg::PlayerAdded(peer.view()));
            peer.send_logged(introduced.clone());
        }

        info!(
            session_id = %self.id,
            x = spawn.x,
            y = spawn.y,
            map = %map_id,
            players = self.world.players.len(),
            "Player spawned"
        );
        Flow::Continue
    }

    fn on_move(&self, to: Position, direction: i32) {
        let Some(player) = self.active_player("move") else {
            return;
        };

        let now = Instant::now();
        let outcome = {
            let mut state = player.lock();
            match can_move_to(&state, to, direction, self.world.tiles(), now) {
                Ok(facing) => {
                    state.position = to;
                    state.direction = facing;
                    state.last_move = Some(now);
                    Ok(facing)
                }
                Err(rejection) => Err((rejection, state.position, state.direction)),
            }
        };

        match outcome {
            Ok(facing) => {
                self.reply(ServerMsg::MoveOk {
                    id: self.id,
                    x: to.x,
                    y: to.y,
                    direction: facing,
                });
                broadcast_except(
                    &self.world.players,
                    self.id,
                    &ServerMsg::PlayerMove {
                        id: self.id,
                        x: to.x,
                        y: to.y,
                        direction: facing,
                    },
                );
            }
            Err((rejection, at, facing)) => {
                debug!(session_id = %self.id, reason = %rejection, to_x = to.x, to_y = to.y, "Move rejected");
                self.reply(ServerMsg::MoveInvalid {
                    id: self.id,
                    x: at.x,
                    y: at.y,
                    direction: facing,
                    to_x: to.x,
                    to_y: to.y,
                    to_direction: direction,
                });
            }
        }
    }

    fn on_bomb_add(&self, to: Position) {
        let Some(player) = self.active_player("bomb-add") else {
            return;
        };

        let now = Instant::now();
        let outcome = {
            let mut state = player.lock();
            match can_add_bomb_at(&state, to, self.world.tiles(), now) {
                Ok(()) => {
                    state.last_bomb = Some(now);
                    Ok(state.direction)
                }
                Err(rejection) => Err((rejection, state.position)),
            }
        };

        match outcome {
            Ok(direction) => {
                let rules = self.world.rules();
                let bomb = Arc::new(Bomb {
                    id: Uuid::new_v4(),
                    position: to,
                    bomb_type: rules.bomb_type.clone(),
                    direction,
                    movement_delay: Duration::ZERO,
                    created_at: now,
                    fire_delay: rules.fire_delay,
                    fire_length: rules.fire_length,
                    owner: Arc::downgrade(player),
                });
                let added = ServerMsg::BombAdded(bomb.view());
                self.world.bombs.add(bomb);
                broadcast(&self.world.players, &added);
            }
            Err((rejection, at)) => {
                debug!(session_id = %self.id, reason = %rejection, "Bomb placement rejected");
                self.reply(ServerMsg::BombAddInvalid {
                    x: at.x,
                    y: at.y,
                    to_x: to.x,
                    to_y: to.y,
                });
            }
        }
    }

    fn active_player(&self, request: &'static str) -> Option<&Arc<Player>> {
        if self.state != SessionState::Active {
            warn!(session_id = %self.id, state = ?self.state, request, "Request before spawn");
            return None;
        }
        self.player.as_ref()
    }
}
