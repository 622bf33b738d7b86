//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    /// Heartbeat / latency check
    Ping {
        /// Client timestamp, echoed back in the pong
        #[serde(default)]
        time: Option<u64>,
    },

    /// Session login
    Login {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        version: String,
    },

    /// Request spawn and the initial game state
    GameData,

    /// Step request
    Move {
        x: i32,
        y: i32,
        #[serde(default)]
        direction: i32,
    },

    /// Drop a bomb underfoot
    BombAdd { x: i32, y: i32 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Heartbeat reply
    Pong {
        /// Client timestamp when one was sent, server time otherwise
        time: u64,
    },

    LoginOk,
    LoginInvalid,
    VersionInvalid,

    /// Full state of the receiving player
    PlayerData(PlayerView),

    /// Another player became visible
    PlayerAdded(PlayerView),

    /// Another player disconnected
    PlayerRemoved { id: Uuid },

    /// A player was caught in a blast
    PlayerDead { id: Uuid, x: i32, y: i32 },

    /// Move accepted
    MoveOk {
        id: Uuid,
        x: i32,
        y: i32,
        direction: u8,
    },

    /// Move rejected; position fields hold the unchanged state
    MoveInvalid {
        id: Uuid,
        x: i32,
        y: i32,
        direction: u8,
        to_x: i32,
        to_y: i32,
        to_direction: i32,
    },

    /// Another player moved
    PlayerMove {
        id: Uuid,
        x: i32,
        y: i32,
        direction: u8,
    },

    /// A bomb was placed
    BombAdded(BombView),

    /// Placement rejected
    BombAddInvalid { x: i32, y: i32, to_x: i32, to_y: i32 },

    /// A bomb went off; `points` is the blast point set
    BombFired {
        id: Uuid,
        x: i32,
        y: i32,
        fire_length: u32,
        points: Vec<[i32; 2]>,
    },

    /// The receiving player was killed
    Dead,
}

/// Public player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
    pub char_type: String,
    pub direction: u8,
    /// Movement cooldown in milliseconds
    pub movement_delay: u64,
    pub map: String,
}

/// Public bomb state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombView {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
    pub bomb_type: String,
    pub direction: u8,
    /// Milliseconds until detonation
    pub fire_delay: u64,
    pub fire_length: u32,
    pub owner_id: Option<Uuid>,
}
