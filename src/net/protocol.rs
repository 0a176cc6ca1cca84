//! Session Protocol
//!
//! JSON messages exchanged over a connection, tagged by a `t` field on both
//! directions. Malformed payloads are dropped without a reply; unknown tags
//! fail deserialization and are dropped the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::input::InputState;
use crate::game::scheme::{ItemType, Scheme, Theme};
use crate::game::snapshot::Snapshot;
use crate::game::world::PlayerId;
use crate::room::room::{RoomSettings, RoomStatus, RosterPlayer, SettingsPatch};

/// Canned taunt lines, selected by index.
pub const TAUNTS: &[&str] = &[
    "Come get some!",
    "Is that all you've got?",
    "Too slow!",
    "Boom!",
    "Watch out!",
    "Nice try!",
    "You're going down!",
    "Catch this!",
];

/// Everything a client may send.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a connection; optionally resumes a prior session.
    Hello {
        /// Display name.
        #[serde(default)]
        name: Option<String>,
        /// `"binary"` to negotiate binary snapshot frames.
        #[serde(default)]
        proto: Option<String>,
        /// Token from a previous welcome, for reconnection.
        #[serde(default, rename = "reconnectToken")]
        reconnect_token: Option<String>,
    },
    /// Change display name.
    SetName {
        /// New name, truncated server-side.
        name: String,
    },
    /// Enter quick play.
    QueueJoin {
        /// Ranked pairing (exactly two players).
        #[serde(default)]
        ranked: bool,
    },
    /// Create a private lobby.
    LobbyCreate,
    /// Join a lobby by code.
    LobbyJoin {
        /// Six-character room code.
        code: String,
    },
    /// Leave the current lobby.
    LobbyLeave,
    /// Toggle ready state.
    LobbyReady {
        /// New ready state.
        #[serde(default)]
        ready: bool,
    },
    /// Lobby chat line.
    LobbyChat {
        /// Message text, truncated server-side.
        text: String,
    },
    /// Host edits room settings.
    LobbySettings {
        /// Partial settings update; invalid fields are ignored.
        #[serde(default)]
        patch: SettingsPatch,
    },
    /// Host starts the match.
    LobbyStart,
    /// Latest button state; the server keeps only the most recent.
    Input {
        /// Button state, press edges included.
        buttons: InputState,
    },
    /// Send a taunt by table index.
    Taunt {
        /// Index into the taunt table, wrapped.
        #[serde(default)]
        idx: u32,
    },
}

/// Everything the server may send.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to hello.
    #[serde(rename_all = "camelCase")]
    Welcome {
        /// Connection-scoped id.
        client_id: String,
        /// Token for reconnection; doubles as the player id.
        reconnect_token: PlayerId,
        /// Server identification.
        server: ServerHello,
    },
    /// Terse rejection of a game command.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// Full lobby roster and settings.
    #[serde(rename_all = "camelCase")]
    LobbyState {
        /// Room code.
        code: String,
        /// Room lifecycle state.
        status: RoomStatus,
        /// Ranked room flag.
        ranked: bool,
        /// Current host, if any member remains.
        host_token: Option<PlayerId>,
        /// Members in join order.
        players: Vec<LobbyPlayer>,
        /// Current settings.
        settings: RoomSettings,
    },
    /// A round is starting.
    #[serde(rename_all = "camelCase")]
    MatchStart {
        /// Room code.
        code: String,
        /// Map definition for the round.
        scheme: Scheme,
        /// Visual theme.
        theme: Theme,
        /// Settings the round runs under.
        settings: RoomSettings,
        /// Round seed.
        seed: u32,
        /// Roster in fixed match order.
        players: Vec<RosterPlayer>,
        /// 1-based round number.
        round_index: u32,
        /// Win counts so far, keyed by player token or team.
        wins: BTreeMap<String, u32>,
        /// Wins needed to take the match.
        target_wins: u32,
    },
    /// The match is over.
    #[serde(rename_all = "camelCase")]
    MatchEnd {
        /// Room code.
        code: String,
        /// Winning player token or team.
        winner_key: Option<String>,
        /// Final win counts.
        wins: BTreeMap<String, u32>,
    },
    /// World snapshot (JSON transport; binary negotiates its own frames).
    Snapshot {
        /// Room code.
        code: String,
        /// Renderable state.
        snap: Snapshot,
    },
    /// Room-level event.
    Event {
        /// Event payload.
        e: RoomEvent,
    },
}

impl ServerMessage {
    /// Serialize for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Server identification inside a welcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerHello {
    /// Wire protocol version.
    pub protocol: u32,
    /// Server build version.
    pub version: String,
}

impl Default for ServerHello {
    fn default() -> Self {
        ServerHello {
            protocol: crate::PROTOCOL_VERSION,
            version: crate::VERSION.to_string(),
        }
    }
}

/// One member in a lobby-state roster.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    /// Display name.
    pub name: String,
    /// Member token.
    pub reconnect_token: PlayerId,
    /// Ready to start.
    pub ready: bool,
    /// Socket currently attached.
    pub connected: bool,
    /// This member is the host.
    pub is_host: bool,
    /// Assigned color.
    pub color: String,
}

/// Room-level events broadcast inside [`ServerMessage::Event`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Lobby chat line.
    Chat {
        /// Sender name.
        from: String,
        /// Message text.
        text: String,
    },
    /// A taunt during a match.
    #[serde(rename_all = "camelCase")]
    Taunt {
        /// Sender name.
        from: String,
        /// Sender token.
        from_id: PlayerId,
        /// Resolved taunt line.
        text: String,
        /// Requested table index.
        idx: u32,
    },
    /// A round finished.
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        /// Winning key, if the round was not a draw.
        winner_key: Option<String>,
        /// Win counts after this round.
        wins: BTreeMap<String, u32>,
    },
    /// Ratings changed after a ranked match.
    #[serde(rename_all = "camelCase")]
    Ratings {
        /// New ratings for both participants.
        new_ratings: RatingsUpdate,
    },
    /// Carryover item granted to the previous match winner.
    #[serde(rename_all = "camelCase")]
    Gold {
        /// Winner receiving the item.
        winner_token: PlayerId,
        /// Granted item.
        item: ItemType,
    },
}

/// Post-match ratings pair.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RatingsUpdate {
    /// First participant's new rating.
    pub a: i32,
    /// Second participant's new rating.
    pub b: i32,
}

/// Parse a client payload. Anything malformed is dropped silently.
pub fn parse_client(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}
