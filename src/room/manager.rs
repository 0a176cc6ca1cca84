//! Room Manager
//!
//! The server context: clients by reconnect token, rooms by code, message
//! dispatch, quick play, and the background loops. All state sits behind one
//! `Arc<Mutex<..>>`; connection tasks, room tick loops, and the grace sweep
//! all lock it briefly. Sends never block — a connection is an unbounded
//! channel handle — so holding the lock across a broadcast is fine.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::codec::encode_snapshot;
use crate::game::input::InputState;
use crate::game::scheme::Team;
use crate::game::snapshot::Snapshot;
use crate::game::world::PlayerId;
use crate::net::connection::Connection;
use crate::net::protocol::{
    ClientMessage, LobbyPlayer, RoomEvent, ServerHello, ServerMessage, TAUNTS,
};
use crate::ratings::Ratings;
use crate::room::replay::ReplayDoc;
use crate::room::room::{Room, RoomOutput, RoomStatus, RosterPlayer, COLOR_POOL};
use crate::store::Store;
use crate::TICK_HZ;

/// Room codes come from this alphabet; no 'I', 'O', '0', or '1'.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// How long a dropped member may reconnect before being written off.
const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Minimum delay between taunts per member.
const TAUNT_COOLDOWN: Duration = Duration::from_secs(2);

/// Name length cap.
const MAX_NAME_LEN: usize = 24;

/// Chat line length cap.
const MAX_CHAT_LEN: usize = 200;

/// Shared handle to the manager.
pub type SharedManager = Arc<Mutex<RoomManager>>;

/// One known player session, alive across reconnects.
#[derive(Debug)]
pub struct Client {
    /// Connection-scoped id, rotates on reconnect.
    pub id: String,
    /// Stable token; also the world player id.
    pub token: PlayerId,
    /// Display name.
    pub name: String,
    /// Attached socket, if any.
    pub conn: Option<Connection>,
    /// Room this client is in.
    pub room_code: Option<String>,
    /// Lobby ready flag.
    pub ready: bool,
    /// Negotiated binary snapshot frames.
    pub binary_snapshots: bool,
    /// Latest buffered input.
    pub input: InputState,
    /// When the socket dropped, for the grace sweep.
    pub disconnected_at: Option<Instant>,
    /// Set once the grace period expired mid-match.
    pub reconnect_disabled: bool,
    /// Last accepted taunt, for rate limiting.
    pub last_taunt_at: Option<Instant>,
}

/// Client and room registries plus the dispatch logic.
#[derive(Debug)]
pub struct RoomManager {
    clients: BTreeMap<PlayerId, Client>,
    rooms: BTreeMap<String, Room>,
    store: Arc<Store>,
    ratings: Ratings,
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn truncated(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

impl RoomManager {
    /// Fresh manager over a store and a loaded ratings database.
    pub fn new(store: Arc<Store>, ratings: Ratings) -> RoomManager {
        RoomManager {
            clients: BTreeMap::new(),
            rooms: BTreeMap::new(),
            store,
            ratings,
        }
    }

    /// Number of known client sessions.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // =========================================================================
    // SESSION BINDING
    // =========================================================================

    /// Attach a socket to a session: resume the token from a hello when it is
    /// known, disconnected, and not written off; otherwise create a guest.
    pub fn bind_connection(
        &mut self,
        conn: &Connection,
        reconnect_token: Option<&str>,
    ) -> PlayerId {
        if let Some(token) = reconnect_token
            .and_then(|t| t.parse::<uuid::Uuid>().ok())
            .map(PlayerId)
        {
            if let Some(client) = self.clients.get_mut(&token) {
                if client.conn.is_none() && !client.reconnect_disabled {
                    client.conn = Some(conn.clone());
                    client.disconnected_at = None;
                    client.id = format!("c_{}", hex::encode(rand::random::<[u8; 8]>()));
                    debug!(%token, "session resumed");
                    return token;
                }
            }
        }
        self.create_client(Some(conn.clone()))
    }

    fn create_client(&mut self, conn: Option<Connection>) -> PlayerId {
        let token = PlayerId::random();
        let short = token.to_string();
        let short = &short[short.len() - 4..];
        self.clients.insert(
            token,
            Client {
                id: format!("c_{}", hex::encode(rand::random::<[u8; 8]>())),
                token,
                name: format!("Guest-{short}"),
                conn,
                room_code: None,
                ready: false,
                binary_snapshots: false,
                input: InputState::default(),
                disconnected_at: None,
                reconnect_disabled: false,
                last_taunt_at: None,
            },
        );
        token
    }

    /// The socket went away. Lobby members are removed immediately; in-match
    /// members get the grace period.
    pub fn on_socket_closed(&mut self, token: PlayerId) {
        let Some(client) = self.clients.get_mut(&token) else {
            return;
        };
        client.conn = None;
        client.disconnected_at = Some(Instant::now());

        let in_lobby = client
            .room_code
            .as_ref()
            .and_then(|code| self.rooms.get(code))
            .is_some_and(|room| room.status == RoomStatus::Lobby);
        if in_lobby {
            self.leave_room(token);
        }
    }

    /// One pass of the 1-second grace sweep.
    pub fn sweep(&mut self) {
        let now = Instant::now();
        let expired: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|c| {
                !c.reconnect_disabled
                    && c.disconnected_at
                        .is_some_and(|at| now.duration_since(at) >= GRACE_PERIOD)
            })
            .map(|c| c.token)
            .collect();

        for token in expired {
            let room_code = self.clients.get(&token).and_then(|c| c.room_code.clone());
            let playing = room_code
                .as_ref()
                .and_then(|code| self.rooms.get_mut(code))
                .filter(|room| room.status == RoomStatus::Playing)
                .is_some_and(|room| {
                    if let Some(world) = room.world.as_mut() {
                        world.mark_disconnected(token);
                    }
                    true
                });

            if playing {
                if let Some(client) = self.clients.get_mut(&token) {
                    client.reconnect_disabled = true;
                }
                info!(%token, "grace period expired mid-match");
            } else {
                self.leave_room(token);
                self.clients.remove(&token);
            }
        }
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Handle one parsed client message. Returns the code of a room whose
    /// tick loop must be spawned, if a match just started.
    pub fn on_message(&mut self, token: PlayerId, msg: ClientMessage) -> Option<String> {
        match msg {
            ClientMessage::Hello { name, proto, .. } => {
                self.handle_hello(token, name, proto);
                None
            }
            ClientMessage::SetName { name } => {
                self.handle_set_name(token, &name);
                None
            }
            ClientMessage::QueueJoin { ranked } => self.join_quick_play(token, ranked),
            ClientMessage::LobbyCreate => {
                self.leave_room(token);
                let code = self.create_room(token, false, false);
                self.join_room(token, &code);
                None
            }
            ClientMessage::LobbyJoin { code } => {
                self.handle_lobby_join(token, &code);
                None
            }
            ClientMessage::LobbyLeave => {
                self.leave_room(token);
                None
            }
            ClientMessage::LobbyReady { ready } => self.handle_ready(token, ready),
            ClientMessage::LobbyChat { text } => {
                self.handle_chat(token, &text);
                None
            }
            ClientMessage::LobbySettings { patch } => {
                let Some(code) = self.room_code_of(token) else {
                    return None;
                };
                let Some(room) = self.rooms.get_mut(&code) else {
                    return None;
                };
                if room.host != Some(token) || room.ranked {
                    return None;
                }
                room.apply_settings_patch(patch);
                self.broadcast_lobby(&code);
                None
            }
            ClientMessage::LobbyStart => {
                let code = self.room_code_of(token)?;
                if self.rooms.get(&code)?.host != Some(token) {
                    return None;
                }
                self.try_start_match(&code)
            }
            ClientMessage::Input { buttons } => {
                let playing = self
                    .room_code_of(token)
                    .and_then(|code| self.rooms.get(&code))
                    .is_some_and(|room| room.status == RoomStatus::Playing);
                if playing {
                    if let Some(client) = self.clients.get_mut(&token) {
                        client.input = buttons;
                    }
                }
                None
            }
            ClientMessage::Taunt { idx } => {
                self.handle_taunt(token, idx);
                None
            }
        }
    }

    fn handle_hello(&mut self, token: PlayerId, name: Option<String>, proto: Option<String>) {
        let Some(client) = self.clients.get_mut(&token) else {
            return;
        };
        if let Some(name) = name.as_deref().map(|n| truncated(n, MAX_NAME_LEN)) {
            if !name.is_empty() {
                client.name = name;
            }
        }
        if proto.as_deref() == Some("binary") {
            client.binary_snapshots = true;
        }
        let welcome = ServerMessage::Welcome {
            client_id: client.id.clone(),
            reconnect_token: token,
            server: ServerHello::default(),
        };
        let name = client.name.clone();
        self.ratings.set_name(token, &name);
        self.send_to(token, &welcome);

        // Resume into whatever the client's room is doing.
        let Some(code) = self.room_code_of(token) else {
            return;
        };
        if let Some(state) = self.lobby_state_of(&code) {
            self.send_to(token, &state);
        }
        if let Some(room) = self.rooms.get(&code) {
            if room.status == RoomStatus::Playing {
                if let Some(resume) = room.resume_message() {
                    let snap = room.world.as_ref().map(|w| w.snapshot());
                    self.send_to(token, &resume);
                    if let Some(snap) = snap {
                        self.send_snapshot_to(token, &code, &snap);
                    }
                }
            }
        }
    }

    fn handle_set_name(&mut self, token: PlayerId, name: &str) {
        let name = truncated(name, MAX_NAME_LEN);
        if name.is_empty() {
            return;
        }
        let Some(client) = self.clients.get_mut(&token) else {
            return;
        };
        client.name = name.clone();
        self.ratings.set_name(token, &name);

        let Some(code) = self.room_code_of(token) else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(&code) {
            if let Some(world) = room.world.as_mut() {
                if let Some(p) = world.player_mut(token) {
                    p.name = name;
                }
            }
        }
        self.broadcast_lobby(&code);
    }

    fn handle_lobby_join(&mut self, token: PlayerId, code: &str) {
        let code = code.to_uppercase();
        let error = match self.rooms.get(&code) {
            None => Some("Lobby not found"),
            Some(room) if room.status != RoomStatus::Lobby => Some("Lobby already started"),
            Some(room) if room.members.len() >= crate::MAX_PLAYERS => Some("Lobby full"),
            Some(_) => None,
        };
        if let Some(message) = error {
            self.send_to(
                token,
                &ServerMessage::Error {
                    message: message.to_string(),
                },
            );
            return;
        }
        self.leave_room(token);
        self.join_room(token, &code);
    }

    fn handle_ready(&mut self, token: PlayerId, ready: bool) -> Option<String> {
        let code = self.room_code_of(token)?;
        if let Some(client) = self.clients.get_mut(&token) {
            client.ready = ready;
        }
        self.broadcast_lobby(&code);
        let room = self.rooms.get(&code)?;
        if room.quick_play && room.members.len() >= 2 {
            return self.try_start_match(&code);
        }
        None
    }

    fn handle_chat(&mut self, token: PlayerId, text: &str) {
        let text = truncated(text, MAX_CHAT_LEN);
        if text.is_empty() {
            return;
        }
        let Some(code) = self.room_code_of(token) else {
            return;
        };
        let from = self
            .clients
            .get(&token)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        self.broadcast(
            &code,
            &ServerMessage::Event {
                e: RoomEvent::Chat { from, text },
            },
        );
    }

    fn handle_taunt(&mut self, token: PlayerId, idx: u32) {
        let Some(code) = self.room_code_of(token) else {
            return;
        };
        let Some(room) = self.rooms.get(&code) else {
            return;
        };
        // Mid-match, only living players get to talk.
        if room.status == RoomStatus::Playing {
            let alive = room
                .world
                .as_ref()
                .and_then(|w| w.player(token))
                .is_some_and(|p| p.alive);
            if !alive {
                return;
            }
        }
        let now = Instant::now();
        let Some(client) = self.clients.get_mut(&token) else {
            return;
        };
        if client
            .last_taunt_at
            .is_some_and(|at| now.duration_since(at) < TAUNT_COOLDOWN)
        {
            return;
        }
        client.last_taunt_at = Some(now);
        let from = client.name.clone();
        let text = TAUNTS[idx as usize % TAUNTS.len()].to_string();
        self.broadcast(
            &code,
            &ServerMessage::Event {
                e: RoomEvent::Taunt {
                    from,
                    from_id: token,
                    text,
                    idx,
                },
            },
        );
    }

    // =========================================================================
    // ROOMS
    // =========================================================================

    fn create_room(&mut self, host: PlayerId, quick_play: bool, ranked: bool) -> String {
        let mut code = random_code();
        while self.rooms.contains_key(&code) {
            code = random_code();
        }
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), host, quick_play, ranked));
        info!(%code, quick_play, ranked, "room created");
        code
    }

    fn set_client_room(&mut self, token: PlayerId, code: &str) {
        if let Some(client) = self.clients.get_mut(&token) {
            client.room_code = Some(code.to_string());
            client.ready = false;
        }
    }

    fn join_room(&mut self, token: PlayerId, code: &str) {
        if let Some(room) = self.rooms.get_mut(code) {
            room.add_member(token);
            self.set_client_room(token, code);
            self.broadcast_lobby(code);
        }
    }

    fn room_code_of(&self, token: PlayerId) -> Option<String> {
        self.clients.get(&token)?.room_code.clone()
    }

    /// Remove a client from its room, migrating the host and deleting the
    /// room once empty.
    pub fn leave_room(&mut self, token: PlayerId) {
        let Some(code) = self.room_code_of(token) else {
            return;
        };
        if let Some(client) = self.clients.get_mut(&token) {
            client.room_code = None;
            client.ready = false;
            client.input = InputState::default();
        }
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if room.remove_member(token) {
            self.rooms.remove(&code);
            info!(%code, "room deleted");
            return;
        }
        self.broadcast_lobby(&code);
    }

    fn join_quick_play(&mut self, token: PlayerId, ranked: bool) -> Option<String> {
        let max = if ranked { 2 } else { crate::MAX_PLAYERS };
        let open = self
            .rooms
            .values()
            .find(|r| {
                r.status == RoomStatus::Lobby
                    && r.quick_play
                    && r.ranked == ranked
                    && r.members.len() < max
            })
            .map(|r| r.code.clone());

        self.leave_room(token);
        let code = match open {
            Some(code) => code,
            None => self.create_room(token, true, ranked),
        };
        self.join_room(token, &code);
        if let Some(client) = self.clients.get_mut(&token) {
            client.ready = true;
        }
        self.broadcast_lobby(&code);

        let enough = self
            .rooms
            .get(&code)
            .is_some_and(|r| r.members.len() >= 2);
        if enough {
            return self.try_start_match(&code);
        }
        None
    }

    /// Try to start the match in a room. Checks readiness, builds the roster,
    /// and returns the room code when a tick loop must be spawned.
    pub fn try_start_match(&mut self, code: &str) -> Option<String> {
        let room = self.rooms.get(code)?;
        if room.status != RoomStatus::Lobby || room.members.len() < 2 {
            return None;
        }
        let host = room.host;
        let members = room.members.clone();
        for token in &members {
            let Some(client) = self.clients.get(token) else {
                continue;
            };
            if Some(*token) != host && !client.ready {
                return None;
            }
        }

        let roster: Vec<RosterPlayer> = members
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let room = &self.rooms[code];
                RosterPlayer {
                    id: *token,
                    name: self
                        .clients
                        .get(token)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| format!("Guest-{i}")),
                    color: room
                        .colors
                        .get(token)
                        .cloned()
                        .unwrap_or_else(|| COLOR_POOL[i % COLOR_POOL.len()].to_string()),
                    team: Team::None,
                }
            })
            .collect();

        let room = self.rooms.get_mut(code)?;
        match room.start_match(roster)? {
            Ok(outputs) => {
                let spawn_loop = !room.loop_running;
                room.loop_running = true;
                info!(%code, "match started");
                self.process_outputs(code, outputs);
                spawn_loop.then(|| code.to_string())
            }
            Err(e) => {
                warn!(%code, "match start failed: {e}");
                let room = self.rooms.get_mut(code)?;
                room.stop();
                self.broadcast(
                    code,
                    &ServerMessage::Error {
                        message: "Failed to start match".to_string(),
                    },
                );
                None
            }
        }
    }

    /// Advance one room by one tick. Returns false when the loop should end:
    /// the room is gone or fell back to the lobby.
    pub fn tick_room(&mut self, code: &str) -> bool {
        let Some(room) = self.rooms.get(code) else {
            return false;
        };
        let inputs: BTreeMap<PlayerId, InputState> = room
            .members
            .iter()
            .filter_map(|t| self.clients.get(t).map(|c| (*t, c.input)))
            .collect();

        let Some(room) = self.rooms.get_mut(code) else {
            return false;
        };
        let outputs = room.tick(&inputs);
        self.process_outputs(code, outputs);

        match self.rooms.get_mut(code) {
            Some(room) if room.status == RoomStatus::Playing => true,
            Some(room) => {
                room.loop_running = false;
                false
            }
            None => false,
        }
    }

    fn process_outputs(&mut self, code: &str, outputs: Vec<RoomOutput>) {
        for output in outputs {
            match output {
                RoomOutput::Broadcast(msg) => self.broadcast(code, &msg),
                RoomOutput::Snapshot(snap) => self.broadcast_snapshot(code, &snap),
                RoomOutput::SaveReplay(doc) => self.save_replay(*doc),
                RoomOutput::RecordRatings { a, b, winner } => {
                    let update = self.ratings.record_match(a, b, winner);
                    self.broadcast(
                        code,
                        &ServerMessage::Event {
                            e: RoomEvent::Ratings {
                                new_ratings: update,
                            },
                        },
                    );
                    let store = self.store.clone();
                    let path = self.ratings.path().to_path_buf();
                    let doc = self.ratings.document();
                    tokio::spawn(async move {
                        if let Err(e) = store.write_json(&path, &doc).await {
                            warn!("failed to persist ratings: {e}");
                        }
                    });
                }
                RoomOutput::ReturnedToLobby => {
                    let members = self
                        .rooms
                        .get(code)
                        .map(|r| r.members.clone())
                        .unwrap_or_default();
                    for token in members {
                        if let Some(client) = self.clients.get_mut(&token) {
                            client.input = InputState::default();
                        }
                    }
                    self.broadcast_lobby(code);
                }
            }
        }
    }

    fn save_replay(&self, doc: ReplayDoc) {
        let store = self.store.clone();
        let path = store.dirs.replays.join(format!("{}.json", doc.id));
        tokio::spawn(async move {
            match store.write_json(&path, &doc).await {
                Ok(()) => debug!(id = %doc.id, "replay persisted"),
                Err(e) => warn!(id = %doc.id, "failed to persist replay: {e}"),
            }
        });
    }

    // =========================================================================
    // SENDING
    // =========================================================================

    fn lobby_state_of(&self, code: &str) -> Option<ServerMessage> {
        let room = self.rooms.get(code)?;
        let players = room
            .members
            .iter()
            .enumerate()
            .filter_map(|(i, token)| {
                self.clients.get(token).map(|c| LobbyPlayer {
                    name: c.name.clone(),
                    reconnect_token: *token,
                    ready: c.ready,
                    connected: c.conn.is_some(),
                    is_host: room.host == Some(*token),
                    color: room
                        .colors
                        .get(token)
                        .cloned()
                        .unwrap_or_else(|| COLOR_POOL[i % COLOR_POOL.len()].to_string()),
                })
            })
            .collect();
        Some(ServerMessage::LobbyState {
            code: room.code.clone(),
            status: room.status,
            ranked: room.ranked,
            host_token: room.host,
            players,
            settings: room.settings.clone(),
        })
    }

    fn broadcast_lobby(&self, code: &str) {
        if let Some(msg) = self.lobby_state_of(code) {
            self.broadcast(code, &msg);
        }
    }

    fn send_to(&self, token: PlayerId, msg: &ServerMessage) {
        let Some(client) = self.clients.get(&token) else {
            return;
        };
        let Some(conn) = &client.conn else {
            return;
        };
        match msg.to_json() {
            Ok(text) => conn.send_text(text),
            Err(e) => warn!("failed to serialize message: {e}"),
        }
    }

    fn broadcast(&self, code: &str, msg: &ServerMessage) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let text = match msg.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialize message: {e}");
                return;
            }
        };
        for token in &room.members {
            if let Some(conn) = self.clients.get(token).and_then(|c| c.conn.as_ref()) {
                conn.send_text(text.clone());
            }
        }
    }

    fn broadcast_snapshot(&self, code: &str, snap: &Snapshot) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let binary = encode_snapshot(snap);
        let json = ServerMessage::Snapshot {
            code: code.to_string(),
            snap: snap.clone(),
        }
        .to_json();

        for token in &room.members {
            let Some(client) = self.clients.get(token) else {
                continue;
            };
            let Some(conn) = &client.conn else {
                continue;
            };
            if client.binary_snapshots {
                conn.send_binary(binary.clone());
            } else if let Ok(text) = &json {
                conn.send_text(text.clone());
            }
        }
    }

    fn send_snapshot_to(&self, token: PlayerId, code: &str, snap: &Snapshot) {
        let Some(client) = self.clients.get(&token) else {
            return;
        };
        let Some(conn) = &client.conn else {
            return;
        };
        if client.binary_snapshots {
            conn.send_binary(encode_snapshot(snap));
        } else {
            let msg = ServerMessage::Snapshot {
                code: code.to_string(),
                snap: snap.clone(),
            };
            if let Ok(text) = msg.to_json() {
                conn.send_text(text);
            }
        }
    }
}

// =============================================================================
// BACKGROUND LOOPS
// =============================================================================

/// Drive one room at the simulation rate until it falls back to the lobby.
pub fn spawn_room_loop(manager: SharedManager, code: String) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_micros(1_000_000 / u64::from(TICK_HZ)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !manager.lock().await.tick_room(&code) {
                debug!(%code, "room loop ended");
                break;
            }
        }
    });
}

/// Run the 1-second grace-period sweep forever.
pub async fn run_grace_sweep(manager: SharedManager) {
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        manager.lock().await.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::DeathReason;
    use crate::room::room::RoomStatus;

    async fn scratch_manager() -> RoomManager {
        let root = std::env::temp_dir()
            .join("blast-arena-manager-tests")
            .join(uuid::Uuid::new_v4().to_string());
        let store = Arc::new(Store::open(root).await.unwrap());
        let ratings = Ratings::open(&store).await.unwrap();
        RoomManager::new(store, ratings)
    }

    fn offline_client(mgr: &mut RoomManager) -> PlayerId {
        mgr.create_client(None)
    }

    fn the_room_code(mgr: &RoomManager) -> String {
        mgr.rooms.keys().next().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_lobby_create_join_start() {
        let mut mgr = scratch_manager().await;
        let host = offline_client(&mut mgr);
        let guest = offline_client(&mut mgr);

        assert!(mgr.on_message(host, ClientMessage::LobbyCreate).is_none());
        let code = the_room_code(&mgr);
        assert_eq!(code.len(), 6);

        mgr.on_message(guest, ClientMessage::LobbyJoin { code: code.clone() });
        assert_eq!(mgr.rooms[&code].members.len(), 2);

        // Host cannot start while the guest is not ready.
        assert!(mgr.on_message(host, ClientMessage::LobbyStart).is_none());
        assert_eq!(mgr.rooms[&code].status, RoomStatus::Lobby);

        mgr.on_message(guest, ClientMessage::LobbyReady { ready: true });
        let started = mgr.on_message(host, ClientMessage::LobbyStart);
        assert_eq!(started.as_deref(), Some(code.as_str()));
        assert_eq!(mgr.rooms[&code].status, RoomStatus::Playing);

        // Second start request does not spawn a second loop.
        assert!(mgr.try_start_match(&code).is_none());
    }

    #[tokio::test]
    async fn test_guest_cannot_start_match() {
        let mut mgr = scratch_manager().await;
        let host = offline_client(&mut mgr);
        let guest = offline_client(&mut mgr);
        mgr.on_message(host, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(guest, ClientMessage::LobbyJoin { code: code.clone() });
        mgr.on_message(host, ClientMessage::LobbyReady { ready: true });

        assert!(mgr.on_message(guest, ClientMessage::LobbyStart).is_none());
        assert_eq!(mgr.rooms[&code].status, RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_quick_play_pairs_and_autostarts() {
        let mut mgr = scratch_manager().await;
        let first = offline_client(&mut mgr);
        let second = offline_client(&mut mgr);

        assert!(mgr
            .on_message(first, ClientMessage::QueueJoin { ranked: false })
            .is_none());
        assert_eq!(mgr.room_count(), 1);

        let started = mgr.on_message(second, ClientMessage::QueueJoin { ranked: false });
        assert!(started.is_some());
        let code = the_room_code(&mgr);
        assert_eq!(mgr.rooms[&code].status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn test_ranked_queue_does_not_mix_with_casual() {
        let mut mgr = scratch_manager().await;
        let casual = offline_client(&mut mgr);
        let ranked = offline_client(&mut mgr);

        mgr.on_message(casual, ClientMessage::QueueJoin { ranked: false });
        mgr.on_message(ranked, ClientMessage::QueueJoin { ranked: true });
        assert_eq!(mgr.room_count(), 2);
    }

    #[tokio::test]
    async fn test_room_deleted_when_last_member_leaves() {
        let mut mgr = scratch_manager().await;
        let host = offline_client(&mut mgr);
        let guest = offline_client(&mut mgr);
        mgr.on_message(host, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(guest, ClientMessage::LobbyJoin { code: code.clone() });

        mgr.on_message(host, ClientMessage::LobbyLeave);
        assert_eq!(mgr.rooms[&code].host, Some(guest));

        mgr.on_message(guest, ClientMessage::LobbyLeave);
        assert_eq!(mgr.room_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_room_runs_and_stops_after_match() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });
        mgr.on_message(b, ClientMessage::LobbyReady { ready: true });
        mgr.rooms.get_mut(&code).unwrap().settings.target_wins = 1;
        mgr.on_message(a, ClientMessage::LobbyStart);

        assert!(mgr.tick_room(&code));
        assert_eq!(mgr.rooms[&code].world.as_ref().unwrap().tick, 1);

        // Kill one player; the next tick ends the round and the match.
        if let Some(world) = mgr.rooms.get_mut(&code).unwrap().world.as_mut() {
            if let Some(p) = world.player_mut(b) {
                p.alive = false;
            }
        }
        assert!(!mgr.tick_room(&code));
        assert_eq!(mgr.rooms[&code].status, RoomStatus::Lobby);
        assert!(!mgr.rooms[&code].loop_running);
    }

    #[tokio::test]
    async fn test_input_buffered_only_while_playing() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });

        let press = InputState {
            up: true,
            ..Default::default()
        };
        mgr.on_message(a, ClientMessage::Input { buttons: press });
        assert_eq!(mgr.clients[&a].input, InputState::default());

        mgr.on_message(b, ClientMessage::LobbyReady { ready: true });
        mgr.on_message(a, ClientMessage::LobbyStart);
        mgr.on_message(a, ClientMessage::Input { buttons: press });
        assert_eq!(mgr.clients[&a].input, press);
    }

    #[tokio::test]
    async fn test_grace_expiry_kills_in_match_player() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });
        mgr.on_message(b, ClientMessage::LobbyReady { ready: true });
        mgr.on_message(a, ClientMessage::LobbyStart);

        mgr.on_socket_closed(b);
        // Playing room: the member survives the immediate close.
        assert!(mgr.rooms[&code].members.contains(&b));

        mgr.clients.get_mut(&b).unwrap().disconnected_at =
            Some(Instant::now() - GRACE_PERIOD - Duration::from_secs(1));
        mgr.sweep();

        let world = mgr.rooms[&code].world.as_ref().unwrap();
        let player = world.player(b).unwrap();
        assert!(!player.alive);
        assert_eq!(player.death_reason, Some(DeathReason::Disconnect));
        assert!(mgr.clients[&b].reconnect_disabled);
    }

    #[tokio::test]
    async fn test_written_off_member_swept_once() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });
        mgr.on_message(b, ClientMessage::LobbyReady { ready: true });
        mgr.on_message(a, ClientMessage::LobbyStart);

        mgr.on_socket_closed(b);
        mgr.clients.get_mut(&b).unwrap().disconnected_at =
            Some(Instant::now() - GRACE_PERIOD - Duration::from_secs(1));
        mgr.sweep();
        assert!(mgr.clients[&b].reconnect_disabled);

        // Later passes must skip the written-off member entirely. Revive the
        // world player so a repeat write-off would be visible.
        if let Some(world) = mgr.rooms.get_mut(&code).unwrap().world.as_mut() {
            let p = world.player_mut(b).unwrap();
            p.alive = true;
            p.death_reason = None;
        }
        mgr.sweep();
        let world = mgr.rooms[&code].world.as_ref().unwrap();
        assert!(world.player(b).unwrap().alive);
    }

    #[tokio::test]
    async fn test_lobby_disconnect_removes_member_immediately() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });

        mgr.on_socket_closed(b);
        assert!(!mgr.rooms[&code].members.contains(&b));
    }

    #[tokio::test]
    async fn test_settings_rejected_from_non_host() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });

        let patch = crate::room::room::SettingsPatch {
            target_wins: Some(9),
            ..Default::default()
        };
        mgr.on_message(b, ClientMessage::LobbySettings { patch: patch.clone() });
        assert_eq!(mgr.rooms[&code].settings.target_wins, 5);

        mgr.on_message(a, ClientMessage::LobbySettings { patch });
        assert_eq!(mgr.rooms[&code].settings.target_wins, 9);
    }

    #[tokio::test]
    async fn test_set_name_truncates_and_renames_world_player() {
        let mut mgr = scratch_manager().await;
        let a = offline_client(&mut mgr);
        let b = offline_client(&mut mgr);
        mgr.on_message(a, ClientMessage::LobbyCreate);
        let code = the_room_code(&mgr);
        mgr.on_message(b, ClientMessage::LobbyJoin { code: code.clone() });
        mgr.on_message(b, ClientMessage::LobbyReady { ready: true });
        mgr.on_message(a, ClientMessage::LobbyStart);

        let long = "x".repeat(40);
        mgr.on_message(a, ClientMessage::SetName { name: long });
        assert_eq!(mgr.clients[&a].name.len(), MAX_NAME_LEN);
        let world = mgr.rooms[&code].world.as_ref().unwrap();
        assert_eq!(world.player(a).unwrap().name.len(), MAX_NAME_LEN);
    }
}
