//! Room State Machine
//!
//! One room loops `lobby -> playing -> lobby`. While playing it owns a World
//! and drives the match bookkeeping: round seeds derived from the match seed,
//! win counting per player token (or team), intermissions between rounds,
//! replay capture, and the carryover roll at match end.
//!
//! The room itself performs no I/O: [`Room::tick`] returns [`RoomOutput`]s
//! and the manager turns them into sends, file writes, and rating updates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rand::Rng;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::game::enclosement::EnclosementDepth;
use crate::game::input::InputState;
use crate::game::scheme::{get_official_scheme, get_theme, ItemType, Scheme, Team, Theme};
use crate::game::snapshot::Snapshot;
use crate::game::world::{PlayerId, RoundTicks, World, WorldError, WorldSettings};
use crate::net::protocol::{RoomEvent, ServerMessage};
use crate::room::replay::{GoldCarryover, MatchResult, ReplayDoc, ReplayRound, RoundResult};
use crate::TICK_HZ;

/// Ticks between round end and the next round start.
pub const INTERMISSION_TICKS: u32 = 3 * TICK_HZ;

/// Snapshot broadcast cadence.
pub const SNAPSHOT_EVERY_TICKS: u32 = 3;

/// Reward pool for the gold carryover roll. Every spawnable stat or ability
/// item qualifies; diseases and rerolls do not.
const GOLD_ROULETTE: [ItemType; 11] = [
    ItemType::BombUp,
    ItemType::FireUp,
    ItemType::FullFire,
    ItemType::SpeedUp,
    ItemType::SpeedDown,
    ItemType::Kick,
    ItemType::BoxingGlove,
    ItemType::PowerGlove,
    ItemType::RemoteControl,
    ItemType::RubberBomb,
    ItemType::LineBomb,
];

// =============================================================================
// SETTINGS
// =============================================================================

/// Room lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Members gathering, settings editable.
    Lobby,
    /// A match is running.
    Playing,
}

/// Free-for-all or two-team play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Every player for themselves.
    #[serde(rename = "FFA")]
    Ffa,
    /// Red versus White, teams taken from spawn points.
    Teams,
}

/// Fuse variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Long 3-second fuses.
    Classic,
    /// Standard 2-second fuses.
    Enhanced,
}

impl Variant {
    /// Base fuse for newly placed bombs under this variant.
    pub fn fuse_ticks(self) -> u32 {
        match self {
            Variant::Classic => 3 * TICK_HZ,
            Variant::Enhanced => 2 * TICK_HZ,
        }
    }
}

/// Round timer: a second count, or `"Infinite"` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerSetting {
    /// Finite timer; clamped to 60..=600 seconds at round start.
    Seconds(u32),
    /// No timer, no enclosement trigger.
    Infinite,
}

impl TimerSetting {
    /// Initial round clock, with the finite range clamped.
    pub fn round_ticks(self) -> RoundTicks {
        match self {
            TimerSetting::Seconds(s) => RoundTicks::Finite(s.clamp(60, 600) * TICK_HZ),
            TimerSetting::Infinite => RoundTicks::Unbounded,
        }
    }
}

impl Serialize for TimerSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TimerSetting::Seconds(s) => serializer.serialize_u32(*s),
            TimerSetting::Infinite => serializer.serialize_str("Infinite"),
        }
    }
}

impl<'de> Deserialize<'de> for TimerSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimerVisitor;

        impl Visitor<'_> for TimerVisitor {
            type Value = TimerSetting;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a second count or the string \"Infinite\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TimerSetting, E> {
                Ok(TimerSetting::Seconds(v.min(u64::from(u32::MAX)) as u32))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TimerSetting, E> {
                self.visit_u64(v.max(0) as u64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TimerSetting, E> {
                if v == "Infinite" {
                    Ok(TimerSetting::Infinite)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(TimerVisitor)
    }
}

/// Host-editable room settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    /// Play mode.
    pub mode: GameMode,
    /// Fuse variant.
    pub variant: Variant,
    /// Round timer.
    #[serde(rename = "timerSeconds")]
    pub timer: TimerSetting,
    /// How far the endgame shrink closes in.
    pub enclosement_depth: EnclosementDepth,
    /// Official scheme id.
    pub scheme_id: String,
    /// Theme id.
    pub theme_id: String,
    /// Roll a carryover item for the match winner.
    pub gold_carryover: bool,
    /// Round wins needed to take the match, 1..=20.
    pub target_wins: u32,
}

impl Default for RoomSettings {
    fn default() -> Self {
        RoomSettings {
            mode: GameMode::Ffa,
            variant: Variant::Enhanced,
            timer: TimerSetting::Seconds(180),
            enclosement_depth: EnclosementDepth::ALittle,
            scheme_id: "default".to_string(),
            theme_id: "green-acres".to_string(),
            gold_carryover: false,
            target_wins: 5,
        }
    }
}

/// Partial settings update from the host. Fields absent from the payload are
/// left unchanged; out-of-range values are ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// New play mode.
    pub mode: Option<GameMode>,
    /// New fuse variant.
    pub variant: Option<Variant>,
    /// New round timer.
    #[serde(rename = "timerSeconds")]
    pub timer: Option<TimerSetting>,
    /// New shrink depth.
    pub enclosement_depth: Option<EnclosementDepth>,
    /// New scheme id.
    pub scheme_id: Option<String>,
    /// New theme id.
    pub theme_id: Option<String>,
    /// New carryover flag.
    pub gold_carryover: Option<bool>,
    /// New win target.
    pub target_wins: Option<u32>,
}

// =============================================================================
// MATCH BOOKKEEPING
// =============================================================================

/// One roster entry, fixed at match start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RosterPlayer {
    /// Player token.
    pub id: PlayerId,
    /// Name at match start.
    pub name: String,
    /// Assigned color.
    pub color: String,
    /// Team for team-mode matches, set at round start.
    pub team: Team,
}

/// Per-match state, alive from start to match end.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Match seed; round seeds are `base_seed ^ round_index`.
    pub base_seed: u32,
    /// Wins needed.
    pub target_wins: u32,
    /// Win counts keyed by player token string or team name.
    pub wins: BTreeMap<String, u32>,
    /// 1-based round counter.
    pub round_index: u32,
    /// Scheme locked in at match start.
    pub scheme: Scheme,
    /// Theme locked in at match start.
    pub theme: Theme,
    /// Roster in fixed order; replay frames follow this order.
    pub players: Vec<RosterPlayer>,
}

/// Side effect of a tick, performed by the manager.
#[derive(Debug)]
pub enum RoomOutput {
    /// Send to every member.
    Broadcast(ServerMessage),
    /// Send per member protocol (JSON message or binary frame).
    Snapshot(Snapshot),
    /// Persist the finished replay.
    SaveReplay(Box<ReplayDoc>),
    /// Record a ranked result.
    RecordRatings {
        /// First roster player.
        a: PlayerId,
        /// Second roster player.
        b: PlayerId,
        /// Match winner.
        winner: PlayerId,
    },
    /// The room fell back to the lobby; the manager rebroadcasts lobby state.
    ReturnedToLobby,
}

/// Win-count key for a team.
fn team_key(team: Team) -> Option<&'static str> {
    match team {
        Team::None => None,
        Team::Red => Some("Red"),
        Team::White => Some("White"),
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// One room: lobby membership plus, while playing, the live World and match
/// bookkeeping.
#[derive(Debug)]
pub struct Room {
    /// Join code.
    pub code: String,
    /// Lifecycle state.
    pub status: RoomStatus,
    /// Current host; migrates to the next remaining member.
    pub host: Option<PlayerId>,
    /// Created through quick play; auto-starts when enough members are ready.
    pub quick_play: bool,
    /// Ranked pair room with locked settings.
    pub ranked: bool,
    /// Members in join order.
    pub members: Vec<PlayerId>,
    /// Assigned display colors.
    pub colors: BTreeMap<PlayerId, String>,
    /// Current settings.
    pub settings: RoomSettings,
    /// Live round, present only mid-round while playing.
    pub world: Option<World>,
    /// Match bookkeeping, present while playing.
    pub match_state: Option<MatchState>,
    /// Carryover from the previous match in this room.
    pub gold_carryover: Option<GoldCarryover>,
    /// Replay accumulator for the running match.
    pub replay: Option<ReplayDoc>,
    /// Ticks left before the next round starts.
    pub intermission_ticks: u32,
    /// True while a tick loop task is driving this room.
    pub loop_running: bool,
}

impl Room {
    /// Fresh lobby with one member as host.
    pub fn new(code: String, host: PlayerId, quick_play: bool, ranked: bool) -> Room {
        let mut room = Room {
            code,
            status: RoomStatus::Lobby,
            host: Some(host),
            quick_play,
            ranked,
            members: vec![host],
            colors: BTreeMap::new(),
            settings: RoomSettings::default(),
            world: None,
            match_state: None,
            gold_carryover: None,
            replay: None,
            intermission_ticks: 0,
            loop_running: false,
        };
        room.assign_colors();
        room
    }

    /// Add a member and assign a free color. No-op if already present.
    pub fn add_member(&mut self, token: PlayerId) {
        if !self.members.contains(&token) {
            self.members.push(token);
        }
        self.assign_colors();
    }

    /// Remove a member, migrating the host to the next remaining member.
    /// Returns true when the room is now empty and should be deleted.
    pub fn remove_member(&mut self, token: PlayerId) -> bool {
        self.members.retain(|t| *t != token);
        self.colors.remove(&token);
        if self.host == Some(token) {
            self.host = self.members.first().copied();
        }
        self.members.is_empty()
    }

    fn assign_colors(&mut self) {
        let used: BTreeSet<String> = self.colors.values().cloned().collect();
        let mut pool = COLOR_POOL.iter().filter(|c| !used.contains(**c));
        for token in &self.members {
            if self.colors.contains_key(token) {
                continue;
            }
            let color = pool.next().copied().unwrap_or(COLOR_POOL[0]);
            self.colors.insert(*token, color.to_string());
        }
    }

    /// Apply a host settings patch. Out-of-range win targets are ignored;
    /// the timer is clamped later, at round start.
    pub fn apply_settings_patch(&mut self, patch: SettingsPatch) {
        if let Some(mode) = patch.mode {
            self.settings.mode = mode;
        }
        if let Some(variant) = patch.variant {
            self.settings.variant = variant;
        }
        if let Some(timer) = patch.timer {
            self.settings.timer = timer;
        }
        if let Some(depth) = patch.enclosement_depth {
            self.settings.enclosement_depth = depth;
        }
        if let Some(scheme_id) = patch.scheme_id {
            self.settings.scheme_id = scheme_id;
        }
        if let Some(theme_id) = patch.theme_id {
            self.settings.theme_id = theme_id;
        }
        if let Some(gold) = patch.gold_carryover {
            self.settings.gold_carryover = gold;
        }
        if let Some(target) = patch.target_wins {
            if (1..=20).contains(&target) {
                self.settings.target_wins = target;
            }
        }
    }

    /// Start a match with the given roster (names and colors resolved by the
    /// manager). Returns the outputs of the first round start, or `None` when
    /// preconditions fail.
    pub fn start_match(
        &mut self,
        roster: Vec<RosterPlayer>,
    ) -> Option<Result<Vec<RoomOutput>, WorldError>> {
        if self.status != RoomStatus::Lobby {
            return None;
        }
        if roster.len() < 2 || roster.len() > crate::MAX_PLAYERS {
            return None;
        }
        if self.ranked && roster.len() != 2 {
            return None;
        }

        let scheme = get_official_scheme(&self.settings.scheme_id);
        let theme = get_theme(&self.settings.theme_id);

        let base_seed: u32 = rand::thread_rng().gen();
        self.status = RoomStatus::Playing;
        self.match_state = Some(MatchState {
            base_seed,
            target_wins: self.settings.target_wins.clamp(1, 20),
            wins: BTreeMap::new(),
            round_index: 0,
            scheme: scheme.clone(),
            theme: theme.clone(),
            players: roster.clone(),
        });
        self.intermission_ticks = 0;
        self.replay = Some(ReplayDoc::new(
            self.ranked,
            scheme,
            theme,
            self.settings.clone(),
            base_seed,
            roster,
            if self.settings.gold_carryover {
                self.gold_carryover
            } else {
                None
            },
        ));

        Some(self.start_round())
    }

    /// Build the next round's World and spawn the roster into it.
    fn start_round(&mut self) -> Result<Vec<RoomOutput>, WorldError> {
        let mut out = Vec::new();
        let Some(ms) = self.match_state.as_mut() else {
            return Ok(out);
        };
        ms.round_index += 1;
        let seed = ms.base_seed ^ ms.round_index;

        let mut world = World::new(
            &ms.scheme,
            seed,
            WorldSettings {
                round_ticks: self.settings.timer.round_ticks(),
                enclosement_depth: self.settings.enclosement_depth,
            },
        )?;

        for (i, roster) in ms.players.iter_mut().enumerate() {
            let spawn_index = i % ms.scheme.spawns.len();
            world.spawn_player(
                &ms.scheme,
                spawn_index,
                roster.id,
                roster.name.clone(),
                roster.color.clone(),
            )?;
            if let Some(p) = world.player_mut(roster.id) {
                if self.settings.mode != GameMode::Teams {
                    p.team = Team::None;
                }
                p.stats_base.fuse_ticks = self.settings.variant.fuse_ticks();
                roster.team = p.team;
            }
        }

        // Carryover from the previous match, re-applied every round.
        if self.settings.gold_carryover {
            if let Some(carry) = self.gold_carryover {
                if world.grant_item(carry.winner_token, carry.item) {
                    if let Some(p) = world.player_mut(carry.winner_token) {
                        p.is_gold = true;
                    }
                    out.push(RoomOutput::Broadcast(ServerMessage::Event {
                        e: RoomEvent::Gold {
                            winner_token: carry.winner_token,
                            item: carry.item,
                        },
                    }));
                }
            }
        }

        if let Some(replay) = self.replay.as_mut() {
            replay.rounds.push(ReplayRound {
                seed,
                frames: Vec::new(),
                result: None,
            });
        }

        out.push(RoomOutput::Broadcast(ServerMessage::MatchStart {
            code: self.code.clone(),
            scheme: ms.scheme.clone(),
            theme: ms.theme.clone(),
            settings: self.settings.clone(),
            seed,
            players: ms.players.clone(),
            round_index: ms.round_index,
            wins: ms.wins.clone(),
            target_wins: ms.target_wins,
        }));

        self.world = Some(world);
        Ok(out)
    }

    /// The match_start message for a member who reconnected mid-round.
    pub fn resume_message(&self) -> Option<ServerMessage> {
        let ms = self.match_state.as_ref()?;
        let world = self.world.as_ref()?;
        Some(ServerMessage::MatchStart {
            code: self.code.clone(),
            scheme: ms.scheme.clone(),
            theme: ms.theme.clone(),
            settings: self.settings.clone(),
            seed: world.seed,
            players: ms.players.clone(),
            round_index: ms.round_index,
            wins: ms.wins.clone(),
            target_wins: ms.target_wins,
        })
    }

    /// Advance the room by one tick: apply the latest member inputs, record
    /// the replay frame, step the world, and detect round and match end.
    pub fn tick(&mut self, inputs: &BTreeMap<PlayerId, InputState>) -> Vec<RoomOutput> {
        let mut out = Vec::new();
        if self.status != RoomStatus::Playing || self.match_state.is_none() {
            return out;
        }

        // Between rounds only the intermission clock runs.
        if self.world.is_none() {
            if self.intermission_ticks > 0 {
                self.intermission_ticks -= 1;
            }
            if self.intermission_ticks == 0 {
                match self.start_round() {
                    Ok(started) => out.extend(started),
                    Err(e) => {
                        tracing::error!(code = %self.code, "round start failed: {e}");
                        self.stop();
                        out.push(RoomOutput::ReturnedToLobby);
                    }
                }
            }
            return out;
        }

        let (Some(world), Some(ms)) = (self.world.as_mut(), self.match_state.as_mut()) else {
            return out;
        };

        for roster in &ms.players {
            world.apply_input(
                roster.id,
                inputs.get(&roster.id).copied().unwrap_or_default(),
            );
        }

        // Replay frame: the server-applied inputs in roster order.
        if let Some(round) = self.replay.as_mut().and_then(|r| r.rounds.last_mut()) {
            let frame: Vec<u8> = ms
                .players
                .iter()
                .map(|p| inputs.get(&p.id).copied().unwrap_or_default().pack())
                .collect();
            round.frames.push(frame);
        }

        world.step();

        if world.tick % SNAPSHOT_EVERY_TICKS == 0 {
            out.push(RoomOutput::Snapshot(world.snapshot()));
        }

        // Round end detection.
        let alive: Vec<(PlayerId, Team)> = world
            .players
            .iter()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.team))
            .collect();
        let time_up = world.round_ticks_remaining.expired();
        let alive_teams: BTreeSet<&'static str> =
            alive.iter().filter_map(|(_, t)| team_key(*t)).collect();

        let winner_key: Option<String> = if self.settings.mode == GameMode::Teams {
            (alive_teams.len() == 1)
                .then(|| alive_teams.iter().next().map(|t| t.to_string()))
                .flatten()
        } else {
            (alive.len() == 1).then(|| alive[0].0.to_string())
        };

        let round_over = time_up
            || winner_key.is_some()
            || if self.settings.mode == GameMode::Teams {
                alive_teams.len() <= 1
            } else {
                alive.len() <= 1
            };
        if !round_over {
            return out;
        }

        if let Some(round) = self.replay.as_mut().and_then(|r| r.rounds.last_mut()) {
            round.result = Some(RoundResult {
                ended_at: Utc::now(),
                winner_key: winner_key.clone(),
                alive_tokens: alive.iter().map(|(id, _)| *id).collect(),
            });
        }
        if let Some(key) = &winner_key {
            *ms.wins.entry(key.clone()).or_insert(0) += 1;
        }

        out.push(RoomOutput::Broadcast(ServerMessage::Event {
            e: RoomEvent::RoundEnd {
                winner_key: winner_key.clone(),
                wins: ms.wins.clone(),
            },
        }));

        let match_over = winner_key
            .as_ref()
            .is_some_and(|k| ms.wins.get(k).copied().unwrap_or(0) >= ms.target_wins);
        if !match_over {
            self.world = None;
            self.intermission_ticks = INTERMISSION_TICKS;
            return out;
        }

        // Match end.
        let wins = ms.wins.clone();
        let winner_id = ms
            .players
            .iter()
            .find(|p| winner_key.as_deref() == Some(p.id.to_string().as_str()))
            .map(|p| p.id);

        self.gold_carryover = if self.settings.gold_carryover
            && self.settings.mode != GameMode::Teams
        {
            winner_id.map(|winner| GoldCarryover {
                winner_token: winner,
                item: GOLD_ROULETTE[rand::thread_rng().gen_range(0..GOLD_ROULETTE.len())],
            })
        } else {
            None
        };

        if self.ranked && self.settings.mode != GameMode::Teams && ms.players.len() == 2 {
            if let Some(winner) = winner_id {
                out.push(RoomOutput::RecordRatings {
                    a: ms.players[0].id,
                    b: ms.players[1].id,
                    winner,
                });
            }
        }

        if let Some(mut replay) = self.replay.take() {
            replay.match_result = Some(MatchResult {
                ended_at: Utc::now(),
                winner_key: winner_key.clone(),
                wins: wins.clone(),
            });
            out.push(RoomOutput::SaveReplay(Box::new(replay)));
        }

        out.push(RoomOutput::Broadcast(ServerMessage::MatchEnd {
            code: self.code.clone(),
            winner_key,
            wins,
        }));

        self.stop();
        out.push(RoomOutput::ReturnedToLobby);
        out
    }

    /// Tear down match state and fall back to the lobby.
    pub fn stop(&mut self) {
        self.world = None;
        self.match_state = None;
        self.replay = None;
        self.intermission_ticks = 0;
        self.status = RoomStatus::Lobby;
    }
}

/// Fixed display color pool, assigned in join order.
pub const COLOR_POOL: [&str; 10] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22", "#1abc9c", "#ec87c0",
    "#95a5a6", "#34495e",
];
