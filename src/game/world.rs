//! World State
//!
//! All simulation state for one round, plus entity management: players,
//! bombs, explosions, floor items, and the hidden items seeded under soft
//! blocks. Collections are either insertion-ordered vectors or BTreeMaps so
//! that iteration order is deterministic across runs.
//!
//! The per-tick pipeline lives in [`crate::game::step`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::Mulberry32;
use crate::game::enclosement::EnclosementDepth;
use crate::game::events::GameEvent;
use crate::game::input::InputState;
use crate::game::items::{self, Ability};
use crate::game::scheme::{validate_scheme, ItemRules, ItemType, OverrideMode, Scheme, SchemeError, Team, TileType};
use crate::game::status::{DiseaseSet, EffectiveStats};
use crate::{BOMB_FUSE_TICKS, EXPLOSION_TTL_TICKS, MAX_PLAYERS, SUBTILE, TICK_HZ};

// =============================================================================
// IDS
// =============================================================================

/// Unique player identifier within a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Bomb identifier, unique within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BombId(pub u32);

/// Explosion identifier, unique within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExplosionId(pub u32);

// =============================================================================
// ROUND CLOCK / FUSES
// =============================================================================

/// Remaining round time in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundTicks {
    /// Counting down.
    Finite(u32),
    /// Infinite-timer rounds never expire.
    Unbounded,
}

impl RoundTicks {
    /// Decrement, saturating at zero.
    pub fn tick(&mut self) {
        if let RoundTicks::Finite(t) = self {
            *t = t.saturating_sub(1);
        }
    }

    /// True when the clock has run out.
    pub fn expired(self) -> bool {
        matches!(self, RoundTicks::Finite(0))
    }

    /// Whole seconds remaining, rounded up.
    pub fn seconds_remaining(self) -> Option<u32> {
        match self {
            RoundTicks::Finite(t) => Some(t.div_ceil(TICK_HZ)),
            RoundTicks::Unbounded => None,
        }
    }
}

/// A bomb fuse: finite tick count, or armed until remotely triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fuse {
    /// Detonates when this reaches zero.
    Ticks(u32),
    /// Remote-trigger bombs never expire on their own.
    Unbounded,
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Why a player died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathReason {
    /// Caught in a blast.
    Explosion,
    /// Crushed by a closing block.
    Enclosement,
    /// Left the round and did not come back within the grace period.
    Disconnect,
}

/// Base stats, before disease effects.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Movement speed level, 1..=10.
    pub speed: u8,
    /// Concurrent bomb limit, 1..=10.
    pub bomb_cap: u8,
    /// Blast length in tiles, 1..=10.
    pub flame: u8,
    /// Fuse of newly placed timed bombs.
    pub fuse_ticks: u32,
}

/// A bomb lifted off the floor; it keeps ticking while carried.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CarriedBomb {
    /// Blast length.
    pub flame: u8,
    /// Remaining fuse.
    pub fuse: Fuse,
    /// Flags carried over to the thrown bomb.
    pub flags: BombFlags,
}

/// One player in the round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Stable id, shared with the owning session.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Team for team-mode rounds.
    pub team: Team,
    /// Gold roulette winner flag (carried across rounds by the room).
    pub is_gold: bool,
    /// False once dead; dead players take no actions.
    pub alive: bool,
    /// Set alongside `alive = false`.
    pub death_reason: Option<DeathReason>,
    /// Position in sub-tile units (center of the hurtbox).
    pub x: i32,
    /// Position in sub-tile units.
    pub y: i32,
    /// Cardinal facing for item actions.
    pub facing: (i8, i8),
    /// Latest input from the session.
    pub input: InputState,
    /// Bombs currently on the floor owned by this player.
    pub bombs_placed: u32,
    /// Base stats.
    pub stats_base: PlayerStats,
    /// Stats after diseases, refreshed every tick.
    #[serde(skip)]
    pub stats: EffectiveStats,
    /// Permanent abilities.
    pub ability: Ability,
    /// Armed remote-trigger bombs, detonated FIFO.
    pub trigger_bombs: VecDeque<BombId>,
    /// Active diseases.
    pub diseases: DiseaseSet,
    /// At most one carried bomb.
    pub carrying: Option<CarriedBomb>,
    /// Tick of the previous drop press, for line-bomb double-tap.
    pub last_drop_tick: Option<u32>,
}

impl Player {
    /// Tile containing the player's center.
    pub fn tile(&self) -> (i32, i32) {
        (self.x.div_euclid(SUBTILE), self.y.div_euclid(SUBTILE))
    }

    /// Facing snapped to a cardinal direction, defaulting to east.
    pub fn facing_dir(&self) -> (i32, i32) {
        let (fx, fy) = self.facing;
        if fx != 0 {
            (fx.signum() as i32, 0)
        } else if fy != 0 {
            (0, fy.signum() as i32)
        } else {
            (1, 0)
        }
    }
}

// =============================================================================
// BOMBS / EXPLOSIONS
// =============================================================================

/// Behavior flags a bomb carries from its placer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombFlags {
    /// Remote-trigger bomb.
    pub trigger: bool,
    /// Bounces off obstacles when sliding.
    pub jelly: bool,
}

/// Sliding state of a kicked bomb.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BombMotion {
    /// Direction x, -1/0/+1.
    pub dx: i8,
    /// Direction y, -1/0/+1.
    pub dy: i8,
    /// Ticks until the next tile step.
    pub cooldown: u8,
    /// Player who kicked it; only they may stop it.
    pub owner_id: PlayerId,
}

/// A bomb on the floor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bomb {
    /// Bomb id.
    pub id: BombId,
    /// Tile x.
    pub tx: u8,
    /// Tile y.
    pub ty: u8,
    /// Placing player.
    pub owner_id: PlayerId,
    /// Blast length in tiles.
    pub flame: u8,
    /// Remaining fuse.
    pub fuse: Fuse,
    /// Sliding state when kicked.
    pub moving: Option<BombMotion>,
    /// Players allowed to stand on this tile (placer until they walk off).
    pub passable_by: BTreeSet<PlayerId>,
    /// Behavior flags.
    pub flags: BombFlags,
}

/// An active blast, hot for a fixed number of ticks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Explosion {
    /// Explosion id.
    pub id: ExplosionId,
    /// Covered tiles.
    pub tiles: Vec<(u8, u8)>,
    /// Remaining hot ticks.
    pub ttl: u32,
}

// =============================================================================
// WORLD
// =============================================================================

/// Per-round knobs supplied by the room.
#[derive(Clone, Copy, Debug)]
pub struct WorldSettings {
    /// Initial round clock.
    pub round_ticks: RoundTicks,
    /// Shrink depth for the endgame.
    pub enclosement_depth: EnclosementDepth,
}

/// Full state of one round.
#[derive(Clone, Debug)]
pub struct World {
    /// Grid width in tiles.
    pub width: u8,
    /// Grid height in tiles.
    pub height: u8,
    /// Row-major tile grid; mutated as blocks are destroyed and rebuilt.
    pub tiles: Vec<TileType>,
    /// Ticks advanced so far.
    pub tick: u32,
    /// Seed this round was created with.
    pub seed: u32,
    pub(crate) rng: Mulberry32,

    /// Players in join order.
    pub players: Vec<Player>,
    /// Bombs in placement order.
    pub bombs: Vec<Bomb>,
    pub(crate) bombs_by_tile: BTreeMap<(u8, u8), BombId>,
    /// Explosions in detonation order.
    pub explosions: Vec<Explosion>,
    /// Revealed floor items by tile.
    pub items: BTreeMap<(u8, u8), ItemType>,
    pub(crate) hidden_items: BTreeMap<(u8, u8), ItemType>,

    /// Remaining round clock.
    pub round_ticks_remaining: RoundTicks,
    pub(crate) enclosement_depth: EnclosementDepth,
    pub(crate) enclosement_active: bool,
    pub(crate) enclosement_order: Vec<(u8, u8)>,
    pub(crate) enclosement_index: usize,
    pub(crate) enclosement_cooldown: u32,

    pub(crate) item_rules: ItemRules,
    pub(crate) random_pool: Vec<ItemType>,

    pub(crate) next_entity_id: u32,
    pub(crate) detonation_queue: VecDeque<(BombId, bool)>,

    /// Events emitted by the current tick.
    pub events: Vec<GameEvent>,
}

/// World construction or mutation failure.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Scheme failed validation.
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    /// Player cap reached.
    #[error("world full: {0} players max")]
    Full(usize),
    /// Spawn index out of range for the scheme.
    #[error("no spawn point at index {0}")]
    NoSpawn(usize),
}

impl World {
    /// Build a world from a validated scheme and seed hidden items.
    pub fn new(scheme: &Scheme, seed: u32, settings: WorldSettings) -> Result<World, WorldError> {
        validate_scheme(scheme)?;
        let mut world = World {
            width: scheme.width,
            height: scheme.height,
            tiles: scheme.tiles.clone(),
            tick: 0,
            seed,
            rng: Mulberry32::new(seed),
            players: Vec::new(),
            bombs: Vec::new(),
            bombs_by_tile: BTreeMap::new(),
            explosions: Vec::new(),
            items: BTreeMap::new(),
            hidden_items: BTreeMap::new(),
            round_ticks_remaining: settings.round_ticks,
            enclosement_depth: settings.enclosement_depth,
            enclosement_active: false,
            enclosement_order: Vec::new(),
            enclosement_index: 0,
            enclosement_cooldown: 0,
            item_rules: scheme.item_rules.clone(),
            random_pool: items::random_pool(&scheme.item_rules),
            next_entity_id: 1,
            detonation_queue: VecDeque::new(),
            events: Vec::new(),
        };
        world.seed_hidden_items();
        Ok(world)
    }

    /// Spawn a player at the scheme spawn with the given index, applying
    /// born-with item rules.
    pub fn spawn_player(
        &mut self,
        scheme: &Scheme,
        spawn_index: usize,
        id: PlayerId,
        name: String,
        color: String,
    ) -> Result<(), WorldError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(WorldError::Full(MAX_PLAYERS));
        }
        let spawn = scheme
            .spawns
            .get(spawn_index)
            .copied()
            .ok_or(WorldError::NoSpawn(spawn_index))?;

        let born = |it: ItemType| scheme.item_rules.rule(it).born_with;
        let bomb_cap = (1 + born(ItemType::BombUp)).clamp(1, 10) as u8;
        let flame = (1 + born(ItemType::FireUp)).clamp(1, 10) as u8;
        let stats = PlayerStats {
            speed: 5,
            bomb_cap,
            flame,
            fuse_ticks: BOMB_FUSE_TICKS,
        };

        self.players.push(Player {
            id,
            name,
            color,
            team: spawn.team,
            is_gold: false,
            alive: true,
            death_reason: None,
            x: i32::from(spawn.x) * SUBTILE + SUBTILE / 2,
            y: i32::from(spawn.y) * SUBTILE + SUBTILE / 2,
            facing: (1, 0),
            input: InputState::default(),
            bombs_placed: 0,
            stats_base: stats,
            stats: EffectiveStats {
                speed: stats.speed,
                flame: stats.flame,
                fuse_ticks: stats.fuse_ticks,
                reverse_controls: false,
                constipation: false,
                poops: false,
            },
            ability: Ability::default(),
            trigger_bombs: VecDeque::new(),
            diseases: DiseaseSet::default(),
            carrying: None,
            last_drop_tick: None,
        });
        Ok(())
    }

    /// Remove a player (room teardown or mid-round leave).
    pub fn remove_player(&mut self, id: PlayerId) {
        self.players.retain(|p| p.id != id);
    }

    /// Kill a player whose connection grace period expired.
    pub fn mark_disconnected(&mut self, id: PlayerId) {
        if let Some(p) = self.players.iter_mut().find(|p| p.id == id) {
            if p.alive {
                p.alive = false;
                p.death_reason = Some(DeathReason::Disconnect);
                self.events.push(GameEvent::PlayerDead {
                    id,
                    reason: DeathReason::Disconnect,
                });
            }
        }
    }

    /// Grant an item to a player through the normal pickup path. Used by the
    /// room for gold carryover at round start.
    pub fn grant_item(&mut self, id: PlayerId, item: ItemType) -> bool {
        match self.players.iter().position(|p| p.id == id) {
            Some(pi) => {
                self.apply_item_pickup(pi, item);
                true
            }
            None => false,
        }
    }

    /// Replace a player's input for the next tick.
    pub fn apply_input(&mut self, id: PlayerId, input: InputState) {
        if let Some(p) = self.players.iter_mut().find(|p| p.id == id) {
            p.input = input;
        }
    }

    /// Lookup by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Mutable lookup by id.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Players still alive.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    // =========================================================================
    // TILES
    // =========================================================================

    /// Tile at a coordinate; out of bounds reads as Hard.
    pub fn tile_at(&self, tx: i32, ty: i32) -> TileType {
        if tx < 0 || ty < 0 || tx >= i32::from(self.width) || ty >= i32::from(self.height) {
            return TileType::Hard;
        }
        self.tiles[ty as usize * self.width as usize + tx as usize]
    }

    pub(crate) fn set_tile(&mut self, tx: u8, ty: u8, tile: TileType) {
        let idx = ty as usize * self.width as usize + tx as usize;
        self.tiles[idx] = tile;
    }

    /// Hard and soft blocks stop players and blasts.
    pub fn is_blocking_tile(&self, tx: i32, ty: i32) -> bool {
        matches!(self.tile_at(tx, ty), TileType::Hard | TileType::Soft)
    }

    pub(crate) fn is_blocked_for_player(&self, player_id: PlayerId, tx: i32, ty: i32) -> bool {
        if self.is_blocking_tile(tx, ty) {
            return true;
        }
        let Some(&bomb_id) = self.bombs_by_tile.get(&(tx as u8, ty as u8)) else {
            return false;
        };
        match self.bomb(bomb_id) {
            Some(bomb) => !bomb.passable_by.contains(&player_id),
            None => false,
        }
    }

    // =========================================================================
    // BOMBS
    // =========================================================================

    /// Lookup by id.
    pub fn bomb(&self, id: BombId) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.id == id)
    }

    pub(crate) fn bomb_mut(&mut self, id: BombId) -> Option<&mut Bomb> {
        self.bombs.iter_mut().find(|b| b.id == id)
    }

    /// Bomb occupying a tile, if any.
    pub fn bomb_at(&self, tx: u8, ty: u8) -> Option<BombId> {
        self.bombs_by_tile.get(&(tx, ty)).copied()
    }

    /// Place a bomb on a free floor tile. Returns None when the tile is
    /// blocked or already occupied.
    pub fn spawn_bomb(
        &mut self,
        tx: u8,
        ty: u8,
        owner_id: PlayerId,
        flame: u8,
        fuse: Fuse,
        flags: BombFlags,
        passable_by: BTreeSet<PlayerId>,
    ) -> Option<BombId> {
        if self.is_blocking_tile(i32::from(tx), i32::from(ty)) {
            return None;
        }
        if self.bombs_by_tile.contains_key(&(tx, ty)) {
            return None;
        }
        let id = BombId(self.next_entity_id);
        self.next_entity_id += 1;
        self.bombs.push(Bomb {
            id,
            tx,
            ty,
            owner_id,
            flame,
            fuse,
            moving: None,
            passable_by,
            flags,
        });
        self.bombs_by_tile.insert((tx, ty), id);
        self.events.push(GameEvent::BombPlaced {
            id,
            tx,
            ty,
            owner_id,
        });

        if flags.trigger {
            if let Some(owner) = self.player_mut(owner_id) {
                owner.trigger_bombs.push_back(id);
            }
        }
        Some(id)
    }

    /// Take a bomb out of the world, unarming it from its owner's trigger
    /// list.
    pub fn remove_bomb(&mut self, id: BombId, silent: bool) -> Option<Bomb> {
        let idx = self.bombs.iter().position(|b| b.id == id)?;
        let bomb = self.bombs.remove(idx);
        self.bombs_by_tile.remove(&(bomb.tx, bomb.ty));
        if let Some(owner) = self.player_mut(bomb.owner_id) {
            owner.trigger_bombs.retain(|b| *b != id);
        }
        if !silent {
            self.events.push(GameEvent::BombRemoved { id });
        }
        Some(bomb)
    }

    /// Detonate a bomb now, processing any chain reactions it sets off.
    pub fn detonate_bomb(&mut self, id: BombId) {
        self.detonation_queue.push_back((id, false));
        self.drain_detonations();
    }

    pub(crate) fn drain_detonations(&mut self) {
        while let Some((id, chain)) = self.detonation_queue.pop_front() {
            if self.bomb(id).is_some() {
                self.detonate_now(id, chain);
            }
        }
    }

    /// Blast propagation: center tile, then each cardinal arm up to flame
    /// length, stopping at hard blocks and consuming the first soft block.
    fn detonate_now(&mut self, id: BombId, chain: bool) {
        let Some(bomb) = self.remove_bomb(id, false) else {
            return;
        };
        let mut tiles = vec![(bomb.tx, bomb.ty)];
        for (dx, dy) in [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)] {
            for i in 1..=i32::from(bomb.flame) {
                let tx = i32::from(bomb.tx) + dx * i;
                let ty = i32::from(bomb.ty) + dy * i;
                let tile = self.tile_at(tx, ty);
                if tile == TileType::Hard {
                    break;
                }
                tiles.push((tx as u8, ty as u8));
                if tile == TileType::Soft {
                    break;
                }
            }
        }

        let explosion_id = ExplosionId(self.next_entity_id);
        self.next_entity_id += 1;
        self.explosions.push(Explosion {
            id: explosion_id,
            tiles: tiles.clone(),
            ttl: EXPLOSION_TTL_TICKS,
        });
        self.events.push(GameEvent::Explosion {
            id: explosion_id,
            tiles: tiles.clone(),
            chain,
        });

        for (tx, ty) in tiles {
            if self.tile_at(i32::from(tx), i32::from(ty)) == TileType::Soft {
                self.set_tile(tx, ty, TileType::Floor);
                self.reveal_hidden_item(tx, ty);
            } else if self.item_rules.items_destructible {
                self.items.remove(&(tx, ty));
            }
            if let Some(other) = self.bombs_by_tile.get(&(tx, ty)).copied() {
                self.detonation_queue.push_back((other, true));
            }
        }
    }

    // =========================================================================
    // ITEMS
    // =========================================================================

    /// Drop an item on a free floor tile.
    pub fn spawn_item(&mut self, tx: u8, ty: u8, item: ItemType) -> bool {
        if self.is_blocking_tile(i32::from(tx), i32::from(ty)) {
            return false;
        }
        if self.items.contains_key(&(tx, ty)) {
            return false;
        }
        self.items.insert((tx, ty), item);
        true
    }

    /// Uniform draw from the random pool, for SelectItem rerolls.
    pub fn roll_select_item(&mut self) -> Option<ItemType> {
        if self.random_pool.is_empty() {
            return None;
        }
        let idx = self.rng.next_below(self.random_pool.len() as u32) as usize;
        Some(self.random_pool[idx])
    }

    pub(crate) fn reveal_hidden_item(&mut self, tx: u8, ty: u8) {
        if let Some(item) = self.hidden_items.remove(&(tx, ty)) {
            self.spawn_item(tx, ty, item);
        }
    }

    /// Roll the item density over every soft block, then allocate
    /// FixedCount items first and fill the rest from the weighted pool.
    fn seed_hidden_items(&mut self) {
        let density = self.item_rules.density_percent;
        let mut item_tiles = Vec::new();
        for ty in 0..self.height {
            for tx in 0..self.width {
                if self.tile_at(i32::from(tx), i32::from(ty)) != TileType::Soft {
                    continue;
                }
                if self.rng.chance(density, 100) {
                    item_tiles.push((tx, ty));
                }
            }
        }
        self.rng.shuffle(&mut item_tiles);

        for it in items::MAP_SPAWNABLE {
            let rule = self.item_rules.rule(it);
            if rule.override_rule.mode != OverrideMode::FixedCount {
                continue;
            }
            for _ in 0..rule.override_rule.value {
                let Some((tx, ty)) = item_tiles.pop() else {
                    break;
                };
                self.hidden_items.insert((tx, ty), it);
            }
        }

        let pool = items::weighted_pool(&self.item_rules);
        for (tx, ty) in item_tiles {
            let item = items::pick_weighted(&mut self.rng, &pool);
            self.hidden_items.insert((tx, ty), item);
        }
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Four-corner sample: does the hurtbox centered at (x, y) overlap the
    /// tile?
    pub(crate) fn hurtbox_overlaps_tile(x: i32, y: i32, tx: i32, ty: i32) -> bool {
        let r = crate::PLAYER_RADIUS;
        for (sx, sy) in [(x - r, y - r), (x + r, y - r), (x - r, y + r), (x + r, y + r)] {
            if sx.div_euclid(SUBTILE) == tx && sy.div_euclid(SUBTILE) == ty {
                return true;
            }
        }
        false
    }

    /// Farthest free floor tile along a ray, for throws and punches.
    pub(crate) fn farthest_landing_tile(
        &self,
        from_tx: i32,
        from_ty: i32,
        dx: i32,
        dy: i32,
    ) -> Option<(u8, u8)> {
        let mut candidate = None;
        let max_steps = i32::from(self.width) + i32::from(self.height);
        for i in 1..=max_steps {
            let tx = from_tx + dx * i;
            let ty = from_ty + dy * i;
            if tx < 0 || ty < 0 || tx >= i32::from(self.width) || ty >= i32::from(self.height) {
                break;
            }
            if self.tile_at(tx, ty) != TileType::Floor {
                continue;
            }
            if self.bombs_by_tile.contains_key(&(tx as u8, ty as u8)) {
                continue;
            }
            candidate = Some((tx as u8, ty as u8));
        }
        candidate
    }

    pub(crate) fn kill_player(&mut self, pi: usize, reason: DeathReason) {
        let p = &mut self.players[pi];
        if !p.alive {
            return;
        }
        p.alive = false;
        p.death_reason = Some(reason);
        let id = p.id;
        self.events.push(GameEvent::PlayerDead { id, reason });
    }
}
