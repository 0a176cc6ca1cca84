//! Renderable Snapshots
//!
//! A [`Snapshot`] is the per-tick view of a world that clients render: the
//! JSON sub-protocol sends it as-is, the binary sub-protocol runs it
//! through [`crate::codec`]. Unbounded clocks and fuses appear as `None`
//! here; wire sentinels exist only inside the codec.

use serde::{Deserialize, Serialize};

use crate::game::items::Ability;
use crate::game::scheme::{ItemType, Team, TileType};
use crate::game::status::DiseaseType;
use crate::game::world::{
    BombFlags, BombId, ExplosionId, Fuse, PlayerId, RoundTicks, World,
};

/// Stats as rendered: either the base or the disease-adjusted values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Movement speed level.
    pub speed: u8,
    /// Concurrent bomb limit.
    pub bomb_cap: u8,
    /// Blast length in tiles.
    pub flame: u8,
    /// Fuse of newly placed timed bombs.
    pub fuse_ticks: u32,
}

/// One player as rendered.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Sub-tile x.
    pub x: i32,
    /// Sub-tile y.
    pub y: i32,
    /// Alive flag.
    pub alive: bool,
    /// Team.
    pub team: Team,
    /// Gold roulette winner.
    pub is_gold: bool,
    /// Disease-adjusted stats.
    pub stats: StatsSnapshot,
    /// Base stats.
    pub stats_base: StatsSnapshot,
    /// Ability set.
    pub ability: Ability,
    /// Active disease effects, oldest first.
    pub diseases: Vec<DiseaseType>,
    /// Carrying a bomb.
    pub carrying: bool,
}

/// Sliding direction of a kicked bomb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSnapshot {
    /// Direction x.
    pub dx: i8,
    /// Direction y.
    pub dy: i8,
}

/// One bomb as rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombSnapshot {
    /// Bomb id.
    pub id: BombId,
    /// Tile x.
    pub tx: u8,
    /// Tile y.
    pub ty: u8,
    /// Remaining fuse; `None` for remote-trigger bombs.
    pub fuse_ticks: Option<u32>,
    /// Blast length.
    pub flame: u8,
    /// Sliding state.
    pub moving: Option<MotionSnapshot>,
    /// Behavior flags.
    pub flags: BombFlags,
}

/// One active blast as rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionSnapshot {
    /// Explosion id.
    pub id: ExplosionId,
    /// Covered tiles.
    pub tiles: Vec<(u8, u8)>,
    /// Remaining hot ticks.
    pub ttl: u32,
}

/// One floor item as rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Tile x.
    pub x: u8,
    /// Tile y.
    pub y: u8,
    /// Item on the tile.
    #[serde(rename = "type")]
    pub item: ItemType,
}

/// Full renderable state of one tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Tick this snapshot was taken at.
    pub tick: u32,
    /// Grid width.
    pub width: u8,
    /// Grid height.
    pub height: u8,
    /// Row-major tile grid.
    pub tiles: Vec<TileType>,
    /// Players in join order.
    pub players: Vec<PlayerSnapshot>,
    /// Bombs in placement order.
    pub bombs: Vec<BombSnapshot>,
    /// Active explosions.
    pub explosions: Vec<ExplosionSnapshot>,
    /// Revealed floor items.
    pub items: Vec<ItemSnapshot>,
    /// Remaining round clock; `None` on an infinite timer.
    pub round_ticks_remaining: Option<u32>,
    /// Events from the tick the snapshot was taken at.
    pub events: Vec<crate::game::events::GameEvent>,
}

impl World {
    /// Capture the renderable state of the current tick.
    pub fn snapshot(&self) -> Snapshot {
        let players = self
            .players
            .iter()
            .map(|p| PlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                color: p.color.clone(),
                x: p.x,
                y: p.y,
                alive: p.alive,
                team: p.team,
                is_gold: p.is_gold,
                stats: StatsSnapshot {
                    speed: p.stats.speed,
                    bomb_cap: p.stats_base.bomb_cap,
                    flame: p.stats.flame,
                    fuse_ticks: p.stats.fuse_ticks,
                },
                stats_base: StatsSnapshot {
                    speed: p.stats_base.speed,
                    bomb_cap: p.stats_base.bomb_cap,
                    flame: p.stats_base.flame,
                    fuse_ticks: p.stats_base.fuse_ticks,
                },
                ability: p.ability,
                diseases: p.diseases.iter().map(|d| d.effect).collect(),
                carrying: p.carrying.is_some(),
            })
            .collect();

        let bombs = self
            .bombs
            .iter()
            .map(|b| BombSnapshot {
                id: b.id,
                tx: b.tx,
                ty: b.ty,
                fuse_ticks: match b.fuse {
                    Fuse::Ticks(t) => Some(t),
                    Fuse::Unbounded => None,
                },
                flame: b.flame,
                moving: b.moving.map(|m| MotionSnapshot { dx: m.dx, dy: m.dy }),
                flags: b.flags,
            })
            .collect();

        let explosions = self
            .explosions
            .iter()
            .map(|e| ExplosionSnapshot {
                id: e.id,
                tiles: e.tiles.clone(),
                ttl: e.ttl,
            })
            .collect();

        let items = self
            .items
            .iter()
            .map(|(&(x, y), &item)| ItemSnapshot { x, y, item })
            .collect();

        Snapshot {
            tick: self.tick,
            width: self.width,
            height: self.height,
            tiles: self.tiles.clone(),
            players,
            bombs,
            explosions,
            items,
            round_ticks_remaining: match self.round_ticks_remaining {
                RoundTicks::Finite(t) => Some(t),
                RoundTicks::Unbounded => None,
            },
            events: self.events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::game::enclosement::EnclosementDepth;
    use crate::game::scheme::default_scheme;
    use crate::game::world::WorldSettings;
    use crate::TICK_HZ;

    fn snap_world() -> World {
        let scheme = default_scheme();
        let mut world = World::new(
            &scheme,
            11,
            WorldSettings {
                round_ticks: RoundTicks::Finite(180 * TICK_HZ),
                enclosement_depth: EnclosementDepth::ALittle,
            },
        )
        .unwrap();
        world
            .spawn_player(&scheme, 0, PlayerId::random(), "tester".into(), "#4f8cff".into())
            .unwrap();
        world
    }

    #[test]
    fn test_snapshot_reflects_world() {
        let mut world = snap_world();
        world
            .spawn_bomb(
                3,
                1,
                world.players[0].id,
                2,
                Fuse::Unbounded,
                BombFlags { trigger: true, jelly: false },
                BTreeSet::new(),
            )
            .unwrap();
        world.step();

        let snap = world.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.bombs.len(), 1);
        assert_eq!(snap.bombs[0].fuse_ticks, None);
        assert!(snap.bombs[0].flags.trigger);
        assert_eq!(snap.round_ticks_remaining, Some(180 * TICK_HZ - 1));
        assert_eq!(snap.tiles.len(), 15 * 11);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let world = snap_world();
        let value = serde_json::to_value(world.snapshot()).unwrap();
        assert!(value.get("roundTicksRemaining").is_some());
        assert!(value["players"][0].get("isGold").is_some());
        assert!(value["players"][0]["statsBase"].get("bombCap").is_some());
    }

    #[test]
    fn test_unbounded_clock_is_null() {
        let scheme = default_scheme();
        let world = World::new(
            &scheme,
            1,
            WorldSettings {
                round_ticks: RoundTicks::Unbounded,
                enclosement_depth: EnclosementDepth::None,
            },
        )
        .unwrap();
        let value = serde_json::to_value(world.snapshot()).unwrap();
        assert!(value["roundTicksRemaining"].is_null());
    }
}
