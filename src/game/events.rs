//! Game Events
//!
//! Events generated during simulation, drained once per tick. Rooms forward
//! them to clients verbatim as JSON, so the wire tags are part of the
//! protocol.

use serde::{Deserialize, Serialize};

use crate::game::scheme::ItemType;
use crate::game::status::DiseaseSource;
use crate::game::world::{BombId, DeathReason, ExplosionId, PlayerId};

/// One simulation event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum GameEvent {
    /// A bomb appeared on a tile.
    BombPlaced {
        /// Bomb id.
        id: BombId,
        /// Tile x.
        tx: u8,
        /// Tile y.
        ty: u8,
        /// Placing player.
        owner_id: PlayerId,
    },
    /// A bomb left the world (detonated or crushed).
    BombRemoved {
        /// Bomb id.
        id: BombId,
    },
    /// A bomb started sliding.
    BombKicked {
        /// Bomb id.
        id: BombId,
        /// Direction x.
        dx: i8,
        /// Direction y.
        dy: i8,
        /// Kicking player.
        owner_id: PlayerId,
    },
    /// A sliding bomb was stopped by its kicker.
    BombStopped {
        /// Bomb id.
        id: BombId,
        /// Stopping player.
        owner_id: PlayerId,
    },
    /// A bomb was punched across the arena.
    BombPunched {
        /// Bomb id.
        id: BombId,
        /// Punching player.
        owner_id: PlayerId,
        /// Landing tile x.
        tx: u8,
        /// Landing tile y.
        ty: u8,
        /// Direction x.
        dx: i8,
        /// Direction y.
        dy: i8,
    },
    /// A bomb was lifted off the floor.
    BombPickedUp {
        /// Carrying player.
        player_id: PlayerId,
        /// Bomb id.
        bomb_id: BombId,
    },
    /// A carried bomb was thrown.
    BombThrown {
        /// Throwing player.
        player_id: PlayerId,
        /// New bomb id.
        bomb_id: BombId,
        /// Landing tile x.
        tx: u8,
        /// Landing tile y.
        ty: u8,
        /// Direction x.
        dx: i8,
        /// Direction y.
        dy: i8,
    },
    /// A line of bombs was placed in one action.
    Spooge {
        /// Placing player.
        player_id: PlayerId,
        /// Bombs placed.
        placed: u32,
    },
    /// A detonation covered a set of tiles.
    Explosion {
        /// Explosion id.
        id: ExplosionId,
        /// Covered tiles.
        tiles: Vec<(u8, u8)>,
        /// Set off by another explosion.
        chain: bool,
    },
    /// A player died.
    PlayerDead {
        /// Victim.
        id: PlayerId,
        /// Cause.
        reason: DeathReason,
    },
    /// A player collected a floor item.
    ItemPickup {
        /// Collecting player.
        player_id: PlayerId,
        /// Item collected.
        item: ItemType,
    },
    /// An exclusive item was ejected back onto the floor.
    ItemEjected {
        /// Player whose pickup caused the ejection.
        player_id: PlayerId,
        /// Ejected item.
        item: ItemType,
        /// Drop tile x.
        tx: u8,
        /// Drop tile y.
        ty: u8,
    },
    /// A Skull pickup infected a player.
    DiseaseApplied {
        /// Infected player.
        player_id: PlayerId,
        /// Skull or Ebola.
        source: DiseaseSource,
    },
    /// A disease jumped between touching players.
    DiseaseTransfer {
        /// Previous carrier.
        from: PlayerId,
        /// New carrier.
        to: PlayerId,
    },
    /// The shrinking phase began.
    EnclosementStart,
    /// A closing block landed.
    ClosingBlock {
        /// Tile x.
        x: u8,
        /// Tile y.
        y: u8,
    },
}
