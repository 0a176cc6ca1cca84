//! Binary Snapshot Format
//!
//! Layout (all little-endian):
//!
//! ```text
//! 'S' (0x53)
//! tick u32
//! width u8, height u8
//! roundTicksRemaining u32      (0xFFFFFFFF = unbounded)
//! tiles: width*height u8       (0 = Floor, 1 = Hard, 2 = Soft)
//! playerCount u8, then per player:
//!   x u16, y u16, alive u8, team u8 (0/1/2), gold u8,
//!   speed u8, bombCap u8, flame u8, diseaseCount u8
//! bombCount u8, then per bomb:
//!   tx u8, ty u8, fuse u16 (0xFFFF = unbounded, clamped to 0xFFFE),
//!   flame u8, flags u8 (bit0 = trigger, bit1 = jelly), moveDx i8, moveDy i8
//! explosionCount u8, then per explosion:
//!   ttl u8, tileCount u8, then tileCount * (x u8, y u8)
//! itemCount u8, then per item: x u8, y u8, itemCode u8
//! ```
//!
//! Player identity (id, name, color) is omitted for size; decoding takes it
//! as external metadata in join order.

use thiserror::Error;

use crate::game::items::Ability;
use crate::game::scheme::{ItemType, Team, TileType};
use crate::game::snapshot::{
    BombSnapshot, ExplosionSnapshot, ItemSnapshot, MotionSnapshot, PlayerSnapshot, Snapshot,
    StatsSnapshot,
};
use crate::game::status::DiseaseType;
use crate::game::world::{BombFlags, BombId, ExplosionId, PlayerId};

/// Magic tag, first byte of every binary snapshot.
pub const SNAPSHOT_MAGIC: u8 = 0x53;

const UNBOUNDED_CLOCK: u32 = 0xFFFF_FFFF;
const UNBOUNDED_FUSE: u16 = 0xFFFF;

/// Decode failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// First byte is not the snapshot magic.
    #[error("bad snapshot magic: {0:#04x}")]
    BadMagic(u8),
    /// Buffer ended before the layout did.
    #[error("snapshot truncated at offset {0}")]
    Truncated(usize),
}

/// Identity metadata the binary form omits, supplied at decode time in
/// join order.
#[derive(Clone, Debug)]
pub struct PlayerMeta {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
}

// =============================================================================
// ENCODE
// =============================================================================

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn tile_code(tile: TileType) -> u8 {
    match tile {
        TileType::Floor => 0,
        TileType::Hard => 1,
        TileType::Soft => 2,
    }
}

fn team_code(team: Team) -> u8 {
    match team {
        Team::None => 0,
        Team::Red => 1,
        Team::White => 2,
    }
}

/// Encode a snapshot into the binary layout.
pub fn encode_snapshot(snap: &Snapshot) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        16 + snap.tiles.len() + snap.players.len() * 12 + snap.bombs.len() * 9,
    );
    out.push(SNAPSHOT_MAGIC);
    push_u32(&mut out, snap.tick);
    out.push(snap.width);
    out.push(snap.height);
    push_u32(
        &mut out,
        snap.round_ticks_remaining.unwrap_or(UNBOUNDED_CLOCK),
    );

    for &tile in &snap.tiles {
        out.push(tile_code(tile));
    }

    out.push(snap.players.len() as u8);
    for p in &snap.players {
        push_u16(&mut out, p.x.clamp(0, i32::from(u16::MAX)) as u16);
        push_u16(&mut out, p.y.clamp(0, i32::from(u16::MAX)) as u16);
        out.push(u8::from(p.alive));
        out.push(team_code(p.team));
        out.push(u8::from(p.is_gold));
        out.push(p.stats.speed);
        out.push(p.stats.bomb_cap);
        out.push(p.stats.flame);
        out.push(p.diseases.len() as u8);
    }

    out.push(snap.bombs.len() as u8);
    for b in &snap.bombs {
        out.push(b.tx);
        out.push(b.ty);
        let fuse = match b.fuse_ticks {
            Some(t) => t.min(u32::from(UNBOUNDED_FUSE - 1)) as u16,
            None => UNBOUNDED_FUSE,
        };
        push_u16(&mut out, fuse);
        out.push(b.flame);
        let flags = u8::from(b.flags.trigger) | (u8::from(b.flags.jelly) << 1);
        out.push(flags);
        let (dx, dy) = b.moving.map(|m| (m.dx, m.dy)).unwrap_or((0, 0));
        out.push(dx as u8);
        out.push(dy as u8);
    }

    out.push(snap.explosions.len() as u8);
    for ex in &snap.explosions {
        out.push(ex.ttl.min(255) as u8);
        out.push(ex.tiles.len() as u8);
        for &(x, y) in &ex.tiles {
            out.push(x);
            out.push(y);
        }
    }

    out.push(snap.items.len() as u8);
    for it in &snap.items {
        out.push(it.x);
        out.push(it.y);
        out.push(it.item.code());
    }

    out
}

// =============================================================================
// DECODE
// =============================================================================

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, CodecError> {
        let v = *self.buf.get(self.pos).ok_or(CodecError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(v)
    }

    fn i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.u8()? as i8)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.u8()?;
        }
        Ok(u32::from_le_bytes(bytes))
    }
}

/// Decode a binary snapshot. `meta` supplies per-player identity in join
/// order; missing entries get placeholder names. The binary form carries
/// only the disease count, so decoded disease effects are placeholders.
pub fn decode_snapshot(buf: &[u8], meta: &[PlayerMeta]) -> Result<Snapshot, CodecError> {
    let mut r = Reader { buf, pos: 0 };

    let magic = r.u8()?;
    if magic != SNAPSHOT_MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let tick = r.u32()?;
    let width = r.u8()?;
    let height = r.u8()?;
    let rtr = r.u32()?;
    let round_ticks_remaining = (rtr != UNBOUNDED_CLOCK).then_some(rtr);

    let mut tiles = Vec::with_capacity(usize::from(width) * usize::from(height));
    for _ in 0..usize::from(width) * usize::from(height) {
        tiles.push(match r.u8()? {
            1 => TileType::Hard,
            2 => TileType::Soft,
            _ => TileType::Floor,
        });
    }

    let player_count = r.u8()?;
    let mut players = Vec::with_capacity(usize::from(player_count));
    for i in 0..usize::from(player_count) {
        let x = i32::from(r.u16()?);
        let y = i32::from(r.u16()?);
        let alive = r.u8()? == 1;
        let team = match r.u8()? {
            1 => Team::Red,
            2 => Team::White,
            _ => Team::None,
        };
        let is_gold = r.u8()? & 1 != 0;
        let speed = r.u8()?;
        let bomb_cap = r.u8()?;
        let flame = r.u8()?;
        let disease_count = r.u8()?;

        let stats = StatsSnapshot {
            speed,
            bomb_cap,
            flame,
            fuse_ticks: 0,
        };
        players.push(PlayerSnapshot {
            id: meta
                .get(i)
                .map(|m| m.id)
                .unwrap_or(PlayerId(uuid::Uuid::nil())),
            name: meta
                .get(i)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| format!("P{i}")),
            color: meta
                .get(i)
                .map(|m| m.color.clone())
                .unwrap_or_else(|| "#ffffff".to_string()),
            x,
            y,
            alive,
            team,
            is_gold,
            stats,
            stats_base: stats,
            ability: Ability::default(),
            diseases: vec![DiseaseType::Molasses; usize::from(disease_count)],
            carrying: false,
        });
    }

    let bomb_count = r.u8()?;
    let mut bombs = Vec::with_capacity(usize::from(bomb_count));
    for i in 0..u32::from(bomb_count) {
        let tx = r.u8()?;
        let ty = r.u8()?;
        let fuse = r.u16()?;
        let flame = r.u8()?;
        let flags = r.u8()?;
        let dx = r.i8()?;
        let dy = r.i8()?;
        bombs.push(BombSnapshot {
            id: BombId(i),
            tx,
            ty,
            fuse_ticks: (fuse != UNBOUNDED_FUSE).then_some(u32::from(fuse)),
            flame,
            flags: BombFlags {
                trigger: flags & 1 != 0,
                jelly: flags & 2 != 0,
            },
            moving: (dx != 0 || dy != 0).then_some(MotionSnapshot { dx, dy }),
        });
    }

    let explosion_count = r.u8()?;
    let mut explosions = Vec::with_capacity(usize::from(explosion_count));
    for i in 0..u32::from(explosion_count) {
        let ttl = u32::from(r.u8()?);
        let tile_count = r.u8()?;
        let mut ex_tiles = Vec::with_capacity(usize::from(tile_count));
        for _ in 0..tile_count {
            let x = r.u8()?;
            let y = r.u8()?;
            ex_tiles.push((x, y));
        }
        explosions.push(ExplosionSnapshot {
            id: ExplosionId(i),
            tiles: ex_tiles,
            ttl,
        });
    }

    let item_count = r.u8()?;
    let mut items = Vec::with_capacity(usize::from(item_count));
    for _ in 0..item_count {
        let x = r.u8()?;
        let y = r.u8()?;
        let code = r.u8()?;
        items.push(ItemSnapshot {
            x,
            y,
            item: ItemType::from_code(code),
        });
    }

    Ok(Snapshot {
        tick,
        width,
        height,
        tiles,
        players,
        bombs,
        explosions,
        items,
        round_ticks_remaining,
        events: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn empty_snapshot() -> Snapshot {
        Snapshot {
            tick: 7,
            width: 2,
            height: 2,
            tiles: vec![TileType::Floor, TileType::Hard, TileType::Soft, TileType::Floor],
            players: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            items: Vec::new(),
            round_ticks_remaining: Some(600),
            events: Vec::new(),
        }
    }

    #[test]
    fn test_known_layout_bytes() {
        let buf = encode_snapshot(&empty_snapshot());
        let expected = vec![
            0x53, // magic
            7, 0, 0, 0, // tick
            2, 2, // dimensions
            0x58, 0x02, 0, 0, // remaining = 600
            0, 1, 2, 0, // tiles
            0, // players
            0, // bombs
            0, // explosions
            0, // items
        ];
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = encode_snapshot(&empty_snapshot());
        buf[0] = 0x54;
        assert!(matches!(
            decode_snapshot(&buf, &[]),
            Err(CodecError::BadMagic(0x54))
        ));
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let buf = encode_snapshot(&empty_snapshot());
        assert!(matches!(
            decode_snapshot(&buf[..buf.len() - 3], &[]),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_unbounded_sentinels() {
        let mut snap = empty_snapshot();
        snap.round_ticks_remaining = None;
        snap.bombs.push(BombSnapshot {
            id: BombId(1),
            tx: 1,
            ty: 1,
            fuse_ticks: None,
            flame: 2,
            moving: None,
            flags: BombFlags { trigger: true, jelly: false },
        });
        let buf = encode_snapshot(&snap);
        let decoded = decode_snapshot(&buf, &[]).unwrap();
        assert_eq!(decoded.round_ticks_remaining, None);
        assert_eq!(decoded.bombs[0].fuse_ticks, None);
        assert!(decoded.bombs[0].flags.trigger);
    }

    #[test]
    fn test_finite_fuse_clamps_below_sentinel() {
        let mut snap = empty_snapshot();
        snap.bombs.push(BombSnapshot {
            id: BombId(1),
            tx: 0,
            ty: 0,
            fuse_ticks: Some(1_000_000),
            flame: 1,
            moving: None,
            flags: BombFlags::default(),
        });
        let buf = encode_snapshot(&snap);
        let decoded = decode_snapshot(&buf, &[]).unwrap();
        assert_eq!(decoded.bombs[0].fuse_ticks, Some(0xFFFE));
    }

    #[test]
    fn test_decode_applies_player_meta() {
        let mut snap = empty_snapshot();
        snap.players.push(PlayerSnapshot {
            id: PlayerId(uuid::Uuid::from_u128(5)),
            name: "encoded-name-dropped".into(),
            color: "#123456".into(),
            x: 384,
            y: 384,
            alive: true,
            team: Team::Red,
            is_gold: true,
            stats: StatsSnapshot { speed: 6, bomb_cap: 3, flame: 4, fuse_ticks: 120 },
            stats_base: StatsSnapshot { speed: 5, bomb_cap: 3, flame: 4, fuse_ticks: 120 },
            ability: Ability::default(),
            diseases: vec![DiseaseType::Crack, DiseaseType::Poops],
            carrying: false,
        });
        let buf = encode_snapshot(&snap);

        let meta = vec![PlayerMeta {
            id: PlayerId(uuid::Uuid::from_u128(5)),
            name: "Maze".into(),
            color: "#123456".into(),
        }];
        let decoded = decode_snapshot(&buf, &meta).unwrap();
        let p = &decoded.players[0];
        assert_eq!(p.name, "Maze");
        assert_eq!((p.x, p.y), (384, 384));
        assert_eq!(p.team, Team::Red);
        assert!(p.is_gold);
        assert_eq!(p.stats.speed, 6);
        assert_eq!(p.diseases.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_bomb_fields_survive_roundtrip(
            tx in 0u8..=254,
            ty in 0u8..=254,
            fuse in proptest::option::of(0u32..=0xFFFE),
            flame in 1u8..=10,
            trigger in any::<bool>(),
            jelly in any::<bool>(),
            dx in -1i8..=1,
            dy in -1i8..=1,
        ) {
            let mut snap = empty_snapshot();
            let moving = (dx != 0 || dy != 0).then_some(MotionSnapshot { dx, dy });
            snap.bombs.push(BombSnapshot {
                id: BombId(1),
                tx,
                ty,
                fuse_ticks: fuse,
                flame,
                moving,
                flags: BombFlags { trigger, jelly },
            });
            let decoded = decode_snapshot(&encode_snapshot(&snap), &[]).unwrap();
            let b = &decoded.bombs[0];
            prop_assert_eq!((b.tx, b.ty, b.flame), (tx, ty, flame));
            prop_assert_eq!(b.fuse_ticks, fuse);
            prop_assert_eq!(b.flags, BombFlags { trigger, jelly });
            prop_assert_eq!(b.moving, moving);
        }

        #[test]
        fn prop_explosion_tiles_survive_roundtrip(
            tiles in proptest::collection::vec((0u8..=20, 0u8..=20), 1..12),
            ttl in 1u32..=18,
        ) {
            let mut snap = empty_snapshot();
            snap.explosions.push(ExplosionSnapshot {
                id: ExplosionId(1),
                tiles: tiles.clone(),
                ttl,
            });
            let decoded = decode_snapshot(&encode_snapshot(&snap), &[]).unwrap();
            prop_assert_eq!(&decoded.explosions[0].tiles, &tiles);
            prop_assert_eq!(decoded.explosions[0].ttl, ttl);
        }
    }
}
