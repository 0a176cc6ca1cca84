//! Map Schemes
//!
//! A scheme is a complete map definition: tile layout, spawn points, and
//! item seeding rules. Schemes are validated at the boundary — the
//! simulation never receives an unvalidated scheme.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ARENA_DEFAULT_H, ARENA_DEFAULT_W, MAX_PLAYERS};

// =============================================================================
// TILES / TEAMS / ITEMS
// =============================================================================

/// Grid cell kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileType {
    /// Walkable floor.
    Floor,
    /// Indestructible block.
    Hard,
    /// Destructible block; may hide an item.
    Soft,
}

/// Team assignment for team mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Free-for-all (no team).
    #[default]
    None,
    /// Team A.
    Red,
    /// Team B.
    White,
}

/// Every pickup the game knows about.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ItemType {
    /// +1 bomb capacity.
    BombUp,
    /// +1 flame length.
    FireUp,
    /// Maximum flame for the rest of the round.
    FullFire,
    /// +1 speed.
    SpeedUp,
    /// -1 speed.
    SpeedDown,
    /// Kick bombs by walking into them.
    Kick,
    /// Punch an adjacent bomb across the arena.
    BoxingGlove,
    /// Pick up and throw bombs.
    PowerGlove,
    /// Remote-trigger bombs (infinite fuse, FIFO detonation).
    RemoteControl,
    /// Kicked/thrown bombs bounce off obstacles.
    RubberBomb,
    /// Double-tap to place a whole line of bombs.
    LineBomb,
    /// Disease carrier.
    Skull,
    /// Rerolls into a random concrete item.
    SelectItem,
}

impl ItemType {
    /// All item types, in the fixed wire-code order.
    pub const ALL: [ItemType; 13] = [
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
        ItemType::Skull,
        ItemType::SelectItem,
    ];

    /// Wire code used by the binary snapshot format.
    pub fn code(self) -> u8 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as u8
    }

    /// Inverse of [`ItemType::code`]; unknown codes fall back to `BombUp`.
    pub fn from_code(code: u8) -> ItemType {
        Self::ALL.get(code as usize).copied().unwrap_or(ItemType::BombUp)
    }
}

// =============================================================================
// ITEM RULES
// =============================================================================

/// Per-item spawn override mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideMode {
    /// Weight 1 in the random pool.
    #[default]
    Default,
    /// Exactly `value` copies are hidden, consuming tiles first.
    FixedCount,
    /// Weight `value`/10 in the random pool.
    ChanceIn10,
}

/// Spawn override for one item type.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ItemOverride {
    /// Override mode.
    pub mode: OverrideMode,
    /// Mode-specific count or chance numerator.
    pub value: u32,
}

/// Seeding rule for one item type.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ItemRule {
    /// Copies every player starts the round holding.
    pub born_with: u32,
    /// Excluded from the random/select pool.
    pub forbid_in_random: bool,
    /// Spawn override.
    #[serde(rename = "override")]
    pub override_rule: ItemOverride,
}

/// Full item configuration for a scheme.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemRules {
    /// Percentage of destructible tiles that hide an item.
    pub density_percent: u32,
    /// Per-item rules (every [`ItemType`] must be present).
    pub items: BTreeMap<ItemType, ItemRule>,
    /// Whether blasts destroy revealed floor items.
    pub items_destructible: bool,
}

impl ItemRules {
    /// Rule lookup; all valid schemes carry every item type.
    pub fn rule(&self, item: ItemType) -> ItemRule {
        self.items.get(&item).copied().unwrap_or_default()
    }
}

// =============================================================================
// SCHEME
// =============================================================================

/// Spawn point.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Spawn {
    /// Tile x.
    pub x: u8,
    /// Tile y.
    pub y: u8,
    /// Stable spawn ordering index.
    pub spawn_index: u8,
    /// Team for team-mode rounds.
    pub team: Team,
}

/// A complete map definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scheme {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Grid width in tiles.
    pub width: u8,
    /// Grid height in tiles.
    pub height: u8,
    /// Row-major tile layout (`width * height` entries).
    pub tiles: Vec<TileType>,
    /// Spawn points (at least two).
    pub spawns: Vec<Spawn>,
    /// Item seeding configuration.
    pub item_rules: ItemRules,
}

/// Scheme validation failure.
#[derive(Debug, Error)]
pub enum SchemeError {
    /// id or name missing.
    #[error("scheme id/name required")]
    MissingIdentity,
    /// Zero-sized grid.
    #[error("scheme dimensions invalid: {0}x{1}")]
    BadDimensions(u8, u8),
    /// Tile array does not match the dimensions.
    #[error("tile array has {got} entries, expected {expected}")]
    TileCountMismatch {
        /// Entries present.
        got: usize,
        /// `width * height`.
        expected: usize,
    },
    /// Fewer than two spawn points.
    #[error("at least 2 spawns required, got {0}")]
    TooFewSpawns(usize),
    /// Spawn outside the grid or on a non-floor tile.
    #[error("spawn {index} invalid: must be on a floor tile inside the grid")]
    BadSpawn {
        /// Spawn list position.
        index: usize,
    },
    /// Density outside 0..=100.
    #[error("item density {0}% out of range")]
    BadDensity(u32),
    /// An item type has no rule entry.
    #[error("missing item rule for {0:?}")]
    MissingItemRule(ItemType),
}

/// Validate a scheme before it may reach a [`crate::World`].
pub fn validate_scheme(scheme: &Scheme) -> Result<(), SchemeError> {
    if scheme.id.is_empty() || scheme.name.is_empty() {
        return Err(SchemeError::MissingIdentity);
    }
    if scheme.width == 0 || scheme.height == 0 {
        return Err(SchemeError::BadDimensions(scheme.width, scheme.height));
    }
    let expected = scheme.width as usize * scheme.height as usize;
    if scheme.tiles.len() != expected {
        return Err(SchemeError::TileCountMismatch {
            got: scheme.tiles.len(),
            expected,
        });
    }
    if scheme.spawns.len() < 2 {
        return Err(SchemeError::TooFewSpawns(scheme.spawns.len()));
    }
    for (index, s) in scheme.spawns.iter().enumerate() {
        if s.x >= scheme.width || s.y >= scheme.height {
            return Err(SchemeError::BadSpawn { index });
        }
        let tile = scheme.tiles[s.y as usize * scheme.width as usize + s.x as usize];
        if tile != TileType::Floor {
            return Err(SchemeError::BadSpawn { index });
        }
    }
    if scheme.item_rules.density_percent > 100 {
        return Err(SchemeError::BadDensity(scheme.item_rules.density_percent));
    }
    for it in ItemType::ALL {
        if !scheme.item_rules.items.contains_key(&it) {
            return Err(SchemeError::MissingItemRule(it));
        }
    }
    Ok(())
}

// =============================================================================
// OFFICIAL SCHEMES
// =============================================================================

/// Classic bordered arena: hard pillars on even coordinates, soft fill,
/// cleared 3x3 pockets around each spawn.
pub fn default_scheme() -> Scheme {
    let width = ARENA_DEFAULT_W;
    let height = ARENA_DEFAULT_H;
    let w = width as usize;
    let h = height as usize;
    let mut tiles = vec![TileType::Floor; w * h];

    for y in 0..h {
        for x in 0..w {
            let border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
            tiles[y * w + x] = if border {
                TileType::Hard
            } else if x % 2 == 0 && y % 2 == 0 {
                TileType::Hard
            } else {
                TileType::Soft
            };
        }
    }

    let spawn_coords: [(u8, u8); 10] = [
        (1, 1),
        (width - 2, 1),
        (1, height - 2),
        (width - 2, height - 2),
        (1, height / 2),
        (width - 2, height / 2),
        (width / 2, 1),
        (width / 2, height - 2),
        (3, 1),
        (width - 4, height - 2),
    ];

    let mut spawns = Vec::new();
    for (i, &(x, y)) in spawn_coords.iter().take(MAX_PLAYERS).enumerate() {
        spawns.push(Spawn {
            x,
            y,
            spawn_index: i as u8,
            team: Team::None,
        });
        // Clear a small safety zone around the spawn.
        for oy in -1i32..=1 {
            for ox in -1i32..=1 {
                let sx = x as i32 + ox;
                let sy = y as i32 + oy;
                if sx <= 0 || sy <= 0 || sx >= w as i32 - 1 || sy >= h as i32 - 1 {
                    continue;
                }
                let idx = sy as usize * w + sx as usize;
                if tiles[idx] != TileType::Hard {
                    tiles[idx] = TileType::Floor;
                }
            }
        }
    }

    let mut items = BTreeMap::new();
    for it in ItemType::ALL {
        items.insert(it, ItemRule::default());
    }
    if let Some(rule) = items.get_mut(&ItemType::BombUp) {
        rule.born_with = 1;
    }
    if let Some(rule) = items.get_mut(&ItemType::FireUp) {
        rule.born_with = 1;
    }

    Scheme {
        id: "default".to_string(),
        name: "Default".to_string(),
        width,
        height,
        tiles,
        spawns,
        item_rules: ItemRules {
            density_percent: 35,
            items,
            items_destructible: true,
        },
    }
}

fn sparse_scheme() -> Scheme {
    let mut base = default_scheme();
    base.id = "sparse".to_string();
    base.name = "Sparse".to_string();
    // Convert some soft to floor in a deterministic stripe pattern.
    let w = base.width as usize;
    for y in 1..base.height as usize - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if base.tiles[idx] == TileType::Soft && (x + y) % 3 == 0 {
                base.tiles[idx] = TileType::Floor;
            }
        }
    }
    base
}

fn teams_scheme() -> Scheme {
    let mut base = default_scheme();
    base.id = "teams".to_string();
    base.name = "Teams (Red vs White)".to_string();
    for s in &mut base.spawns {
        s.team = if s.spawn_index % 2 == 0 {
            Team::Red
        } else {
            Team::White
        };
    }
    base
}

/// The built-in scheme library.
pub fn official_schemes() -> Vec<Scheme> {
    vec![default_scheme(), sparse_scheme(), teams_scheme()]
}

/// Look up a built-in scheme; unknown ids fall back to the default.
pub fn get_official_scheme(id: &str) -> Scheme {
    official_schemes()
        .into_iter()
        .find(|s| s.id == id)
        .unwrap_or_else(default_scheme)
}

// =============================================================================
// THEMES
// =============================================================================

/// Render palette for a theme (opaque to the server; forwarded to clients).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Palette {
    /// Floor color.
    pub floor: String,
    /// Hard block color.
    pub hard: String,
    /// Soft block color.
    pub soft: String,
    /// Explosion overlay color.
    pub explosion: String,
    /// Item accent color.
    pub item: String,
    /// Bomb body color.
    pub bomb: String,
}

/// A named render theme.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Palette forwarded to clients.
    pub palette: Palette,
}

fn theme(id: &str, name: &str, colors: [&str; 6]) -> Theme {
    Theme {
        id: id.to_string(),
        name: name.to_string(),
        palette: Palette {
            floor: colors[0].to_string(),
            hard: colors[1].to_string(),
            soft: colors[2].to_string(),
            explosion: colors[3].to_string(),
            item: colors[4].to_string(),
            bomb: colors[5].to_string(),
        },
    }
}

/// The built-in theme library.
pub fn themes() -> Vec<Theme> {
    vec![
        theme(
            "green-acres",
            "Green Acres",
            ["#0c1720", "#2a3d55", "#3f3a2d", "rgba(255, 160, 40, 0.65)", "#4f8cff", "#0c0f16"],
        ),
        theme(
            "haunted",
            "Haunted House",
            ["#0b0b12", "#2f2b3d", "#403038", "rgba(210, 120, 255, 0.55)", "#69f0ff", "#111"],
        ),
        theme(
            "hockey",
            "Hockey Rink",
            ["#0b1524", "#375c85", "#3a4b61", "rgba(255, 200, 80, 0.65)", "#a7ff83", "#0b0e14"],
        ),
    ]
}

/// Look up a built-in theme; unknown ids fall back to the first.
pub fn get_theme(id: &str) -> Theme {
    themes()
        .into_iter()
        .find(|t| t.id == id)
        .unwrap_or_else(|| themes().remove(0))
}

// =============================================================================
// TESTS
// =============================================================================
