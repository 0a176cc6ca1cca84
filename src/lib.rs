//! # Blast Arena Game Server
//!
//! Server-authoritative multiplayer arena game: rooms of up to ten players
//! place bombs on a tile grid, blasts chain and carve the map open, and the
//! last bomber standing takes the round.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BLAST ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Mulberry32 PRNG                           │
//! │                                                              │
//! │  game/           - Simulation engine (deterministic)         │
//! │  ├── scheme.rs   - Map definitions and validation            │
//! │  ├── input.rs    - Button state, packed replay bytes         │
//! │  ├── status.rs   - Disease status effects                    │
//! │  ├── items.rs    - Item pickups and ability conflicts        │
//! │  ├── enclosement.rs - Map-shrinking spiral                   │
//! │  ├── world.rs    - Round state: grid, bombs, explosions      │
//! │  ├── step.rs     - Authoritative per-tick pipeline           │
//! │  ├── snapshot.rs - Renderable state extraction               │
//! │  └── events.rs   - Per-tick game events                      │
//! │                                                              │
//! │  codec/          - Binary snapshot wire format               │
//! │                                                              │
//! │  net/            - Transport (non-deterministic)             │
//! │  ├── handshake.rs- Upgrade handshake, accept hash            │
//! │  ├── frame.rs    - Frame encode/decode, masking              │
//! │  ├── connection.rs - Socket read loop + writer task          │
//! │  └── protocol.rs - Session JSON messages                     │
//! │                                                              │
//! │  room/           - Match orchestration                       │
//! │  ├── room.rs     - Lobby/round/match state machine           │
//! │  ├── manager.rs  - Client + room registries, dispatch        │
//! │  └── replay.rs   - Persisted replay documents                │
//! │                                                              │
//! │  store.rs        - JSON document store                       │
//! │  ratings.rs      - Elo ratings                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Everything under `core/` and `game/` is **100% deterministic**:
//! - Integer arithmetic only (sub-tile fixed-point positions)
//! - Insertion-ordered containers wherever iteration order is visible
//! - No system time dependencies
//! - All randomness from the seeded Mulberry32 stream
//!
//! Given a round seed and the recorded per-tick input bytes, a round replays
//! byte-for-byte offline.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod codec;
pub mod core;
pub mod game;
pub mod net;
pub mod ratings;
pub mod room;
pub mod store;

// Re-export commonly used types
pub use core::rng::Mulberry32;
pub use game::input::InputState;
pub use game::scheme::{ItemType, Scheme, TileType};
pub use game::world::World;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Simulation tick rate (Hz)
pub const TICK_HZ: u32 = 60;

/// Sub-tile position units per tile
pub const SUBTILE: i32 = 256;

/// Player hurtbox radius in sub-tile units (0.33 tiles)
pub const PLAYER_RADIUS: i32 = 84;

/// Default arena width in tiles
pub const ARENA_DEFAULT_W: u8 = 15;

/// Default arena height in tiles
pub const ARENA_DEFAULT_H: u8 = 11;

/// Default round length in seconds
pub const DEFAULT_ROUND_SECONDS: u32 = 3 * 60;

/// Seconds remaining at which the enclosement starts closing tiles
pub const ENCLOSEMENT_START_SECONDS: u32 = 60;

/// Ticks between consecutive closing blocks (250ms at 60Hz)
pub const ENCLOSEMENT_INTERVAL_TICKS: u32 = 15;

/// Explosion lifetime in ticks (300ms at 60Hz)
pub const EXPLOSION_TTL_TICKS: u32 = 18;

/// Default bomb fuse in ticks (2.0s at 60Hz)
pub const BOMB_FUSE_TICKS: u32 = 120;

/// Maximum players per room
pub const MAX_PLAYERS: usize = 10;
