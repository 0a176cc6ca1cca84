//! Game Logic Module
//!
//! All round simulation code. 100% deterministic: integer-only math,
//! ordered containers, and a seeded RNG shared by every random decision.
//!
//! ## Module Structure
//!
//! - `scheme`: Map definitions, validation, built-in library and themes
//! - `input`: Per-tick player input and the packed replay byte
//! - `status`: Diseases and effective-stat computation
//! - `items`: Pickup rules and the ability exclusivity matrix
//! - `enclosement`: Shrinking-map spiral
//! - `world`: Round state and entity management
//! - `step`: The per-tick pipeline
//! - `snapshot`: Renderable per-tick state
//! - `events`: Simulation events forwarded to clients

pub mod enclosement;
pub mod events;
pub mod input;
pub mod items;
pub mod scheme;
pub mod snapshot;
pub mod status;
pub mod step;
pub mod world;

// Re-export key types
pub use events::GameEvent;
pub use input::InputState;
pub use scheme::{ItemType, Scheme, Team, TileType};
pub use snapshot::Snapshot;
pub use world::{Player, PlayerId, RoundTicks, World, WorldSettings};
