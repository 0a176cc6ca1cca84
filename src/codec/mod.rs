//! Snapshot Codec
//!
//! The bandwidth-optimized binary form of a [`crate::game::Snapshot`]. The
//! layout is a fixed bit-for-bit contract shared with clients; see
//! [`snapshot_bin`] for the exact format.

pub mod snapshot_bin;

pub use snapshot_bin::{decode_snapshot, encode_snapshot, CodecError, PlayerMeta};
