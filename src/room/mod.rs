//! Rooms and the server context around them.
//!
//! A [`Room`](room::Room) runs one lobby or match and performs no I/O of its
//! own; it reports what happened as [`RoomOutput`](room::RoomOutput) values.
//! The [`RoomManager`](manager::RoomManager) owns every room and client
//! session, routes messages, and drives the tick and grace-sweep loops.

pub mod manager;
pub mod replay;
pub mod room;

pub use manager::{run_grace_sweep, spawn_room_loop, RoomManager, SharedManager};
pub use replay::ReplayDoc;
pub use room::{Room, RoomOutput, RoomSettings, RoomStatus, RosterPlayer, SettingsPatch};
