//! Live side of the relay: who is connected to which room, fan-out of new
//! messages, and reclaiming rooms nobody uses any more.

mod engine;
mod reaper;
mod registry;
mod session;

pub use engine::BroadcastEngine;
pub use reaper::Reaper;
pub use registry::{ConnectionHandle, ConnectionId, Membership, Registry};
pub use session::RoomSession;
