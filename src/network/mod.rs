//! Network Layer
//!
//! WebSocket relay server and the peer session that talks to it.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod room;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use room::{
    outbound_queue, ConnectionId, Outbound, OutboundReceiver, OutboundSender, RelayError,
    RoomRegistry,
};
pub use server::{RelayServer, RelayServerError};
pub use session::{
    MatchSummary, PeerSession, Role, SessionCommand, SessionCore, SessionError, SessionEvent,
};
