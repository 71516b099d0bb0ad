//! Match Rooms
//!
//! Per-match routing contexts and the registry that owns them.
//! The registry lock is held only for lookup, insert or removal; every
//! room operation runs under that room's own mutex, so rooms never wait
//! on each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::grid::Direction;
use crate::game::state::ContestantId;
use crate::network::protocol::ServerMessage;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Send this message.
    Message(ServerMessage),
    /// Close the connection (it was replaced by a newer one).
    Close,
}

/// Sending half of a connection's outbound queues.
///
/// State updates go through a bounded queue and are dropped when it is
/// full, since a later update supersedes them. Everything else (presence,
/// moves, close) goes through an unbounded queue and is never dropped.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    control: mpsc::UnboundedSender<Outbound>,
    state: mpsc::Sender<Outbound>,
}

impl OutboundSender {
    /// Queue `item`. Returns false if it was dropped.
    pub fn push(&self, item: Outbound) -> bool {
        match item {
            Outbound::Message(ServerMessage::GameStateUpdate { .. }) => {
                self.state.try_send(item).is_ok()
            }
            _ => self.control.send(item).is_ok(),
        }
    }
}

/// Receiving half of a connection's outbound queues.
#[derive(Debug)]
pub struct OutboundReceiver {
    control: mpsc::UnboundedReceiver<Outbound>,
    state: mpsc::Receiver<Outbound>,
}

impl OutboundReceiver {
    /// Next item, control before state. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            item = self.control.recv() => item,
            Some(item) = self.state.recv() => Some(item),
        }
    }

    /// Next item without waiting.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.control
            .try_recv()
            .ok()
            .or_else(|| self.state.try_recv().ok())
    }
}

/// Outbound queues for one connection, holding up to `state_buffer` state updates.
pub fn outbound_queue(state_buffer: usize) -> (OutboundSender, OutboundReceiver) {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = mpsc::channel(state_buffer.max(1));
    (
        OutboundSender { control: control_tx, state: state_tx },
        OutboundReceiver { control: control_rx, state: state_rx },
    )
}

/// A registered peer.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Owning connection.
    pub conn: ConnectionId,
    /// Participant address given at join.
    pub address: String,
    /// Outbound queues of the connection.
    pub sender: OutboundSender,
}

impl Peer {
    fn send(&self, message: ServerMessage) {
        self.push(Outbound::Message(message));
    }

    fn push(&self, item: Outbound) {
        // Never block a room on one slow peer.
        if !self.sender.push(item) {
            warn!(conn = %self.conn, "Dropping outbound message");
        }
    }
}

/// Routing context for one match.
#[derive(Debug)]
pub struct Room {
    /// Match key.
    pub key: String,
    /// Peers by contestant slot.
    peers: BTreeMap<ContestantId, Peer>,
    /// Last authoritative state blob.
    cached_state: Option<Value>,
    /// Removed from the registry; joins must retry.
    closed: bool,
}

impl Room {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            peers: BTreeMap::new(),
            cached_state: None,
            closed: false,
        }
    }

    /// Peers currently registered.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Contestant slots currently registered.
    pub fn contestants(&self) -> Vec<ContestantId> {
        self.peers.keys().copied().collect()
    }

    /// Last cached state blob.
    pub fn cached_state(&self) -> Option<&Value> {
        self.cached_state.as_ref()
    }

    fn broadcast(&self, message: &ServerMessage, exclude: Option<ConnectionId>) -> usize {
        let mut sent = 0;
        for peer in self.peers.values() {
            if Some(peer.conn) == exclude {
                continue;
            }
            peer.send(message.clone());
            sent += 1;
        }
        sent
    }

    fn joined_message(&self, id: ContestantId, address: &str) -> ServerMessage {
        ServerMessage::PlayerJoined {
            game_id: self.key.clone(),
            player_id: id,
            player_address: address.to_string(),
            player_count: self.peers.len(),
        }
    }
}

/// Relay errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// No room for this key.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// The slot is held by another connection (or nobody).
    #[error("contestant {contestant} is not registered to this connection")]
    NotRegistered {
        /// Contestant slot.
        contestant: ContestantId,
    },
}

/// Result of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Peers in the room after the join.
    pub player_count: usize,
    /// Connection that held the slot before, now told to close.
    pub evicted: Option<ConnectionId>,
}

/// Result of a leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Peers still in the room.
    pub player_count: usize,
    /// Room was deleted because it emptied.
    pub room_removed: bool,
}

/// All active rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<String, Arc<Mutex<Room>>>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a room by key.
    pub async fn get(&self, key: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(key).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn get_or_create(&self, key: &str) -> Arc<Mutex<Room>> {
        if let Some(room) = self.get(key).await {
            return room;
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key, "Room created");
                Arc::new(Mutex::new(Room::new(key)))
            })
            .clone()
    }

    async fn remove_if_same(&self, key: &str, room: &Arc<Mutex<Room>>) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(key).is_some_and(|r| Arc::ptr_eq(r, room)) {
            rooms.remove(key);
            info!(key, "Room removed (empty)");
        }
    }

    /// Register `conn` as `contestant` in room `key`.
    ///
    /// A connection already holding the slot is evicted and told to close.
    /// The joiner learns about every peer already present, the others learn
    /// about the joiner, and a cached state is replayed to the joiner.
    pub async fn join(
        &self,
        conn: ConnectionId,
        key: &str,
        contestant: ContestantId,
        address: &str,
        sender: OutboundSender,
    ) -> JoinOutcome {
        loop {
            let handle = self.get_or_create(key).await;
            let mut room = handle.lock().await;
            if room.closed {
                // Emptied and removed while we waited; try a fresh one.
                continue;
            }

            let peer = Peer {
                conn,
                address: address.to_string(),
                sender,
            };
            let evicted = room
                .peers
                .insert(contestant, peer.clone())
                .filter(|old| old.conn != conn)
                .map(|old| {
                    warn!(key, %contestant, stale = %old.conn, "Evicting stale registration");
                    old.push(Outbound::Close);
                    old.conn
                });

            // Presence replay for the joiner.
            for (id, other) in room.peers.iter() {
                if *id != contestant {
                    peer.send(room.joined_message(*id, &other.address));
                }
            }

            let joined = room.joined_message(contestant, address);
            room.broadcast(&joined, Some(conn));

            if let Some(state) = room.cached_state.clone() {
                peer.send(ServerMessage::GameStateUpdate {
                    game_id: key.to_string(),
                    game_state: state,
                });
            }

            info!(key, %contestant, peers = room.peers.len(), "Peer joined");
            return JoinOutcome {
                player_count: room.peers.len(),
                evicted,
            };
        }
    }

    /// Forward a move to every other connection in the room.
    pub async fn relay_move(
        &self,
        conn: ConnectionId,
        key: &str,
        contestant: ContestantId,
        direction: Direction,
        timestamp: u64,
    ) -> Result<usize, RelayError> {
        let handle = self
            .get(key)
            .await
            .ok_or_else(|| RelayError::RoomNotFound(key.to_string()))?;
        let room = handle.lock().await;

        let message = ServerMessage::PlayerMove {
            game_id: key.to_string(),
            player_id: contestant,
            direction,
            timestamp,
        };
        Ok(room.broadcast(&message, Some(conn)))
    }

    /// Cache the state blob and broadcast it to every peer, sender included.
    pub async fn relay_state(&self, key: &str, state: Value) -> Result<usize, RelayError> {
        let handle = self
            .get(key)
            .await
            .ok_or_else(|| RelayError::RoomNotFound(key.to_string()))?;
        let mut room = handle.lock().await;

        room.cached_state = Some(state.clone());
        let message = ServerMessage::GameStateUpdate {
            game_id: key.to_string(),
            game_state: state,
        };
        Ok(room.broadcast(&message, None))
    }

    /// Remove `contestant` if `conn` still holds the slot.
    ///
    /// Remaining peers get `PLAYER_LEFT`; an emptied room is deleted.
    pub async fn leave(
        &self,
        conn: ConnectionId,
        key: &str,
        contestant: ContestantId,
    ) -> Result<LeaveOutcome, RelayError> {
        let handle = self
            .get(key)
            .await
            .ok_or_else(|| RelayError::RoomNotFound(key.to_string()))?;
        let mut room = handle.lock().await;

        if room.peers.get(&contestant).map(|p| p.conn) != Some(conn) {
            return Err(RelayError::NotRegistered { contestant });
        }
        room.peers.remove(&contestant);

        let message = ServerMessage::PlayerLeft {
            game_id: key.to_string(),
            player_id: contestant,
            player_count: room.peers.len(),
        };
        room.broadcast(&message, None);
        info!(key, %contestant, peers = room.peers.len(), "Peer left");

        let room_removed = room.peers.is_empty();
        if room_removed {
            room.closed = true;
            self.remove_if_same(key, &handle).await;
        }

        Ok(LeaveOutcome {
            player_count: room.peers.len(),
            room_removed,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
