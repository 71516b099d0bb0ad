//! WebSocket Relay Server
//!
//! Accepts peer connections and routes their messages through the
//! [`RoomRegistry`]. The relay never interprets game state.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::game::state::ContestantId;
use crate::network::protocol::{ClientMessage, ProtocolError};
use crate::network::room::{
    outbound_queue, ConnectionId, Outbound, OutboundSender, RelayError, RoomRegistry,
};

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Room registration held by one connection.
type Registration = Option<(String, ContestantId)>;

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: RelayConfig,
    /// Active rooms.
    rooms: Arc<RoomRegistry>,
    /// Open connections.
    connections: Arc<RwLock<BTreeMap<ConnectionId, SocketAddr>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay server.
    pub fn new(config: RelayConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            rooms: Arc::new(RoomRegistry::new()),
            connections: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, RelayServerError> {
        Ok(TcpListener::bind(&self.config.bind_addr).await?)
    }

    /// Bind and serve until [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<(), RelayServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RelayServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Relay listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let count = self.connections.read().await.len();
                            if count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let connections = self.connections.clone();
        let rooms = self.rooms.clone();
        let buffer = self.config.outbound_buffer;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let conn: ConnectionId = Uuid::new_v4();
            connections.write().await.insert(conn, addr);

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (out_tx, mut out_rx) = outbound_queue(buffer);

            // Writer task: drains the outbound queue in order.
            let mut writer = tokio::spawn(async move {
                while let Some(item) = out_rx.recv().await {
                    let frame = match item {
                        Outbound::Message(msg) => match msg.to_json() {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        },
                        Outbound::Close => {
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    };
                    if ws_sender.send(frame).await.is_err() {
                        break;
                    }
                }
            });

            let mut registration: Registration = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(msg) => {
                                        Self::handle_client_message(
                                            conn,
                                            msg,
                                            &rooms,
                                            &out_tx,
                                            &mut registration,
                                        )
                                        .await;
                                    }
                                    Err(e) => warn!(%conn, "Dropping message: {}", e),
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                warn!(%conn, "Dropping message: {}", ProtocolError::UnsupportedFrame("binary"));
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                debug!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut writer => {
                        // Evicted, or the socket stopped accepting writes.
                        debug!("Writer for {} finished", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            writer.abort();

            if let Some((key, contestant)) = registration.take() {
                Self::leave(conn, &key, contestant, &rooms).await;
            }
            connections.write().await.remove(&conn);

            debug!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        conn: ConnectionId,
        msg: ClientMessage,
        rooms: &RoomRegistry,
        sender: &OutboundSender,
        registration: &mut Registration,
    ) {
        match msg {
            ClientMessage::JoinGame { game_id, player_id, player_address } => {
                if let Some((key, contestant)) = registration.take() {
                    if key != game_id || contestant != player_id {
                        Self::leave(conn, &key, contestant, rooms).await;
                    }
                }
                rooms
                    .join(conn, &game_id, player_id, &player_address, sender.clone())
                    .await;
                *registration = Some((game_id, player_id));
            }
            ClientMessage::PlayerMove { game_id, player_id, direction, timestamp } => {
                if let Err(e) = rooms
                    .relay_move(conn, &game_id, player_id, direction, timestamp)
                    .await
                {
                    debug!(%conn, "Move dropped: {}", e);
                }
            }
            ClientMessage::GameState { game_id, game_state } => {
                if let Err(e) = rooms.relay_state(&game_id, game_state).await {
                    debug!(%conn, "State dropped: {}", e);
                }
            }
            ClientMessage::LeaveGame { game_id, player_id } => {
                Self::leave(conn, &game_id, player_id, rooms).await;
                if registration
                    .as_ref()
                    .is_some_and(|(key, id)| *key == game_id && *id == player_id)
                {
                    *registration = None;
                }
            }
        }
    }

    async fn leave(conn: ConnectionId, key: &str, contestant: ContestantId, rooms: &RoomRegistry) {
        match rooms.leave(conn, key, contestant).await {
            Ok(_) => {}
            Err(e @ RelayError::NotRegistered { .. }) => debug!(%conn, "Leave ignored: {}", e),
            Err(e) => debug!(%conn, "Leave dropped: {}", e),
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Live room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.room_count().await
    }

    /// The room registry.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }
}
