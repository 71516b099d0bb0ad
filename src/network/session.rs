//! Peer Session
//!
//! Connects one participant to a match through the relay.
//!
//! [`SessionCore`] holds all session rules and performs no I/O: callers
//! feed it transport events, relay messages, key presses and frame ticks,
//! then drain the messages it wants sent and the events it wants shown.
//! [`PeerSession`] drives a core over a WebSocket with reconnection.
//!
//! ## Roles
//!
//! - **Host** (contestant 1, match creator): owns the [`Engine`], applies
//!   both contestants' inputs and publishes `GAME_STATE` after every tick.
//! - **Guest** (contestant 2): sends its presses and mirrors the host's
//!   snapshots. It never simulates.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::core::clock::Clock;
use crate::core::grid::Direction;
use crate::core::hash::OutcomeDigest;
use crate::game::engine::Engine;
use crate::game::events::MatchOutcome;
use crate::game::snapshot::GameSnapshot;
use crate::game::state::{ContestantId, MatchMode, MatchPhase};
use crate::network::protocol::{ClientMessage, ProtocolError, ServerMessage};

/// Which side of the match this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Match creator, runs the simulation.
    Host,
    /// Joiner, mirrors the host.
    Guest,
}

impl Role {
    /// Contestant slot played by this role.
    pub fn contestant(self) -> ContestantId {
        match self {
            Role::Host => ContestantId::One,
            Role::Guest => ContestantId::Two,
        }
    }
}

/// Final result as seen by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Local contestant.
    pub contestant: ContestantId,
    /// Outcome of the match.
    pub outcome: MatchOutcome,
    /// Final scores (contestant 1, contestant 2).
    pub scores: (u32, u32),
    /// Fingerprint of inputs and scores.
    pub digest: OutcomeDigest,
}

impl MatchSummary {
    /// Did the local contestant win?
    pub fn won(&self) -> bool {
        self.outcome.winner() == Some(self.contestant)
    }

    /// Local contestant's score.
    pub fn score(&self) -> u32 {
        match self.contestant {
            ContestantId::One => self.scores.0,
            ContestantId::Two => self.scores.1,
        }
    }
}

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport established, join sent.
    Connected,
    /// Transport lost.
    Disconnected,
    /// The other contestant appeared in (true) or left (false) the room.
    OpponentPresent(bool),
    /// New state to render.
    StateUpdated(GameSnapshot),
    /// The match is over.
    MatchEnded(MatchSummary),
}

/// Input from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Heading key pressed.
    Press(Direction),
    /// User left the match.
    Exit,
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// WebSocket failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unreadable relay message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Outgoing message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// I/O-free session state machine.
#[derive(Debug)]
pub struct SessionCore {
    role: Role,
    match_key: String,
    address: String,
    mode: MatchMode,
    engine: Option<Engine>,
    mirror: Option<GameSnapshot>,
    published_version: Option<u64>,
    final_state: Option<serde_json::Value>,
    final_unsent: bool,
    connected: bool,
    opponent_present: bool,
    exited: bool,
    summary: Option<MatchSummary>,
    outbox: Vec<ClientMessage>,
    events: Vec<SessionEvent>,
}

impl SessionCore {
    /// Host session that starts the engine at `now`.
    pub fn host(match_key: &str, address: &str, mode: MatchMode, now: u64) -> Self {
        let mut core = Self::empty(Role::Host, match_key, address, mode);
        core.engine = Some(Engine::new(match_key, mode, now));
        core
    }

    /// Guest session for a duel created by someone else.
    pub fn guest(match_key: &str, address: &str) -> Self {
        Self::empty(Role::Guest, match_key, address, MatchMode::Duel)
    }

    fn empty(role: Role, match_key: &str, address: &str, mode: MatchMode) -> Self {
        Self {
            role,
            match_key: match_key.to_string(),
            address: address.to_string(),
            mode,
            engine: None,
            mirror: None,
            published_version: None,
            final_state: None,
            final_unsent: false,
            connected: false,
            opponent_present: false,
            exited: false,
            summary: None,
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Session role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Local contestant.
    pub fn contestant(&self) -> ContestantId {
        self.role.contestant()
    }

    /// Match key.
    pub fn match_key(&self) -> &str {
        &self.match_key
    }

    /// Match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Host engine.
    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    /// Last snapshot received by a guest.
    pub fn mirror(&self) -> Option<&GameSnapshot> {
        self.mirror.as_ref()
    }

    /// Practice matches run without a relay.
    pub fn needs_relay(&self) -> bool {
        self.mode == MatchMode::Duel
    }

    /// Transport currently up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Other contestant known to be in the room.
    pub fn opponent_present(&self) -> bool {
        self.opponent_present
    }

    /// User exited.
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Match ended locally.
    pub fn is_ended(&self) -> bool {
        self.summary.is_some()
    }

    /// Final result, once ended.
    pub fn summary(&self) -> Option<&MatchSummary> {
        self.summary.as_ref()
    }

    /// Keep reconnecting after transport loss?
    ///
    /// A host whose final state never reached the relay keeps trying until
    /// it does.
    pub fn should_reconnect(&self) -> bool {
        !self.exited && (!self.is_ended() || self.final_unsent)
    }

    /// Messages waiting to be sent.
    pub fn take_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Put messages that could not be sent back at the front of the outbox.
    pub fn restore_outbox(&mut self, mut unsent: Vec<ClientMessage>) {
        unsent.append(&mut self.outbox);
        self.outbox = unsent;
    }

    /// Events waiting to be shown.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Transport is up: register with the relay.
    pub fn on_connected(&mut self) {
        self.connected = true;
        self.outbox.push(ClientMessage::JoinGame {
            game_id: self.match_key.clone(),
            player_id: self.contestant(),
            player_address: self.address.clone(),
        });
        self.queue_final_state();
        self.events.push(SessionEvent::Connected);
    }

    /// Transport lost. Unsent messages are dropped, except the final state.
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        if self.final_state.is_some()
            && self
                .outbox
                .iter()
                .any(|m| matches!(m, ClientMessage::GameState { .. }))
        {
            self.final_unsent = true;
        }
        self.outbox.clear();
        if self.opponent_present {
            self.opponent_present = false;
            self.events.push(SessionEvent::OpponentPresent(false));
        }
        self.events.push(SessionEvent::Disconnected);
    }

    /// Local heading key.
    ///
    /// The host applies it to its engine and forwards it; the guest only
    /// forwards it. Returns whether the press went anywhere.
    pub fn press(&mut self, heading: Direction, now: u64) -> bool {
        if self.exited || self.is_ended() {
            return false;
        }
        let contestant = self.contestant();

        let accepted = match self.engine.as_mut() {
            Some(engine) => engine.queue_input(contestant, heading, now),
            None => self.connected,
        };
        if accepted && self.connected {
            self.outbox.push(ClientMessage::PlayerMove {
                game_id: self.match_key.clone(),
                player_id: contestant,
                direction: heading,
                timestamp: now,
            });
        }
        accepted
    }

    /// Message from the relay. Echoes of our own messages are ignored.
    pub fn on_message(&mut self, message: ServerMessage, now: u64) {
        let me = self.contestant();
        match message {
            ServerMessage::PlayerJoined { player_id, .. } if player_id != me => {
                if !self.opponent_present {
                    self.opponent_present = true;
                    self.events.push(SessionEvent::OpponentPresent(true));
                }
            }
            ServerMessage::PlayerLeft { player_id, .. } if player_id != me => {
                if self.opponent_present {
                    self.opponent_present = false;
                    self.events.push(SessionEvent::OpponentPresent(false));
                }
            }
            ServerMessage::PlayerMove { player_id, direction, .. } if player_id != me => {
                // Stamped with local time so the host log stays monotonic.
                if let Some(engine) = self.engine.as_mut() {
                    engine.queue_input(player_id, direction, now);
                }
            }
            ServerMessage::GameStateUpdate { game_state, .. } if self.role == Role::Guest => {
                match serde_json::from_value::<GameSnapshot>(game_state) {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(e) => warn!(key = %self.match_key, "Unreadable game state: {}", e),
                }
            }
            _ => {}
        }
    }

    fn apply_snapshot(&mut self, snapshot: GameSnapshot) {
        if self.is_ended() {
            return;
        }
        if let Some(outcome) = snapshot.outcome() {
            let scores = (snapshot.player1.score, snapshot.player2.score);
            self.finish(outcome, scores, snapshot.outcome_digest());
        }
        self.events.push(SessionEvent::StateUpdated(snapshot.clone()));
        self.mirror = Some(snapshot);
        if let Some(summary) = self.summary.clone() {
            self.events.push(SessionEvent::MatchEnded(summary));
        }
    }

    /// Frame tick. Advances the host engine and publishes changes.
    pub fn frame(&mut self, now: u64) {
        if self.is_ended() || self.exited {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        engine.advance(now);
        if self.published_version == Some(engine.version()) && engine.phase() != MatchPhase::Ended {
            return;
        }
        self.published_version = Some(engine.version());

        let snapshot = engine.snapshot(now);
        let ended = engine
            .outcome(now)
            .filter(|_| engine.phase() == MatchPhase::Ended)
            .map(|outcome| (outcome, engine.state().scores(), engine.outcome_digest()));

        if self.mode == MatchMode::Duel {
            match serde_json::to_value(&snapshot) {
                Ok(game_state) if ended.is_some() => {
                    self.final_state = Some(game_state);
                    self.final_unsent = true;
                    if self.connected {
                        self.queue_final_state();
                    }
                }
                Ok(game_state) if self.connected => self.outbox.push(ClientMessage::GameState {
                    game_id: self.match_key.clone(),
                    game_state,
                }),
                Ok(_) => {}
                Err(e) => warn!(key = %self.match_key, "Failed to encode state: {}", e),
            }
        }
        self.events.push(SessionEvent::StateUpdated(snapshot));

        if let Some((outcome, scores, digest)) = ended {
            self.finish(outcome, scores, digest);
            if let Some(summary) = self.summary.clone() {
                self.events.push(SessionEvent::MatchEnded(summary));
            }
        }
    }

    fn queue_final_state(&mut self) {
        if !self.final_unsent {
            return;
        }
        if let Some(game_state) = self.final_state.clone() {
            self.outbox.push(ClientMessage::GameState {
                game_id: self.match_key.clone(),
                game_state,
            });
            self.final_unsent = false;
        }
    }

    fn finish(&mut self, outcome: MatchOutcome, scores: (u32, u32), digest: OutcomeDigest) {
        info!(key = %self.match_key, ?outcome, ?scores, %digest, "Match ended");
        self.summary = Some(MatchSummary {
            contestant: self.contestant(),
            outcome,
            scores,
            digest,
        });
    }

    /// User leaves. Sends `LEAVE_GAME` if connected.
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        if self.connected {
            self.outbox.push(ClientMessage::LeaveGame {
                game_id: self.match_key.clone(),
                player_id: self.contestant(),
            });
        }
    }

    fn apply(&mut self, command: Option<SessionCommand>, now: u64) {
        match command {
            Some(SessionCommand::Press(heading)) => {
                self.press(heading, now);
            }
            // Dropped command channel means nobody is watching.
            Some(SessionCommand::Exit) | None => self.exit(),
        }
    }
}

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connection attempt ended.
enum Link {
    /// Session finished; do not reconnect.
    Done,
    /// Transport lost.
    Lost,
}

/// Drives a [`SessionCore`] over a relay connection.
pub struct PeerSession {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    core: SessionCore,
}

impl PeerSession {
    /// Create a session runner.
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>, core: SessionCore) -> Self {
        Self { config, clock, core }
    }

    /// Run until the match ends or the user exits.
    ///
    /// Returns the summary if the match finished. Transport loss is retried
    /// after the configured backoff for as long as the match is live.
    #[instrument(skip_all, fields(key = %self.core.match_key, role = ?self.core.role))]
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Option<MatchSummary>, SessionError> {
        if !self.core.needs_relay() {
            self.run_offline(&mut commands, &events).await;
            return Ok(self.core.summary().cloned());
        }

        loop {
            match connect_async(self.config.relay_url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Connected to relay");
                    if let Link::Done = self.drive(ws, &mut commands, &events).await? {
                        break;
                    }
                }
                Err(e) => warn!("Relay connect failed: {}", e),
            }

            if !self.core.should_reconnect() {
                break;
            }
            self.backoff(&mut commands, &events).await;
            if !self.core.should_reconnect() {
                break;
            }
        }

        Ok(self.core.summary().cloned())
    }

    async fn drive(
        &mut self,
        ws: RelaySocket,
        commands: &mut mpsc::Receiver<SessionCommand>,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<Link, SessionError> {
        let (mut sink, mut stream) = ws.split();
        self.core.on_connected();

        let mut frames = interval(self.config.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let now = self.clock.now_ms();
            if self.flush(&mut sink, events).await.is_err() {
                self.core.on_disconnected();
                self.emit(events).await;
                return Ok(Link::Lost);
            }

            if self.core.is_ended() || self.core.has_exited() {
                self.core.exit();
                // Best effort; the relay also cleans up on close.
                let _ = self.flush(&mut sink, events).await;
                let _ = sink.close().await;
                return Ok(Link::Done);
            }

            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(message) => self.core.on_message(message, now),
                        Err(e) => warn!("Dropping relay message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Relay closed the connection");
                        self.core.on_disconnected();
                        self.emit(events).await;
                        return Ok(Link::Lost);
                    }
                    Some(Err(e)) => {
                        warn!("Relay transport error: {}", e);
                        self.core.on_disconnected();
                        self.emit(events).await;
                        return Ok(Link::Lost);
                    }
                    _ => {}
                },
                _ = frames.tick() => self.core.frame(self.clock.now_ms()),
                command = commands.recv() => self.core.apply(command, self.clock.now_ms()),
            }
        }
    }

    /// Wait out the reconnect backoff. The host keeps simulating meanwhile.
    async fn backoff(
        &mut self,
        commands: &mut mpsc::Receiver<SessionCommand>,
        events: &mpsc::Sender<SessionEvent>,
    ) {
        debug!(backoff_ms = self.config.reconnect_backoff.as_millis() as u64, "Reconnecting later");
        let deadline = sleep(self.config.reconnect_backoff);
        tokio::pin!(deadline);
        let mut frames = interval(self.config.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut deadline => return,
                _ = frames.tick() => self.core.frame(self.clock.now_ms()),
                command = commands.recv() => self.core.apply(command, self.clock.now_ms()),
            }
            // Nothing can be sent while offline.
            self.core.take_outbox();
            self.emit(events).await;
            if !self.core.should_reconnect() {
                return;
            }
        }
    }

    async fn run_offline(
        &mut self,
        commands: &mut mpsc::Receiver<SessionCommand>,
        events: &mpsc::Sender<SessionEvent>,
    ) {
        let mut frames = interval(self.config.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.core.is_ended() && !self.core.has_exited() {
            tokio::select! {
                _ = frames.tick() => self.core.frame(self.clock.now_ms()),
                command = commands.recv() => self.core.apply(command, self.clock.now_ms()),
            }
            self.emit(events).await;
        }
    }

    async fn flush(
        &mut self,
        sink: &mut SplitSink<RelaySocket, Message>,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<(), SessionError> {
        self.emit(events).await;
        let outbox = self.core.take_outbox();
        for (i, message) in outbox.iter().enumerate() {
            let sent = match message.to_json() {
                Ok(text) => sink.send(Message::Text(text)).await.map_err(SessionError::from),
                Err(e) => Err(SessionError::from(e)),
            };
            if let Err(e) = sent {
                self.core.restore_outbox(outbox[i..].to_vec());
                return Err(e);
            }
        }
        Ok(())
    }

    async fn emit(&mut self, events: &mpsc::Sender<SessionEvent>) {
        for event in self.core.take_events() {
            // Nobody listening is fine.
            let _ = events.send(event).await;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
