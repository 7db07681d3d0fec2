//! Relay hub - the single task that owns all shared relay state
//!
//! Per-connection tasks never touch the peer set, the username registry or
//! the advisory snapshot directly. They send [`HubCommand`]s to the hub and
//! receive outbound frames on their own channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::snapshot::GameStateData;
use crate::util::time::unix_millis;
use crate::ws::protocol::{decode, encode, ClientMsg, ProtocolError, ServerMsg};

use super::registry::{ConnId, SessionRegistry};

/// Serialized frame shared by every recipient of a broadcast
pub type Outbound = Arc<str>;

/// Capacity of each peer's outbound queue
pub const PEER_BUFFER: usize = 256;

/// Capacity of the hub's command queue
const COMMAND_BUFFER: usize = 1024;

/// Delivery failure on one connection; never affects other peers
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection {0} is closed")]
    Closed(ConnId),

    #[error("connection {0} outbound queue is full")]
    Backlogged(ConnId),

    #[error("connection {0} is not known to the relay")]
    UnknownPeer(ConnId),

    #[error("relay hub has shut down")]
    HubGone,
}

/// Commands accepted by the hub task
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        conn_id: ConnId,
        remote: String,
        tx: mpsc::Sender<Outbound>,
    },
    Inbound {
        conn_id: ConnId,
        text: String,
    },
    Disconnect {
        conn_id: ConnId,
        reason: &'static str,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Point-in-time counters for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub registered_players: usize,
    pub has_game_state: bool,
}

/// Hub tuning taken from [`Config`]
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub sweep_interval: Duration,
    pub status_interval: Duration,
    /// Used when a damage event does not carry `bossMaxHP`
    pub default_boss_max_hp: f32,
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            sweep_interval: config.sweep_interval,
            status_interval: config.status_interval,
            default_boss_max_hp: config.default_boss_max_hp,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            status_interval: Duration::from_secs(60),
            default_boss_max_hp: 1000.0,
        }
    }
}

/// Cloneable handle used by connection tasks and HTTP handlers
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl RelayHandle {
    pub async fn connect(
        &self,
        conn_id: ConnId,
        remote: String,
        tx: mpsc::Sender<Outbound>,
    ) -> Result<(), TransportError> {
        self.send(HubCommand::Connect {
            conn_id,
            remote,
            tx,
        })
        .await
    }

    pub async fn inbound(&self, conn_id: ConnId, text: String) -> Result<(), TransportError> {
        self.send(HubCommand::Inbound { conn_id, text }).await
    }

    pub async fn disconnect(&self, conn_id: ConnId, reason: &'static str) {
        let _ = self.send(HubCommand::Disconnect { conn_id, reason }).await;
    }

    pub async fn stats(&self) -> Option<RelayStats> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await.ok()?;
        rx.await.ok()
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), TransportError> {
        self.tx.send(cmd).await.map_err(|_| TransportError::HubGone)
    }
}

struct Peer {
    remote: String,
    tx: mpsc::Sender<Outbound>,
}

impl Peer {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Owner of the peer set, username registry and advisory snapshot
pub struct RelayHub {
    peers: HashMap<ConnId, Peer>,
    registry: SessionRegistry,
    snapshot: GameStateData,
    settings: RelaySettings,
    rx: mpsc::Receiver<HubCommand>,
}

impl RelayHub {
    pub fn new(settings: RelaySettings) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let hub = Self {
            peers: HashMap::new(),
            registry: SessionRegistry::new(),
            snapshot: GameStateData::default(),
            settings,
            rx,
        };
        (hub, RelayHandle { tx })
    }

    /// Run until every handle has been dropped
    pub async fn run(mut self) {
        info!("Relay hub started");

        let sweep_every = self.settings.sweep_interval;
        let status_every = self.settings.status_interval;
        let mut sweep = interval_at(Instant::now() + sweep_every, sweep_every);
        let mut status = interval_at(Instant::now() + status_every, status_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = sweep.tick() => {
                    self.sweep();
                }
                _ = status.tick() => {
                    let stats = self.stats();
                    info!(
                        connections = stats.connections,
                        registered_players = stats.registered_players,
                        has_game_state = stats.has_game_state,
                        "Relay status"
                    );
                }
            }
        }

        info!("Relay hub stopped");
    }

    pub fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect {
                conn_id,
                remote,
                tx,
            } => self.on_connect(conn_id, remote, tx),
            HubCommand::Inbound { conn_id, text } => self.on_message(conn_id, &text),
            HubCommand::Disconnect { conn_id, reason } => self.on_disconnect(conn_id, reason),
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.peers.len(),
            registered_players: self.registry.len(),
            has_game_state: !self.snapshot.is_empty(),
        }
    }

    pub fn snapshot(&self) -> &GameStateData {
        &self.snapshot
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn on_connect(&mut self, conn_id: ConnId, remote: String, tx: mpsc::Sender<Outbound>) {
        info!(
            conn_id = %conn_id,
            remote = %remote,
            connections = self.peers.len() + 1,
            "Peer connected"
        );
        self.peers.insert(conn_id, Peer { remote, tx });

        let welcome = ServerMsg::Connected {
            client_id: conn_id.to_string(),
            message: "Connected to boss battle relay".to_string(),
            timestamp: unix_millis(),
        };
        self.send_msg(conn_id, &welcome);

        if !self.snapshot.is_empty() {
            let greeting = ServerMsg::GameState {
                data: self.snapshot.clone(),
            };
            self.send_msg(conn_id, &greeting);
        }
    }

    fn on_disconnect(&mut self, conn_id: ConnId, reason: &'static str) {
        let released = self.registry.unregister(conn_id);
        if let Some(peer) = self.peers.remove(&conn_id) {
            info!(
                conn_id = %conn_id,
                remote = %peer.remote,
                reason,
                released_name = released.as_deref().unwrap_or(""),
                connections = self.peers.len(),
                registered_players = self.registry.len(),
                "Peer disconnected"
            );
        }
    }

    /// Dispatch one inbound text frame. Bad frames are logged and dropped.
    pub fn on_message(&mut self, conn_id: ConnId, text: &str) {
        let msg = match decode::<ClientMsg>(text) {
            Ok(msg) => msg,
            Err(ProtocolError::UnknownMessageType(kind)) => {
                warn!(conn_id = %conn_id, kind = %kind, "Unknown message type, dropping");
                return;
            }
            Err(e) => {
                let preview: String = text.chars().take(100).collect();
                warn!(
                    conn_id = %conn_id,
                    error = %e,
                    preview = %preview,
                    "Failed to parse client message"
                );
                return;
            }
        };

        // Relayed frames are forwarded verbatim so fields this relay does
        // not model survive the hop.
        let verbatim: Outbound = Arc::from(text);
        let identity = msg.claimed_identity();

        match msg {
            ClientMsg::Bullet(ref bullet) => {
                info!(
                    conn_id = %conn_id,
                    registered = self.registry.name_of(conn_id).unwrap_or("-"),
                    player = %bullet.player.name,
                    text = %bullet.text,
                    "Bullet"
                );
                self.broadcast(verbatim, Some(conn_id));
            }
            ClientMsg::Damage(ref damage) => {
                info!(
                    conn_id = %conn_id,
                    player = %damage.player.name,
                    damage = damage.damage,
                    is_critical = damage.is_critical,
                    "Damage"
                );
                self.broadcast(verbatim, Some(conn_id));
                if let Some(hp) = damage.boss_hp {
                    let max_hp = damage
                        .boss_max_hp
                        .unwrap_or(self.settings.default_boss_max_hp);
                    if self.snapshot.merge_boss_hp(hp, max_hp) {
                        debug!(boss_hp = ?self.snapshot.boss_hp, "Advisory boss HP lowered");
                    }
                }
            }
            ClientMsg::PlayerInfo { .. } => {
                let (name, avatar_url) = identity.unwrap_or_default();
                self.on_player_info(conn_id, &name, avatar_url);
            }
            ClientMsg::BossState(state) => {
                if !self.snapshot.set_boss_position(state.boss) {
                    warn!(
                        conn_id = %conn_id,
                        x = state.boss.x,
                        y = state.boss.y,
                        "Malformed boss position, dropping"
                    );
                    return;
                }
                self.broadcast(verbatim, Some(conn_id));
            }
            ClientMsg::GameReset => {
                self.snapshot.clear();
                let cleared = self.registry.reset();
                info!(conn_id = %conn_id, cleared_names = cleared, "Game reset");
                self.broadcast(verbatim, Some(conn_id));
            }
            ClientMsg::Ping { .. } => {
                self.send_msg(
                    conn_id,
                    &ServerMsg::Pong {
                        timestamp: unix_millis(),
                    },
                );
            }
        }
    }

    fn on_player_info(&mut self, conn_id: ConnId, name: &str, avatar_url: String) {
        match self.registry.register(conn_id, name) {
            Ok(player_name) => {
                info!(conn_id = %conn_id, player = %player_name, "Player registered");
                self.send_msg(
                    conn_id,
                    &ServerMsg::UsernameConfirmed {
                        message: "Player name registered".to_string(),
                        player_name: player_name.clone(),
                    },
                );
                let joined = ServerMsg::PlayerJoined {
                    player_name,
                    avatar_url,
                };
                match encode(&joined) {
                    Ok(json) => {
                        self.broadcast(Arc::from(json), Some(conn_id));
                    }
                    Err(e) => warn!(error = %e, "Failed to encode playerJoined"),
                }
            }
            Err(e) => {
                warn!(conn_id = %conn_id, requested = %name, error = %e, "Registration rejected");
                self.send_msg(
                    conn_id,
                    &ServerMsg::UsernameError {
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    /// Deliver `payload` to every open peer except `originator`.
    /// Returns the number of peers it was queued for.
    pub fn broadcast(&self, payload: Outbound, originator: Option<ConnId>) -> usize {
        let mut delivered = 0;

        for (conn_id, peer) in &self.peers {
            if Some(*conn_id) == originator || !peer.is_open() {
                continue;
            }
            match Self::deliver(*conn_id, peer, payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(error = %e, "Broadcast delivery failed"),
            }
        }

        if delivered > 0 {
            debug!(recipients = delivered, "Broadcast");
        }
        delivered
    }

    /// Drop peers whose connection task is gone without a disconnect
    pub fn sweep(&mut self) -> usize {
        let dead: Vec<ConnId> = self
            .peers
            .iter()
            .filter(|(_, peer)| !peer.is_open())
            .map(|(id, _)| *id)
            .collect();

        for conn_id in &dead {
            self.peers.remove(conn_id);
            self.registry.unregister(*conn_id);
        }

        if !dead.is_empty() {
            info!(
                cleaned = dead.len(),
                connections = self.peers.len(),
                "Swept closed connections"
            );
        }
        dead.len()
    }

    fn send_msg(&self, conn_id: ConnId, msg: &ServerMsg) {
        let json = match encode(msg) {
            Ok(json) => json,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to encode message");
                return;
            }
        };

        let result = match self.peers.get(&conn_id) {
            Some(peer) => Self::deliver(conn_id, peer, Arc::from(json)),
            None => Err(TransportError::UnknownPeer(conn_id)),
        };
        if let Err(e) = result {
            warn!(error = %e, "Direct send failed");
        }
    }

    fn deliver(conn_id: ConnId, peer: &Peer, payload: Outbound) -> Result<(), TransportError> {
        peer.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backlogged(conn_id),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(conn_id),
        })
    }
}
