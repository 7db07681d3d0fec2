//! Client-side reconciliation between the local simulation and the relay
//!
//! Own bullets are applied to the local simulator immediately and also
//! handed back to the caller for sending. Events arriving from the relay are
//! deduplicated by bullet id and merged with the lower-only HP policy, so
//! duplicated or reordered delivery never double-spawns or heals the boss.

use tracing::{debug, info};

use crate::game::{CombatEvent, CombatSimulator, SimulationConfig};
use crate::util::time::unix_millis;
use crate::ws::protocol::{
    BossPosition, BossStateEvent, BulletEvent, BulletId, ClientMsg, DamageEvent, PlayerRef,
    ServerMsg,
};

use super::battle_log::{BattleLog, DamageStats};

/// Everything one frame produced
#[derive(Debug, Default)]
pub struct FrameOutput {
    /// For the presentation layer
    pub events: Vec<CombatEvent>,
    /// To be sent to the relay
    pub outgoing: Vec<ClientMsg>,
}

/// What applying a relay message did
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Connected { client_id: String },
    NameConfirmed(String),
    NameRejected(String),
    PlayerJoined { player_name: String, avatar_url: String },
    BulletAccepted(BulletId),
    /// Live or already removed locally; dropped silently
    BulletDuplicate(BulletId),
    /// Missing sender name or text
    BulletDropped,
    RemoteDamage { player_name: String, hp_lowered: bool },
    /// Our own damage report came back
    OwnDamageIgnored,
    BossMoved,
    Seeded { hp_lowered: bool },
    GameReset,
    Pong { timestamp: u64 },
}

/// One player's view of the battle
pub struct ClientSession {
    player: PlayerRef,
    sim: CombatSimulator,
    log: BattleLog,
    stats: DamageStats,
    confirmed_name: Option<String>,
}

impl ClientSession {
    pub fn new(player: PlayerRef, config: SimulationConfig, seed: u64) -> Self {
        Self {
            player,
            sim: CombatSimulator::new(config, seed),
            log: BattleLog::default(),
            stats: DamageStats::default(),
            confirmed_name: None,
        }
    }

    pub fn with_simulator(player: PlayerRef, sim: CombatSimulator) -> Self {
        Self {
            player,
            sim,
            log: BattleLog::default(),
            stats: DamageStats::default(),
            confirmed_name: None,
        }
    }

    pub fn player(&self) -> &PlayerRef {
        &self.player
    }

    pub fn simulator(&self) -> &CombatSimulator {
        &self.sim
    }

    pub fn battle_log(&self) -> &BattleLog {
        &self.log
    }

    pub fn stats(&self) -> &DamageStats {
        &self.stats
    }

    /// Name the relay accepted, if registration succeeded
    pub fn confirmed_name(&self) -> Option<&str> {
        self.confirmed_name.as_deref()
    }

    /// Registration message sent right after connecting
    pub fn hello(&self) -> ClientMsg {
        ClientMsg::PlayerInfo {
            player_name: Some(self.player.name.clone()),
            avatar_url: Some(self.player.avatar_url.clone()),
            player: None,
        }
    }

    pub fn ping(&self) -> ClientMsg {
        ClientMsg::Ping {
            timestamp: Some(unix_millis()),
        }
    }

    /// Advisory position report for other clients
    pub fn boss_state(&self) -> ClientMsg {
        let boss = self.sim.boss();
        ClientMsg::BossState(BossStateEvent {
            boss: BossPosition {
                x: boss.x,
                y: boss.y,
            },
        })
    }

    /// Fire a bullet: applied locally now, returned for sending.
    /// Blank text and finished games fire nothing.
    pub fn fire(&mut self, text: &str) -> Option<ClientMsg> {
        let text = text.trim();
        if text.is_empty() || self.sim.is_game_over() {
            return None;
        }

        let id = BulletId::generate();
        if !self.sim.spawn_bullet(id.clone(), self.player.clone(), text) {
            return None;
        }

        Some(ClientMsg::Bullet(BulletEvent {
            id: Some(id),
            player: self.player.clone(),
            text: text.to_string(),
        }))
    }

    /// Restart locally and produce the reset signal for everyone else
    pub fn reset_game(&mut self) -> ClientMsg {
        self.restart_local();
        ClientMsg::GameReset
    }

    /// Advance one frame. Hits landed by our own bullets are logged and
    /// reported; hits by remote bullets are reported by their owners.
    pub fn tick(&mut self) -> FrameOutput {
        let events = self.sim.tick();
        let mut outgoing = Vec::new();

        for event in &events {
            match event {
                CombatEvent::Damage(hit) if hit.player.name == self.player.name => {
                    self.log.push(&hit.player.name, hit.damage, hit.is_critical);
                    self.stats.record(&hit.player.name, hit.damage, hit.is_critical);
                    outgoing.push(ClientMsg::Damage(DamageEvent {
                        player: hit.player.clone(),
                        damage: hit.damage,
                        is_critical: hit.is_critical,
                        boss_hp: Some(hit.boss_hp),
                        boss_max_hp: Some(hit.boss_max_hp),
                    }));
                }
                CombatEvent::BossDefeated { killer } => {
                    info!(
                        player = %self.player.name,
                        killer = killer.as_ref().map(|k| k.name.as_str()).unwrap_or("unknown"),
                        "Boss down"
                    );
                }
                _ => {}
            }
        }

        FrameOutput { events, outgoing }
    }

    /// Apply one message received from the relay
    pub fn apply(&mut self, msg: ServerMsg) -> SessionNotice {
        match msg {
            ServerMsg::Connected { client_id, .. } => SessionNotice::Connected { client_id },
            ServerMsg::GameState { data } => {
                let hp_lowered = data
                    .boss_hp
                    .map(|hp| self.sim.merge_remote_hp(hp, None))
                    .unwrap_or(false);
                if let Some(pos) = data.boss {
                    self.sim.set_boss_position(pos.x, pos.y);
                }
                SessionNotice::Seeded { hp_lowered }
            }
            ServerMsg::UsernameConfirmed { player_name, .. } => {
                self.confirmed_name = Some(player_name.clone());
                SessionNotice::NameConfirmed(player_name)
            }
            ServerMsg::UsernameError { message } => SessionNotice::NameRejected(message),
            ServerMsg::PlayerJoined {
                player_name,
                avatar_url,
            } => SessionNotice::PlayerJoined {
                player_name,
                avatar_url,
            },
            ServerMsg::Bullet(bullet) => self.apply_remote_bullet(bullet),
            ServerMsg::Damage(damage) => self.apply_remote_damage(damage),
            ServerMsg::BossState(state) => {
                self.sim.set_boss_position(state.boss.x, state.boss.y);
                SessionNotice::BossMoved
            }
            ServerMsg::GameReset => {
                self.restart_local();
                SessionNotice::GameReset
            }
            ServerMsg::Pong { timestamp } => SessionNotice::Pong { timestamp },
        }
    }

    fn apply_remote_bullet(&mut self, bullet: BulletEvent) -> SessionNotice {
        if bullet.player.name.trim().is_empty() || bullet.text.trim().is_empty() {
            debug!("Bullet without sender or text, skipping");
            return SessionNotice::BulletDropped;
        }

        let id = bullet.id.unwrap_or_else(BulletId::generate);
        if self.sim.knows_bullet(&id) {
            debug!(bullet_id = %id, "Bullet already seen, skipping");
            return SessionNotice::BulletDuplicate(id);
        }

        if self.sim.spawn_bullet(id.clone(), bullet.player, bullet.text) {
            SessionNotice::BulletAccepted(id)
        } else {
            SessionNotice::BulletDuplicate(id)
        }
    }

    fn apply_remote_damage(&mut self, damage: DamageEvent) -> SessionNotice {
        if damage.player.name == self.player.name {
            return SessionNotice::OwnDamageIgnored;
        }

        self.log
            .push(&damage.player.name, damage.damage, damage.is_critical);
        self.stats
            .record(&damage.player.name, damage.damage, damage.is_critical);

        let hp_lowered = damage
            .boss_hp
            .map(|hp| self.sim.merge_remote_hp(hp, Some(&damage.player)))
            .unwrap_or(false);

        SessionNotice::RemoteDamage {
            player_name: damage.player.name,
            hp_lowered,
        }
    }

    fn restart_local(&mut self) {
        self.sim.restart();
        self.log.clear();
    }
}
