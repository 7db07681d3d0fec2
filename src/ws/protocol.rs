//! WebSocket protocol message definitions
//! These are the wire types shared by the relay and the simulating clients.
//! Every message is a JSON object discriminated by its `type` field.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::game::snapshot::GameStateData;

/// Bullet identifier, unique per origin and used for deduplication.
///
/// Browser clients send numeric ids (`Date.now() + Math.random()`), native
/// clients send strings; both are normalized to their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BulletId(String);

impl BulletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a locally fired bullet
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BulletId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

/// Player attribution carried by bullets and damage events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl PlayerRef {
    pub fn new(name: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: avatar_url.into(),
        }
    }
}

/// A bullet spawned by some player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletEvent {
    /// Missing ids are tolerated; the receiver assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BulletId>,
    pub player: PlayerRef,
    pub text: String,
}

/// A client-computed hit on the boss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEvent {
    pub player: PlayerRef,
    pub damage: f32,
    #[serde(default)]
    pub is_critical: bool,
    /// Boss HP on the sender's side after the hit
    #[serde(rename = "bossHP", default, skip_serializing_if = "Option::is_none")]
    pub boss_hp: Option<f32>,
    #[serde(rename = "bossMaxHP", default, skip_serializing_if = "Option::is_none")]
    pub boss_max_hp: Option<f32>,
}

/// Boss position, advisory only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossStateEvent {
    pub boss: BossPosition,
}

/// Messages sent from client to relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Registration request
    #[serde(rename_all = "camelCase")]
    PlayerInfo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_url: Option<String>,
        /// Older clients nest the identity in a `player` object
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<PlayerRef>,
    },

    Bullet(BulletEvent),

    Damage(DamageEvent),

    BossState(BossStateEvent),

    GameReset,

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

impl ClientMsg {
    /// Name and avatar of a `playerInfo` message, preferring the flat fields
    pub fn claimed_identity(&self) -> Option<(String, String)> {
        match self {
            ClientMsg::PlayerInfo {
                player_name,
                avatar_url,
                player,
            } => {
                let name = player_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .or_else(|| player.as_ref().map(|p| p.name.clone()))
                    .unwrap_or_default();
                let avatar = avatar_url
                    .clone()
                    .filter(|a| !a.is_empty())
                    .or_else(|| player.as_ref().map(|p| p.avatar_url.clone()))
                    .unwrap_or_default();
                Some((name, avatar))
            }
            _ => None,
        }
    }
}

/// Messages sent from relay to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Greeting after the socket opens
    #[serde(rename_all = "camelCase")]
    Connected {
        client_id: String,
        message: String,
        timestamp: u64,
    },

    /// Advisory state used to seed a newly joined client
    GameState { data: GameStateData },

    #[serde(rename_all = "camelCase")]
    UsernameConfirmed { message: String, player_name: String },

    UsernameError { message: String },

    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_name: String,
        avatar_url: String,
    },

    Bullet(BulletEvent),

    Damage(DamageEvent),

    BossState(BossStateEvent),

    GameReset,

    Pong { timestamp: u64 },
}

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message family with a closed set of `type` discriminators
pub trait Envelope: DeserializeOwned {
    const KINDS: &'static [&'static str];
}

impl Envelope for ClientMsg {
    const KINDS: &'static [&'static str] = &[
        "playerInfo",
        "bullet",
        "damage",
        "bossState",
        "gameReset",
        "ping",
    ];
}

impl Envelope for ServerMsg {
    const KINDS: &'static [&'static str] = &[
        "connected",
        "gameState",
        "usernameConfirmed",
        "usernameError",
        "playerJoined",
        "bullet",
        "damage",
        "bossState",
        "gameReset",
        "pong",
    ];
}

/// Decode one text frame, separating unknown types from broken payloads
pub fn decode<M: Envelope>(text: &str) -> Result<M, ProtocolError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedMessage("missing `type` field".to_string()))?;

    if !M::KINDS.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Encode a message to its JSON text form
pub fn encode<M: Serialize>(msg: &M) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_bullet_with_numeric_id_decodes() {
        let text = r#"{"type":"bullet","id":1700000000000.25,
            "player":{"name":"Alice","avatarUrl":"a.png"},"text":"hi"}"#;
        let msg: ClientMsg = decode(text).unwrap();
        match msg {
            ClientMsg::Bullet(ev) => {
                assert_eq!(ev.id, Some(BulletId::new("1700000000000.25")));
                assert_eq!(ev.player.name, "Alice");
                assert_eq!(ev.text, "hi");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn damage_uses_upper_case_hp_fields() {
        let msg = ClientMsg::Damage(DamageEvent {
            player: PlayerRef::new("Bob", ""),
            damage: 50.0,
            is_critical: true,
            boss_hp: Some(450.0),
            boss_max_hp: Some(500.0),
        });
        let json: Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "damage");
        assert_eq!(json["isCritical"], true);
        assert_eq!(json["bossHP"], 450.0);
        assert_eq!(json["bossMaxHP"], 500.0);
    }

    #[test]
    fn unknown_type_is_reported_separately() {
        let err = decode::<ClientMsg>(r#"{"type":"teleport"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(k) if k == "teleport"));
    }

    #[test]
    fn broken_payloads_are_malformed() {
        assert!(matches!(
            decode::<ClientMsg>("not json"),
            Err(ProtocolError::MalformedMessage(_))
        ));
        assert!(matches!(
            decode::<ClientMsg>(r#"{"text":"no type"}"#),
            Err(ProtocolError::MalformedMessage(_))
        ));
        assert!(matches!(
            decode::<ClientMsg>(r#"{"type":"damage","damage":"lots"}"#),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn player_info_accepts_nested_player() {
        let msg: ClientMsg =
            decode(r#"{"type":"playerInfo","player":{"name":"Carol","avatarUrl":"c.png"}}"#)
                .unwrap();
        assert_eq!(
            msg.claimed_identity(),
            Some(("Carol".to_string(), "c.png".to_string()))
        );
    }

    #[test]
    fn game_reset_has_no_payload() {
        assert_eq!(encode(&ServerMsg::GameReset).unwrap(), r#"{"type":"gameReset"}"#);
        let msg: ServerMsg = decode(r#"{"type":"gameReset"}"#).unwrap();
        assert_eq!(msg, ServerMsg::GameReset);
    }
}
