//! Advisory boss state and the lower-only HP merge
//!
//! Neither the relay nor a client treats remote HP as truth. A remote value
//! is only ever allowed to lower the locally held one ("most damage wins"),
//! so late joiners converge on the most damaged view they have heard of.

use serde::{Deserialize, Serialize};

use crate::ws::protocol::BossPosition;

/// Returns the value to adopt if `incoming` lowers `current`
pub fn lower_only(current: f32, incoming: f32) -> Option<f32> {
    if incoming.is_finite() && incoming < current {
        Some(incoming)
    } else {
        None
    }
}

/// Snapshot the relay keeps to greet new peers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStateData {
    #[serde(rename = "bossHP", default, skip_serializing_if = "Option::is_none")]
    pub boss_hp: Option<f32>,
    #[serde(rename = "bossMaxHP", default, skip_serializing_if = "Option::is_none")]
    pub boss_max_hp: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss: Option<BossPosition>,
}

impl GameStateData {
    pub fn is_empty(&self) -> bool {
        self.boss_hp.is_none() && self.boss_max_hp.is_none() && self.boss.is_none()
    }

    /// Merge a reported HP. Returns true if the snapshot changed.
    pub fn merge_boss_hp(&mut self, hp: f32, max_hp: f32) -> bool {
        if !hp.is_finite() {
            return false;
        }
        let hp = hp.max(0.0);
        let merged = match self.boss_hp {
            None => Some(hp),
            Some(current) => lower_only(current, hp),
        };

        match merged {
            Some(hp) => {
                self.boss_hp = Some(hp);
                self.boss_max_hp = Some(max_hp);
                true
            }
            None => false,
        }
    }

    /// Store a reported position. Non-finite coordinates are refused since
    /// they cannot be written back out as JSON numbers.
    pub fn set_boss_position(&mut self, position: BossPosition) -> bool {
        if !(position.x.is_finite() && position.y.is_finite()) {
            return false;
        }
        self.boss = Some(position);
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
