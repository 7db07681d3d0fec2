//! Battle log and per-player damage tallies kept by a client

use std::collections::{HashMap, VecDeque};

/// Entries kept in the visible log
pub const BATTLE_LOG_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub player_name: String,
    pub damage: f32,
    pub is_critical: bool,
}

/// Newest-first list of recent hits
#[derive(Debug, Default)]
pub struct BattleLog {
    entries: VecDeque<LogEntry>,
}

impl BattleLog {
    pub fn push(&mut self, player_name: &str, damage: f32, is_critical: bool) {
        self.entries.push_front(LogEntry {
            player_name: player_name.to_string(),
            damage,
            is_critical,
        });
        self.entries.truncate(BATTLE_LOG_CAPACITY);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerTally {
    pub total_damage: f32,
    pub hit_count: u32,
    pub critical_count: u32,
}

/// Damage dealt per player across games; cleared only on request
#[derive(Debug, Default)]
pub struct DamageStats {
    players: HashMap<String, PlayerTally>,
}

impl DamageStats {
    pub fn record(&mut self, player_name: &str, damage: f32, is_critical: bool) {
        let tally = self.players.entry(player_name.to_string()).or_default();
        tally.total_damage += damage;
        tally.hit_count += 1;
        if is_critical {
            tally.critical_count += 1;
        }
    }

    pub fn get(&self, player_name: &str) -> Option<&PlayerTally> {
        self.players.get(player_name)
    }

    /// Players ordered by total damage, highest first
    pub fn ranking(&self) -> Vec<(&str, &PlayerTally)> {
        let mut ranked: Vec<_> = self
            .players
            .iter()
            .map(|(name, tally)| (name.as_str(), tally))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_damage
                .total_cmp(&a.1.total_damage)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }
}
