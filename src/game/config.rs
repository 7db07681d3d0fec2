//! Simulation tuning values
//!
//! Field names follow the `default-config.json` layout used by the browser
//! build (`BOSS`, `BULLET`, ...), so the same file can seed a native client.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct SimulationConfig {
    pub boss: BossConfig,
    pub bullet: BulletConfig,
    pub arena: ArenaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct BossConfig {
    pub initial_hp: f32,
    pub max_hp: f32,
    /// Diameter; the hit circle radius is half of this
    pub size: f32,
    /// Pixels per tick on the x axis
    pub move_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct BulletConfig {
    /// Pixels per tick, always leftward
    pub speed: f32,
    pub height: f32,
    pub base_damage: f32,
    /// Probability in 0..=1
    pub critical_rate: f32,
    pub critical_multiplier: f32,
    /// Ticks after which a bullet that never left the screen is retired
    pub max_age_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            initial_hp: 500.0,
            max_hp: 500.0,
            size: 350.0,
            move_speed: 0.6,
        }
    }
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: 0.6,
            height: 60.0,
            base_damage: 10.0,
            critical_rate: 0.15,
            critical_multiplier: 5.0,
            // Three minutes at 60 FPS
            max_age_ticks: 10_800,
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            boss: BossConfig::default(),
            bullet: BulletConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl SimulationConfig {
    /// Clamp every value into a range the simulator can run with.
    /// Non-finite values fall back to the defaults.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();

        let max_hp = finite_or(self.boss.max_hp, d.boss.max_hp).max(1.0);
        let initial_hp = finite_or(self.boss.initial_hp, max_hp).clamp(1.0, max_hp);

        Self {
            boss: BossConfig {
                initial_hp,
                max_hp,
                size: finite_or(self.boss.size, d.boss.size).max(1.0),
                move_speed: finite_or(self.boss.move_speed, d.boss.move_speed).max(0.0),
            },
            bullet: BulletConfig {
                speed: finite_or(self.bullet.speed, d.bullet.speed).max(0.01),
                height: finite_or(self.bullet.height, d.bullet.height).max(1.0),
                base_damage: finite_or(self.bullet.base_damage, d.bullet.base_damage).max(0.0),
                critical_rate: finite_or(self.bullet.critical_rate, d.bullet.critical_rate)
                    .clamp(0.0, 1.0),
                critical_multiplier: finite_or(
                    self.bullet.critical_multiplier,
                    d.bullet.critical_multiplier,
                )
                .max(1.0),
                max_age_ticks: self.bullet.max_age_ticks.max(1),
            },
            arena: ArenaConfig {
                width: finite_or(self.arena.width, d.arena.width).max(1.0),
                height: finite_or(self.arena.height, d.arena.height).max(1.0),
            },
        }
    }

    pub fn boss_radius(&self) -> f32 {
        self.boss.size / 2.0
    }

    pub fn move_range(&self) -> MoveRange {
        MoveRange::for_arena(self.arena.width, self.arena.height, self.boss.size)
    }
}

/// Box the boss centre bounces inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRange {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl MoveRange {
    /// Derive the movement box from the playfield size
    pub fn for_arena(width: f32, height: f32, boss_size: f32) -> Self {
        Self {
            min_x: boss_size,
            max_x: width - boss_size,
            min_y: (height * 0.15).min(150.0),
            max_y: (height - 200.0).max(height * 0.7),
        }
    }
}
