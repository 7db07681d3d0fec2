//! Per-tick combat simulation owned by one client
//!
//! The simulator is purely local: it advances the boss and every bullet,
//! resolves hits and reports what happened as [`CombatEvent`]s. It performs
//! no I/O; the caller decides what to render and what to send to the relay.

use std::collections::{HashSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::ws::protocol::{BulletId, PlayerRef};

use super::combat::{CombatSystem, DamageProfile};
use super::config::{MoveRange, SimulationConfig};
use super::physics::{PhysicsSystem, Rect};

/// Ticks the boss flashes after being hit
pub const HIT_FLASH_TICKS: u32 = 10;

/// Bullets spawn this far beyond the right edge of the arena
const SPAWN_OFFSET_X: f32 = 100.0;

/// Vertical margin kept free when picking a spawn row
const SPAWN_MARGIN_Y: f32 = 100.0;

/// Retired bullet ids remembered so late duplicates stay out
pub const RETIRED_ID_MEMORY: usize = 1024;

/// Game phase. `Over` is terminal for a game instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Running,
    Over,
}

/// Why a bullet left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Right edge passed the off-screen threshold
    OffScreen,
    /// Consumed by a hit on the boss
    Hit,
    /// Lived longer than the configured maximum age
    Expired,
}

/// A resolved hit on the boss
#[derive(Debug, Clone, PartialEq)]
pub struct DamageDealt {
    pub bullet_id: BulletId,
    pub player: PlayerRef,
    pub damage: f32,
    pub is_critical: bool,
    pub boss_hp: f32,
    pub boss_max_hp: f32,
}

/// Events produced by the simulator for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    BulletSpawned { id: BulletId },
    BulletRemoved { id: BulletId, reason: RemovalReason },
    Damage(DamageDealt),
    /// Emitted exactly once per game instance
    BossDefeated { killer: Option<PlayerRef> },
}

/// Character-count estimate of an 18px sans-serif label plus avatar padding
pub fn estimate_label_width(label: &str) -> f32 {
    const GLYPH_WIDTH: f32 = 10.0;
    const AVATAR_PADDING: f32 = 80.0;
    label.chars().count() as f32 * GLYPH_WIDTH + AVATAR_PADDING
}

/// Bounded FIFO of ids that already left the simulation
#[derive(Debug, Default)]
struct RetiredIds {
    order: VecDeque<BulletId>,
    ids: HashSet<BulletId>,
}

impl RetiredIds {
    fn insert(&mut self, id: BulletId) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > RETIRED_ID_MEMORY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn contains(&self, id: &BulletId) -> bool {
        self.ids.contains(id)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

/// The shared boss
#[derive(Debug, Clone)]
pub struct Boss {
    pub x: f32,
    pub y: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub alive: bool,
    pub range: MoveRange,
    /// Cosmetic; counts down every tick
    pub flash_timer: u32,
}

impl Boss {
    fn spawn(config: &SimulationConfig) -> Self {
        Self {
            x: config.arena.width / 2.0,
            y: config.arena.height / 2.0,
            dir_x: 1.0,
            dir_y: 1.0,
            hp: config.boss.initial_hp,
            max_hp: config.boss.max_hp,
            alive: true,
            range: config.move_range(),
            flash_timer: 0,
        }
    }
}

/// A text bullet travelling leftward
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: BulletId,
    pub player: PlayerRef,
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Unknown until measured
    pub width: Option<f32>,
    pub height: f32,
    pub age_ticks: u32,
}

impl Bullet {
    pub fn new(
        id: BulletId,
        player: PlayerRef,
        text: impl Into<String>,
        x: f32,
        y: f32,
        height: f32,
    ) -> Self {
        Self {
            id,
            player,
            text: text.into(),
            x,
            y,
            width: None,
            height,
            age_ticks: 0,
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    /// Text as rendered: `name: text`
    pub fn label(&self) -> String {
        format!("{}: {}", self.player.name, self.text)
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width.unwrap_or(0.0),
            height: self.height,
        }
    }
}

/// Local combat state for one game instance
pub struct CombatSimulator {
    config: SimulationConfig,
    damage: DamageProfile,
    boss: Boss,
    bullets: Vec<Bullet>,
    phase: GamePhase,
    killer: Option<PlayerRef>,
    rng: ChaCha8Rng,
    retired: RetiredIds,
    tick: u64,
    pending: Vec<CombatEvent>,
}

impl CombatSimulator {
    pub fn new(config: SimulationConfig, seed: u64) -> Self {
        let config = config.sanitized();
        Self {
            damage: DamageProfile::from_config(&config),
            boss: Boss::spawn(&config),
            bullets: Vec::new(),
            phase: GamePhase::Running,
            killer: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            retired: RetiredIds::default(),
            tick: 0,
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn boss(&self) -> &Boss {
        &self.boss
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::Over
    }

    /// Player whose hit finished the boss, fixed once set
    pub fn killer(&self) -> Option<&PlayerRef> {
        self.killer.as_ref()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn contains_bullet(&self, id: &BulletId) -> bool {
        self.bullets.iter().any(|b| &b.id == id)
    }

    /// Live now, or removed earlier in this game instance
    pub fn knows_bullet(&self, id: &BulletId) -> bool {
        self.retired.contains(id) || self.contains_bullet(id)
    }

    /// Start a fresh game instance with the same configuration
    pub fn restart(&mut self) {
        self.boss = Boss::spawn(&self.config);
        self.bullets.clear();
        self.phase = GamePhase::Running;
        self.killer = None;
        self.retired.clear();
        self.pending.clear();
        info!(boss_hp = self.boss.hp, "Combat restarted");
    }

    /// Resize the playfield; the boss is pulled back inside the new bounds
    pub fn resize_arena(&mut self, width: f32, height: f32) {
        let mut config = self.config.clone();
        config.arena.width = width;
        config.arena.height = height;
        self.config = config.sanitized();

        self.boss.range = self.config.move_range();
        self.boss.x = self.boss.x.min(self.config.arena.width - self.config.boss.size);
        self.boss.y = self.boss.y.min(self.config.arena.height - 200.0);
    }

    /// Spawn a bullet just beyond the right edge at a random row.
    /// Returns false if this id is live or was already removed.
    pub fn spawn_bullet(
        &mut self,
        id: BulletId,
        player: PlayerRef,
        text: impl Into<String>,
    ) -> bool {
        let x = self.config.arena.width + SPAWN_OFFSET_X;
        let top = SPAWN_MARGIN_Y;
        let bottom = self.config.arena.height - SPAWN_MARGIN_Y;
        let y = if bottom > top {
            self.rng.gen_range(top..bottom)
        } else {
            self.config.arena.height / 2.0
        };

        let bullet = Bullet::new(id, player, text, x, y, self.config.bullet.height);
        self.insert_bullet(bullet)
    }

    /// Insert a fully built bullet. Known ids are rejected, so a removed
    /// bullet never reappears.
    pub fn insert_bullet(&mut self, bullet: Bullet) -> bool {
        if self.knows_bullet(&bullet.id) {
            debug!(bullet_id = %bullet.id, "Duplicate bullet ignored");
            return false;
        }

        self.pending.push(CombatEvent::BulletSpawned {
            id: bullet.id.clone(),
        });
        self.bullets.push(bullet);
        true
    }

    /// Lower local HP from a remote report; never raises it.
    /// Returns true if HP changed.
    pub fn merge_remote_hp(&mut self, hp: f32, reported_by: Option<&PlayerRef>) -> bool {
        if self.phase == GamePhase::Over || !hp.is_finite() {
            return false;
        }

        let Some(lowered) = super::snapshot::lower_only(self.boss.hp, hp.max(0.0)) else {
            return false;
        };

        self.boss.hp = lowered.clamp(0.0, self.boss.max_hp);
        if self.boss.hp <= 0.0 {
            self.defeat(reported_by.cloned());
        }
        true
    }

    /// Adopt an advisory boss position
    pub fn set_boss_position(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.boss.x = x;
            self.boss.y = y;
        }
    }

    /// Advance one frame and return everything that happened in it
    pub fn tick(&mut self) -> Vec<CombatEvent> {
        let mut events = std::mem::take(&mut self.pending);

        if self.phase == GamePhase::Running {
            self.advance_boss();
            self.advance_bullets(&mut events);
            // A death inside advance_bullets queues its event in `pending`
            events.append(&mut self.pending);
        }

        self.boss.flash_timer = self.boss.flash_timer.saturating_sub(1);
        self.tick += 1;
        events
    }

    /// Move the boss and bounce it off its movement box. No-op once dead.
    pub fn advance_boss(&mut self) {
        if !self.boss.alive {
            return;
        }

        let (x, y, dir_x, dir_y) = PhysicsSystem::step_boss(
            self.boss.x,
            self.boss.y,
            self.boss.dir_x,
            self.boss.dir_y,
            self.config.boss.move_speed,
            &self.boss.range,
        );
        self.boss.x = x;
        self.boss.y = y;
        self.boss.dir_x = dir_x;
        self.boss.dir_y = dir_y;
    }

    /// Move every bullet, retire those that left or expired, and resolve hits
    pub fn advance_bullets(&mut self, events: &mut Vec<CombatEvent>) {
        let speed = self.config.bullet.speed;
        let max_age = self.config.bullet.max_age_ticks;
        let bullets = std::mem::take(&mut self.bullets);
        let mut survivors = Vec::with_capacity(bullets.len());

        for mut bullet in bullets {
            bullet.x -= speed;
            bullet.age_ticks = bullet.age_ticks.saturating_add(1);
            if bullet.width.is_none() {
                bullet.width = Some(estimate_label_width(&bullet.label()));
            }

            let reason = if PhysicsSystem::is_offscreen(&bullet.rect()) {
                Some(RemovalReason::OffScreen)
            } else if bullet.age_ticks > max_age {
                Some(RemovalReason::Expired)
            } else if self.resolve_collision(&bullet, events) {
                Some(RemovalReason::Hit)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    self.retired.insert(bullet.id.clone());
                    events.push(CombatEvent::BulletRemoved {
                        id: bullet.id,
                        reason,
                    });
                }
                None => survivors.push(bullet),
            }
        }

        self.bullets = survivors;
    }

    /// Test one bullet against the boss and apply the hit.
    /// Returns true if the bullet was consumed.
    pub fn resolve_collision(&mut self, bullet: &Bullet, events: &mut Vec<CombatEvent>) -> bool {
        if !self.boss.alive || self.phase == GamePhase::Over {
            return false;
        }

        let hit = PhysicsSystem::circle_hits_rect(
            self.boss.x,
            self.boss.y,
            self.config.boss_radius(),
            &bullet.rect(),
        );
        if !hit {
            return false;
        }

        let roll = CombatSystem::resolve_damage(&mut self.rng, &self.damage);
        let (hp, killed) = CombatSystem::apply_damage(self.boss.hp, roll.damage);
        self.boss.hp = hp;
        self.boss.flash_timer = HIT_FLASH_TICKS;

        events.push(CombatEvent::Damage(DamageDealt {
            bullet_id: bullet.id.clone(),
            player: bullet.player.clone(),
            damage: roll.damage,
            is_critical: roll.is_critical,
            boss_hp: hp,
            boss_max_hp: self.boss.max_hp,
        }));

        if killed {
            self.defeat(Some(bullet.player.clone()));
        }
        true
    }

    /// The single Running -> Over transition
    fn defeat(&mut self, killer: Option<PlayerRef>) {
        if self.phase == GamePhase::Over {
            return;
        }

        self.boss.hp = 0.0;
        self.boss.alive = false;
        self.phase = GamePhase::Over;
        self.killer = killer.clone();

        info!(
            killer = killer.as_ref().map(|k| k.name.as_str()).unwrap_or("unknown"),
            tick = self.tick,
            "Boss defeated"
        );
        self.pending.push(CombatEvent::BossDefeated { killer });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> PlayerRef {
        PlayerRef::new("Alice", "alice.png")
    }

    fn config(critical_rate: f32) -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.bullet.base_damage = 10.0;
        cfg.bullet.critical_multiplier = 5.0;
        cfg.bullet.critical_rate = critical_rate;
        cfg
    }

    /// A bullet sitting on the boss centre, hit on the next tick
    fn bullet_on_boss(sim: &CombatSimulator, id: &str) -> Bullet {
        let boss = sim.boss();
        Bullet::new(BulletId::new(id), alice(), "pew", boss.x - 10.0, boss.y - 10.0, 20.0)
            .with_width(20.0)
    }

    fn damage_events(events: &[CombatEvent]) -> Vec<&DamageDealt> {
        events
            .iter()
            .filter_map(|e| match e {
                CombatEvent::Damage(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn non_critical_hit_removes_base_damage() {
        let mut sim = CombatSimulator::new(config(0.0), 1);
        let bullet = bullet_on_boss(&sim, "b1");
        assert!(sim.insert_bullet(bullet));

        let events = sim.tick();
        let hits = damage_events(&events);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].damage, 10.0);
        assert!(!hits[0].is_critical);
        assert_eq!(sim.boss().hp, 490.0);
        assert!(sim.bullets().is_empty());
        assert!(events.contains(&CombatEvent::BulletRemoved {
            id: BulletId::new("b1"),
            reason: RemovalReason::Hit,
        }));
        assert_eq!(sim.boss().flash_timer, HIT_FLASH_TICKS - 1);
    }

    #[test]
    fn killing_blow_is_terminal_and_fixes_killer() {
        let mut cfg = config(0.0);
        cfg.boss.initial_hp = 10.0;
        let mut sim = CombatSimulator::new(cfg, 3);

        let first = bullet_on_boss(&sim, "kill");
        sim.insert_bullet(first);
        let events = sim.tick();

        assert_eq!(sim.boss().hp, 0.0);
        assert!(!sim.boss().alive);
        assert!(sim.is_game_over());
        assert_eq!(sim.killer(), Some(&alice()));
        assert!(events.contains(&CombatEvent::BossDefeated {
            killer: Some(alice())
        }));

        // Later bullets never touch HP or the killer
        let bob = PlayerRef::new("Bob", "");
        let late = Bullet::new(
            BulletId::new("late"),
            bob,
            "too late",
            sim.boss().x - 10.0,
            sim.boss().y - 10.0,
            20.0,
        )
        .with_width(20.0);
        sim.insert_bullet(late);
        for _ in 0..5 {
            let events = sim.tick();
            assert!(damage_events(&events).is_empty());
            assert!(!events
                .iter()
                .any(|e| matches!(e, CombatEvent::BossDefeated { .. })));
        }
        assert_eq!(sim.boss().hp, 0.0);
        assert_eq!(sim.killer(), Some(&alice()));
    }

    #[test]
    fn each_bullet_hits_at_most_once_and_rolls_independently() {
        let mut cfg = config(0.5);
        cfg.boss.initial_hp = 5_000.0;
        cfg.boss.max_hp = 5_000.0;
        let mut sim = CombatSimulator::new(cfg, 11);
        for i in 0..20 {
            let bullet = bullet_on_boss(&sim, &format!("b{i}"));
            sim.insert_bullet(bullet);
        }

        let events = sim.tick();
        let hits = damage_events(&events);
        assert_eq!(hits.len(), 20);
        assert!(hits.iter().any(|h| h.is_critical));
        assert!(hits.iter().any(|h| !h.is_critical));
        assert!(sim.bullets().is_empty());
        assert!(sim.tick().is_empty());
    }

    #[test]
    fn hp_stays_within_bounds_every_tick() {
        let mut cfg = config(0.3);
        cfg.boss.initial_hp = 200.0;
        cfg.boss.max_hp = 200.0;
        let mut sim = CombatSimulator::new(cfg, 99);

        for tick in 0..400 {
            if tick % 3 == 0 {
                let bullet = bullet_on_boss(&sim, &format!("b{tick}"));
                sim.insert_bullet(bullet);
            }
            sim.tick();
            let boss = sim.boss();
            assert!(boss.hp >= 0.0 && boss.hp <= boss.max_hp);
            assert_eq!(boss.alive, boss.hp > 0.0);
        }
        assert!(sim.is_game_over());
    }

    #[test]
    fn offscreen_bullet_is_removed_and_never_collides() {
        let mut sim = CombatSimulator::new(config(0.0), 5);
        let bullet = Bullet::new(BulletId::new("gone"), alice(), "bye", -159.5, 0.0, 60.0)
            .with_width(60.0);
        sim.insert_bullet(bullet);

        let events = sim.tick();
        assert!(events.contains(&CombatEvent::BulletRemoved {
            id: BulletId::new("gone"),
            reason: RemovalReason::OffScreen,
        }));
        assert!(sim.bullets().is_empty());

        // Move the boss onto where the bullet was; nothing can hit it now
        sim.set_boss_position(-150.0, 30.0);
        let events = sim.tick();
        assert!(damage_events(&events).is_empty());
        assert_eq!(sim.boss().hp, 500.0);
    }

    #[test]
    fn bullets_expire_after_max_age() {
        let mut cfg = config(0.0);
        cfg.bullet.max_age_ticks = 3;
        let mut sim = CombatSimulator::new(cfg, 5);
        // Far from the boss and from the left edge
        let bullet = Bullet::new(BulletId::new("slow"), alice(), "zzz", 5_000.0, 0.0, 10.0)
            .with_width(10.0);
        sim.insert_bullet(bullet);

        for _ in 0..3 {
            sim.tick();
        }
        assert_eq!(sim.bullets().len(), 1);
        let events = sim.tick();
        assert!(events.contains(&CombatEvent::BulletRemoved {
            id: BulletId::new("slow"),
            reason: RemovalReason::Expired,
        }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut sim = CombatSimulator::new(config(0.0), 2);
        assert!(sim.spawn_bullet(BulletId::new("x"), alice(), "one"));
        assert!(!sim.spawn_bullet(BulletId::new("x"), alice(), "two"));
        assert_eq!(sim.bullets().len(), 1);
    }

    #[test]
    fn removed_bullet_never_reappears() {
        let mut sim = CombatSimulator::new(config(0.0), 2);
        let bullet = bullet_on_boss(&sim, "once");
        assert!(sim.insert_bullet(bullet.clone()));
        sim.tick();
        assert!(!sim.contains_bullet(&BulletId::new("once")));
        assert_eq!(sim.boss().hp, 490.0);

        assert!(!sim.insert_bullet(bullet));
        assert!(!sim.spawn_bullet(BulletId::new("once"), alice(), "again"));
        assert!(sim.bullets().is_empty());
        assert_eq!(sim.boss().hp, 490.0);

        // A new game instance starts with a clean slate
        sim.restart();
        assert!(sim.spawn_bullet(BulletId::new("once"), alice(), "new round"));
    }

    #[test]
    fn retired_id_memory_is_bounded() {
        let mut retired = RetiredIds::default();
        for i in 0..RETIRED_ID_MEMORY + 10 {
            retired.insert(BulletId::new(format!("b{i}")));
        }
        assert_eq!(retired.order.len(), RETIRED_ID_MEMORY);
        assert!(!retired.contains(&BulletId::new("b0")));
        assert!(retired.contains(&BulletId::new(format!("b{}", RETIRED_ID_MEMORY + 9))));
    }

    #[test]
    fn spawned_bullets_start_beyond_right_edge() {
        let mut sim = CombatSimulator::new(config(0.0), 2);
        sim.spawn_bullet(BulletId::new("s"), alice(), "hello");
        let bullet = &sim.bullets()[0];
        let arena = &sim.config().arena;
        assert_eq!(bullet.x, arena.width + 100.0);
        assert!(bullet.y >= 100.0 && bullet.y < arena.height - 100.0);
        assert!(bullet.width.is_none());

        let events = sim.tick();
        assert_eq!(events[0], CombatEvent::BulletSpawned { id: BulletId::new("s") });
        assert!(sim.bullets()[0].width.is_some());
    }

    #[test]
    fn dead_boss_does_not_move() {
        let mut cfg = config(0.0);
        cfg.boss.initial_hp = 1.0;
        let mut sim = CombatSimulator::new(cfg, 4);
        let bullet = bullet_on_boss(&sim, "k");
        sim.insert_bullet(bullet);
        sim.tick();
        assert!(!sim.boss().alive);

        let (x, y) = (sim.boss().x, sim.boss().y);
        sim.advance_boss();
        sim.tick();
        assert_eq!((sim.boss().x, sim.boss().y), (x, y));
    }

    #[test]
    fn remote_hp_only_lowers_and_can_finish_the_boss() {
        let mut sim = CombatSimulator::new(config(0.0), 8);
        assert!(!sim.merge_remote_hp(600.0, None));
        assert!(sim.merge_remote_hp(120.0, None));
        assert_eq!(sim.boss().hp, 120.0);

        let bob = PlayerRef::new("Bob", "");
        assert!(sim.merge_remote_hp(0.0, Some(&bob)));
        assert!(sim.is_game_over());
        assert_eq!(sim.killer(), Some(&bob));
        assert!(sim
            .tick()
            .contains(&CombatEvent::BossDefeated { killer: Some(bob) }));
        assert!(!sim.merge_remote_hp(0.0, None));
    }

    #[test]
    fn restart_begins_a_new_instance() {
        let mut cfg = config(0.0);
        cfg.boss.initial_hp = 5.0;
        let mut sim = CombatSimulator::new(cfg, 6);
        let bullet = bullet_on_boss(&sim, "k");
        sim.insert_bullet(bullet);
        sim.tick();
        assert!(sim.is_game_over());

        sim.restart();
        assert_eq!(sim.phase(), GamePhase::Running);
        assert_eq!(sim.boss().hp, 5.0);
        assert!(sim.killer().is_none());
        assert!(sim.bullets().is_empty());
    }

    #[test]
    fn flash_timer_keeps_decaying_after_game_over() {
        let mut cfg = config(0.0);
        cfg.boss.initial_hp = 1.0;
        let mut sim = CombatSimulator::new(cfg, 4);
        let bullet = bullet_on_boss(&sim, "k");
        sim.insert_bullet(bullet);
        sim.tick();
        let before = sim.boss().flash_timer;
        sim.tick();
        assert_eq!(sim.boss().flash_timer, before - 1);
    }

    #[test]
    fn resize_keeps_boss_inside() {
        let mut sim = CombatSimulator::new(config(0.0), 1);
        sim.resize_arena(800.0, 600.0);
        assert!(sim.boss().x <= 800.0 - 350.0);
        assert!(sim.boss().y <= 400.0);
        assert_eq!(sim.boss().range.max_x, 450.0);
    }
}
