//! Combat system - damage rolls and HP bookkeeping

use rand::Rng;

use super::config::SimulationConfig;

/// Damage parameters for bullets
#[derive(Debug, Clone, Copy)]
pub struct DamageProfile {
    /// Damage per non-critical hit
    pub base_damage: f32,
    /// Chance of a critical hit (0..=1)
    pub critical_rate: f32,
    /// Critical hits deal `base_damage * critical_multiplier`
    pub critical_multiplier: f32,
}

impl DamageProfile {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            base_damage: config.bullet.base_damage,
            critical_rate: config.bullet.critical_rate,
            critical_multiplier: config.bullet.critical_multiplier,
        }
    }

    pub fn critical_damage(&self) -> f32 {
        self.base_damage * self.critical_multiplier
    }
}

/// Outcome of a single damage roll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRoll {
    pub damage: f32,
    pub is_critical: bool,
}

/// Combat system for damage resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Roll damage for one hit. One uniform draw per call; never cached.
    pub fn resolve_damage<R: Rng + ?Sized>(rng: &mut R, profile: &DamageProfile) -> DamageRoll {
        let is_critical = rng.gen::<f32>() < profile.critical_rate;
        let damage = if is_critical {
            profile.critical_damage()
        } else {
            profile.base_damage
        };

        DamageRoll {
            damage,
            is_critical,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn profile(rate: f32) -> DamageProfile {
        DamageProfile {
            base_damage: 10.0,
            critical_rate: rate,
            critical_multiplier: 5.0,
        }
    }

    #[test]
    fn damage_is_base_or_critical_only() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p = profile(0.5);
        for _ in 0..1_000 {
            let roll = CombatSystem::resolve_damage(&mut rng, &p);
            if roll.is_critical {
                assert_eq!(roll.damage, 50.0);
            } else {
                assert_eq!(roll.damage, 10.0);
            }
        }
    }

    #[test]
    fn critical_frequency_converges_to_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let p = profile(0.15);
        let trials = 20_000;
        let crits = (0..trials)
            .filter(|_| CombatSystem::resolve_damage(&mut rng, &p).is_critical)
            .count();
        let observed = crits as f32 / trials as f32;
        assert!((observed - 0.15).abs() < 0.015, "observed crit rate {observed}");
    }

    #[test]
    fn zero_and_full_rates_are_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(!CombatSystem::resolve_damage(&mut rng, &profile(0.0)).is_critical);
            assert!(CombatSystem::resolve_damage(&mut rng, &profile(1.0)).is_critical);
        }
    }

    #[test]
    fn apply_damage_floors_at_zero() {
        assert_eq!(CombatSystem::apply_damage(500.0, 10.0), (490.0, false));
        assert_eq!(CombatSystem::apply_damage(10.0, 50.0), (0.0, true));
        assert_eq!(CombatSystem::apply_damage(10.0, 10.0), (0.0, true));
    }
}
