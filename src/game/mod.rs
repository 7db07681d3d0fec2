//! Game simulation modules

pub mod combat;
pub mod config;
pub mod physics;
pub mod simulator;
pub mod snapshot;

pub use combat::{CombatSystem, DamageProfile, DamageRoll};
pub use config::{MoveRange, SimulationConfig};
pub use physics::{PhysicsSystem, Rect};
pub use simulator::{
    estimate_label_width, Boss, Bullet, CombatEvent, CombatSimulator, DamageDealt, GamePhase,
    RemovalReason,
};
pub use snapshot::GameStateData;
