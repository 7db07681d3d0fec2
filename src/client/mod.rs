//! Player-side reconciliation and the headless bot client

pub mod battle_log;
pub mod runner;
pub mod session;

pub use battle_log::{BattleLog, DamageStats, LogEntry, PlayerTally, BATTLE_LOG_CAPACITY};
pub use runner::run_bot;
pub use session::{ClientSession, FrameOutput, SessionNotice};
