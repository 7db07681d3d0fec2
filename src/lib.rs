//! Boss Battle Relay - cooperative boss fight over a non-authoritative relay
//!
//! The relay registers unique player names, fans out combat events and keeps
//! a lower-only boss HP snapshot for late joiners. Each client runs its own
//! combat simulation and reconciles it with events from other players.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod relay;
pub mod util;
pub mod ws;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
