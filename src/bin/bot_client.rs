//! Headless bot player for exercising a running relay

use tracing::info;

use boss_battle_relay::client::run_bot;
use boss_battle_relay::config::BotConfig;
use boss_battle_relay::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_tracing(&config.log_level);

    info!(
        player = %config.player_name,
        url = %config.relay_url,
        seed = config.seed,
        "Starting bot client"
    );

    run_bot(config).await
}
