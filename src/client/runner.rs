//! Headless bot: joins a relay, fires on a timer and keeps a local simulation

use std::time::Duration;

use anyhow::{bail, Context};
use futures::{SinkExt, StreamExt};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::util::time::frame_duration;
use crate::ws::protocol::{decode, encode, ClientMsg, PlayerRef, ServerMsg};

use super::session::{ClientSession, SessionNotice};

const PING_INTERVAL: Duration = Duration::from_secs(20);
const BOSS_STATE_INTERVAL: Duration = Duration::from_secs(1);

const BOT_LINES: &[&str] = &["hello", "pew pew", "take that", "gg", "one more", "focus fire"];

/// Run the bot until the relay closes the connection
pub async fn run_bot(config: BotConfig) -> anyhow::Result<()> {
    let (socket, _) = connect_async(config.relay_url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", config.relay_url))?;
    info!(url = %config.relay_url, player = %config.player_name, "Connected to relay");

    let (mut sink, mut stream) = socket.split();
    let player = PlayerRef::new(config.player_name.clone(), config.avatar_url.clone());
    let mut session = ClientSession::new(player, config.simulation.clone(), config.seed);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    send(&mut sink, &session.hello()).await?;

    let mut frame = interval(frame_duration());
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut fire = interval(config.fire_interval);
    let mut ping = interval(PING_INTERVAL);
    let mut boss_state = interval(BOSS_STATE_INTERVAL);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                let output = session.tick();
                for msg in &output.outgoing {
                    send(&mut sink, msg).await?;
                }
            }
            _ = fire.tick() => {
                if session.confirmed_name().is_none() {
                    continue;
                }
                if session.simulator().is_game_over() {
                    let reset = session.reset_game();
                    info!(player = %session.player().name, "Starting a new round");
                    send(&mut sink, &reset).await?;
                    continue;
                }
                let line = BOT_LINES.choose(&mut rng).copied().unwrap_or("pew");
                if let Some(msg) = session.fire(line) {
                    send(&mut sink, &msg).await?;
                }
            }
            _ = ping.tick() => {
                send(&mut sink, &session.ping()).await?;
            }
            _ = boss_state.tick() => {
                if session.confirmed_name().is_some() {
                    send(&mut sink, &session.boss_state()).await?;
                }
            }
            incoming = stream.next() => {
                let Some(received) = incoming else {
                    info!("Relay closed the stream");
                    break;
                };
                match received.context("websocket read failed")? {
                    Message::Text(text) => on_text(&mut session, &text)?,
                    Message::Close(_) => {
                        info!("Relay closed the connection");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(
        frames = session.simulator().tick_count(),
        game_over = session.simulator().is_game_over(),
        "Bot session finished"
    );

    let mut ranking = session.stats().ranking();
    ranking.truncate(5);
    for (name, tally) in ranking {
        info!(
            player = %name,
            total_damage = tally.total_damage,
            hits = tally.hit_count,
            crits = tally.critical_count,
            "Damage ranking"
        );
    }

    Ok(())
}

fn on_text(session: &mut ClientSession, text: &str) -> anyhow::Result<()> {
    let msg = match decode::<ServerMsg>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable relay message");
            return Ok(());
        }
    };

    match session.apply(msg) {
        SessionNotice::NameRejected(message) => bail!("username rejected: {message}"),
        SessionNotice::NameConfirmed(name) => info!(player = %name, "Username confirmed"),
        SessionNotice::PlayerJoined { player_name, .. } => {
            info!(player = %player_name, "Player joined")
        }
        SessionNotice::GameReset => info!("Game reset by another player"),
        notice => debug!(?notice, "Applied relay message"),
    }
    Ok(())
}

async fn send<S>(sink: &mut S, msg: &ClientMsg) -> anyhow::Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = encode(msg)?;
    sink.send(Message::Text(text))
        .await
        .context("websocket write failed")?;
    Ok(())
}
