//! Process entry point: configuration, logging, and the session loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rand::Rng;

use hallway_sdk::gateway::{self, GatewayConfig};
use hallway_sdk::rest::RestPlatform;

use hallway_bot::bot::{Bot, Flow};
use hallway_bot::config::BotConfig;

#[derive(Parser)]
#[command(name = "hallway-bot", about = "Temporary voice channel bot")]
struct Args {
    /// Path to the bot configuration file.
    #[arg(long, default_value = "hallway.toml")]
    config: PathBuf,

    /// Platform credential (or set HALLWAY_TOKEN).
    #[arg(long, env = "HALLWAY_TOKEN", hide_env_values = true)]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs when HALLWAY_LOG_JSON=1, human-readable otherwise.
    let json_logs = std::env::var("HALLWAY_LOG_JSON").unwrap_or_default() == "1";
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hallway_bot=info,hallway_sdk=info".into());
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();
    let config = BotConfig::load(&args.config)?;

    let platform = Arc::new(RestPlatform::new(&config.api_base, &args.token)?);
    let gateway_url = config.gateway_url.clone();
    let bot = Bot::new(platform, config);

    tracing::info!(gateway = %gateway_url, "Starting hallway-bot");

    // Consumer-driven reconnect with exponential backoff, 2→4→8→16→30s cap.
    let mut backoff = Duration::from_secs(2);
    loop {
        match gateway::connect(GatewayConfig {
            url: gateway_url.clone(),
            token: args.token.clone(),
            intents: gateway::intents::GUILD_VOICE_STATES | gateway::intents::GUILD_MESSAGES,
        })
        .await
        {
            Ok((handle, mut events)) => {
                backoff = Duration::from_secs(2);
                while let Some(event) = events.recv().await {
                    if bot.handle_event(event).await == Flow::Restart {
                        handle.close().await;
                        tracing::info!("Shutting down for supervisor restart");
                        return Ok(());
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Gateway connection failed"),
        }

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
        tokio::time::sleep(backoff + jitter).await;
        backoff = (backoff * 2).min(Duration::from_secs(30));
    }
}
