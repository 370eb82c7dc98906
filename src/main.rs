use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hivebot::api::BeekeeperApi;
use hivebot::bot::{Bot, BotHandle, Callback};
use hivebot::config::Config;
use hivebot::model::Message;

/// Demo handler: log every message and reply into its conversation.
struct EchoCallback;

#[async_trait]
impl Callback for EchoCallback {
    async fn on_message(&self, bot: &BotHandle, message: &Message) -> Result<()> {
        info!(
            "Got message from {} at {}: {}",
            message.profile, message.created, message.text
        );
        bot.send_message(
            message.conversation_id,
            &format!("I got your message: {}", message.text),
            "regular",
        )
        .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hivebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("  Tenant: {}", config.api.subdomain);
    info!("  Poll interval: {}s", config.bot.poll_interval_secs);

    let api = Arc::new(BeekeeperApi::new(config.api.clone())?);
    api.verify().await.context("API credential check failed")?;

    let bot = Arc::new(Bot::new(
        api,
        Duration::from_secs(config.bot.poll_interval_secs),
    ));
    bot.register_callback(Arc::new(EchoCallback)).await;

    // Ctrl-C requests a stop; the in-flight poll cycle drains before exit.
    {
        let bot = bot.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                bot.stop();
            }
        });
    }

    info!("Bot is starting...");
    bot.run().await?;
    info!("Bot has shut down");

    Ok(())
}
