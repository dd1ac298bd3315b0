mod assistant;
mod config;
mod dispatch;
mod greeting;
mod llm;
mod news;
mod platform;
mod reactions;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::assistant::{Assistant, AssistantClient};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::platform::telegram::{self, TelegramSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,teambot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("TEAMBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Allowed chats: {:?}", config.telegram.allowed_chat_ids);
    info!("  News sources: {:?}", config.news.sources.keys());
    info!("  Command policy: {}", config.dispatch.command_policy);

    let assistant: Option<Arc<dyn Assistant>> = if config.assistant_enabled() {
        info!("  Assistant model: {}", config.llm.model);
        Some(Arc::new(AssistantClient::new(config.llm.clone())))
    } else {
        info!("  Assistant disabled (no API key)");
        None
    };

    let bot = Bot::new(&config.telegram.bot_token);
    telegram::authorize(&bot).await?;

    let sink = Arc::new(TelegramSink::new(bot.clone()));
    let dispatcher = Arc::new(Dispatcher::new(&config, sink, assistant)?);

    info!("Bot is starting...");
    telegram::run(bot, dispatcher).await?;

    Ok(())
}
