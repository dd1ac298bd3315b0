use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ReactionType, ReplyParameters};
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::platform::{InboundMessage, MessageSink};

/// Telegram rejects texts over 4096 chars; leave headroom.
const MAX_MESSAGE_LEN: usize = 4000;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Outbound Telegram calls through teloxide.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send_text(&self, chat_id: i64, reply_to: Option<i32>, text: &str) -> Result<()> {
        // Only the first chunk is threaded to the original message
        let mut reply_to = reply_to;
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let mut request = self.bot.send_message(ChatId(chat_id), chunk);
            if let Some(message_id) = reply_to.take() {
                request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
            }
            request
                .await
                .with_context(|| format!("Failed to send message to chat {chat_id}"))?;
        }

        info!("Outgoing message: chat_id: {}, text: {}", chat_id, text);
        Ok(())
    }

    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) -> Result<()> {
        let reaction = ReactionType::Emoji {
            emoji: emoji.to_string(),
        };
        self.bot
            .set_message_reaction(ChatId(chat_id), MessageId(message_id))
            .reaction(vec![reaction])
            .await
            .with_context(|| {
                format!("Failed to add reaction to msg {message_id} in chat {chat_id}")
            })?;

        info!(
            "Outgoing reaction: chat_id: {}, message_id: {}, emoji: {}",
            chat_id, message_id, emoji
        );
        Ok(())
    }
}

/// Convert a teloxide message into the platform-agnostic form.
/// Non-text messages are skipped.
pub fn inbound_from(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?.to_string();
    let (username, first_name) = match msg.from.as_ref() {
        Some(user) => (user.username.clone(), user.first_name.clone()),
        None => (None, String::new()),
    };

    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        username,
        first_name,
        text,
    })
}

/// Verify the bot token; an invalid token is fatal at startup.
pub async fn authorize(bot: &Bot) -> Result<()> {
    let me = bot
        .get_me()
        .await
        .context("Failed to authorize with the Telegram bot token")?;
    info!("Authorized on account {}", me.username());
    Ok(())
}

/// Long-poll Telegram and feed every text message to the dispatcher, one at a time.
pub async fn run(bot: Bot, dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    teloxide::dispatching::Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        // A single key for every update: strictly sequential handling
        .distribution_function(|_| Some(()))
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, dispatcher: Arc<Dispatcher>) -> ResponseResult<()> {
    if let Some(inbound) = inbound_from(&msg) {
        dispatcher.handle(&inbound).await;
    }
    Ok(())
}
