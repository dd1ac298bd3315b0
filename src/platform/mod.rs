pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A text message received from the chat platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    /// Sender's username, without the leading '@'
    pub username: Option<String>,
    /// Sender's display (first) name
    pub first_name: String,
    pub text: String,
}

/// Outbound primitives of the chat platform.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `text` to `chat_id`, optionally as a reply to `reply_to`.
    async fn send_text(&self, chat_id: i64, reply_to: Option<i32>, text: &str) -> Result<()>;

    /// Attach `emoji` as a reaction to an existing message.
    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) -> Result<()>;
}
