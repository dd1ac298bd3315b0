use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::assistant::Assistant;
use crate::config::{CommandPolicy, Config};
use crate::greeting::GreetingMatcher;
use crate::news::NewsFetcher;
use crate::platform::{InboundMessage, MessageSink};
use crate::reactions::ReactionTable;

const START_TEXT: &str = "Hello, human. AI welcomes you. What can I do for you?";
const HELP_TEXT: &str = "Hello, human. AI welcomes you. Having a bad day? How can I help you?";
const TEST_TEXT: &str = "Testing";
const BYE_TEXT: &str = "Goodbye. Have a nice day!";
const NEWS_APOLOGY: &str = "Sorry, can not load news at the moment";

/// Exact-text commands, matched against the whole message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/<source>` for a configured feed source
    News(String),
    Test,
    Bye,
    /// Mood word answered with a reaction
    Mood(&'static str),
}

impl Command {
    pub fn parse(text: &str, is_news_source: impl Fn(&str) -> bool) -> Option<Self> {
        match text {
            "/start" => Some(Command::Start),
            "/help" => Some(Command::Help),
            "test" => Some(Command::Test),
            "bye" => Some(Command::Bye),
            "heart" => Some(Command::Mood("❤")),
            "like" => Some(Command::Mood("👍")),
            "ghost" => Some(Command::Mood("👻")),
            _ => text
                .strip_prefix('/')
                .filter(|key| is_news_source(*key))
                .map(|key| Command::News(key.to_string())),
        }
    }
}

/// Strip a leading, case-insensitive `name` that ends on a word boundary.
fn strip_name_prefix<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }

    let mut chars = text.char_indices();
    for expected in name.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }

    let rest = match chars.next() {
        Some((idx, _)) => &text[idx..],
        None => "",
    };
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() => None,
        _ => Some(rest),
    }
}

fn trim_leading_punctuation(text: &str) -> &str {
    text.trim_start_matches(|c: char| {
        c.is_whitespace() || c.is_ascii_punctuation() || matches!(c, '—' | '–' | '…' | '«' | '»')
    })
}

/// Routes each inbound message to replies, reactions, news or the assistant.
pub struct Dispatcher {
    sink: Arc<dyn MessageSink>,
    assistant: Option<Arc<dyn Assistant>>,
    greetings: GreetingMatcher,
    news: NewsFetcher,
    reactions: ReactionTable,
    allowed_chat_ids: Vec<i64>,
    bot_name: String,
    command_policy: CommandPolicy,
}

impl Dispatcher {
    /// Build the dispatcher from configuration. Fails on an invalid reaction
    /// table so that misconfiguration stops the process at startup.
    pub fn new(
        config: &Config,
        sink: Arc<dyn MessageSink>,
        assistant: Option<Arc<dyn Assistant>>,
    ) -> Result<Self> {
        let reactions =
            ReactionTable::from_names(&config.reactions.team_members, &config.reactions.emoji)?;
        info!("Reaction table: {} team member(s)", reactions.len());

        Ok(Self {
            sink,
            assistant,
            greetings: GreetingMatcher::new(&config.greetings.phrases),
            news: NewsFetcher::new(config.news.sources.clone()),
            reactions,
            allowed_chat_ids: config.telegram.allowed_chat_ids.clone(),
            bot_name: config.telegram.bot_name.clone(),
            command_policy: config.dispatch.command_policy,
        })
    }

    /// Handle one inbound message. Never fails: errors are logged and dropped.
    pub async fn handle(&self, msg: &InboundMessage) {
        info!(
            "Incoming message: chat_id: {}, from: {}, text: {}",
            msg.chat_id,
            msg.username.as_deref().unwrap_or("-"),
            msg.text
        );

        if let Some(command) = Command::parse(&msg.text, |key| self.news.has_source(key)) {
            debug!("Matched command {:?}", command);
            self.run_command(msg, command).await;
            if self.command_policy == CommandPolicy::Exclusive {
                return;
            }
        }

        if self.greetings.contains_greeting(&msg.text) {
            let name = if msg.first_name.is_empty() {
                "человеки"
            } else {
                msg.first_name.as_str()
            };
            self.reply(msg, &format!("Привет, {name}!")).await;
        }

        if let Some(emoji) = msg
            .username
            .as_deref()
            .and_then(|username| self.reactions.resolve(username))
        {
            self.react(msg, emoji).await;
        }

        self.ask_assistant(msg).await;
    }

    async fn run_command(&self, msg: &InboundMessage, command: Command) {
        match command {
            Command::Start => self.reply(msg, START_TEXT).await,
            Command::Help => self.reply(msg, HELP_TEXT).await,
            Command::Test => self.reply(msg, TEST_TEXT).await,
            Command::Bye => self.reply(msg, BYE_TEXT).await,
            Command::Mood(emoji) => self.react(msg, emoji).await,
            Command::News(source) => self.send_news(msg, &source).await,
        }
    }

    async fn send_news(&self, msg: &InboundMessage, source: &str) {
        let items = match self.news.get_news(source).await {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to load news from '{}': {:#}", source, e);
                self.send(msg.chat_id, None, NEWS_APOLOGY).await;
                return;
            }
        };

        for item in items {
            self.send(msg.chat_id, None, &format!("{}\n{}", item.link, item.title))
                .await;
        }
    }

    /// Prompt for the assistant, if the message is meant for it.
    fn assistant_prompt<'a>(&self, msg: &'a InboundMessage) -> Option<&'a str> {
        let text = msg.text.trim_start();
        let rest = match strip_name_prefix(text, &self.bot_name) {
            Some(rest) => rest,
            None if self.allowed_chat_ids.contains(&msg.chat_id) => text,
            None => return None,
        };

        let prompt = trim_leading_punctuation(rest);
        (!prompt.trim().is_empty()).then_some(prompt)
    }

    async fn ask_assistant(&self, msg: &InboundMessage) {
        let Some(assistant) = &self.assistant else {
            return;
        };
        let Some(prompt) = self.assistant_prompt(msg) else {
            return;
        };

        let user_key = match &msg.username {
            Some(username) => username.clone(),
            None => format!("chat:{}", msg.chat_id),
        };

        match assistant.post(&user_key, prompt).await {
            Ok(answer) if answer.trim().is_empty() => {
                warn!("Assistant returned an empty answer for {}", user_key);
            }
            Ok(answer) => self.reply(msg, &answer).await,
            Err(e) => error!("Assistant request for {} failed: {:#}", user_key, e),
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        self.send(msg.chat_id, Some(msg.message_id), text).await;
    }

    async fn send(&self, chat_id: i64, reply_to: Option<i32>, text: &str) {
        if let Err(e) = self.sink.send_text(chat_id, reply_to, text).await {
            warn!("Send failed: {:#}", e);
        }
    }

    async fn react(&self, msg: &InboundMessage, emoji: &str) {
        if let Err(e) = self
            .sink
            .send_reaction(msg.chat_id, msg.message_id, emoji)
            .await
        {
            warn!("Reaction failed: {:#}", e);
        }
    }
}
