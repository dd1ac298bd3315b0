use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_HTTP_API_TOKEN";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ALLOWED_CHAT_IDS: &str = "ALLOWED_CHAT_IDS";
pub const ENV_TEAM_MEMBERS: &str = "TEAM_MEMBERS";
pub const ENV_BOT_NAME: &str = "BOT_NAME";

/// What happens to the remaining rules once an exact command has matched.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandPolicy {
    /// A matched command ends handling of the message.
    #[default]
    Exclusive,
    /// Greeting, reaction and assistant checks still run after a command.
    Inclusive,
}

impl std::fmt::Display for CommandPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandPolicy::Exclusive => write!(f, "exclusive"),
            CommandPolicy::Inclusive => write!(f, "inclusive"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_llm_config")]
    pub llm: LlmConfig,
    #[serde(default = "default_news_config")]
    pub news: NewsConfig,
    #[serde(default = "default_greetings_config")]
    pub greetings: GreetingsConfig,
    #[serde(default = "default_reactions_config")]
    pub reactions: ReactionsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chats where every message is forwarded to the assistant
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    /// Name the bot answers to when a message starts with it (e.g. "Mike")
    #[serde(default)]
    pub bot_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    /// Feed source key -> RSS URL
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GreetingsConfig {
    #[serde(default = "default_greeting_phrases")]
    pub phrases: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReactionsConfig {
    /// Candidate emoji, assigned by position to `team_members`
    #[serde(default = "default_reaction_emoji")]
    pub emoji: Vec<String>,
    /// Comma-separated Telegram usernames
    #[serde(default)]
    pub team_members: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    #[serde(default)]
    pub command_policy: CommandPolicy,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_system_prompt() -> String {
    "You are a friendly assistant living in a team chat. \
     Answer briefly and in the language of the question."
        .to_string()
}

fn default_sources() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "habr".to_string(),
        "https://habrahabr.ru/rss/best/".to_string(),
    )])
}

fn default_greeting_phrases() -> Vec<String> {
    [
        "доброе утро",
        "доброе день",
        "доброе вечер",
        "утро доброе",
        "привет",
        "good morning",
        "hello",
        "hi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// Every entry must be one of the reactions Telegram accepts.
fn default_reaction_emoji() -> Vec<String> {
    ["🔥", "🦄", "🐳", "🍓", "👾", "🤓", "🍌", "🎉", "😎", "🏆"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_llm_config() -> LlmConfig {
    LlmConfig {
        model: default_model(),
        base_url: default_base_url(),
        api_key: String::new(),
        max_tokens: default_max_tokens(),
        system_prompt: default_system_prompt(),
    }
}

fn default_news_config() -> NewsConfig {
    NewsConfig {
        sources: default_sources(),
    }
}

fn default_greetings_config() -> GreetingsConfig {
    GreetingsConfig {
        phrases: default_greeting_phrases(),
    }
}

fn default_reactions_config() -> ReactionsConfig {
    ReactionsConfig {
        emoji: default_reaction_emoji(),
        team_members: String::new(),
    }
}

/// Parse a comma-separated list of chat IDs, ignoring blank entries.
pub fn parse_chat_ids(csv: &str) -> Result<Vec<i64>> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid chat id: {s:?}"))
        })
        .collect()
}

impl Config {
    /// Whether an API key is configured for the assistant.
    pub fn assistant_enabled(&self) -> bool {
        !self.llm.api_key.is_empty()
    }

    /// Load the optional TOML file at `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = if path.exists() {
            info!("Loading configuration from: {}", path.display());
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            info!(
                "No config file at {}, using defaults and environment",
                path.display()
            );
            None
        };

        Self::from_parts(content.as_deref(), env)
    }

    /// Build a config from optional TOML text and an environment lookup.
    pub fn from_parts<F>(toml_text: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config =
            toml::from_str(toml_text.unwrap_or("")).context("Failed to parse config file")?;

        if let Some(token) = env(ENV_BOT_TOKEN) {
            config.telegram.bot_token = token;
        }
        if let Some(key) = env(ENV_API_KEY) {
            config.llm.api_key = key;
        }
        if let Some(ids) = env(ENV_ALLOWED_CHAT_IDS) {
            config.telegram.allowed_chat_ids = parse_chat_ids(&ids)
                .with_context(|| format!("Failed to parse {ENV_ALLOWED_CHAT_IDS}"))?;
        }
        if let Some(names) = env(ENV_TEAM_MEMBERS) {
            config.reactions.team_members = names;
        }
        if let Some(name) = env(ENV_BOT_NAME) {
            config.telegram.bot_name = name.trim().to_string();
        }

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is not set (env {ENV_BOT_TOKEN})");
        }

        Ok(config)
    }
}
