use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// One entry of a syndication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub link: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    guid: Text,
    #[serde(default)]
    title: Text,
}

// Element text, tolerating attributes such as `isPermaLink`
#[derive(Debug, Deserialize, Default)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse an RSS document into feed items, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    let rss: Rss = quick_xml::de::from_str(xml).context("Failed to parse RSS document")?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| FeedItem {
            link: item.guid.value.trim().to_string(),
            title: item.title.value.trim().to_string(),
        })
        .collect())
}

/// Fetches named RSS feeds over HTTP.
pub struct NewsFetcher {
    client: reqwest::Client,
    sources: BTreeMap<String, String>,
}

impl NewsFetcher {
    pub fn new(sources: BTreeMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            sources,
        }
    }

    pub fn has_source(&self, key: &str) -> bool {
        self.sources.contains_key(key)
    }

    /// Fetch and parse the feed registered under `source`. All-or-nothing:
    /// any transport, status or parse failure yields an error and no items.
    pub async fn get_news(&self, source: &str) -> Result<Vec<FeedItem>> {
        let url = self
            .sources
            .get(source)
            .with_context(|| format!("Unknown news source: {source}"))?;

        debug!("Fetching feed '{}' from {}", source, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch feed from {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Feed request to {} failed with status {}", url, status);
        }

        let body = response
            .text()
            .await
            .context("Failed to read feed response body")?;

        let items = parse_feed(&body)?;
        debug!("Feed '{}' returned {} item(s)", source, items.len());
        Ok(items)
    }
}
