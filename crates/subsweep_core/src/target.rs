use serde::{Deserialize, Serialize};
use url::Url;

/// Values of the `unsubscribe` column that select a row for the unsubscribe job.
pub const UNSUBSCRIBE_TOKENS: [&str; 4] = ["yes", "y", "1", "true"];

/// One channel to act on. The URL is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_collected: Option<String>,
}

impl ChannelTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            subscriber_count: None,
            description: None,
            date_collected: None,
        }
    }
}

/// One row of the subscriptions table, in export column order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_name: String,
    pub channel_url: String,
    pub subscriber_count: String,
    pub description: String,
    pub unsubscribe: String,
    pub date_collected: String,
}

impl ChannelRecord {
    /// True when the `unsubscribe` column holds one of [`UNSUBSCRIBE_TOKENS`].
    pub fn wants_unsubscribe(&self) -> bool {
        is_unsubscribe_token(&self.unsubscribe)
    }

    pub fn to_target(&self) -> ChannelTarget {
        ChannelTarget {
            name: self.channel_name.clone(),
            url: self.channel_url.clone(),
            subscriber_count: non_empty(&self.subscriber_count),
            description: non_empty(&self.description),
            date_collected: non_empty(&self.date_collected),
        }
    }
}

pub fn is_unsubscribe_token(value: &str) -> bool {
    let value = value.trim();
    UNSUBSCRIBE_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(value))
}

/// Normalizes a channel URL for identity comparison: trimmed, fragment dropped
/// and trailing slashes removed. Scheme and host are lowercased by the parser;
/// the path keeps its case since channel IDs are case-sensitive.
pub fn normalize_channel_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut normalized = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    };
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
