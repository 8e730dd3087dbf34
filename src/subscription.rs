//! Subscription data model.
//!
//! A [`SubscriptionRecord`] is what we remember about one playlist between
//! polls. Persisted field names (`itemCount`, `readItemCount`) match the
//! layout the browser extension wrote, so an exported blob imports as-is.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Web page for a playlist, used by the popup to open it.
pub const PLAYLIST_PAGE_URL: &str = "https://www.youtube.com/playlist?list=";

/// One subscribed playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Playlist ID. Also the store key, so it is not serialized.
    #[serde(skip)]
    pub id: String,
    pub title: String,
    /// Last-observed number of items in the playlist
    #[serde(rename = "itemCount")]
    pub total_count: u64,
    /// Item count at the time the user last looked at the playlist
    #[serde(rename = "readItemCount")]
    pub read_count: u64,
}

impl SubscriptionRecord {
    /// A fresh subscription starts with nothing unread.
    pub fn seeded(id: impl Into<String>, title: impl Into<String>, total_count: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            total_count,
            read_count: total_count,
        }
    }

    pub fn unread(&self) -> u64 {
        self.total_count.saturating_sub(self.read_count)
    }

    pub fn url(&self) -> String {
        format!("{}{}", PLAYLIST_PAGE_URL, self.id)
    }
}

/// The single "most recent error" slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(rename = "displayableMessage")]
    pub displayable_message: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, displayable_message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            displayable_message: displayable_message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Row shown in the popup list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub title: String,
    pub total_count: u64,
    pub read_count: u64,
    pub unread: u64,
    pub url: String,
}

impl From<&SubscriptionRecord> for SubscriptionSummary {
    fn from(record: &SubscriptionRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            total_count: record.total_count,
            read_count: record.read_count,
            unread: record.unread(),
            url: record.url(),
        }
    }
}

/// Total unread items across all subscriptions (the badge number).
pub fn aggregate_unread<'a>(records: impl IntoIterator<Item = &'a SubscriptionRecord>) -> u64 {
    records.into_iter().map(SubscriptionRecord::unread).sum()
}

/// Summaries sorted by title, then ID.
pub fn summarize(records: &BTreeMap<String, SubscriptionRecord>) -> Vec<SubscriptionSummary> {
    let mut rows: Vec<SubscriptionSummary> = records.values().map(SubscriptionSummary::from).collect();
    rows.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    rows
}

/// Extract a playlist ID from user input.
///
/// Accepts a bare ID or any YouTube URL carrying a `list=` parameter
/// (playlist pages and watch pages inside a playlist). Returns `None` for
/// blank input or a URL without a playlist.
pub fn parse_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains("://") {
        let url = Url::parse(input).ok()?;
        return url
            .query_pairs()
            .find(|(key, _)| key == "list")
            .map(|(_, value)| value.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    if input.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Some(input.to_string())
    } else {
        None
    }
}
