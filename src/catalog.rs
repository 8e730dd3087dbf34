//! YouTube Data API client for playlist metadata.
//!
//! Only `playlists.list` is used: one GET per call with every requested ID
//! comma-joined, projected down to id, title and item count.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

const PLAYLISTS_RESOURCE: &str = "playlists";
const PLAYLIST_PART: &str = "id,contentDetails,snippet";
const PLAYLIST_FIELDS: &str = "items(id,contentDetails/itemCount,snippet/title)";

/// What the API tells us about one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub title: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    /// No response at all (DNS, connect, TLS, body read).
    #[error("request failed: {0}")]
    Transport(String),
    /// The API answered with a status outside 200..400.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("could not decode API response: {0}")]
    Decode(String),
}

/// Source of playlist metadata. The engine only talks to this trait.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch metadata for every ID in one request. IDs the API does not
    /// know are simply absent from the returned map.
    async fn fetch_collections(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CollectionInfo>, CatalogError>;
}

// API Response models
#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    id: String,
    snippet: Snippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
}

// A playlist without a count is undecodable, not empty: reading it as 0
// would collapse the stored read position.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    item_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build `<base><resource>?k=v&k=v` with every value percent-encoded.
pub fn build_request_url(base_url: &str, resource: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        format!("{}{}", base_url, resource)
    } else {
        format!("{}{}?{}", base_url, resource, query)
    }
}

/// Parse a successful `playlists.list` body into an ID-keyed map.
pub(crate) fn parse_playlists(body: &str) -> Result<HashMap<String, CollectionInfo>, CatalogError> {
    let response: PlaylistListResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Decode(e.to_string()))?;

    Ok(response
        .items
        .into_iter()
        .map(|item| {
            (
                item.id,
                CollectionInfo {
                    title: item.snippet.title,
                    item_count: item.content_details.item_count,
                },
            )
        })
        .collect())
}

/// Pull `error.message` out of a Google API error body, if it has one.
fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
}

/// Live client backed by reqwest and a static API key.
pub struct YouTubeCatalog {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl YouTubeCatalog {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("playlist-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            http_client,
        })
    }

    fn playlists_url(&self, ids: &[String]) -> String {
        let joined = ids.join(",");
        build_request_url(
            &self.base_url,
            PLAYLISTS_RESOURCE,
            &[
                ("part", PLAYLIST_PART),
                ("fields", PLAYLIST_FIELDS),
                ("id", &joined),
                ("key", &self.api_key),
            ],
        )
    }
}

#[async_trait]
impl CatalogClient for YouTubeCatalog {
    async fn fetch_collections(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CollectionInfo>, CatalogError> {
        tracing::debug!("Fetching {} playlist(s) from the catalog", ids.len());

        let response = self
            .http_client
            .get(self.playlists_url(ids))
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.without_url().to_string()))?;

        if status.is_success() || status.is_redirection() {
            parse_playlists(&body)
        } else {
            Err(CatalogError::Api {
                status: status.as_u16(),
                message: api_error_message(&body).unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}
