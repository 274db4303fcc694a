pub mod gql;
pub mod playlist;
pub mod usher;

pub use gql::{GqlClient, GQL_ENDPOINT, TWITCH_CLIENT_ID};
pub use playlist::{
    resolve_best_rendition, resolve_segments, PlaylistError, PlaylistResult, RenditionVariant,
    Segment,
};
pub use usher::USHER_ENDPOINT;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwitchError {
    #[error("video not found")]
    NotFound,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },
    #[error("failed to decode api response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("playback token missing from response")]
    MissingToken,
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for TwitchError {
    fn from(error: reqwest::Error) -> Self {
        TwitchError::Network(error.to_string())
    }
}

pub type TwitchResult<T> = Result<T, TwitchError>;

/// A VOD as reported by the platform's metadata API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "lengthSeconds")]
    pub duration: u64,
}

/// Short-lived value/signature pair authorizing manifest retrieval from the
/// CDN. Scoped to a single video, never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaybackAccessToken {
    pub value: String,
    pub signature: String,
}

/// In-memory handle for one video being resolved, carrying the token cache.
#[derive(Debug, Clone)]
pub struct VodHandle {
    pub video: Video,
    cached_token: Option<PlaybackAccessToken>,
}

impl VodHandle {
    pub fn new(video: Video) -> Self {
        Self {
            video,
            cached_token: None,
        }
    }

    pub fn cached_token(&self) -> Option<&PlaybackAccessToken> {
        self.cached_token.as_ref()
    }

    /// Returns the cached token, fetching and caching one on first use.
    pub async fn ensure_token(&mut self, client: &GqlClient) -> TwitchResult<PlaybackAccessToken> {
        if let Some(token) = &self.cached_token {
            return Ok(token.clone());
        }
        let token = client.fetch_playback_token(&self.video.id).await?;
        self.cached_token = Some(token.clone());
        Ok(token)
    }
}
