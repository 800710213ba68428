mod client;

pub use client::HttpScrobbleClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrobbleError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("scrobble service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("scrobble service unreachable: {0}")]
    Unreachable(String),

    #[error("invalid scrobble service response: {0}")]
    Parse(String),
}

/// A completed listen, reported once the played fraction crossed the
/// threshold. `timestamp` is the Unix time the track started.
#[derive(Debug, Clone, Serialize)]
pub struct ScrobbleSubmission {
    pub artist: String,
    pub album_artist: String,
    pub track: String,
    pub album: String,
    pub duration: i64,
    pub timestamp: i64,
    pub track_number: i64,
    pub external_track_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NowPlayingUpdate {
    pub artist: String,
    pub album_artist: String,
    pub track: String,
    pub album: String,
    pub duration: i64,
}

/// Black-box remote tracking service. The engine only depends on this shape;
/// transport and signing live behind it.
#[async_trait]
pub trait ScrobbleService: Send + Sync {
    async fn submit_completion(&self, submission: &ScrobbleSubmission)
        -> Result<(), ScrobbleError>;

    async fn update_now_playing(&self, update: &NowPlayingUpdate) -> Result<(), ScrobbleError>;

    async fn query_favorite(&self, artist: &str, track: &str) -> Result<bool, ScrobbleError>;

    async fn set_favorite(
        &self,
        artist: &str,
        track: &str,
        loved: bool,
    ) -> Result<(), ScrobbleError>;
}
