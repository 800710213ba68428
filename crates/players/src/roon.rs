use crate::PlayerController;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scrobble_relay_core::{PlaybackSample, Source, TransportState};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

const ROON_BUNDLE_ID: &str = "com.roon.Roon";

/// Payload of `media-control get`, the system now-playing bridge Roon is
/// visible through (it has no scripting interface of its own).
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MediaControlNowPlaying {
    title: String,
    album: String,
    artist: String,
    duration: f64,
    elapsed_time_now: f64,
    playing: bool,
    bundle_identifier: String,
    content_item_identifier: String,
}

async fn media_control_get() -> Result<MediaControlNowPlaying> {
    let output = Command::new("media-control")
        .arg("get")
        .output()
        .await
        .context("failed to spawn media-control")?;

    if !output.status.success() {
        return Err(anyhow!(
            "media-control failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    serde_json::from_slice(&output.stdout).context("invalid JSON from media-control")
}

#[derive(Default)]
pub struct RoonPlayer;

impl RoonPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlayerController for RoonPlayer {
    fn source(&self) -> Source {
        Source::Roon
    }

    async fn is_running(&self) -> bool {
        match media_control_get().await {
            Ok(playing) => playing.bundle_identifier == ROON_BUNDLE_ID,
            Err(err) => {
                debug!(error = %err, "roon running check failed");
                false
            }
        }
    }

    async fn transport_state(&self) -> Result<TransportState> {
        let playing = media_control_get().await?;
        if playing.bundle_identifier != ROON_BUNDLE_ID {
            return Ok(TransportState::Stopped);
        }
        Ok(if playing.playing {
            TransportState::Playing
        } else {
            TransportState::Stopped
        })
    }

    async fn now_playing(&self) -> Result<Option<PlaybackSample>> {
        let playing = media_control_get().await?;
        if playing.bundle_identifier != ROON_BUNDLE_ID || playing.title.is_empty() {
            return Ok(None);
        }

        // Roon reports joined artist credits; keep the primary one.
        let artist = playing
            .artist
            .split(',')
            .next()
            .unwrap_or(&playing.artist)
            .trim()
            .to_string();

        Ok(Some(PlaybackSample {
            title: playing.title,
            album: playing.album,
            album_artist: artist.clone(),
            artist,
            track_number: 0,
            duration_seconds: playing.duration as i64,
            position_seconds: playing.elapsed_time_now,
            genre: String::new(),
            composer: String::new(),
            release_date: String::new(),
            external_track_id: String::new(),
            bundle_id: playing.bundle_identifier,
            unique_id: playing.content_item_identifier,
            url: String::new(),
        }))
    }
}
