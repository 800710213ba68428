use crate::{osa, PlayerController};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scrobble_relay_core::{PlaybackSample, Source, TransportState};
use serde::Deserialize;
use tracing::debug;

const AUDIRVANA_BUNDLE_ID: &str = "com.audirvana.Audirvana";

// Audirvana exposes the playing file URL, which the engine needs to tell
// apart identically-titled tracks coming from cue sheets.
const NOW_PLAYING_SCRIPT: &str = r#"
on repl(t, s, r)
	set AppleScript's text item delimiters to s
	set parts to every text item of t
	set AppleScript's text item delimiters to r
	set t to parts as string
	set AppleScript's text item delimiters to ""
	return t
end repl
on str(v)
	try
		if v is missing value then return ""
		set t to v as string
		set t to my repl(t, "\\", "\\\\")
		set t to my repl(t, "\"", "\\\"")
		return t
	on error
		return ""
	end try
end str
tell application id "com.audirvana.Audirvana"
	if player state is not playing then return "{}"
	set json to "{"
	set json to json & "\"title\":\"" & my str(playing track title) & "\","
	set json to json & "\"album\":\"" & my str(playing track album) & "\","
	set json to json & "\"artist\":\"" & my str(playing track artist) & "\","
	set json to json & "\"duration\":\"" & my str(playing track duration) & "\","
	set json to json & "\"position\":\"" & my str(player position) & "\","
	set json to json & "\"url\":\"" & my str(playing track url) & "\""
	set json to json & "}"
	return json
end tell
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTrack {
    title: String,
    album: String,
    artist: String,
    duration: String,
    position: String,
    url: String,
}

#[derive(Default)]
pub struct AudirvanaPlayer;

impl AudirvanaPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlayerController for AudirvanaPlayer {
    fn source(&self) -> Source {
        Source::Audirvana
    }

    async fn is_running(&self) -> bool {
        match osa::run(r#"tell application "System Events" to (exists process "Audirvana")"#).await
        {
            Ok(out) => osa::parse_bool(&out),
            Err(err) => {
                debug!(error = %err, "audirvana running check failed");
                false
            }
        }
    }

    async fn transport_state(&self) -> Result<TransportState> {
        let out =
            osa::run(r#"tell application id "com.audirvana.Audirvana" to player state as string"#)
                .await?;
        Ok(match out.as_str() {
            "playing" => TransportState::Playing,
            "paused" => TransportState::Paused,
            "stopped" => TransportState::Stopped,
            _ => TransportState::Unknown,
        })
    }

    async fn now_playing(&self) -> Result<Option<PlaybackSample>> {
        let out = osa::run(NOW_PLAYING_SCRIPT).await?;
        let raw: RawTrack =
            serde_json::from_str(&out).context("invalid JSON from Audirvana now-playing script")?;
        if raw.title.is_empty() && raw.artist.is_empty() {
            return Ok(None);
        }

        Ok(Some(PlaybackSample {
            title: raw.title,
            album: raw.album,
            album_artist: raw.artist.clone(),
            artist: raw.artist,
            track_number: 0,
            duration_seconds: raw.duration.parse::<f64>().unwrap_or(0.0) as i64,
            position_seconds: raw.position.parse().unwrap_or(0.0),
            genre: String::new(),
            composer: String::new(),
            release_date: String::new(),
            external_track_id: String::new(),
            bundle_id: AUDIRVANA_BUNDLE_ID.to_string(),
            unique_id: raw.url.clone(),
            url: raw.url,
        }))
    }
}
