use crate::{osa, PlayerController};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scrobble_relay_core::{PlaybackSample, Source, TransportState};
use serde::Deserialize;
use tracing::debug;

const MUSIC_BUNDLE_ID: &str = "com.apple.Music";

// The script stringifies every value so one malformed field cannot break the
// whole payload; numbers are re-parsed on the Rust side.
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
tell application "Music"
	if player state is not playing then return "{}"
	if not (exists current track) then return "{}"
	set t to current track
	set json to "{"
	set json to json & "\"name\":\"" & my str(name of t) & "\","
	set json to json & "\"album\":\"" & my str(album of t) & "\","
	set json to json & "\"artist\":\"" & my str(artist of t) & "\","
	set json to json & "\"albumArtist\":\"" & my str(album artist of t) & "\","
	set json to json & "\"trackNumber\":\"" & my str(track number of t) & "\","
	set json to json & "\"duration\":\"" & my str(duration of t) & "\","
	set json to json & "\"playerPosition\":\"" & my str(player position) & "\","
	set json to json & "\"genre\":\"" & my str(genre of t) & "\","
	set json to json & "\"composer\":\"" & my str(composer of t) & "\","
	set json to json & "\"releaseDate\":\"" & my str(release date of t) & "\","
	set json to json & "\"databaseID\":\"" & my str(database ID of t) & "\","
	set json to json & "\"favorited\":\"" & my str(favorited of t) & "\""
	set json to json & "}"
	return json
end tell
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTrack {
    name: String,
    album: String,
    artist: String,
    #[serde(rename = "albumArtist")]
    album_artist: String,
    #[serde(rename = "trackNumber")]
    track_number: String,
    duration: String,
    #[serde(rename = "playerPosition")]
    player_position: String,
    genre: String,
    composer: String,
    #[serde(rename = "releaseDate")]
    release_date: String,
    #[serde(rename = "databaseID")]
    database_id: String,
    favorited: String,
}

#[derive(Default)]
pub struct AppleMusicPlayer;

impl AppleMusicPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlayerController for AppleMusicPlayer {
    fn source(&self) -> Source {
        Source::AppleMusic
    }

    fn supports_favorites(&self) -> bool {
        true
    }

    async fn is_running(&self) -> bool {
        match osa::run(r#"tell application "System Events" to (exists process "Music")"#).await {
            Ok(out) => osa::parse_bool(&out),
            Err(err) => {
                debug!(error = %err, "apple music running check failed");
                false
            }
        }
    }

    async fn transport_state(&self) -> Result<TransportState> {
        let out = osa::run(r#"tell application "Music" to player state as string"#).await?;
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
            serde_json::from_str(&out).context("invalid JSON from Music now-playing script")?;
        if raw.name.is_empty() && raw.artist.is_empty() {
            return Ok(None);
        }

        Ok(Some(PlaybackSample {
            title: raw.name,
            album: raw.album,
            album_artist: raw.album_artist,
            artist: raw.artist,
            track_number: raw.track_number.parse().unwrap_or(0),
            duration_seconds: raw.duration.parse::<f64>().unwrap_or(0.0) as i64,
            position_seconds: raw.player_position.parse().unwrap_or(0.0),
            genre: raw.genre,
            composer: raw.composer,
            release_date: raw.release_date,
            external_track_id: String::new(),
            bundle_id: MUSIC_BUNDLE_ID.to_string(),
            unique_id: raw.database_id,
            url: String::new(),
        }))
    }

    async fn is_current_favorite(&self) -> bool {
        let script = r#"
tell application "Music"
	try
		return favorited of current track
	on error
		return false
	end try
end tell
"#;
        match osa::run(script).await {
            Ok(out) => osa::parse_bool(&out),
            Err(err) => {
                debug!(error = %err, "apple music favorite check failed");
                false
            }
        }
    }

    async fn set_current_favorite(&self, favorite: bool) -> Result<()> {
        let script = format!(
            r#"tell application "Music" to set favorited of current track to {favorite}"#
        );
        osa::run(&script).await.map(|_| ())
    }
}
