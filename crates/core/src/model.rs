use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    AppleMusic,
    Audirvana,
    Roon,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::AppleMusic => "apple_music",
            Source::Audirvana => "audirvana",
            Source::Roon => "roon",
        }
    }

    pub fn from_name(name: &str) -> Option<Source> {
        match name {
            "apple_music" => Some(Source::AppleMusic),
            "audirvana" => Some(Source::Audirvana),
            "roon" => Some(Source::Roon),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Unknown,
}

/// One normalized snapshot of what a player reports as currently playing.
/// Produced fresh on every poll; lookups key off (artist, album, title).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSample {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    pub track_number: i64,
    pub duration_seconds: i64,
    pub position_seconds: f64,
    pub genre: String,
    pub composer: String,
    pub release_date: String,
    pub external_track_id: String,
    pub bundle_id: String,
    pub unique_id: String,
    pub url: String,
}

/// Key used for scrobble bookkeeping within one playing streak. Samples that
/// carry a URL get it prefixed so identical titles from different disc/cue
/// sources stay distinct.
pub fn track_key(sample: &PlaybackSample) -> String {
    let base = format!(
        "{}\u{1f}{}\u{1f}{}",
        sample.artist, sample.album, sample.title
    );
    if sample.url.is_empty() {
        base
    } else {
        format!("{}|{}", sample.url, base)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub artist: String,
    pub album: String,
    pub track: String,
}

impl TrackIdentity {
    pub fn from_sample(sample: &PlaybackSample) -> Self {
        Self {
            artist: sample.artist.clone(),
            album: sample.album.clone(),
            track: sample.title.clone(),
        }
    }
}

/// Metadata merged into an aggregate row. Empty strings and zeroes mean
/// "unobserved" and never overwrite a previously stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub album_artist: String,
    pub track_number: i64,
    pub duration: i64,
    pub genre: String,
    pub composer: String,
    pub release_date: String,
    pub external_track_id: String,
    pub source: String,
    pub bundle_id: String,
    pub unique_id: String,
}

impl TrackMetadata {
    pub fn from_sample(sample: &PlaybackSample, source: Source) -> Self {
        Self {
            album_artist: sample.album_artist.clone(),
            track_number: sample.track_number,
            duration: sample.duration_seconds,
            genre: sample.genre.clone(),
            composer: sample.composer.clone(),
            release_date: sample.release_date.clone(),
            external_track_id: sample.external_track_id.clone(),
            source: if sample.url.is_empty() {
                source.as_str().to_string()
            } else {
                sample.url.clone()
            },
            bundle_id: sample.bundle_id.clone(),
            unique_id: sample.unique_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NowPlaying {
    pub source: Source,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub apple_music_favorite: bool,
    pub lastfm_loved: bool,
    pub duration: i64,
    pub position: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    NowPlaying(NowPlaying),
    Stop { source: Source },
}

#[cfg(test)]
mod tests {
    use super::{track_key, PlaybackEvent, PlaybackSample, Source};

    fn sample(title: &str) -> PlaybackSample {
        PlaybackSample {
            title: title.to_string(),
            album: "Album".to_string(),
            artist: "Artist".to_string(),
            ..PlaybackSample::default()
        }
    }

    #[test]
    fn track_key_separates_identical_titles_by_url() {
        let plain = sample("Intro");
        let mut cue_a = sample("Intro");
        cue_a.url = "file:///music/disc-a.cue".to_string();
        let mut cue_b = sample("Intro");
        cue_b.url = "file:///music/disc-b.cue".to_string();

        assert_ne!(track_key(&plain), track_key(&cue_a));
        assert_ne!(track_key(&cue_a), track_key(&cue_b));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let stop = PlaybackEvent::Stop {
            source: Source::Roon,
        };
        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["type"], "stop");
        assert_eq!(json["source"], "roon");
    }
}
