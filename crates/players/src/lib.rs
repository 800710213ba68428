use anyhow::Result;
use async_trait::async_trait;
use scrobble_relay_core::{PlaybackSample, Source, TransportState};

/// Uniform capability contract one polling task consumes. Each implementation
/// owns all OS/process/scripting details for its player; failures surface as
/// `Unknown`/`None`/`false`, never as a panic.
#[async_trait]
pub trait PlayerController: Send + Sync {
    fn source(&self) -> Source;

    /// Whether this player can report and set a per-track favorite flag.
    fn supports_favorites(&self) -> bool {
        false
    }

    async fn is_running(&self) -> bool;

    async fn transport_state(&self) -> Result<TransportState>;

    async fn now_playing(&self) -> Result<Option<PlaybackSample>>;

    async fn is_current_favorite(&self) -> bool {
        false
    }

    async fn set_current_favorite(&self, _favorite: bool) -> Result<()> {
        Ok(())
    }
}

pub fn build_players(priority: &[String]) -> Vec<Box<dyn PlayerController>> {
    let mut players: Vec<Box<dyn PlayerController>> = Vec::new();

    for item in priority {
        let built = match Source::from_name(item) {
            Some(Source::AppleMusic) => platform::apple_music_player(),
            Some(Source::Audirvana) => platform::audirvana_player(),
            Some(Source::Roon) => platform::roon_player(),
            None => {
                tracing::warn!(player = %item, "unknown player name in config; skipping");
                None
            }
        };
        if let Some(p) = built {
            players.push(p);
        }
    }

    players
}

mod platform {
    use super::PlayerController;

    #[cfg(target_os = "macos")]
    pub fn apple_music_player() -> Option<Box<dyn PlayerController>> {
        Some(Box::new(crate::apple_music::AppleMusicPlayer::new()))
    }

    #[cfg(not(target_os = "macos"))]
    pub fn apple_music_player() -> Option<Box<dyn PlayerController>> {
        None
    }

    #[cfg(target_os = "macos")]
    pub fn audirvana_player() -> Option<Box<dyn PlayerController>> {
        Some(Box::new(crate::audirvana::AudirvanaPlayer::new()))
    }

    #[cfg(not(target_os = "macos"))]
    pub fn audirvana_player() -> Option<Box<dyn PlayerController>> {
        None
    }

    #[cfg(target_os = "macos")]
    pub fn roon_player() -> Option<Box<dyn PlayerController>> {
        Some(Box::new(crate::roon::RoonPlayer::new()))
    }

    #[cfg(not(target_os = "macos"))]
    pub fn roon_player() -> Option<Box<dyn PlayerController>> {
        None
    }
}

#[cfg(target_os = "macos")]
mod apple_music;
#[cfg(target_os = "macos")]
mod audirvana;
#[cfg(target_os = "macos")]
mod osa;
#[cfg(target_os = "macos")]
mod roon;
