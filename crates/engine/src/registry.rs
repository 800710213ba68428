use scrobble_relay_core::{NowPlaying, Source};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Last emitted now-playing payload per source. Each entry is written only by
/// its owning poller but read by every poller when deciding whether a global
/// stop may be emitted. One lock guards the whole table; the stop rule needs
/// a consistent snapshot across entries.
#[derive(Default)]
pub struct PlaybackRegistry {
    inner: Mutex<HashMap<Source, NowPlaying>>,
}

impl PlaybackRegistry {
    pub fn update(&self, source: Source, entry: NowPlaying) {
        self.lock().insert(source, entry);
    }

    /// Returns true when the source actually had a live entry.
    pub fn remove(&self, source: Source) -> bool {
        self.lock().remove(&source).is_some()
    }

    pub fn get(&self, source: Source) -> Option<NowPlaying> {
        self.lock().get(&source).cloned()
    }

    pub fn any_other_playing(&self, source: Source) -> bool {
        self.lock().keys().any(|s| *s != source)
    }

    pub fn snapshot(&self) -> Vec<NowPlaying> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Source, NowPlaying>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackRegistry;
    use scrobble_relay_core::{NowPlaying, Source};

    fn entry(source: Source) -> NowPlaying {
        NowPlaying {
            source,
            title: "Title".to_string(),
            album: "Album".to_string(),
            artist: "Artist".to_string(),
            apple_music_favorite: false,
            lastfm_loved: false,
            duration: 180,
            position: 10.0,
        }
    }

    #[test]
    fn tracks_other_live_sources() {
        let registry = PlaybackRegistry::default();
        registry.update(Source::AppleMusic, entry(Source::AppleMusic));
        registry.update(Source::Roon, entry(Source::Roon));

        assert!(registry.any_other_playing(Source::AppleMusic));
        assert_eq!(registry.snapshot().len(), 2);
        assert!(registry.remove(Source::Roon));
        assert!(!registry.any_other_playing(Source::AppleMusic));
        assert!(!registry.remove(Source::Roon));
        assert!(registry.get(Source::AppleMusic).is_some());
        assert!(registry.get(Source::Roon).is_none());
    }
}
