use scrobble_relay_core::PlaybackEvent;
use scrobble_relay_engine::NotificationSink;
use tokio::sync::broadcast;
use tracing::info;

/// Mirrors engine events to the log and fans them out to any in-process
/// listeners. Nobody listening is fine; delivery is fire-and-forget.
pub struct BroadcastSink {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    #[allow(dead_code)]
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::NowPlaying(now) => {
                info!(
                    source = %now.source,
                    artist = %now.artist,
                    title = %now.title,
                    position = now.position,
                    "now playing"
                );
            }
            PlaybackEvent::Stop { source } => {
                info!(source = %source, "playback stopped");
            }
        }
        let _ = self.tx.send(event.clone());
    }
}
