use crate::reconcile::reconcile_favorites;
use crate::{EngineShared, NotificationSink};
use chrono::{DateTime, Utc};
use scrobble_relay_core::{
    track_key, NowPlaying, PlaybackEvent, PlaybackSample, PollIntervals, Source, TrackIdentity,
    TrackMetadata, TransportState,
};
use scrobble_relay_lastfm::{NowPlayingUpdate, ScrobbleService, ScrobbleSubmission};
use scrobble_relay_players::PlayerController;
use scrobble_relay_store::{NewPlayRecord, TrackStore};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Played fraction past which a track counts as listened.
pub const SCROBBLE_FRACTION: f64 = 0.55;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub default_interval: Duration,
    pub long_interval: Duration,
    pub idle_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(2),
            long_interval: Duration::from_secs(60),
            idle_threshold: 100,
        }
    }
}

impl PollerConfig {
    pub fn from_intervals(intervals: &PollIntervals) -> Self {
        Self {
            default_interval: Duration::from_secs(intervals.default_poll_secs),
            long_interval: Duration::from_secs(intervals.long_poll_secs),
            idle_threshold: intervals.idle_poll_threshold,
        }
    }
}

/// One polling loop for one player. All state here is owned by the loop;
/// the only cross-task surfaces are the shared registry and the store.
pub struct PlayerPoller {
    source: Source,
    controller: Box<dyn PlayerController>,
    store: Arc<dyn TrackStore>,
    scrobbler: Arc<dyn ScrobbleService>,
    sink: Arc<dyn NotificationSink>,
    shared: Arc<EngineShared>,
    cfg: PollerConfig,
    previous_key: Option<String>,
    scrobbled: HashSet<String>,
    idle_ticks: u32,
    slow_poll: bool,
    track_started_at: Option<DateTime<Utc>>,
}

impl PlayerPoller {
    pub fn new(
        controller: Box<dyn PlayerController>,
        store: Arc<dyn TrackStore>,
        scrobbler: Arc<dyn ScrobbleService>,
        sink: Arc<dyn NotificationSink>,
        shared: Arc<EngineShared>,
        cfg: PollerConfig,
    ) -> Self {
        Self {
            source: controller.source(),
            controller,
            store,
            scrobbler,
            sink,
            shared,
            cfg,
            previous_key: None,
            scrobbled: HashSet::new(),
            idle_ticks: 0,
            slow_poll: false,
            track_started_at: None,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Current effective poll interval; lengthens after a long streak of
    /// non-playing ticks and snaps back the moment playback is seen again.
    pub fn interval(&self) -> Duration {
        if self.slow_poll {
            self.cfg.long_interval
        } else {
            self.cfg.default_interval
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut next = self.interval();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(next) => {
                    next = self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!(source = %self.source, "poller exiting");
                    return;
                }
            }
        }
    }

    /// One poll cycle. Returns the interval to sleep before the next one.
    pub async fn tick(&mut self) -> Duration {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks > self.cfg.idle_threshold && !self.slow_poll {
            self.slow_poll = true;
            info!(
                source = %self.source,
                pushed = self.shared.push_count(),
                "no playback seen; backing off to the long poll interval"
            );
        }

        if !self.controller.is_running().await {
            self.handle_not_playing();
            return self.interval();
        }

        let state = match self.controller.transport_state().await {
            Ok(state) => state,
            Err(err) => {
                debug!(source = %self.source, error = %err, "transport state query failed");
                TransportState::Unknown
            }
        };
        if state != TransportState::Playing {
            self.handle_not_playing();
            return self.interval();
        }

        self.slow_poll = false;
        self.idle_ticks = 0;

        match self.controller.now_playing().await {
            Ok(Some(sample)) => self.process_sample(sample).await,
            Ok(None) => {}
            Err(err) => {
                warn!(source = %self.source, error = %err, "now-playing query failed");
            }
        }

        self.interval()
    }

    fn handle_not_playing(&mut self) {
        if !self.shared.registry.remove(self.source) {
            return;
        }
        if self.shared.registry.any_other_playing(self.source) {
            debug!(source = %self.source, "stop suppressed; another source is still playing");
            return;
        }
        self.shared.any_playing.store(false, Ordering::SeqCst);
        self.sink.publish(&PlaybackEvent::Stop {
            source: self.source,
        });
    }

    async fn process_sample(&mut self, sample: PlaybackSample) {
        let key = track_key(&sample);
        let identity = TrackIdentity::from_sample(&sample);
        let meta = TrackMetadata::from_sample(&sample, self.source);

        let flags = reconcile_favorites(
            self.controller.as_ref(),
            self.store.as_ref(),
            self.scrobbler.as_ref(),
            &identity,
            &meta,
        )
        .await;

        let payload = NowPlaying {
            source: self.source,
            title: sample.title.clone(),
            album: sample.album.clone(),
            artist: sample.artist.clone(),
            apple_music_favorite: flags.apple_music,
            lastfm_loved: flags.lastfm,
            duration: sample.duration_seconds,
            position: sample.position_seconds,
        };
        self.shared.registry.update(self.source, payload.clone());
        self.shared.any_playing.store(true, Ordering::SeqCst);
        self.sink.publish(&PlaybackEvent::NowPlaying(payload));

        // A zero duration would make the fraction meaningless; skip the
        // scrobble check for this tick but keep the now-playing flow alive.
        if sample.duration_seconds > 0 {
            let played_fraction =
                sample.position_seconds / sample.duration_seconds as f64;
            if played_fraction > SCROBBLE_FRACTION && !self.scrobbled.contains(&key) {
                self.record_completion(&sample, &identity, &meta).await;
                self.scrobbled.insert(key.clone());
            }
        }

        if self.previous_key.as_deref() != Some(key.as_str()) {
            self.handle_new_track(&sample, &key).await;
        }
        self.previous_key = Some(key);
    }

    async fn handle_new_track(&mut self, sample: &PlaybackSample, key: &str) {
        if let Some(prev) = self.previous_key.take() {
            if prev != key {
                self.scrobbled.remove(&prev);
            }
        }
        self.track_started_at = Some(Utc::now());

        let update = NowPlayingUpdate {
            artist: sample.artist.clone(),
            album_artist: album_artist_or_artist(sample),
            track: sample.title.clone(),
            album: sample.album.clone(),
            duration: sample.duration_seconds,
        };
        if let Err(err) = self.scrobbler.update_now_playing(&update).await {
            warn!(source = %self.source, error = %err, "remote now-playing update failed");
        }
    }

    async fn record_completion(
        &mut self,
        sample: &PlaybackSample,
        identity: &TrackIdentity,
        meta: &TrackMetadata,
    ) {
        let started = self.track_started_at.unwrap_or_else(Utc::now);
        let submission = ScrobbleSubmission {
            artist: sample.artist.clone(),
            album_artist: album_artist_or_artist(sample),
            track: sample.title.clone(),
            album: sample.album.clone(),
            duration: sample.duration_seconds,
            timestamp: started.timestamp(),
            track_number: sample.track_number,
            external_track_id: sample.external_track_id.clone(),
        };

        let submitted = match self.scrobbler.submit_completion(&submission).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    source = %self.source,
                    error = %err,
                    "scrobble submission failed; keeping the record for batch retry"
                );
                false
            }
        };

        let record = NewPlayRecord {
            artist: submission.artist.clone(),
            album_artist: submission.album_artist.clone(),
            track: submission.track.clone(),
            album: submission.album.clone(),
            duration: submission.duration,
            play_time: started,
            submitted,
            external_track_id: submission.external_track_id.clone(),
            track_number: submission.track_number,
            source: self.source.as_str().to_string(),
        };
        if let Err(err) = self.store.insert_play_record(&record).await {
            warn!(source = %self.source, error = %err, "failed to insert play record");
        }

        if let Err(err) = self.store.increment_play_count(identity, meta).await {
            warn!(source = %self.source, error = %err, "failed to increment play count");
        }

        let total = self.shared.push_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            source = %self.source,
            track = %submission.track,
            submitted,
            total_pushed = total,
            "listen recorded"
        );
    }
}

fn album_artist_or_artist(sample: &PlaybackSample) -> String {
    if sample.album_artist.is_empty() {
        sample.artist.clone()
    } else {
        sample.album_artist.clone()
    }
}
