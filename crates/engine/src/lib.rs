pub mod poller;
pub mod reconcile;
pub mod registry;

pub use poller::{PlayerPoller, PollerConfig, SCROBBLE_FRACTION};
pub use reconcile::{reconcile_favorites, FavoriteFlags};
pub use registry::PlaybackRegistry;

use scrobble_relay_core::PlaybackEvent;
use scrobble_relay_lastfm::ScrobbleService;
use scrobble_relay_players::PlayerController;
use scrobble_relay_store::TrackStore;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Downstream consumer of now-playing/stop events. Delivery is someone
/// else's problem; publishing must not block or fail.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: &PlaybackEvent);
}

/// State visible across polling tasks, owned by the engine instance and
/// handed to each task at construction so multiple engines can coexist in
/// one process.
#[derive(Default)]
pub struct EngineShared {
    pub registry: PlaybackRegistry,
    pub(crate) push_count: AtomicU32,
    pub(crate) any_playing: AtomicBool,
}

impl EngineShared {
    pub fn push_count(&self) -> u32 {
        self.push_count.load(Ordering::SeqCst)
    }

    pub fn is_anything_playing(&self) -> bool {
        self.any_playing.load(Ordering::SeqCst)
    }
}

pub struct Engine {
    cfg: PollerConfig,
    players: Vec<Box<dyn PlayerController>>,
    store: Arc<dyn TrackStore>,
    scrobbler: Arc<dyn ScrobbleService>,
    sink: Arc<dyn NotificationSink>,
    shared: Arc<EngineShared>,
}

impl Engine {
    pub fn new(
        cfg: PollerConfig,
        players: Vec<Box<dyn PlayerController>>,
        store: Arc<dyn TrackStore>,
        scrobbler: Arc<dyn ScrobbleService>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cfg,
            players,
            store,
            scrobbler,
            sink,
            shared: Arc::new(EngineShared::default()),
        }
    }

    pub fn shared(&self) -> Arc<EngineShared> {
        Arc::clone(&self.shared)
    }

    /// Spawn one polling task per player. Tasks are peers; the returned
    /// handle carries the single shared stop signal they all observe.
    pub async fn start(self) -> EngineHandle {
        match self.store.track_count().await {
            Ok(count) => self
                .shared
                .push_count
                .store(count.min(u64::from(u32::MAX)) as u32, Ordering::SeqCst),
            Err(err) => warn!(error = %err, "could not seed push counter from store"),
        }

        let (shutdown_tx, _) = watch::channel(false);
        let mut tasks = Vec::new();

        for controller in self.players {
            let poller = PlayerPoller::new(
                controller,
                Arc::clone(&self.store),
                Arc::clone(&self.scrobbler),
                Arc::clone(&self.sink),
                Arc::clone(&self.shared),
                self.cfg.clone(),
            );
            let source = poller.source();
            info!(source = %source, "starting poller");
            tasks.push(tokio::spawn(poller.run(shutdown_tx.subscribe())));
        }

        EngineHandle {
            shutdown: shutdown_tx,
            tasks,
            shared: self.shared,
        }
    }
}

pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    /// Signal every poller to stop after its in-flight tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub async fn wait(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }
}
