//! SQLite persistence for play statistics and favorite flags.
//!
//! All writers to the `tracks` table (every poller plus the favorite
//! reconciler, potentially across processes) go through the optimistic
//! version protocol in [`tracks::update_with_retry`]; nothing in this crate
//! takes an in-process lock around an aggregate row.

mod error;
pub mod records;
pub mod tracks;

pub use error::StorageError;
pub use records::{NewPlayRecord, PlayRecord};
pub use tracks::{TrackAggregate, UpdateIntent};

use async_trait::async_trait;
use scrobble_relay_core::{TrackIdentity, TrackMetadata};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

pub async fn create_pool(path: &Path) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Persistence port the engine polls and writes through.
#[async_trait]
pub trait TrackStore: Send + Sync {
    async fn get_track(
        &self,
        identity: &TrackIdentity,
    ) -> Result<Option<TrackAggregate>, StorageError>;

    async fn track_count(&self) -> Result<u64, StorageError>;

    async fn increment_play_count(
        &self,
        identity: &TrackIdentity,
        meta: &TrackMetadata,
    ) -> Result<(), StorageError>;

    /// Set one or both favorite flags in a single conditional update.
    async fn set_favorites(
        &self,
        identity: &TrackIdentity,
        meta: &TrackMetadata,
        apple_music: Option<bool>,
        lastfm: Option<bool>,
    ) -> Result<(), StorageError>;

    async fn insert_play_record(&self, record: &NewPlayRecord) -> Result<(), StorageError>;

    async fn unsubmitted_records(&self, limit: i64) -> Result<Vec<PlayRecord>, StorageError>;

    async fn mark_submitted(&self, id: i64, submitted: bool) -> Result<(), StorageError>;
}

pub struct SqliteTrackStore {
    pool: SqlitePool,
}

impl SqliteTrackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TrackStore for SqliteTrackStore {
    async fn get_track(
        &self,
        identity: &TrackIdentity,
    ) -> Result<Option<TrackAggregate>, StorageError> {
        tracks::find_by_identity(&self.pool, identity).await
    }

    async fn track_count(&self) -> Result<u64, StorageError> {
        Ok(tracks::count(&self.pool).await? as u64)
    }

    async fn increment_play_count(
        &self,
        identity: &TrackIdentity,
        meta: &TrackMetadata,
    ) -> Result<(), StorageError> {
        tracks::update_with_retry(&self.pool, identity, meta, UpdateIntent::IncrementPlay).await
    }

    async fn set_favorites(
        &self,
        identity: &TrackIdentity,
        meta: &TrackMetadata,
        apple_music: Option<bool>,
        lastfm: Option<bool>,
    ) -> Result<(), StorageError> {
        if apple_music.is_none() && lastfm.is_none() {
            return Ok(());
        }
        tracks::update_with_retry(
            &self.pool,
            identity,
            meta,
            UpdateIntent::SetFavorites { apple_music, lastfm },
        )
        .await
    }

    async fn insert_play_record(&self, record: &NewPlayRecord) -> Result<(), StorageError> {
        records::insert(&self.pool, record).await?;
        Ok(())
    }

    async fn unsubmitted_records(&self, limit: i64) -> Result<Vec<PlayRecord>, StorageError> {
        records::unsubmitted(&self.pool, limit).await
    }

    async fn mark_submitted(&self, id: i64, submitted: bool) -> Result<(), StorageError> {
        records::mark_submitted(&self.pool, id, submitted).await
    }
}
