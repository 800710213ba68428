use crate::error::StorageError;
use scrobble_relay_core::{TrackIdentity, TrackMetadata};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

// Contention windows are microseconds wide in practice; the cap only exists
// so a wedged table cannot livelock a poller.
const UPDATE_RETRY_LIMIT: u32 = 256;
const RETRY_BACKOFF: Duration = Duration::from_millis(2);

/// One aggregate row per (artist, album, track). `version` moves by exactly
/// one on every successful write; writers re-read on mismatch.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TrackAggregate {
    pub id: i64,
    pub artist: String,
    pub album: String,
    pub track: String,
    pub play_count: i64,
    pub is_apple_music_fav: bool,
    pub is_lastfm_fav: bool,
    pub version: i64,
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

#[derive(Debug, Clone, Copy)]
pub enum UpdateIntent {
    IncrementPlay,
    SetFavorites {
        apple_music: Option<bool>,
        lastfm: Option<bool>,
    },
}

const SELECT_COLUMNS: &str = "id, artist, album, track, play_count, is_apple_music_fav, \
     is_lastfm_fav, version, album_artist, track_number, duration, genre, composer, \
     release_date, external_track_id, source, bundle_id, unique_id";

pub async fn find_by_identity(
    pool: &SqlitePool,
    identity: &TrackIdentity,
) -> Result<Option<TrackAggregate>, StorageError> {
    let row = sqlx::query_as::<_, TrackAggregate>(&format!(
        "SELECT {SELECT_COLUMNS} FROM tracks WHERE artist = ? AND album = ? AND track = ?"
    ))
    .bind(&identity.artist)
    .bind(&identity.album)
    .bind(&identity.track)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn count(pool: &SqlitePool) -> Result<i64, StorageError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Read-modify-write loop from the update protocol: read the row, insert it
/// when absent (a duplicate-key failure means a concurrent writer won the
/// insert, so re-read), otherwise issue a conditional update against the
/// version just read and retry while zero rows are affected.
pub async fn update_with_retry(
    pool: &SqlitePool,
    identity: &TrackIdentity,
    meta: &TrackMetadata,
    intent: UpdateIntent,
) -> Result<(), StorageError> {
    for attempt in 0..UPDATE_RETRY_LIMIT {
        match find_by_identity(pool, identity).await? {
            None => {
                if try_insert(pool, identity, meta, intent).await? {
                    return Ok(());
                }
            }
            Some(existing) => {
                let next = next_state(&existing, meta, intent);
                if conditional_update(pool, identity, existing.version, &next).await? > 0 {
                    return Ok(());
                }
                debug!(
                    artist = %identity.artist,
                    track = %identity.track,
                    version = existing.version,
                    "aggregate version moved underneath us; retrying"
                );
            }
        }
        if attempt + 1 < UPDATE_RETRY_LIMIT {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    Err(StorageError::Contention {
        attempts: UPDATE_RETRY_LIMIT,
    })
}

/// Returns false on a uniqueness conflict so the caller re-reads the row a
/// concurrent writer just created.
async fn try_insert(
    pool: &SqlitePool,
    identity: &TrackIdentity,
    meta: &TrackMetadata,
    intent: UpdateIntent,
) -> Result<bool, StorageError> {
    let (play_count, apple, lastfm) = match intent {
        UpdateIntent::IncrementPlay => (1i64, false, false),
        UpdateIntent::SetFavorites { apple_music, lastfm } => {
            (0i64, apple_music.unwrap_or(false), lastfm.unwrap_or(false))
        }
    };

    let result = sqlx::query(
        "INSERT INTO tracks (artist, album, track, play_count, is_apple_music_fav, \
         is_lastfm_fav, album_artist, track_number, duration, genre, composer, \
         release_date, external_track_id, source, bundle_id, unique_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&identity.artist)
    .bind(&identity.album)
    .bind(&identity.track)
    .bind(play_count)
    .bind(apple)
    .bind(lastfm)
    .bind(&meta.album_artist)
    .bind(meta.track_number)
    .bind(meta.duration)
    .bind(&meta.genre)
    .bind(&meta.composer)
    .bind(&meta.release_date)
    .bind(&meta.external_track_id)
    .bind(&meta.source)
    .bind(&meta.bundle_id)
    .bind(&meta.unique_id)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn conditional_update(
    pool: &SqlitePool,
    identity: &TrackIdentity,
    expected_version: i64,
    next: &TrackAggregate,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        "UPDATE tracks SET play_count = ?, is_apple_music_fav = ?, is_lastfm_fav = ?, \
         version = ?, album_artist = ?, track_number = ?, duration = ?, genre = ?, \
         composer = ?, release_date = ?, external_track_id = ?, source = ?, bundle_id = ?, \
         unique_id = ?, updated_at = datetime('now') \
         WHERE artist = ? AND album = ? AND track = ? AND version = ?",
    )
    .bind(next.play_count)
    .bind(next.is_apple_music_fav)
    .bind(next.is_lastfm_fav)
    .bind(next.version)
    .bind(&next.album_artist)
    .bind(next.track_number)
    .bind(next.duration)
    .bind(&next.genre)
    .bind(&next.composer)
    .bind(&next.release_date)
    .bind(&next.external_track_id)
    .bind(&next.source)
    .bind(&next.bundle_id)
    .bind(&next.unique_id)
    .bind(&identity.artist)
    .bind(&identity.album)
    .bind(&identity.track)
    .bind(expected_version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn next_state(
    existing: &TrackAggregate,
    meta: &TrackMetadata,
    intent: UpdateIntent,
) -> TrackAggregate {
    let mut next = existing.clone();
    match intent {
        UpdateIntent::IncrementPlay => next.play_count += 1,
        UpdateIntent::SetFavorites { apple_music, lastfm } => {
            if let Some(v) = apple_music {
                next.is_apple_music_fav = v;
            }
            if let Some(v) = lastfm {
                next.is_lastfm_fav = v;
            }
        }
    }
    merge_metadata(&mut next, meta);
    next.version = existing.version + 1;
    next
}

/// Fill fields the row has never seen; an empty observation never clobbers a
/// stored value.
fn merge_metadata(row: &mut TrackAggregate, meta: &TrackMetadata) {
    merge_str(&mut row.album_artist, &meta.album_artist);
    merge_i64(&mut row.track_number, meta.track_number);
    merge_i64(&mut row.duration, meta.duration);
    merge_str(&mut row.genre, &meta.genre);
    merge_str(&mut row.composer, &meta.composer);
    merge_str(&mut row.release_date, &meta.release_date);
    merge_str(&mut row.external_track_id, &meta.external_track_id);
    merge_str(&mut row.source, &meta.source);
    merge_str(&mut row.bundle_id, &meta.bundle_id);
    merge_str(&mut row.unique_id, &meta.unique_id);
}

fn merge_str(slot: &mut String, observed: &str) {
    if slot.is_empty() && !observed.is_empty() {
        *slot = observed.to_string();
    }
}

fn merge_i64(slot: &mut i64, observed: i64) {
    if *slot == 0 && observed != 0 {
        *slot = observed;
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

#[cfg(test)]
mod tests {
    use super::{next_state, TrackAggregate, UpdateIntent};
    use scrobble_relay_core::TrackMetadata;

    fn existing() -> TrackAggregate {
        TrackAggregate {
            id: 1,
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            track: "Track".to_string(),
            play_count: 3,
            is_apple_music_fav: false,
            is_lastfm_fav: true,
            version: 7,
            album_artist: String::new(),
            track_number: 0,
            duration: 200,
            genre: "Jazz".to_string(),
            composer: String::new(),
            release_date: String::new(),
            external_track_id: String::new(),
            source: "roon".to_string(),
            bundle_id: String::new(),
            unique_id: String::new(),
        }
    }

    #[test]
    fn increment_bumps_count_and_version() {
        let next = next_state(
            &existing(),
            &TrackMetadata::default(),
            UpdateIntent::IncrementPlay,
        );
        assert_eq!(next.play_count, 4);
        assert_eq!(next.version, 8);
        assert!(next.is_lastfm_fav);
    }

    #[test]
    fn merge_fills_empty_fields_only() {
        let meta = TrackMetadata {
            album_artist: "Band".to_string(),
            genre: "Rock".to_string(),
            duration: 999,
            ..TrackMetadata::default()
        };
        let next = next_state(&existing(), &meta, UpdateIntent::IncrementPlay);
        assert_eq!(next.album_artist, "Band");
        // Already-stored values win over new observations.
        assert_eq!(next.genre, "Jazz");
        assert_eq!(next.duration, 200);
    }

    #[test]
    fn favorite_intent_leaves_unrelated_flag_alone() {
        let next = next_state(
            &existing(),
            &TrackMetadata::default(),
            UpdateIntent::SetFavorites {
                apple_music: Some(true),
                lastfm: None,
            },
        );
        assert!(next.is_apple_music_fav);
        assert!(next.is_lastfm_fav);
        assert_eq!(next.play_count, 3);
        assert_eq!(next.version, 8);
    }
}
