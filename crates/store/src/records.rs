use crate::error::StorageError;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Append-only completion log. Rows are only ever touched again by the batch
/// retry job flipping `submitted`.
#[derive(Debug, Clone)]
pub struct NewPlayRecord {
    pub artist: String,
    pub album_artist: String,
    pub track: String,
    pub album: String,
    pub duration: i64,
    pub play_time: DateTime<Utc>,
    pub submitted: bool,
    pub external_track_id: String,
    pub track_number: i64,
    pub source: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayRecord {
    pub id: i64,
    pub artist: String,
    pub album_artist: String,
    pub track: String,
    pub album: String,
    pub duration: i64,
    pub play_time: DateTime<Utc>,
    pub submitted: bool,
    pub external_track_id: String,
    pub track_number: i64,
    pub source: String,
}

pub async fn insert(pool: &SqlitePool, record: &NewPlayRecord) -> Result<i64, StorageError> {
    let result = sqlx::query(
        "INSERT INTO play_records (artist, album_artist, track, album, duration, play_time, \
         submitted, external_track_id, track_number, source) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.artist)
    .bind(&record.album_artist)
    .bind(&record.track)
    .bind(&record.album)
    .bind(record.duration)
    .bind(record.play_time)
    .bind(record.submitted)
    .bind(&record.external_track_id)
    .bind(record.track_number)
    .bind(&record.source)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn unsubmitted(pool: &SqlitePool, limit: i64) -> Result<Vec<PlayRecord>, StorageError> {
    let rows = sqlx::query_as::<_, PlayRecord>(
        "SELECT id, artist, album_artist, track, album, duration, play_time, submitted, \
         external_track_id, track_number, source \
         FROM play_records WHERE submitted = 0 ORDER BY play_time ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_submitted(
    pool: &SqlitePool,
    id: i64,
    submitted: bool,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE play_records SET submitted = ? WHERE id = ?")
        .bind(submitted)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
