use chrono::Utc;
use scrobble_relay_core::{TrackIdentity, TrackMetadata};
use scrobble_relay_store::{
    create_pool, run_migrations, NewPlayRecord, SqliteTrackStore, TrackStore,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store() -> (TempDir, Arc<SqliteTrackStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = create_pool(&dir.path().join("relay.db")).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    (dir, Arc::new(SqliteTrackStore::new(pool)))
}

fn identity() -> TrackIdentity {
    TrackIdentity {
        artist: "Sound Toy".to_string(),
        album: "Love Is Expensive".to_string(),
        track: "Serenade".to_string(),
    }
}

fn meta() -> TrackMetadata {
    TrackMetadata {
        album_artist: "Sound Toy".to_string(),
        duration: 479,
        genre: "Rock".to_string(),
        source: "apple_music".to_string(),
        ..TrackMetadata::default()
    }
}

#[tokio::test]
async fn first_increment_creates_row() {
    let (_dir, store) = open_store().await;

    store.increment_play_count(&identity(), &meta()).await.unwrap();

    let row = store.get_track(&identity()).await.unwrap().expect("row");
    assert_eq!(row.play_count, 1);
    assert_eq!(row.version, 1);
    assert_eq!(row.genre, "Rock");
    assert_eq!(store.track_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_converge_without_lost_updates() {
    let (_dir, store) = open_store().await;

    // Seed the row at play_count = 0, version = 1.
    store
        .set_favorites(&identity(), &meta(), None, Some(false))
        .await
        .unwrap();

    let n = 8;
    let mut handles = Vec::new();
    for _ in 0..n {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.increment_play_count(&identity(), &meta()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let row = store.get_track(&identity()).await.unwrap().expect("row");
    assert_eq!(row.play_count, i64::from(n));
    assert_eq!(row.version, i64::from(n) + 1);
}

#[tokio::test]
async fn metadata_merge_fills_gaps_but_never_overwrites() {
    let (_dir, store) = open_store().await;

    store.increment_play_count(&identity(), &meta()).await.unwrap();

    let second = TrackMetadata {
        genre: String::new(),
        composer: "A. Composer".to_string(),
        duration: 1,
        ..TrackMetadata::default()
    };
    store.increment_play_count(&identity(), &second).await.unwrap();

    let row = store.get_track(&identity()).await.unwrap().expect("row");
    assert_eq!(row.play_count, 2);
    assert_eq!(row.version, 2);
    assert_eq!(row.genre, "Rock");
    assert_eq!(row.composer, "A. Composer");
    assert_eq!(row.duration, 479);
}

#[tokio::test]
async fn setting_both_favorite_flags_bumps_version_once() {
    let (_dir, store) = open_store().await;

    store.increment_play_count(&identity(), &meta()).await.unwrap();
    store
        .set_favorites(&identity(), &meta(), Some(true), Some(true))
        .await
        .unwrap();

    let row = store.get_track(&identity()).await.unwrap().expect("row");
    assert!(row.is_apple_music_fav);
    assert!(row.is_lastfm_fav);
    assert_eq!(row.version, 2);
    assert_eq!(row.play_count, 1);
}

#[tokio::test]
async fn no_op_favorite_update_writes_nothing() {
    let (_dir, store) = open_store().await;

    store.increment_play_count(&identity(), &meta()).await.unwrap();
    store
        .set_favorites(&identity(), &meta(), None, None)
        .await
        .unwrap();

    let row = store.get_track(&identity()).await.unwrap().expect("row");
    assert_eq!(row.version, 1);
}

#[tokio::test]
async fn play_record_retry_flow() {
    let (_dir, store) = open_store().await;

    store
        .insert_play_record(&NewPlayRecord {
            artist: "Sound Toy".to_string(),
            album_artist: "Sound Toy".to_string(),
            track: "Serenade".to_string(),
            album: "Love Is Expensive".to_string(),
            duration: 479,
            play_time: Utc::now(),
            submitted: false,
            external_track_id: String::new(),
            track_number: 6,
            source: "apple_music".to_string(),
        })
        .await
        .unwrap();

    let pending = store.unsubmitted_records(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].submitted);

    store.mark_submitted(pending[0].id, true).await.unwrap();
    assert!(store.unsubmitted_records(10).await.unwrap().is_empty());
}
