use scrobble_relay_core::{TrackIdentity, TrackMetadata};
use scrobble_relay_lastfm::ScrobbleService;
use scrobble_relay_players::PlayerController;
use scrobble_relay_store::TrackStore;
use tracing::warn;

/// Effective favorite state for the track after reconciliation, used to fill
/// the now-playing event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FavoriteFlags {
    pub apple_music: bool,
    pub lastfm: bool,
}

/// Merge the player's favorite flag and the remote loved flag into the
/// persisted pair. Best-effort and idempotent: re-running with unchanged live
/// signals performs no further writes, and a failed live-signal query counts
/// as "unknown", never as "false persisted".
pub async fn reconcile_favorites(
    controller: &dyn PlayerController,
    store: &dyn TrackStore,
    scrobbler: &dyn ScrobbleService,
    identity: &TrackIdentity,
    meta: &TrackMetadata,
) -> FavoriteFlags {
    let source = controller.source();

    let row = match store.get_track(identity).await {
        Ok(row) => row,
        Err(err) => {
            warn!(source = %source, error = %err, "favorite reconcile skipped; aggregate read failed");
            return FavoriteFlags::default();
        }
    };

    let mut flags = row
        .map(|r| FavoriteFlags {
            apple_music: r.is_apple_music_fav,
            lastfm: r.is_lastfm_fav,
        })
        .unwrap_or_default();

    if !flags.apple_music && !flags.lastfm {
        let live_local = controller.supports_favorites() && controller.is_current_favorite().await;
        let live_remote = match scrobbler
            .query_favorite(&identity.artist, &identity.track)
            .await
        {
            Ok(loved) => loved,
            Err(err) => {
                warn!(source = %source, error = %err, "remote favorite lookup failed");
                false
            }
        };

        if live_local {
            // A player favorite implies the remote should be loved as well.
            match store
                .set_favorites(identity, meta, Some(true), Some(true))
                .await
            {
                Ok(()) => {
                    flags.apple_music = true;
                    flags.lastfm = true;
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "persisting favorite flags failed")
                }
            }
            if let Err(err) = scrobbler
                .set_favorite(&identity.artist, &identity.track, true)
                .await
            {
                warn!(source = %source, error = %err, "propagating favorite to remote failed");
            }
        } else if live_remote {
            // Remote love only reaches the local flag when this source can
            // hold one at all.
            let local = controller.supports_favorites().then_some(true);
            match store.set_favorites(identity, meta, local, Some(true)).await {
                Ok(()) => {
                    flags.lastfm = true;
                    flags.apple_music = local.is_some();
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "persisting loved flag failed")
                }
            }
        }
    } else if flags.lastfm && !flags.apple_music && controller.supports_favorites() {
        if controller.is_current_favorite().await {
            match store.set_favorites(identity, meta, Some(true), None).await {
                Ok(()) => flags.apple_music = true,
                Err(err) => {
                    warn!(source = %source, error = %err, "persisting player favorite failed")
                }
            }
        }
    } else if flags.apple_music && !flags.lastfm {
        match scrobbler
            .query_favorite(&identity.artist, &identity.track)
            .await
        {
            Ok(true) => match store.set_favorites(identity, meta, None, Some(true)).await {
                Ok(()) => flags.lastfm = true,
                Err(err) => {
                    warn!(source = %source, error = %err, "persisting loved flag failed")
                }
            },
            Ok(false) => {}
            Err(err) => {
                warn!(source = %source, error = %err, "remote favorite lookup failed");
            }
        }
    }

    flags
}
