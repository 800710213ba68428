pub mod config;
pub mod model;

pub use config::{AppConfig, DatabaseConfig, PollIntervals, ScrobblerConfig};
pub use model::{
    track_key, NowPlaying, PlaybackEvent, PlaybackSample, Source, TrackIdentity, TrackMetadata,
    TransportState,
};
