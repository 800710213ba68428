use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollIntervals {
    pub default_poll_secs: u64,
    pub long_poll_secs: u64,
    pub idle_poll_threshold: u32,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            default_poll_secs: 2,
            long_poll_secs: 60,
            idle_poll_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrobblerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub session_key: String,
}

impl Default for ScrobblerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://scrobble.example.com/2.0".to_string(),
            api_key: String::new(),
            session_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub players: Vec<String>,
    pub intervals: PollIntervals,
    pub scrobbler: ScrobblerConfig,
    pub database: DatabaseConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            players: vec![
                "apple_music".to_string(),
                "audirvana".to_string(),
                "roon".to_string(),
            ],
            intervals: PollIntervals::default(),
            scrobbler: ScrobblerConfig::default(),
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
        }
    }
}
