use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::naming::TrackNaming;
use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub tracks: TrackNaming,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the jukebox web server.  The WebSocket endpoint and the
    /// stream URL are derived from it.
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
}

/// Polling intervals armed on every successful connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_fast_poll_ms")]
    pub now_playing_ms: u64,
    #[serde(default = "default_fast_poll_ms")]
    pub queue_ms: u64,
    #[serde(default = "default_catalog_poll_ms")]
    pub playlist_ms: u64,
    #[serde(default = "default_catalog_poll_ms")]
    pub artists_ms: u64,
    /// Fixed (non-exponential) reconnect check interval.
    #[serde(default = "default_health_check_ms")]
    pub health_check_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Lifetime of info and warning notifications.  Errors stay until
    /// dismissed or replaced.
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default = "default_volume_step")]
    pub volume_step: f32,
    #[serde(default = "default_mpv_binary")]
    pub mpv_binary: String,
}

/// Geometry used to derive the results page size from the terminal height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_header_rows")]
    pub header_rows: u16,
    #[serde(default = "default_row_height")]
    pub row_height: u16,
    #[serde(default = "default_spare_rows")]
    pub spare_rows: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            stream_path: default_stream_path(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            now_playing_ms: default_fast_poll_ms(),
            queue_ms: default_fast_poll_ms(),
            playlist_ms: default_catalog_poll_ms(),
            artists_ms: default_catalog_poll_ms(),
            health_check_ms: default_health_check_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notification_timeout(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            volume_step: default_volume_step(),
            mpv_binary: default_mpv_binary(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            header_rows: default_header_rows(),
            row_height: default_row_height(),
            spare_rows: default_spare_rows(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_stream_path() -> String {
    "/stream.mp3".to_string()
}

fn default_fast_poll_ms() -> u64 {
    500
}

fn default_catalog_poll_ms() -> u64 {
    1000
}

fn default_health_check_ms() -> u64 {
    5000
}

fn default_notification_timeout() -> u64 {
    10
}

fn default_volume() -> f32 {
    0.5
}

fn default_volume_step() -> f32 {
    0.1
}

fn default_mpv_binary() -> String {
    "mpv".to_string()
}

fn default_header_rows() -> u16 {
    7
}

fn default_row_height() -> u16 {
    1
}

fn default_spare_rows() -> u16 {
    2
}

impl Config {
    /// Load the default config file, writing one with defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://localhost:8080");
        assert_eq!(config.polling.health_check_ms, 5000);
        assert_eq!(config.notifications.timeout_secs, 10);
        assert_eq!(config.tracks.display_suffix_len, 16);
        assert!((config.player.default_volume - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            url = "https://radio.example.org"

            [polling]
            playlist_ms = 30000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.url, "https://radio.example.org");
        assert_eq!(config.server.stream_path, "/stream.mp3");
        assert_eq!(config.polling.playlist_ms, 30000);
        assert_eq!(config.polling.queue_ms, 500);
        assert_eq!(config.tracks.id_len, 11);
    }

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("jukebox-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.url, config.server.url);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
