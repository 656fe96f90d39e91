//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIR: &str = "tunecli";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Could not determine the user config directory")]
  NoConfigDir,
  #[error("Failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Application configuration as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Additional MPV command-line arguments.
  #[serde(default)]
  pub mpv_args: Vec<String>,

  /// Fixed IPC socket path (None = unique per instance).
  #[serde(default)]
  pub socket_path: Option<String>,

  /// Volume applied when the engine starts.
  #[serde(default = "default_volume")]
  pub volume: u8,

  #[serde(default = "default_startup_timeout_ms")]
  pub startup_timeout_ms: u64,

  #[serde(default = "default_command_timeout_ms")]
  pub command_timeout_ms: u64,

  /// How long a graceful quit may take before the engine is killed.
  #[serde(default = "default_shutdown_timeout_ms")]
  pub shutdown_timeout_ms: u64,

  /// Buffered notifications per subscriber before drops start.
  #[serde(default = "default_subscriber_capacity")]
  pub subscriber_capacity: usize,

  /// Custom yt-dlp executable path (None = look up on PATH).
  #[serde(default)]
  pub yt_dlp_path: Option<String>,

  /// Directories scanned for audio files; `~/` is expanded.
  #[serde(default)]
  pub music_dirs: Vec<String>,

  /// Named radio streams playable with `--station`.
  #[serde(default)]
  pub stations: Vec<RadioStation>,
}

/// A named internet radio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioStation {
  pub name: String,
  pub url: String,
  #[serde(default)]
  pub tags: Vec<String>,
}

impl RadioStation {
  pub fn validate(&self) -> Result<(), String> {
    if self.name.trim().is_empty() {
      return Err("name cannot be empty".to_string());
    }
    let url = self.url.trim();
    if url.is_empty() {
      return Err("URL cannot be empty".to_string());
    }
    if !has_url_scheme(url) {
      return Err(format!("invalid URL: {}", url));
    }
    Ok(())
  }
}

/// `scheme://rest` with an RFC 3986 scheme and something after it.
fn has_url_scheme(url: &str) -> bool {
  let Some((scheme, rest)) = url.split_once("://") else {
    return false;
  };
  let mut chars = scheme.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    && !rest.is_empty()
    && !rest.chars().any(char::is_whitespace)
}

fn default_volume() -> u8 {
  100
}

fn default_startup_timeout_ms() -> u64 {
  5000
}

fn default_command_timeout_ms() -> u64 {
  3000
}

fn default_shutdown_timeout_ms() -> u64 {
  2000
}

fn default_subscriber_capacity() -> usize {
  10
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      mpv_path: None,
      mpv_args: Vec::new(),
      socket_path: None,
      volume: default_volume(),
      startup_timeout_ms: default_startup_timeout_ms(),
      command_timeout_ms: default_command_timeout_ms(),
      shutdown_timeout_ms: default_shutdown_timeout_ms(),
      subscriber_capacity: default_subscriber_capacity(),
      yt_dlp_path: None,
      music_dirs: Vec::new(),
      stations: Vec::new(),
    }
  }
}

impl AppConfig {
  /// Default location: `<config_dir>/tunecli/config.json`.
  pub fn default_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
      .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
      .ok_or(ConfigError::NoConfigDir)
  }

  /// Load from the default location, falling back to defaults if no file exists.
  pub fn load() -> Result<Self, ConfigError> {
    let path = Self::default_path()?;
    if !path.exists() {
      log::info!("No config at {}, using defaults", path.display());
      return Ok(Self::default());
    }
    Self::load_from(&path)
  }

  /// Load and validate a specific config file.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    config.validate().map_err(ConfigError::Invalid)?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.volume > 100 {
      return Err("Volume must be between 0 and 100".to_string());
    }
    if self.startup_timeout_ms == 0 {
      return Err("Startup timeout must be greater than zero".to_string());
    }
    if self.command_timeout_ms == 0 {
      return Err("Command timeout must be greater than zero".to_string());
    }
    if self.shutdown_timeout_ms == 0 {
      return Err("Shutdown timeout must be greater than zero".to_string());
    }
    if self.subscriber_capacity == 0 {
      return Err("Subscriber capacity must be at least 1".to_string());
    }
    if is_blank(&self.mpv_path) {
      return Err("MPV path cannot be blank".to_string());
    }
    if is_blank(&self.socket_path) {
      return Err("Socket path cannot be blank".to_string());
    }
    if is_blank(&self.yt_dlp_path) {
      return Err("yt-dlp path cannot be blank".to_string());
    }
    if self.music_dirs.iter().any(|dir| dir.trim().is_empty()) {
      return Err("Music directory cannot be blank".to_string());
    }
    for (i, station) in self.stations.iter().enumerate() {
      station
        .validate()
        .map_err(|e| format!("Station {}: {}", i, e))?;
    }
    Ok(())
  }

  /// Look up a station by name, ignoring case and surrounding whitespace.
  pub fn station(&self, name: &str) -> Option<&RadioStation> {
    let name = name.trim();
    self
      .stations
      .iter()
      .find(|station| station.name.trim().eq_ignore_ascii_case(name))
  }

  /// Runtime view used by the player.
  pub fn player_config(&self) -> PlayerConfig {
    PlayerConfig {
      mpv_path: self.mpv_path.as_ref().map(PathBuf::from),
      extra_args: self.mpv_args.clone(),
      socket_path: self.socket_path.as_ref().map(PathBuf::from),
      initial_volume: self.volume.min(100),
      startup_timeout: Duration::from_millis(self.startup_timeout_ms),
      command_timeout: Duration::from_millis(self.command_timeout_ms),
      shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
      subscriber_capacity: self.subscriber_capacity.max(1),
    }
  }
}

fn is_blank(value: &Option<String>) -> bool {
  value.as_deref().is_some_and(|s| s.trim().is_empty())
}

/// Settings consumed by [`crate::mpv::Player`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
  pub mpv_path: Option<PathBuf>,
  pub extra_args: Vec<String>,
  pub socket_path: Option<PathBuf>,
  pub initial_volume: u8,
  pub startup_timeout: Duration,
  pub command_timeout: Duration,
  pub shutdown_timeout: Duration,
  pub subscriber_capacity: usize,
}

impl Default for PlayerConfig {
  fn default() -> Self {
    AppConfig::default().player_config()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_object_uses_defaults() {
    let config: AppConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, AppConfig::default());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_camel_case_fields() {
    let json = r#"{"mpvPath":"/opt/mpv","mpvArgs":["--ao=pulse"],"volume":40,"commandTimeoutMs":500}"#;
    let config: AppConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.mpv_path.as_deref(), Some("/opt/mpv"));
    assert_eq!(config.mpv_args, vec!["--ao=pulse".to_string()]);

    let player = config.player_config();
    assert_eq!(player.initial_volume, 40);
    assert_eq!(player.command_timeout, Duration::from_millis(500));
    assert_eq!(player.startup_timeout, Duration::from_secs(5));
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let config = AppConfig {
      volume: 101,
      ..AppConfig::default()
    };
    assert!(config.validate().is_err());

    let config = AppConfig {
      shutdown_timeout_ms: 0,
      ..AppConfig::default()
    };
    assert!(config.validate().is_err());

    let config = AppConfig {
      socket_path: Some("   ".to_string()),
      ..AppConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"socketPath":"/tmp/x.sock","subscriberCapacity":4}"#).unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.socket_path.as_deref(), Some("/tmp/x.sock"));
    assert_eq!(config.player_config().subscriber_capacity, 4);
  }

  #[test]
  fn test_load_from_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));

    std::fs::write(&path, r#"{"volume":250}"#).unwrap();
    assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Invalid(_))));

    let missing = dir.path().join("missing.json");
    assert!(matches!(AppConfig::load_from(&missing), Err(ConfigError::Read { .. })));
  }

  fn station(name: &str, url: &str) -> RadioStation {
    RadioStation {
      name: name.to_string(),
      url: url.to_string(),
      tags: Vec::new(),
    }
  }

  #[test]
  fn test_library_and_stations_from_json() {
    let json = r#"{
      "musicDirs": ["~/Music", "/srv/audio"],
      "stations": [
        {"name": "Groove Salad", "url": "https://ice.somafm.com/groovesalad", "tags": ["ambient"]},
        {"name": "Local", "url": "http://127.0.0.1:8000/stream"}
      ]
    }"#;
    let config: AppConfig = serde_json::from_str(json).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.music_dirs, vec!["~/Music", "/srv/audio"]);
    assert_eq!(config.stations[0].tags, vec!["ambient"]);
    assert!(config.stations[1].tags.is_empty());

    assert_eq!(
      config.station("  groove salad ").map(|s| s.url.as_str()),
      Some("https://ice.somafm.com/groovesalad")
    );
    assert!(config.station("Missing").is_none());
  }

  #[test]
  fn test_station_validation() {
    assert!(station("Radio", "https://example.com/live").validate().is_ok());
    assert!(station("Radio", "icecast+http://host:8000/a").validate().is_ok());
    assert!(station(" ", "https://example.com/live").validate().is_err());
    assert!(station("Radio", "   ").validate().is_err());
    assert!(station("Radio", "example.com/live").validate().is_err());
    assert!(station("Radio", "://example.com").validate().is_err());
    assert!(station("Radio", "http://").validate().is_err());
    assert!(station("Radio", "http://exa mple.com").validate().is_err());

    let config = AppConfig {
      stations: vec![station("Good", "https://a.example"), station("Bad", "nope")],
      ..AppConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.starts_with("Station 1"), "{}", err);
  }

  #[test]
  fn test_blank_music_dir_rejected() {
    let config = AppConfig {
      music_dirs: vec!["/srv/music".to_string(), "  ".to_string()],
      ..AppConfig::default()
    };
    assert!(config.validate().is_err());
  }
}
