use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::feed;
use crate::model::Coordinate;
use crate::posts::{self, DEFAULT_LOCATION};
use crate::profile::DEFAULT_DISPLAY_NAME;
use crate::reactions::{self, Thresholds};
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;

const DEFAULT_ENV_PREFIX: &str = "FLAMEFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl Config {
    pub fn feed_settings(&self) -> feed::Settings {
        feed::Settings {
            thresholds: Thresholds {
                flame: self.feed.flame_threshold,
                downvote: self.feed.downvote_threshold,
                flame_display: self.feed.flame_display,
            },
            defaults: posts::Defaults {
                artist: self.user.name.clone(),
                location: self.feed.default_location,
            },
            comment_author: self.user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_flame_threshold")]
    pub flame_threshold: u64,
    #[serde(default = "default_downvote_threshold")]
    pub downvote_threshold: i64,
    #[serde(default = "default_flame_display", with = "humantime_serde")]
    pub flame_display: Duration,
    #[serde(default = "default_location")]
    pub default_location: Coordinate,
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            flame_threshold: default_flame_threshold(),
            downvote_threshold: default_downvote_threshold(),
            flame_display: default_flame_display(),
            default_location: default_location(),
            seed_file: None,
        }
    }
}

fn default_flame_threshold() -> u64 {
    reactions::DEFAULT_FLAME_THRESHOLD
}

fn default_downvote_threshold() -> i64 {
    reactions::DEFAULT_DOWNVOTE_THRESHOLD
}

fn default_flame_display() -> Duration {
    reactions::DEFAULT_FLAME_DISPLAY
}

fn default_location() -> Coordinate {
    DEFAULT_LOCATION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserConfig {
    /// Author label on posts and comments made in this session.
    #[serde(default = "default_user_name")]
    pub name: String,
    /// Name shown on the viewer's own profile.
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            display_name: default_display_name(),
        }
    }
}

fn default_user_name() -> String {
    posts::DEFAULT_ARTIST.into()
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_tick_rate", with = "humantime_serde")]
    pub tick_rate: Duration,
    #[serde(default = "default_scroll_animation", with = "humantime_serde")]
    pub scroll_animation: Duration,
    #[serde(default = "default_wheel_step")]
    pub wheel_step: u16,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            scroll_animation: default_scroll_animation(),
            wheel_step: default_wheel_step(),
        }
    }
}

fn default_tick_rate() -> Duration {
    Duration::from_millis(50)
}

fn default_scroll_animation() -> Duration {
    Duration::from_millis(300)
}

fn default_wheel_step() -> u16 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LocationConfig {
    /// Position reported by the geolocation provider. Unset means the
    /// lookup fails and the map keeps waiting.
    #[serde(default)]
    pub fixed: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_audio_command")]
    pub audio_command: Vec<String>,
    #[serde(default = "default_image_command")]
    pub image_command: Vec<String>,
    /// Where uploaded media is written before an external program opens it.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_command: default_audio_command(),
            image_command: default_image_command(),
            spool_dir: default_spool_dir(),
        }
    }
}

fn default_audio_command() -> Vec<String> {
    vec![
        "mpv".into(),
        "--no-video".into(),
        "--really-quiet".into(),
        "--force-media-title=%TITLE%".into(),
        "%URL%".into(),
    ]
}

fn default_image_command() -> Vec<String> {
    vec![
        "mpv".into(),
        "--force-window=yes".into(),
        "--image-display-duration=inf".into(),
        "--really-quiet".into(),
        "%URL%".into(),
    ]
}

fn default_spool_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("flamefeed").join("media"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("flamefeed").join("flamefeed.log"))
}

fn default_log_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            cfg = read_config_file(path)?;
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = read_config_file(&default_path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.flame_threshold" => {
            if let Ok(parsed) = value.parse::<u64>() {
                cfg.feed.flame_threshold = parsed;
            }
        }
        "feed.downvote_threshold" => {
            if let Ok(parsed) = value.parse::<i64>() {
                cfg.feed.downvote_threshold = parsed;
            }
        }
        "feed.flame_display" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.flame_display = duration;
            }
        }
        "feed.default_location" => {
            if let Some(coord) = parse_coordinate(&value) {
                cfg.feed.default_location = coord;
            }
        }
        "feed.seed_file" => cfg.feed.seed_file = Some(PathBuf::from(value)),
        "user.name" => cfg.user.name = value,
        "user.display_name" => cfg.user.display_name = value,
        "ui.tick_rate" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.tick_rate = duration;
            }
        }
        "ui.scroll_animation" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.scroll_animation = duration;
            }
        }
        "ui.wheel_step" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.ui.wheel_step = parsed;
            }
        }
        "media.max_upload_bytes" => {
            if let Ok(parsed) = value.parse::<u64>() {
                cfg.media.max_upload_bytes = parsed;
            }
        }
        "location.fixed" => cfg.location.fixed = parse_coordinate(&value),
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" => cfg.log.filter = value,
        "player.audio_command" => {
            let parts = split_command(&value);
            if !parts.is_empty() {
                cfg.player.audio_command = parts;
            }
        }
        "player.image_command" => {
            let parts = split_command(&value);
            if !parts.is_empty() {
                cfg.player.image_command = parts;
            }
        }
        "player.spool_dir" => cfg.player.spool_dir = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Parses `"lat,lng"`.
fn parse_coordinate(value: &str) -> Option<Coordinate> {
    let (lat, lng) = value.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lng = lng.trim().parse::<f64>().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(Coordinate::new(lat, lng))
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("flamefeed").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated() -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/flamefeed.yaml")),
            env_prefix: Some("FLAMEFEED_TEST_NONE".into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated()).unwrap();
        assert_eq!(cfg.feed.flame_threshold, 5);
        assert_eq!(cfg.feed.downvote_threshold, -3);
        assert_eq!(cfg.feed.flame_display, Duration::from_millis(1500));
        assert_eq!(cfg.feed.default_location, DEFAULT_LOCATION);
        assert_eq!(cfg.user.name, "Current User");
        assert!(cfg.location.fixed.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "feed:\n  flame_threshold: 3\n  flame_display: 2s\nuser:\n  name: Beat Smith\nlocation:\n  fixed: { lat: 51.5, lng: -0.12 }\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("FLAMEFEED_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.feed.flame_threshold, 3);
        assert_eq!(cfg.feed.downvote_threshold, -3);
        assert_eq!(cfg.feed.flame_display, Duration::from_secs(2));
        assert_eq!(cfg.location.fixed, Some(Coordinate::new(51.5, -0.12)));

        let settings = cfg.feed_settings();
        assert_eq!(settings.thresholds.flame, 3);
        assert_eq!(settings.defaults.artist, "Beat Smith");
        assert_eq!(settings.comment_author, "Beat Smith");
    }

    #[test]
    fn env_overrides() {
        env::set_var("FLAMEFEED_ENVTEST_FEED__DOWNVOTE_THRESHOLD", "-10");
        env::set_var("FLAMEFEED_ENVTEST_LOCATION__FIXED", "48.85, 2.35");
        env::set_var("FLAMEFEED_ENVTEST_UI__TICK_RATE", "100ms");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/flamefeed.yaml")),
            env_prefix: Some("FLAMEFEED_ENVTEST".into()),
        })
        .unwrap();
        assert_eq!(cfg.feed.downvote_threshold, -10);
        assert_eq!(cfg.location.fixed, Some(Coordinate::new(48.85, 2.35)));
        assert_eq!(cfg.ui.tick_rate, Duration::from_millis(100));
        env::remove_var("FLAMEFEED_ENVTEST_FEED__DOWNVOTE_THRESHOLD");
        env::remove_var("FLAMEFEED_ENVTEST_LOCATION__FIXED");
        env::remove_var("FLAMEFEED_ENVTEST_UI__TICK_RATE");
    }

    #[test]
    fn player_command_from_env() {
        env::set_var("FLAMEFEED_PLAYERTEST_PLAYER__AUDIO_COMMAND", "vlc --intf dummy %URL%");
        env::set_var("FLAMEFEED_PLAYERTEST_PLAYER__IMAGE_COMMAND", "   ");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/flamefeed.yaml")),
            env_prefix: Some("FLAMEFEED_PLAYERTEST".into()),
        })
        .unwrap();
        assert_eq!(cfg.player.audio_command, ["vlc", "--intf", "dummy", "%URL%"]);
        assert_eq!(cfg.player.image_command, default_image_command());
        env::remove_var("FLAMEFEED_PLAYERTEST_PLAYER__AUDIO_COMMAND");
        env::remove_var("FLAMEFEED_PLAYERTEST_PLAYER__IMAGE_COMMAND");
    }

    #[test]
    fn bad_coordinates_are_ignored() {
        assert!(parse_coordinate("95,0").is_none());
        assert!(parse_coordinate("north").is_none());
        assert_eq!(parse_coordinate("1,2"), Some(Coordinate::new(1.0, 2.0)));
    }
}
