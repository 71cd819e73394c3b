use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{self, Config};
use crate::feed::FeedStore;
use crate::geo::{FixedLocation, GeolocationProvider, Unavailable};
use crate::logging;
use crate::player::Player;
use crate::profile::{ProfileSource, StubProfileSource};
use crate::seed;
use crate::ui;
use crate::upload;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub seed_file: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = load_config(&options)?;
    logging::init(&cfg.log).context("init logging")?;

    let store = open_store(&cfg, options.seed_file.as_deref())?;
    tracing::info!(posts = store.posts().len(), "feed ready");

    let config_path = options.config_file.clone().or_else(config::default_path);
    let status = format!(
        "Welcome to the feed. Config: {}",
        friendly_path(config_path.as_ref())
    );

    let profile_source: Arc<dyn ProfileSource> =
        Arc::new(StubProfileSource::new(cfg.user.display_name.clone()));
    let geolocation: Arc<dyn GeolocationProvider> = match cfg.location.fixed {
        Some(coord) => Arc::new(FixedLocation(coord)),
        None => Arc::new(Unavailable),
    };

    let options = ui::Options {
        store,
        profile_source,
        geolocation,
        uploader: upload::Reader::new(cfg.media.max_upload_bytes),
        player: Player::new(&cfg.player),
        tick_rate: cfg.ui.tick_rate,
        scroll_animation: cfg.ui.scroll_animation,
        wheel_step: cfg.ui.wheel_step,
        status_message: status,
    };

    let mut model = ui::Model::new(options);
    model.run()?;
    tracing::info!("shutting down");

    Ok(())
}

/// Loads the seed the UI would start with and renders it as JSON.
pub fn dump_seed(options: &RunOptions) -> Result<String> {
    let cfg = load_config(options)?;
    let store = open_store(&cfg, options.seed_file.as_deref())?;
    seed::to_json(&store.snapshot())
}

fn load_config(options: &RunOptions) -> Result<Config> {
    config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")
}

fn open_store(cfg: &Config, seed_file: Option<&Path>) -> Result<FeedStore> {
    let seed_path = seed_file.or(cfg.feed.seed_file.as_deref());
    let posts = seed::load(seed_path)?;
    FeedStore::from_seed(posts, cfg.feed_settings()).context("build feed")
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "defaults".to_string()
    }
}
