#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod comments;
pub mod config;
pub mod feed;
pub mod geo;
pub mod logging;
pub mod map;
pub mod model;
pub mod player;
pub mod posts;
pub mod profile;
pub mod reactions;
pub mod router;
pub mod scroll;
pub mod seed;
pub mod ui;
pub mod upload;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
