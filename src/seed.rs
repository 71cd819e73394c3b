use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model::{Comment, Post};

/// A post as it appears in seed data, with its comment thread inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl SeedPost {
    pub fn from_parts(post: Post, comments: Vec<Comment>) -> Self {
        Self { post, comments }
    }

    pub fn into_parts(self) -> (Post, Vec<Comment>) {
        (self.post, self.comments)
    }
}

static BUNDLED: Lazy<Vec<SeedPost>> = Lazy::new(load_bundled);

fn load_bundled() -> Vec<SeedPost> {
    const RAW: &str = include_str!("../assets/seed.yaml");
    match serde_yaml::from_str(RAW) {
        Ok(posts) => posts,
        Err(err) => {
            tracing::error!("failed to parse bundled seed posts: {err}");
            Vec::new()
        }
    }
}

pub fn bundled() -> Vec<SeedPost> {
    BUNDLED.clone()
}

pub fn load_file(path: &Path) -> Result<Vec<SeedPost>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("seed: failed to read {}", path.display()))?;
    let posts: Vec<SeedPost> = serde_yaml::from_str(&data)
        .with_context(|| format!("seed: failed to parse {}", path.display()))?;
    Ok(posts)
}

/// The seed file when one is given, the bundled posts otherwise.
pub fn load(path: Option<&Path>) -> Result<Vec<SeedPost>> {
    match path {
        Some(path) => load_file(path),
        None => Ok(bundled()),
    }
}

pub fn to_json(posts: &[SeedPost]) -> Result<String> {
    serde_json::to_string_pretty(posts).context("seed: serialize posts")
}
