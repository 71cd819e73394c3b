use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Audio => "audio/",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "music",
        }
    }
}

/// Something a post can embed: a remote URL from seed data or a data URI
/// produced from a local upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

impl MediaRef {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime: None,
            size_bytes: 0,
            checksum: String::new(),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.url.starts_with("data:")
    }

    pub fn label(&self) -> String {
        if self.is_inline() {
            let mime = self.mime.as_deref().unwrap_or("application/octet-stream");
            let short = self.checksum.get(..8).unwrap_or(&self.checksum);
            format!("{mime} upload, {} bytes [{short}]", self.size_bytes)
        } else {
            self.url.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub artist: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaRef>,
    pub location: Coordinate,
    #[serde(default)]
    pub flame_count: u64,
    #[serde(default)]
    pub downvote_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields the create form hands over; everything else is assigned by the
/// collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub content: String,
    pub media: Option<MediaRef>,
    pub audio: Option<MediaRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub content: Option<String>,
    pub media: Option<Option<MediaRef>>,
    pub audio: Option<Option<MediaRef>>,
    pub location: Option<Coordinate>,
    pub flame_count: Option<u64>,
    pub downvote_count: Option<i64>,
}

impl PostPatch {
    pub fn apply(self, post: &mut Post) {
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(media) = self.media {
            post.media = media;
        }
        if let Some(audio) = self.audio {
            post.audio = audio;
        }
        if let Some(location) = self.location {
            post.location = location;
        }
        if let Some(count) = self.flame_count {
            post.flame_count = count;
        }
        if let Some(count) = self.downvote_count {
            post.downvote_count = count;
        }
    }
}

/// Hands out timestamp-derived identifiers that never repeat, even when two
/// are requested within the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct IdSource {
    last: u64,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts above every identifier in `taken`.
    pub fn above<I: IntoIterator<Item = u64>>(taken: I) -> Self {
        Self {
            last: taken.into_iter().max().unwrap_or(0),
        }
    }

    /// Marks `id` as taken so later ids are issued above it.
    pub fn reserve(&mut self, id: u64) {
        self.last = self.last.max(id);
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last.saturating_add(1));
        self.last = id;
        id
    }
}
