use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::{Post, PostId};

pub const DEFAULT_FLAME_THRESHOLD: u64 = 5;
pub const DEFAULT_DOWNVOTE_THRESHOLD: i64 = -3;
pub const DEFAULT_FLAME_DISPLAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub flame: u64,
    pub downvote: i64,
    pub flame_display: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            flame: DEFAULT_FLAME_THRESHOLD,
            downvote: DEFAULT_DOWNVOTE_THRESHOLD,
            flame_display: DEFAULT_FLAME_DISPLAY,
        }
    }
}

/// A value that is live until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExpiringFlag {
    expires_at: Instant,
}

impl ExpiringFlag {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionEvent {
    Flamed {
        post: PostId,
        count: u64,
        flaming: bool,
    },
    Downvoted {
        post: PostId,
        count: i64,
        flagged: bool,
    },
}

impl ReactionEvent {
    pub fn post(&self) -> PostId {
        match self {
            ReactionEvent::Flamed { post, .. } | ReactionEvent::Downvoted { post, .. } => *post,
        }
    }
}

/// Applies flames and downvotes to posts and derives their display status.
///
/// Counts live on the [`Post`] itself; the counter only keeps the transient
/// flame windows, one per post.
#[derive(Debug, Clone, Default)]
pub struct ReactionCounter {
    thresholds: Thresholds,
    flares: HashMap<PostId, ExpiringFlag>,
}

impl ReactionCounter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            flares: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn apply_flame(&mut self, post: &mut Post, now: Instant) -> ReactionEvent {
        post.flame_count = post.flame_count.saturating_add(1);
        // A flame inside a live window restarts it.
        self.flares.insert(
            post.id,
            ExpiringFlag {
                expires_at: now + self.thresholds.flame_display,
            },
        );
        let flaming = self.is_flaming(post, now);
        if self.is_on_fire(post) {
            tracing::debug!(post = %post.id, count = post.flame_count, "flame threshold reached");
        }
        ReactionEvent::Flamed {
            post: post.id,
            count: post.flame_count,
            flaming,
        }
    }

    pub fn apply_downvote(&mut self, post: &mut Post) -> ReactionEvent {
        post.downvote_count = post.downvote_count.saturating_sub(1);
        let flagged = self.is_downvote_flagged(post);
        if flagged {
            tracing::info!(post = %post.id, count = post.downvote_count, "downvote threshold reached");
        }
        ReactionEvent::Downvoted {
            post: post.id,
            count: post.downvote_count,
            flagged,
        }
    }

    /// Sticky status: true once the flame count reaches the threshold.
    pub fn is_on_fire(&self, post: &Post) -> bool {
        post.flame_count >= self.thresholds.flame
    }

    /// True while a recent flame's display window is open.
    pub fn is_flaring(&self, post: PostId, now: Instant) -> bool {
        self.flares
            .get(&post)
            .map(|flag| flag.is_live(now))
            .unwrap_or(false)
    }

    pub fn is_flaming(&self, post: &Post, now: Instant) -> bool {
        self.is_on_fire(post) || self.is_flaring(post.id, now)
    }

    pub fn is_downvote_flagged(&self, post: &Post) -> bool {
        post.downvote_count <= self.thresholds.downvote
    }

    /// Drops expired windows. Returns true when any window closed, so the
    /// caller knows to redraw.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.flares.len();
        self.flares.retain(|_, flag| flag.is_live(now));
        self.flares.len() != before
    }

    pub fn has_live_flares(&self) -> bool {
        !self.flares.is_empty()
    }
}
