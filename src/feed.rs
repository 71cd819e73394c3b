use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::comments::{CommentStore, DEFAULT_AUTHOR};
use crate::model::{Comment, NewPost, Post, PostId, PostPatch};
use crate::posts::{Defaults, FeedError, PostCollection};
use crate::reactions::{ReactionCounter, ReactionEvent, Thresholds};
use crate::seed::SeedPost;

/// A point in time as both the monotonic and the wall clock see it.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub instant: Instant,
    pub wall: DateTime<Utc>,
}

impl Moment {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    Flame(PostId),
    Downvote(PostId),
    Comment { post: PostId, text: String },
    CreatePost(NewPost),
    UpdatePost { post: PostId, patch: PostPatch },
    Connect(PostId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reacted(ReactionEvent),
    Commented(Comment),
    CommentRejected,
    Created(PostId),
    Updated(PostId),
    Connected(PostId),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub defaults: Defaults,
    pub comment_author: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            defaults: Defaults::default(),
            comment_author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

/// Owns every post, comment and reaction of the session. Views read from it
/// and change it only through [`FeedStore::dispatch`].
#[derive(Debug, Clone)]
pub struct FeedStore {
    posts: PostCollection,
    comments: CommentStore,
    reactions: ReactionCounter,
}

impl FeedStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            posts: PostCollection::new(settings.defaults),
            comments: CommentStore::new(settings.comment_author),
            reactions: ReactionCounter::new(settings.thresholds),
        }
    }

    pub fn from_seed(seed: Vec<SeedPost>, settings: Settings) -> Result<Self, FeedError> {
        let mut comments = CommentStore::new(settings.comment_author);
        let mut posts = Vec::with_capacity(seed.len());
        for entry in seed {
            let (post, thread) = entry.into_parts();
            comments.extend(post.id, thread);
            posts.push(post);
        }
        Ok(Self {
            posts: PostCollection::from_seed(posts, settings.defaults)?,
            comments,
            reactions: ReactionCounter::new(settings.thresholds),
        })
    }

    pub fn dispatch(&mut self, intent: Intent, now: Moment) -> Result<Outcome, FeedError> {
        match intent {
            Intent::Flame(id) => {
                let post = self.posts.get_mut(id)?;
                let event = self.reactions.apply_flame(post, now.instant);
                tracing::info!(post = %id, "flamed post");
                Ok(Outcome::Reacted(event))
            }
            Intent::Downvote(id) => {
                let post = self.posts.get_mut(id)?;
                let event = self.reactions.apply_downvote(post);
                tracing::info!(post = %id, "downvoted post");
                Ok(Outcome::Reacted(event))
            }
            Intent::Comment { post, text } => {
                if self.posts.get(post).is_none() {
                    return Err(FeedError::UnknownPost(post));
                }
                match self.comments.add_comment(post, &text, now.wall) {
                    Some(comment) => {
                        tracing::debug!(post = %post, comment = %comment.id, "added comment");
                        Ok(Outcome::Commented(comment))
                    }
                    None => Ok(Outcome::CommentRejected),
                }
            }
            Intent::CreatePost(fields) => {
                let id = self.posts.create_post(fields, now.wall).id;
                Ok(Outcome::Created(id))
            }
            Intent::UpdatePost { post, patch } => {
                self.posts.update_post(post, patch)?;
                Ok(Outcome::Updated(post))
            }
            Intent::Connect(id) => {
                if self.posts.get(id).is_none() {
                    return Err(FeedError::UnknownPost(id));
                }
                tracing::info!(post = %id, "connected with post");
                Ok(Outcome::Connected(id))
            }
        }
    }

    pub fn posts(&self) -> &PostCollection {
        &self.posts
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn comments(&self, id: PostId) -> &[Comment] {
        self.comments.comments(id)
    }

    pub fn is_flaming(&self, id: PostId, now: Instant) -> bool {
        self.posts
            .get(id)
            .map(|post| self.reactions.is_flaming(post, now))
            .unwrap_or(false)
    }

    pub fn is_downvote_flagged(&self, id: PostId) -> bool {
        self.posts
            .get(id)
            .map(|post| self.reactions.is_downvote_flagged(post))
            .unwrap_or(false)
    }

    /// Closes expired flame windows; true when the display changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.reactions.expire(now)
    }

    pub fn has_live_flares(&self) -> bool {
        self.reactions.has_live_flares()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.reactions.thresholds()
    }

    pub fn snapshot(&self) -> Vec<SeedPost> {
        self.posts
            .iter()
            .map(|post| SeedPost::from_parts(post.clone(), self.comments.comments(post.id).to_vec()))
            .collect()
    }
}
