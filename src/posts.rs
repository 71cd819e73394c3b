use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Coordinate, IdSource, NewPost, Post, PostId, PostPatch};

pub const DEFAULT_ARTIST: &str = "Current User";
/// Where newly created posts are pinned; matches the seed data.
pub const DEFAULT_LOCATION: Coordinate = Coordinate::new(40.7128, -74.0060);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("post {0} not found")]
    UnknownPost(PostId),
    #[error("duplicate post id {0}")]
    DuplicatePostId(PostId),
}

#[derive(Debug, Clone)]
pub struct Defaults {
    pub artist: String,
    pub location: Coordinate,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            artist: DEFAULT_ARTIST.to_string(),
            location: DEFAULT_LOCATION,
        }
    }
}

/// Ordered posts, newest first. Identifiers are unique.
#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    posts: Vec<Post>,
    defaults: Defaults,
    ids: IdSource,
}

impl PostCollection {
    pub fn new(defaults: Defaults) -> Self {
        Self {
            posts: Vec::new(),
            defaults,
            ids: IdSource::new(),
        }
    }

    pub fn from_seed(posts: Vec<Post>, defaults: Defaults) -> Result<Self, FeedError> {
        let mut seen = HashSet::with_capacity(posts.len());
        for post in &posts {
            if !seen.insert(post.id) {
                return Err(FeedError::DuplicatePostId(post.id));
            }
        }
        let ids = IdSource::above(posts.iter().map(|post| post.id.0));
        Ok(Self {
            posts,
            defaults,
            ids,
        })
    }

    pub fn create_post(&mut self, fields: NewPost, now: DateTime<Utc>) -> &Post {
        let post = Post {
            id: PostId(self.ids.next(now)),
            artist: self.defaults.artist.clone(),
            content: fields.content,
            media: fields.media,
            audio: fields.audio,
            location: self.defaults.location,
            flame_count: 0,
            downvote_count: 0,
        };
        tracing::info!(post = %post.id, "created post");
        self.posts.insert(0, post);
        &self.posts[0]
    }

    pub fn update_post(&mut self, id: PostId, patch: PostPatch) -> Result<(), FeedError> {
        let post = self.get_mut(id)?;
        patch.apply(post);
        Ok(())
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn get_mut(&mut self, id: PostId) -> Result<&mut Post, FeedError> {
        self.posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(FeedError::UnknownPost(id))
    }

    pub fn at(&self, index: usize) -> Option<&Post> {
        self.posts.get(index)
    }

    pub fn position(&self, id: PostId) -> Option<usize> {
        self.posts.iter().position(|post| post.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn as_slice(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seed_post(id: u64, artist: &str) -> Post {
        Post {
            id: PostId(id),
            artist: artist.into(),
            content: format!("post by {artist}"),
            media: None,
            audio: None,
            location: DEFAULT_LOCATION,
            flame_count: 0,
            downvote_count: 0,
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn create_prepends_with_fresh_id() {
        let mut posts = PostCollection::from_seed(
            vec![seed_post(1, "A"), seed_post(2, "B")],
            Defaults::default(),
        )
        .unwrap();
        let created = posts
            .create_post(
                NewPost {
                    content: "C".into(),
                    ..NewPost::default()
                },
                at(2),
            )
            .clone();
        let artists: Vec<_> = posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(artists, ["C", "post by A", "post by B"]);
        assert_ne!(created.id, PostId(1));
        assert_ne!(created.id, PostId(2));
        assert_eq!(created.artist, DEFAULT_ARTIST);
        assert_eq!(created.location, DEFAULT_LOCATION);
    }

    #[test]
    fn back_to_back_creates_get_distinct_ids() {
        let mut posts = PostCollection::default();
        let a = posts.create_post(NewPost::default(), at(1_000)).id;
        let b = posts.create_post(NewPost::default(), at(1_000)).id;
        assert_ne!(a, b);
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn duplicate_seed_ids_are_rejected() {
        let err = PostCollection::from_seed(
            vec![seed_post(1, "A"), seed_post(1, "A"), seed_post(1, "A")],
            Defaults::default(),
        )
        .unwrap_err();
        assert_eq!(err, FeedError::DuplicatePostId(PostId(1)));
    }

    #[test]
    fn update_targets_one_post() {
        let mut posts = PostCollection::from_seed(
            vec![seed_post(1, "A"), seed_post(2, "B")],
            Defaults::default(),
        )
        .unwrap();
        posts
            .update_post(
                PostId(2),
                PostPatch {
                    content: Some("edited".into()),
                    ..PostPatch::default()
                },
            )
            .unwrap();
        assert_eq!(posts.get(PostId(2)).unwrap().content, "edited");
        assert_eq!(posts.get(PostId(1)).unwrap().content, "post by A");
        assert_eq!(
            posts.update_post(PostId(9), PostPatch::default()),
            Err(FeedError::UnknownPost(PostId(9)))
        );
    }

    #[test]
    fn custom_defaults_flow_into_new_posts() {
        let mut posts = PostCollection::new(Defaults {
            artist: "Night Owl".into(),
            location: Coordinate::new(51.5, -0.12),
        });
        let post = posts.create_post(NewPost::default(), at(0));
        assert_eq!(post.artist, "Night Owl");
        assert_eq!(post.location, Coordinate::new(51.5, -0.12));
    }
}
