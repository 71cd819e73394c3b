use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{Comment, CommentId, IdSource, PostId};

pub const DEFAULT_AUTHOR: &str = "Current User";

/// Append-only comment threads keyed by post.
#[derive(Debug, Clone)]
pub struct CommentStore {
    author: String,
    threads: HashMap<PostId, Vec<Comment>>,
    ids: IdSource,
}

impl Default for CommentStore {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR)
    }
}

impl CommentStore {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            threads: HashMap::new(),
            ids: IdSource::new(),
        }
    }

    /// Appends a comment to `post`. Blank text is ignored.
    pub fn add_comment(
        &mut self,
        post: PostId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<Comment> {
        if text.trim().is_empty() {
            return None;
        }
        let comment = Comment {
            id: CommentId(self.ids.next(now)),
            author: self.author.clone(),
            content: text.to_string(),
            created_at: now,
        };
        self.threads.entry(post).or_default().push(comment.clone());
        Some(comment)
    }

    /// Seeds a thread with existing comments, keeping their ids.
    pub fn extend(&mut self, post: PostId, comments: impl IntoIterator<Item = Comment>) {
        let thread = self.threads.entry(post).or_default();
        for comment in comments {
            self.ids.reserve(comment.id.0);
            thread.push(comment);
        }
    }

    pub fn comments(&self, post: PostId) -> &[Comment] {
        self.threads.get(&post).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, post: PostId) -> usize {
        self.comments(post).len()
    }

    pub fn total(&self) -> usize {
        self.threads.values().map(Vec::len).sum()
    }
}
