use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const OWN_PROFILE_ID: &str = "current";
pub const DEFAULT_DISPLAY_NAME: &str = "Music Maestro";
const OTHER_USER_NAME: &str = "Other User";
const STUB_BIO: &str = "Passionate about creating electronic beats and melodies. Always looking for new collaborations and inspirations.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPost {
    pub id: u64,
    pub content: String,
    pub created_ago: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub bio: String,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub recent_posts: Vec<RecentPost>,
}

impl Profile {
    pub fn is_own(&self) -> bool {
        self.id == OWN_PROFILE_ID
    }
}

pub trait ProfileSource: Send + Sync {
    /// Loads the profile of `user`, or the viewer's own when `None`.
    fn load(&self, user: Option<&str>) -> Result<Profile>;
}

/// Answers every request with the same canned profile.
#[derive(Debug, Clone)]
pub struct StubProfileSource {
    own_name: String,
}

impl Default for StubProfileSource {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_NAME)
    }
}

impl StubProfileSource {
    pub fn new(own_name: impl Into<String>) -> Self {
        Self {
            own_name: own_name.into(),
        }
    }
}

impl ProfileSource for StubProfileSource {
    fn load(&self, user: Option<&str>) -> Result<Profile> {
        let (id, name) = match user {
            Some(user) => (user.to_string(), OTHER_USER_NAME.to_string()),
            None => (OWN_PROFILE_ID.to_string(), self.own_name.clone()),
        };
        Ok(Profile {
            id,
            name,
            bio: STUB_BIO.to_string(),
            followers: 250,
            following: 100,
            posts: 50,
            recent_posts: vec![
                RecentPost {
                    id: 1,
                    content: "New track preview!".into(),
                    created_ago: "2 days ago".into(),
                },
                RecentPost {
                    id: 2,
                    content: "Looking for vocalists".into(),
                    created_ago: "1 week ago".into(),
                },
            ],
        })
    }
}
