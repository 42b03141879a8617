use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored in place of a profile attribute the source never sent.
pub const UNKNOWN_FIELD: &str = "unknown";

/// Lookup key for the generic table store. Both entity types key on a
/// 64-bit id; the store never needs to know anything else about a row.
pub trait Keyed {
    fn key(&self) -> u64;
}

/// One persisted post. Exactly one row per `post_id` after every flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: u64,
    pub full_text: String,
    pub author_id: u64,
    pub created_at: DateTime<Utc>,
    pub hashtags: Vec<String>,
    pub reshares: u64,
    pub likes: u64,
    pub replies: u64,
}

/// Profile of a post's author. Re-written whenever any post by the author
/// arrives, so the stored row always holds the latest observed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub author_id: u64,
    pub name: String,
    pub handle: String,
    pub location: String,
    pub url: String,
    pub verified: bool,
    pub bio: String,
    pub following: u64,
    pub followers: u64,
    pub posts: u64,
    pub created_at: DateTime<Utc>,
}

impl Keyed for PostRecord {
    fn key(&self) -> u64 {
        self.post_id
    }
}

impl Keyed for AuthorRecord {
    fn key(&self) -> u64 {
        self.author_id
    }
}
