//! Raw event decoding
//!
//! Resolves each incoming event to its canonical content before it enters
//! the write queue:
//! - a reshare wrapper decodes to exactly one record carrying the *target's*
//!   id (the wrapper itself adds nothing and produces nothing),
//! - a quote wrapper decodes to two records (the quoting post and the quoted
//!   target),
//! - an ordinary post decodes to one record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{AuthorRecord, PostRecord, UNKNOWN_FIELD};

/// Wire schema of one raw post. Optional attributes are explicit nullable
/// fields checked at decode time, never probed at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub id: u64,
    pub text: String,
    /// Long-form text, preferred over the truncated `text` when present.
    #[serde(default)]
    pub extended_text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub reshare_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    pub author: RawAuthor,
    /// Set when this post is a reshare wrapper around another post.
    #[serde(default)]
    pub reshared_post: Option<Box<RawPost>>,
    /// Set when this post quotes another post while adding its own text.
    #[serde(default)]
    pub quoted_post: Option<Box<RawPost>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAuthor {
    pub id: u64,
    pub name: String,
    pub handle: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub post_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Queue item: one post together with the latest profile of its author.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub post: PostRecord,
    pub author: AuthorRecord,
}

/// Resolve one raw event to zero, one, or two decoded records.
pub fn decode_event(mut raw: RawPost) -> Vec<DecodedRecord> {
    if let Some(target) = raw.reshared_post.take() {
        // Reshares carry no new content; only the original is recorded.
        return vec![decode_single(*target)];
    }

    if let Some(quoted) = raw.quoted_post.take() {
        return vec![decode_single(raw), decode_single(*quoted)];
    }

    vec![decode_single(raw)]
}

fn decode_single(raw: RawPost) -> DecodedRecord {
    let author = AuthorRecord {
        author_id: raw.author.id,
        name: raw.author.name,
        handle: raw.author.handle,
        location: raw.author.location.unwrap_or_else(unknown),
        url: raw.author.url.unwrap_or_else(unknown),
        verified: raw.author.verified,
        bio: raw.author.bio.unwrap_or_else(unknown),
        following: raw.author.following,
        followers: raw.author.followers,
        posts: raw.author.post_count,
        created_at: raw.author.created_at,
    };

    let post = PostRecord {
        post_id: raw.id,
        full_text: raw.extended_text.unwrap_or(raw.text),
        author_id: author.author_id,
        created_at: raw.created_at,
        hashtags: raw.hashtags,
        reshares: raw.reshare_count,
        likes: raw.like_count,
        replies: raw.reply_count,
    };

    log::debug!(
        "Decoded post {} by @{}: {:.80}",
        post.post_id,
        author.handle,
        post.full_text
    );

    DecodedRecord { post, author }
}

fn unknown() -> String {
    UNKNOWN_FIELD.to_string()
}
