use serde::Serialize;
use std::fmt;

use crate::sync::ErrorKind;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a registered feed. Stable for the lifetime of the
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeedId(u64);

/// Opaque identifier of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostId(u64);

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feed-{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "post-{}", self.0)
    }
}

/// Hands out identifiers that are never reused within one engine.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_id(&mut self) -> FeedId {
        FeedId(self.bump())
    }

    pub fn post_id(&mut self) -> PostId {
        PostId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// A registered content source.
///
/// `url` is the address the user registered and the unique key of the feed;
/// `link` is the site address the channel advertises about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: FeedId,
    pub url: String,
    pub link: String,
    pub title: String,
    pub description: String,
}

/// One item of a feed. Never mutated once merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub feed_id: FeedId,
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Everything the engine knows about feeds and posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateState {
    pub feeds: Vec<Feed>,
    pub posts: Vec<Post>,
}

impl AggregateState {
    pub fn feed_by_url(&self, url: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.url == url)
    }

    pub fn posts_for(&self, feed_id: FeedId) -> impl Iterator<Item = &Post> {
        self.posts.iter().filter(move |p| p.feed_id == feed_id)
    }
}

// ============================================================================
// Status fields
// ============================================================================

/// Outcome of the most recent completed poll pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Success,
    Failed,
}

/// Where the current registration submission is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPhase {
    #[default]
    Idle,
    Validating,
    Loading,
    Parsing,
    Success,
    Failed,
}

/// Serializable view of the whole store, used by `--once` output.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub status: SyncStatus,
    pub links: &'a [String],
    pub feeds: &'a [Feed],
    pub posts: &'a [Post],
    pub viewed_posts: &'a [PostId],
    pub registration_phase: RegistrationPhase,
    pub registration_error: Option<ErrorKind>,
}
