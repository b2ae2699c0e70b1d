use crate::feed::{diff, ParsedChannel, ParsedPost};
use crate::store::{AggregateState, Feed, FeedId, IdGenerator, Post};

use super::error::SyncError;

/// What one feed contributed to a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDelta {
    /// Registered feed URL; the key the delta is merged under.
    pub url: String,
    pub channel: ParsedChannel,
    /// Posts not yet known for this feed, in document order.
    pub new_posts: Vec<ParsedPost>,
}

/// A feed that could not be synced this pass.
#[derive(Debug)]
pub struct FeedFailure {
    pub url: String,
    pub error: SyncError,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub state: AggregateState,
    pub new_feeds: usize,
    pub new_posts: usize,
    pub failures: Vec<FeedFailure>,
}

/// Result of applying a single [`FeedDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub feed_id: FeedId,
    pub created: bool,
    pub new_posts: usize,
}

/// Folds the per-feed results of a pass into the next aggregate.
///
/// Results are applied in the order given, which the engine keeps equal to
/// registration order. Failures are set aside and returned; they never stop
/// other feeds from merging. `current` is not modified.
pub fn merge(
    current: &AggregateState,
    results: Vec<Result<FeedDelta, FeedFailure>>,
    ids: &mut IdGenerator,
) -> MergeOutcome {
    let mut state = current.clone();
    let mut new_feeds = 0;
    let mut new_posts = 0;
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(delta) => {
                let applied = apply_delta(&mut state, delta, ids);
                if applied.created {
                    new_feeds += 1;
                }
                new_posts += applied.new_posts;
            }
            Err(failure) => failures.push(failure),
        }
    }

    MergeOutcome {
        state,
        new_feeds,
        new_posts,
        failures,
    }
}

/// Applies one delta in place.
///
/// An unknown URL creates a feed with a fresh id. A known URL keeps its id
/// and has its channel metadata refreshed. Either way only posts whose title
/// is new for the feed are appended, each with a fresh id.
pub fn apply_delta(state: &mut AggregateState, delta: FeedDelta, ids: &mut IdGenerator) -> Applied {
    let FeedDelta {
        url,
        channel,
        new_posts,
    } = delta;

    let (feed_id, created) = match state.feeds.iter_mut().find(|f| f.url == url) {
        Some(feed) => {
            refresh(feed, channel);
            (feed.id, false)
        }
        None => {
            let id = ids.feed_id();
            tracing::debug!(feed = %url, id = %id, "New feed");
            state.feeds.push(Feed {
                id,
                url,
                link: channel.link,
                title: channel.title,
                description: channel.description,
            });
            (id, true)
        }
    };

    let fresh = diff(
        new_posts,
        state.posts_for(feed_id).map(|p| p.title.as_str()),
    );
    let added = fresh.len();
    state.posts.extend(fresh.into_iter().map(|p| Post {
        id: ids.post_id(),
        feed_id,
        url: p.url,
        title: p.title,
        description: p.description,
    }));

    Applied {
        feed_id,
        created,
        new_posts: added,
    }
}

fn refresh(feed: &mut Feed, channel: ParsedChannel) {
    if feed.title != channel.title || feed.description != channel.description {
        tracing::debug!(feed = %feed.url, title = %channel.title, "Channel metadata changed");
    }
    feed.title = channel.title;
    feed.description = channel.description;
    feed.link = channel.link;
}
