use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::feed::{diff, parse, Fetcher, ParsedFeed, Transport};
use crate::store::{FeedId, IdGenerator, ObservableStore, RegistrationPhase, SyncStatus};
use crate::util::{validate_url, validate_url_format};

use super::error::{ErrorKind, SyncError, ValidationError};
use super::merge::{apply_delta, merge, FeedDelta, FeedFailure};

const DEFAULT_MAX_CONCURRENT: usize = 10;

/// How a poll pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing was registered; the store was not touched.
    Skipped,
    Success,
    PartialFailure,
    TotalFailure,
}

impl PassOutcome {
    fn from_counts(attempted: usize, failed: usize) -> Self {
        match failed {
            0 => PassOutcome::Success,
            n if n == attempted => PassOutcome::TotalFailure,
            _ => PassOutcome::PartialFailure,
        }
    }

    /// The status published for this outcome, if any.
    pub fn status(self) -> Option<SyncStatus> {
        match self {
            PassOutcome::Skipped => None,
            PassOutcome::Success => Some(SyncStatus::Success),
            PassOutcome::PartialFailure | PassOutcome::TotalFailure => Some(SyncStatus::Failed),
        }
    }
}

/// A feed that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFeed {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Summary of one [`SyncEngine::run_pass`].
#[derive(Debug, Clone)]
pub struct PassReport {
    pub outcome: PassOutcome,
    /// Feeds attempted.
    pub feeds: usize,
    pub new_posts: usize,
    /// Failed feeds in registration order.
    pub failures: Vec<FailedFeed>,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    fn skipped() -> Self {
        Self {
            outcome: PassOutcome::Skipped,
            feeds: 0,
            new_posts: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
            finished_at: Utc::now(),
        }
    }
}

/// Owns the store and performs registrations and poll passes against it.
///
/// All state changes go through `&mut self`, so registrations and passes are
/// serialized by whoever owns the engine (normally the [`Poller`] task).
///
/// [`Poller`]: super::Poller
#[derive(Debug)]
pub struct SyncEngine {
    fetcher: Fetcher,
    store: ObservableStore,
    ids: IdGenerator,
    allow_private_hosts: bool,
    max_concurrent: usize,
}

impl SyncEngine {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            store: ObservableStore::new(),
            ids: IdGenerator::new(),
            allow_private_hosts: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Builds an engine over `transport` with the configured timeout,
    /// fan-out width and host policy.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self::new(Fetcher::new(transport, config.fetch_timeout()))
            .with_private_hosts(config.allow_private_hosts)
            .with_max_concurrent(config.max_concurrent())
    }

    /// Accept feeds on localhost and private networks.
    pub fn with_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn store(&self) -> &ObservableStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ObservableStore {
        &mut self.store
    }

    /// Registers a new feed URL.
    ///
    /// The URL is validated, checked against the registered links, fetched
    /// and parsed once. Only when all of that succeeds is the feed merged and
    /// its URL appended to the links. Progress is published on
    /// `registration.phase`; a failure also sets `registration.error` and
    /// leaves feeds, posts and links untouched.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The feed URL as entered
    ///
    /// # Returns
    ///
    /// The [`FeedId`] assigned to the new feed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if:
    /// - `Validation`: the URL is malformed, uses a non-http scheme, points at
    ///   a private host, or is already registered
    /// - `Network`: the fetch failed or timed out
    /// - `Parse`: the payload is not well-formed XML, is not RSS, or lacks a
    ///   required channel or item field
    pub async fn submit_candidate(&mut self, candidate: &str) -> Result<FeedId, SyncError> {
        self.store.set_registration_error(None);
        self.store
            .set_registration_phase(RegistrationPhase::Validating);

        match self.register(candidate).await {
            Ok(feed_id) => {
                self.store.set_registration_phase(RegistrationPhase::Success);
                Ok(feed_id)
            }
            Err(e) => {
                tracing::warn!(
                    feed = %candidate.trim(),
                    error = %e,
                    kind = ?e.kind(),
                    "Feed registration failed"
                );
                self.store.set_registration_error(Some(e.kind()));
                self.store.set_registration_phase(RegistrationPhase::Failed);
                Err(e)
            }
        }
    }

    async fn register(&mut self, candidate: &str) -> Result<FeedId, SyncError> {
        let url = self.validate(candidate)?;

        self.store.set_registration_phase(RegistrationPhase::Loading);
        let bytes = self.fetcher.fetch(&url).await?;

        self.store.set_registration_phase(RegistrationPhase::Parsing);
        let ParsedFeed { channel, posts } = parse(&bytes)?;

        let delta = FeedDelta {
            url: url.clone(),
            channel,
            new_posts: diff(posts, std::iter::empty()),
        };
        let mut state = self.store.aggregate().clone();
        let applied = apply_delta(&mut state, delta, &mut self.ids);

        self.store.replace_aggregate(state);
        self.store.push_link(url.clone());

        tracing::info!(
            feed = %url,
            id = %applied.feed_id,
            posts = applied.new_posts,
            "Registered feed"
        );
        Ok(applied.feed_id)
    }

    /// Returns the normalized URL if it is well-formed and not yet registered.
    fn validate(&self, candidate: &str) -> Result<String, SyncError> {
        let parsed = if self.allow_private_hosts {
            validate_url_format(candidate)
        } else {
            validate_url(candidate)
        };
        let url = parsed?.as_str().to_owned();

        if self.store.links().contains(&url) {
            return Err(ValidationError::AlreadyExists(url).into());
        }
        Ok(url)
    }

    /// Runs one poll pass over every registered feed.
    ///
    /// Feeds are fetched concurrently (at most `max_concurrent` at a time),
    /// each through fetch, parse and dedup against the titles known when the
    /// pass began. After all of them finish, the results are merged in
    /// registration order and written to the store in one step, followed by
    /// a single status write. With nothing registered the pass is skipped
    /// and the store is not touched.
    ///
    /// # Returns
    ///
    /// A [`PassReport`] with the outcome, the number of new posts and every
    /// per-feed failure.
    ///
    /// # Errors
    ///
    /// None. A feed that fails is listed in [`PassReport::failures`], logged,
    /// and keeps its known posts; the other feeds still merge.
    pub async fn run_pass(&mut self) -> PassReport {
        if self.store.links().is_empty() {
            tracing::debug!("No feeds registered, skipping pass");
            return PassReport::skipped();
        }

        let started = Instant::now();
        let aggregate = self.store.aggregate();
        let jobs: Vec<(String, Vec<String>)> = self
            .store
            .links()
            .iter()
            .map(|url| {
                let known = aggregate
                    .feed_by_url(url)
                    .map(|feed| {
                        aggregate
                            .posts_for(feed.id)
                            .map(|p| p.title.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                (url.clone(), known)
            })
            .collect();
        let attempted = jobs.len();

        tracing::debug!(feeds = attempted, "Starting poll pass");

        let fetcher = &self.fetcher;
        let results: Vec<Result<FeedDelta, FeedFailure>> = stream::iter(jobs)
            .map(|(url, known)| sync_one(fetcher, url, known))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let merged = merge(self.store.aggregate(), results, &mut self.ids);

        let failures: Vec<FailedFeed> = merged
            .failures
            .iter()
            .map(|f| {
                tracing::warn!(
                    feed = %f.url,
                    error = %f.error,
                    kind = ?f.error.kind(),
                    "Feed failed this pass"
                );
                FailedFeed {
                    url: f.url.clone(),
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                }
            })
            .collect();
        let outcome = PassOutcome::from_counts(attempted, failures.len());

        self.store.replace_aggregate(merged.state);
        if let Some(status) = outcome.status() {
            self.store.set_status(status);
        }

        let report = PassReport {
            outcome,
            feeds: attempted,
            new_posts: merged.new_posts,
            failures,
            elapsed: started.elapsed(),
            finished_at: Utc::now(),
        };
        tracing::info!(
            outcome = ?report.outcome,
            feeds = report.feeds,
            failed = report.failures.len(),
            new_posts = report.new_posts,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Poll pass complete"
        );
        report
    }
}

/// Fetch, parse and dedup for one feed. Never touches engine state.
async fn sync_one(
    fetcher: &Fetcher,
    url: String,
    known_titles: Vec<String>,
) -> Result<FeedDelta, FeedFailure> {
    match fetch_and_parse(fetcher, &url).await {
        Ok(ParsedFeed { channel, posts }) => {
            let new_posts = diff(posts, known_titles.iter().map(String::as_str));
            Ok(FeedDelta {
                url,
                channel,
                new_posts,
            })
        }
        Err(error) => Err(FeedFailure { url, error }),
    }
}

async fn fetch_and_parse(fetcher: &Fetcher, url: &str) -> Result<ParsedFeed, SyncError> {
    let bytes = fetcher.fetch(url).await?;
    Ok(parse(&bytes)?)
}
