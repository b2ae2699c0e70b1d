use std::fmt;

use super::types::{
    AggregateState, Feed, Post, PostId, RegistrationPhase, Snapshot, SyncStatus,
};
use crate::sync::ErrorKind;

/// Field paths a listener can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatePath {
    Feeds,
    Posts,
    Status,
    Links,
    RegistrationPhase,
    RegistrationError,
    ViewedPosts,
}

impl StatePath {
    pub fn as_str(self) -> &'static str {
        match self {
            StatePath::Feeds => "feeds",
            StatePath::Posts => "posts",
            StatePath::Status => "status",
            StatePath::Links => "links",
            StatePath::RegistrationPhase => "registration.phase",
            StatePath::RegistrationError => "registration.error",
            StatePath::ViewedPosts => "ui.viewedPosts",
        }
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field write: the path and the value it now holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange<'a> {
    Feeds(&'a [Feed]),
    Posts(&'a [Post]),
    Status(SyncStatus),
    Links(&'a [String]),
    RegistrationPhase(RegistrationPhase),
    RegistrationError(Option<ErrorKind>),
    ViewedPosts(&'a [PostId]),
}

impl StateChange<'_> {
    pub fn path(&self) -> StatePath {
        match self {
            StateChange::Feeds(_) => StatePath::Feeds,
            StateChange::Posts(_) => StatePath::Posts,
            StateChange::Status(_) => StatePath::Status,
            StateChange::Links(_) => StatePath::Links,
            StateChange::RegistrationPhase(_) => StatePath::RegistrationPhase,
            StateChange::RegistrationError(_) => StatePath::RegistrationError,
            StateChange::ViewedPosts(_) => StatePath::ViewedPosts,
        }
    }
}

/// Handle returned by [`ObservableStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&StateChange<'_>) + Send>;

/// Application state behind a write interceptor.
///
/// Every setter stores the value and then calls each listener, in
/// subscription order, on the caller's task before returning. There is no
/// queue and no coalescing: two writes mean two notifications.
#[derive(Default)]
pub struct ObservableStore {
    aggregate: AggregateState,
    status: SyncStatus,
    links: Vec<String>,
    registration_phase: RegistrationPhase,
    registration_error: Option<ErrorKind>,
    viewed_posts: Vec<PostId>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl ObservableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every subsequent write.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&StateChange<'_>) + Send + 'static,
    {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    // --- reads ---

    pub fn aggregate(&self) -> &AggregateState {
        &self.aggregate
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.aggregate.feeds
    }

    pub fn posts(&self) -> &[Post] {
        &self.aggregate.posts
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.aggregate.posts.iter().find(|p| p.id == id)
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn registration_phase(&self) -> RegistrationPhase {
        self.registration_phase
    }

    pub fn registration_error(&self) -> Option<ErrorKind> {
        self.registration_error
    }

    pub fn viewed_posts(&self) -> &[PostId] {
        &self.viewed_posts
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            status: self.status,
            links: &self.links,
            feeds: &self.aggregate.feeds,
            posts: &self.aggregate.posts,
            viewed_posts: &self.viewed_posts,
            registration_phase: self.registration_phase,
            registration_error: self.registration_error,
        }
    }

    // --- writes ---

    /// Installs the aggregate produced by one merge.
    ///
    /// `feeds` and `posts` are each written (and announced) only when they
    /// differ from the current value, feeds first so a listener reacting to
    /// `posts` can always resolve the owning feed.
    pub fn replace_aggregate(&mut self, next: AggregateState) {
        let AggregateState { feeds, posts } = next;

        if feeds != self.aggregate.feeds {
            self.aggregate.feeds = feeds;
            Self::notify(
                &mut self.listeners,
                StateChange::Feeds(&self.aggregate.feeds),
            );
        }
        if posts != self.aggregate.posts {
            self.aggregate.posts = posts;
            Self::notify(
                &mut self.listeners,
                StateChange::Posts(&self.aggregate.posts),
            );
        }
    }

    pub fn set_status(&mut self, status: SyncStatus) {
        self.status = status;
        Self::notify(&mut self.listeners, StateChange::Status(status));
    }

    pub fn push_link(&mut self, url: String) {
        self.links.push(url);
        Self::notify(&mut self.listeners, StateChange::Links(&self.links));
    }

    pub fn set_registration_phase(&mut self, phase: RegistrationPhase) {
        self.registration_phase = phase;
        Self::notify(&mut self.listeners, StateChange::RegistrationPhase(phase));
    }

    pub fn set_registration_error(&mut self, error: Option<ErrorKind>) {
        self.registration_error = error;
        Self::notify(&mut self.listeners, StateChange::RegistrationError(error));
    }

    /// Records that a post has been opened. Unknown ids are refused; a post
    /// already marked is not announced twice.
    pub fn mark_viewed(&mut self, id: PostId) -> bool {
        if self.post(id).is_none() {
            return false;
        }
        if !self.viewed_posts.contains(&id) {
            self.viewed_posts.push(id);
            Self::notify(
                &mut self.listeners,
                StateChange::ViewedPosts(&self.viewed_posts),
            );
        }
        true
    }

    fn notify(listeners: &mut [(ListenerId, Listener)], change: StateChange<'_>) {
        tracing::trace!(path = %change.path(), listeners = listeners.len(), "State write");
        for (_, listener) in listeners.iter_mut() {
            listener(&change);
        }
    }
}

impl fmt::Debug for ObservableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStore")
            .field("feeds", &self.aggregate.feeds.len())
            .field("posts", &self.aggregate.posts.len())
            .field("status", &self.status)
            .field("links", &self.links)
            .field("registration_phase", &self.registration_phase)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
