//! The synchronization engine.
//!
//! [`SyncEngine`] owns the [`ObservableStore`](crate::store::ObservableStore)
//! and knows how to register a feed and how to run one poll pass.
//! [`Poller`] decides when passes happen and serializes requests from other
//! tasks through a [`PollerHandle`].

mod engine;
mod error;
mod merge;
mod poller;

pub use engine::{FailedFeed, PassOutcome, PassReport, SyncEngine};
pub use error::{ErrorKind, SyncError, ValidationError};
pub use merge::{apply_delta, merge, Applied, FeedDelta, FeedFailure, MergeOutcome};
pub use poller::{Poller, PollerError, PollerHandle};
