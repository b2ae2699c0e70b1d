//! In-memory application state and its change notifications.
//!
//! [`ObservableStore`] owns the [`AggregateState`] (feeds and posts) plus the
//! fields a presentation layer watches: pass status, registered links, the
//! registration phase and viewed posts. Renderers subscribe with a closure
//! and are told about each field write as it happens.

mod observable;
mod types;

pub use observable::{ListenerId, ObservableStore, StateChange, StatePath};
pub use types::{
    AggregateState, Feed, FeedId, IdGenerator, Post, PostId, RegistrationPhase, Snapshot,
    SyncStatus,
};
