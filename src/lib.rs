//! Feed synchronization engine: registers RSS feeds, polls them on a fixed
//! cadence and merges new posts into an observable in-memory store.

pub mod config;
pub mod feed;
pub mod store;
pub mod sync;
pub mod util;
