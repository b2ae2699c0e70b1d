//! Feed retrieval and decoding.
//!
//! Everything here is stateless with respect to the engine:
//!
//! - [`transport`] - where bytes come from (`HttpTransport`, `ProxyTransport`)
//! - [`fetcher`] - one bounded fetch on top of a transport
//! - [`parser`] - strict RSS decoding into [`ParsedFeed`]
//! - [`dedup`] - which parsed posts are new for a feed
//!
//! # Example
//!
//! ```ignore
//! let bytes = fetcher.fetch(url).await?;
//! let parsed = parse(&bytes)?;
//! let new_posts = diff(parsed.posts, known_titles);
//! ```

pub mod dedup;
pub mod fetcher;
pub mod parser;
pub mod transport;

pub use dedup::diff;
pub use fetcher::{FetchError, Fetcher};
pub use parser::{parse, ParseError, ParsedChannel, ParsedFeed, ParsedPost};
pub use transport::{HttpTransport, ProxyTransport, Transport};
