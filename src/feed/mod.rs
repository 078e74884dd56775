//! Feed retrieval: HTTP fetch, RSS decoding, and publication date normalization.
//!
//! - [`fetcher`] - one bounded, cancellable HTTP GET per call
//! - [`parser`] - `rss > channel > item*` decoding with HTML entity cleanup
//! - [`timestamp`] - `pubDate` text to a UTC instant

mod fetcher;
mod parser;
mod timestamp;

pub use fetcher::{FeedFetcher, FetchError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use parser::{parse_feed, unescape_html, Entry, FeedDocument, ParseError};
pub use timestamp::{normalize, Layout, TimeParseError, LAYOUTS};
