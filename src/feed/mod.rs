//! Source fetching for the collect stage.
//!
//! - [`parser`] - RSS/Atom parsing using the `feed-rs` crate
//! - [`fetcher`] - per-source dispatch and the HTTP feed path
//! - [`producthunt`] - the Product Hunt GraphQL path
//! - [`retry`] - bounded retry shared by both paths
//!
//! Every path ends in [`Fetcher::fetch_source`], which never fails: a broken
//! source is logged and yields no entries.

mod entry;
mod fetcher;
mod parser;
mod producthunt;
mod retry;

pub use entry::RawEntry;
pub use fetcher::{FetchError, Fetcher};
pub use parser::{parse_feed, ParseError, ParsedItem};
pub use producthunt::{ProductHunt, PRODUCTHUNT_API_URL, PRODUCTHUNT_TOKEN_ENV};
pub use retry::RetryPolicy;
