//! Collects RSS/Atom feeds and Product Hunt posts into a deduplicated JSON
//! payload, then renders that payload as a Markdown digest.
//!
//! The pipeline runs one way: [`config`] → [`feed`] → [`merge`] →
//! [`storage`] → [`digest`]. [`app`] drives both stages.

pub mod app;
pub mod config;
pub mod digest;
pub mod feed;
pub mod logging;
pub mod merge;
pub mod storage;
pub mod util;
