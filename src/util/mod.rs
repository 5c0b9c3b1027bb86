//! Utility functions shared by the fetch and render stages.
//!
//! - **URL validation**: only `http`/`https` feed URLs are fetched
//! - **Text processing**: character-based summary truncation

mod text;
mod url_validator;

pub use text::truncate_chars;
pub use url_validator::{validate_url, UrlValidationError};
