//! Utility functions for common operations.
//!
//! - **Text**: HTML entity decoding for feed text, terminal-safe output
//! - **URL validation**: accepting only http(s) feed sources
//! - **Durations**: parsing polling intervals like `30s` or `1h30m`

mod duration;
mod text;
mod url_validator;

pub use duration::{parse_duration, DurationError};
pub use text::{strip_control_chars, unescape_entities};
pub use url_validator::{validate_feed_url, UrlValidationError};
