//! Utility functions for common operations.
//!
//! - **HTML cleanup**: editor-artifact removal and list previews for article bodies
//! - **Text processing**: character-safe truncation and newline compaction
//! - **URL validation**: feed endpoint checks and link comparison
//!
//! # Examples
//!
//! ```
//! use announcer::util::{preview, truncate_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! let text = preview("<p>Hello&nbsp;<b>world</b></p>", 280);
//! assert_eq!(text, "Hello world");
//! assert_eq!(truncate_chars("Long article title", 4), "Long");
//! # let _ = url;
//! ```

mod html;
mod text;
mod url_validator;

pub use html::{clean_editor_html, cleaner_html, decode_entities, preview, strip_tags};
pub use text::{compact_newlines, truncate_chars};
pub use url_validator::{same_url, validate_url, UrlValidationError};

/// Maximum length of the plain-text preview stored with each article
pub const PREVIEW_CHARS: usize = 280;
