use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::util::{clean_editor_html, preview};

/// Datestamp layout used by the Blogger feed: ISO-8601-like, but with a
/// mandatory millisecond fraction and a colon-separated UTC offset
/// (`2023-01-01T10:00:00.000+08:00`).
pub const PUBLISHED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// One article from the feed.
///
/// `link` is the identity key: two items with the same link are the same
/// logical article, whatever their other fields say. The derived
/// `PartialEq` compares every field and is what "unchanged" means when a
/// cached copy is checked against a freshly parsed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub author: String,
    /// `None` when the feed's datestamp could not be parsed
    pub published: Option<DateTime<FixedOffset>>,
    pub raw_html_content: String,
    pub stripped_html_content: String,
}

impl FeedItem {
    /// Returns `true` if both items refer to the same article.
    pub fn is_same_article(&self, other: &FeedItem) -> bool {
        self.link == other.link
    }

    /// Cleans the raw body and derives the list preview from it.
    ///
    /// Called once when an entry is complete; `raw_html_content` is replaced
    /// by its cleaned form, so merge comparisons always see cleaned HTML.
    pub fn sanitize(&mut self, preview_chars: usize) {
        self.raw_html_content = clean_editor_html(&self.raw_html_content);
        self.stripped_html_content = preview(&self.raw_html_content, preview_chars);
    }
}

/// Parses a feed datestamp in [`PUBLISHED_FORMAT`].
///
/// The offset is kept as written; no local-time or DST conversion happens.
pub fn parse_published(text: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(text.trim(), PUBLISHED_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_published_with_offset() {
        let date = parse_published("2023-01-01T10:00:00.000+08:00").unwrap();
        assert_eq!(date.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(
            date.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2023, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_published_keeps_milliseconds() {
        let date = parse_published("2016-11-23T08:15:30.125-05:00").unwrap();
        assert_eq!(date.timestamp_subsec_millis(), 125);
    }

    #[test]
    fn test_parse_published_trims_whitespace() {
        assert!(parse_published("\n  2023-01-01T10:00:00.000+08:00  ").is_ok());
    }

    #[test]
    fn test_parse_published_rejects_other_formats() {
        assert!(parse_published("Sun, 01 Jan 2023 10:00:00 +0800").is_err());
        assert!(parse_published("2023-01-01").is_err());
        assert!(parse_published("not a date").is_err());
        assert!(parse_published("").is_err());
    }

    #[test]
    fn test_same_article_is_link_identity() {
        let a = FeedItem {
            link: "https://a".into(),
            title: "First".into(),
            ..Default::default()
        };
        let b = FeedItem {
            link: "https://a".into(),
            title: "Edited".into(),
            ..Default::default()
        };
        let c = FeedItem {
            link: "https://c".into(),
            title: "First".into(),
            ..Default::default()
        };
        assert!(a.is_same_article(&b));
        assert_ne!(a, b);
        assert!(!a.is_same_article(&c));
    }

    #[test]
    fn test_sanitize_derives_preview() {
        let mut item = FeedItem {
            raw_html_content: "<p>Hello<o:p></o:p></p>\n<p>World &amp; all</p>".into(),
            ..Default::default()
        };
        item.sanitize(280);
        assert_eq!(item.raw_html_content, "<p>Hello</p>\n<p>World &amp; all</p>");
        assert_eq!(item.stripped_html_content, "Hello World & all");
    }
}
