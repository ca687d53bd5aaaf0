//! Incremental parsing of the Blogger Atom feed.
//!
//! [`XmlEvents`] turns the fetched bytes into a lazy, finite sequence of
//! element/text events. [`FeedParser`] is the state machine that consumes
//! those events and assembles [`FeedItem`]s; [`parse_into`] drives both and
//! hands every completed entry straight to the merge engine.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::collection::FeedCollection;
use super::item::{parse_published, FeedItem};
use super::merge::{reconcile, MergeSummary};
use crate::util::{same_url, PREVIEW_CHARS};

/// The blog's own home page. Blogger emits it as an `alternate` link at feed
/// level, and it must never be mistaken for an article link.
pub const DEFAULT_PLACEHOLDER_LINK: &str = "http://studentsblog.sst.edu.sg/";

/// Errors that abort a parse pass.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The tokenizer rejected the input.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },
    /// Input ended while elements were still open.
    #[error("Unexpected end of document with {open} unclosed element(s)")]
    UnexpectedEof { open: usize },
    /// Input contained no root element at all.
    #[error("Document is empty")]
    EmptyDocument,
}

/// One tokenizer event, with names and text already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    ElementStart {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    ElementEnd {
        name: String,
    },
    DocumentEnd,
}

/// Lazy event sequence over a byte buffer.
///
/// Yields `Ok(XmlEvent)` until `DocumentEnd`, or a single `Err` on malformed
/// input; either way the iterator is exhausted afterwards and cannot be
/// restarted. Element and attribute names are reported as written, prefix
/// included, so `media:title` never reads as the Atom `title`. Self-closing
/// elements produce a start and an end.
pub struct XmlEvents<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    depth: usize,
    saw_root: bool,
    finished: bool,
}

impl<'a> XmlEvents<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(bytes);
        // Self-closing <link .../> arrives as Start + End
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            saw_root: false,
            finished: false,
        }
    }

    fn next_event(&mut self) -> Result<Option<XmlEvent>, ParseError> {
        self.buf.clear();
        let decoder = self.reader.decoder();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(e) => return Err(xml_error(&self.reader, e)),
        };

        match event {
            Event::Start(e) => {
                self.depth += 1;
                self.saw_root = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut attributes = Vec::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| xml_error(&self.reader, e))?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .decode_and_unescape_value(decoder)
                        .map_err(|e| xml_error(&self.reader, e))?;
                    attributes.push((key, value.into_owned()));
                }
                Ok(Some(XmlEvent::ElementStart { name, attributes }))
            }
            Event::End(e) => {
                self.depth = self.depth.saturating_sub(1);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                Ok(Some(XmlEvent::ElementEnd { name }))
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| xml_error(&self.reader, e))?;
                Ok(Some(XmlEvent::Text(text.into_owned())))
            }
            Event::CData(e) => Ok(Some(XmlEvent::Text(String::from_utf8_lossy(&e).into_owned()))),
            Event::Eof => {
                if self.depth > 0 {
                    return Err(ParseError::UnexpectedEof { open: self.depth });
                }
                if !self.saw_root {
                    return Err(ParseError::EmptyDocument);
                }
                Ok(Some(XmlEvent::DocumentEnd))
            }
            // Declarations, comments, processing instructions, doctype
            _ => Ok(None),
        }
    }
}

fn xml_error(reader: &Reader<&[u8]>, message: impl ToString) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}

impl Iterator for XmlEvents<'_> {
    type Item = Result<XmlEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.next_event() {
                Ok(None) => continue,
                Ok(Some(event)) => {
                    self.finished = event == XmlEvent::DocumentEnd;
                    return Some(Ok(event));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Per-parse settings.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// `alternate` links equal to this URL are not article links
    pub placeholder_link: Option<String>,
    /// Length of the plain-text preview derived for each entry
    pub preview_chars: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            placeholder_link: Some(DEFAULT_PLACEHOLDER_LINK.to_string()),
            preview_chars: PREVIEW_CHARS,
        }
    }
}

/// Entry-assembly state machine.
///
/// Feed one [`XmlEvent`] at a time to [`FeedParser::handle`]; it returns the
/// finished item whenever an `entry` element closes.
#[derive(Debug)]
pub struct FeedParser {
    options: ParseOptions,
    /// Innermost open element, cleared when that element closes
    current_element: Option<String>,
    /// Entry being assembled; `None` outside of `<entry>`
    current_item: Option<FeedItem>,
    published_text: String,
}

impl FeedParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            current_element: None,
            current_item: None,
            published_text: String::new(),
        }
    }

    pub fn handle(&mut self, event: XmlEvent) -> Option<FeedItem> {
        match event {
            XmlEvent::ElementStart { name, attributes } => {
                self.start_element(&name, &attributes);
                self.current_element = Some(name);
                None
            }
            XmlEvent::Text(text) => {
                self.append_text(&text);
                None
            }
            XmlEvent::ElementEnd { name } => self.end_element(&name),
            XmlEvent::DocumentEnd => None,
        }
    }

    fn start_element(&mut self, name: &str, attributes: &[(String, String)]) {
        match name {
            "entry" => {
                // Nested or unterminated entries are not supported: start over
                self.current_item = Some(FeedItem::default());
                self.published_text.clear();
            }
            "link" => {
                let Some(item) = self.current_item.as_mut() else {
                    return;
                };
                let attr = |key: &str| {
                    attributes
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.as_str())
                };
                if attr("rel") != Some("alternate") {
                    return;
                }
                let Some(href) = attr("href") else {
                    return;
                };
                let is_placeholder = self
                    .options
                    .placeholder_link
                    .as_deref()
                    .is_some_and(|placeholder| same_url(href, placeholder));
                if !is_placeholder {
                    item.link = href.to_string();
                }
            }
            _ => {}
        }
    }

    fn append_text(&mut self, text: &str) {
        let (Some(element), Some(item)) =
            (self.current_element.as_deref(), self.current_item.as_mut())
        else {
            return;
        };
        match element {
            "title" => item.title.push_str(text),
            "link" => item.link.push_str(text),
            "published" => self.published_text.push_str(text),
            "name" => item.author.push_str(text),
            "content" => item.raw_html_content.push_str(text),
            _ => {}
        }
    }

    fn end_element(&mut self, name: &str) -> Option<FeedItem> {
        if self.current_element.as_deref() == Some(name) {
            self.current_element = None;
        }

        match name {
            "published" => {
                if let Some(item) = self.current_item.as_mut() {
                    match parse_published(&self.published_text) {
                        Ok(date) => item.published = Some(date),
                        Err(e) => tracing::warn!(
                            text = %self.published_text,
                            error = %e,
                            "Unable to parse published date, feed datestamp format may have changed"
                        ),
                    }
                }
                self.published_text.clear();
                None
            }
            "entry" => {
                let mut item = self.current_item.take()?;
                item.title = item.title.trim().to_string();
                item.link = item.link.trim().to_string();
                item.author = item.author.trim().to_string();
                if item.link.is_empty() {
                    tracing::warn!(title = %item.title, "Skipping entry without an article link");
                    return None;
                }
                item.sanitize(self.options.preview_chars);
                Some(item)
            }
            _ => None,
        }
    }
}

/// Parses `bytes` and reconciles each completed entry into `feeds`.
///
/// Entries are merged the moment they close, so on a parse error every
/// entry before the failure point is already in the collection and stays
/// there. The caller runs the finalize step once this returns `Ok`.
pub fn parse_into(
    bytes: &[u8],
    feeds: &FeedCollection,
    options: ParseOptions,
) -> Result<MergeSummary, ParseError> {
    let mut parser = FeedParser::new(options);
    let mut summary = MergeSummary::default();

    for event in XmlEvents::new(bytes) {
        if let Some(item) = parser.handle(event?) {
            summary.record(reconcile(feeds, item));
        }
    }

    Ok(summary)
}
