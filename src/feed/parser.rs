use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

use crate::util::unescape_entities;

/// The response body could not be read as an RSS document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid RSS document: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid RSS document: no root element")]
    NoRoot,
    #[error("Invalid RSS document: ended before every element was closed")]
    Truncated,
}

/// One fetched RSS channel. Transient: built per fetch, consumed by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyndicationDocument {
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<SyndicationItem>,
}

/// A single `<item>`. `pub_date` is kept verbatim; ingestion parses it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyndicationItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl SyndicationDocument {
    /// Decode HTML entities left in titles and descriptions.
    ///
    /// Links and publish dates are passed through untouched.
    pub fn unescape(&mut self) {
        unescape_in_place(&mut self.channel.title);
        unescape_in_place(&mut self.channel.description);
        for item in &mut self.channel.items {
            unescape_in_place(&mut item.title);
            unescape_in_place(&mut item.description);
        }
    }
}

fn unescape_in_place(field: &mut String) {
    if let std::borrow::Cow::Owned(decoded) = unescape_entities(field) {
        *field = decoded;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn of_channel(local: &[u8]) -> Option<Self> {
        match local {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            _ => None,
        }
    }

    fn of_item(local: &[u8]) -> Option<Self> {
        match local {
            b"pubDate" => Some(Self::PubDate),
            other => Self::of_channel(other),
        }
    }
}

/// One open element, classified by where it sits in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Root,
    Channel,
    Item,
    ChannelField(Field),
    ItemField(Field),
    Ignored,
}

impl Frame {
    /// Namespaced elements (`atom:link`, `media:title`, ...) never map to a
    /// field, even when their local name matches one.
    fn classify(parent: Option<Frame>, start: &BytesStart<'_>) -> Self {
        let name = start.name();
        if name.prefix().is_some() {
            return match parent {
                None => Self::Root,
                Some(_) => Self::Ignored,
            };
        }
        let local = name.local_name();
        let local = local.as_ref();

        match parent {
            None => Self::Root,
            Some(Self::Root) if local == b"channel" => Self::Channel,
            Some(Self::Channel) if local == b"item" => Self::Item,
            Some(Self::Channel) => Field::of_channel(local).map_or(Self::Ignored, Self::ChannelField),
            Some(Self::Item) => Field::of_item(local).map_or(Self::Ignored, Self::ItemField),
            Some(_) => Self::Ignored,
        }
    }
}

fn slot(document: &mut SyndicationDocument, frame: Frame) -> Option<&mut String> {
    let channel = &mut document.channel;
    match frame {
        Frame::ChannelField(Field::Title) => Some(&mut channel.title),
        Frame::ChannelField(Field::Link) => Some(&mut channel.link),
        Frame::ChannelField(Field::Description) => Some(&mut channel.description),
        Frame::ChannelField(Field::PubDate) => None,
        Frame::ItemField(field) => channel.items.last_mut().map(|item| match field {
            Field::Title => &mut item.title,
            Field::Link => &mut item.link,
            Field::Description => &mut item.description,
            Field::PubDate => &mut item.pub_date,
        }),
        _ => None,
    }
}

fn current_slot<'d>(document: &'d mut SyndicationDocument, stack: &[Frame]) -> Option<&'d mut String> {
    match stack.last() {
        Some(&frame) => slot(document, frame),
        None => None,
    }
}

/// Parses an RSS body and normalizes its text fields.
///
/// The root element name is not checked. Only the root's `<channel>`, its
/// direct `<item>` children and their unprefixed `title`/`link`/
/// `description`/`pubDate` elements are read; everything else is skipped.
/// A field that appears twice keeps its last value, a missing one stays
/// empty, and a document with no `<channel>` has no items. Field text is
/// trimmed.
///
/// # Security
///
/// SEC-002: `quick-xml` never expands `<!ENTITY>` declarations, so external
/// entity payloads fail to parse instead of being resolved.
pub fn parse_document(bytes: &[u8]) -> Result<SyndicationDocument, DocumentError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut document = SyndicationDocument::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let frame = Frame::classify(stack.last().copied(), &start);
                open(&mut document, frame);
                seen_root = true;
                stack.push(frame);
            }
            Event::Empty(start) => {
                let frame = Frame::classify(stack.last().copied(), &start);
                open(&mut document, frame);
                seen_root = true;
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    if let Some(text) = slot(&mut document, frame) {
                        let trimmed = text.trim();
                        if trimmed.len() != text.len() {
                            *text = trimmed.to_string();
                        }
                    }
                }
            }
            Event::Text(text) => {
                if let Some(target) = current_slot(&mut document, &stack) {
                    target.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(target) = current_slot(&mut document, &stack) {
                    target.push_str(&cdata.decode().map_err(quick_xml::Error::from)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(DocumentError::NoRoot);
    }
    if !stack.is_empty() {
        return Err(DocumentError::Truncated);
    }

    document.unescape();
    Ok(document)
}

/// Start a new item, or reset a field so a repeated element replaces it
fn open(document: &mut SyndicationDocument, frame: Frame) {
    if frame == Frame::Item {
        document.channel.items.push(SyndicationItem::default());
    } else if let Some(text) = slot(document, frame) {
        text.clear();
    }
}
