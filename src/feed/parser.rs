use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::util::clean_text;

const ROOT: &[u8] = b"rss";
const CHANNEL: &[u8] = b"channel";
const ITEM: &[u8] = b"item";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Why a payload could not be turned into a [`ParsedFeed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The payload is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Malformed(String),
    /// Well-formed XML whose root is not `<rss>`.
    #[error("Unsupported format: root element is <{0}>, expected <rss>")]
    UnsupportedFormat(String),
    /// A structural element the format requires is absent.
    #[error("Missing <{0}> element")]
    MissingElement(&'static str),
    /// A required child of `<channel>` or `<item>` is absent.
    #[error("<{element}> has no <{field}> element")]
    MissingField {
        element: &'static str,
        field: &'static str,
    },
}

/// Channel metadata as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChannel {
    pub link: String,
    pub title: String,
    pub description: String,
}

/// One `<item>`, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPost {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub channel: ParsedChannel,
    /// Items in document order.
    pub posts: Vec<ParsedPost>,
}

/// Parses an RSS document.
///
/// The first `<channel>` under the `<rss>` root supplies `link`, `title` and
/// `description` from its direct children; every `<item>` directly under it
/// becomes a post with the same three fields. Names are matched exactly, so
/// `<atom:link>` is not mistaken for `<link>`. The document is read to the
/// end before any verdict, so malformed input is always reported as
/// [`ParseError::Malformed`] whatever its root. Every element name,
/// attribute and text node is checked, not only the fields that are kept.
///
/// # Security
///
/// quick-xml 0.37 does not expand `<!ENTITY>` declarations: anything but the
/// five predefined entities fails to unescape and the payload is rejected as
/// malformed.
pub fn parse(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut doc = DocumentBuilder::default();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ParseError::Malformed(format!("{} (at byte {})", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => doc.start(checked_name(&e)?, false)?,
            Event::Empty(e) => doc.start(checked_name(&e)?, true)?,
            Event::End(e) => doc.end(e.name().as_ref())?,
            Event::Text(e) => {
                let text = e.unescape().map_err(malformed)?;
                if doc.capturing() {
                    doc.push_text(&text);
                } else if doc.at_top_level() && !text.bytes().all(|b| b.is_ascii_whitespace()) {
                    return Err(text_outside_root());
                }
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e).map_err(malformed)?;
                if doc.capturing() {
                    doc.push_text(text);
                } else if doc.at_top_level() {
                    return Err(text_outside_root());
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    doc.finish()
}

/// Checks that a start tag is well-formed: a UTF-8 name and attributes that
/// are quoted, unique and properly escaped. Returns the raw name.
fn checked_name<'e>(e: &'e BytesStart<'_>) -> Result<&'e [u8], ParseError> {
    std::str::from_utf8(e.name().into_inner()).map_err(malformed)?;
    for attr in e.attributes().with_checks(true) {
        let attr = attr.map_err(malformed)?;
        std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
        attr.unescape_value().map_err(malformed)?;
    }
    Ok(e.name().into_inner())
}

fn malformed(e: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed(e.to_string())
}

fn text_outside_root() -> ParseError {
    ParseError::Malformed("text outside the root element".into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Link,
    Title,
    Description,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"link" => Some(Field::Link),
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Owner {
    Channel,
    Item,
}

/// Text being collected for one field element.
#[derive(Debug)]
struct Capture {
    owner: Owner,
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Debug, Default)]
struct RawFields {
    link: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

impl RawFields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Link => &mut self.link,
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
        }
    }

    fn require(self, element: &'static str) -> Result<(String, String, String), ParseError> {
        let missing = |field| ParseError::MissingField { element, field };
        Ok((
            self.link.ok_or_else(|| missing("link"))?,
            self.title.ok_or_else(|| missing("title"))?,
            self.description.ok_or_else(|| missing("description"))?,
        ))
    }
}

/// Tracks the open-element stack and binds the interesting elements as they
/// stream past.
#[derive(Debug, Default)]
struct DocumentBuilder {
    open: Vec<Vec<u8>>,
    root: Option<Vec<u8>>,
    channel: Option<RawFields>,
    channel_open: bool,
    items: Vec<RawFields>,
    item_open: bool,
    capture: Option<Capture>,
}

impl DocumentBuilder {
    fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn at_top_level(&self) -> bool {
        self.open.is_empty()
    }

    fn is_rss(&self) -> bool {
        self.root.as_deref() == Some(ROOT)
    }

    fn start(&mut self, name: &[u8], empty: bool) -> Result<(), ParseError> {
        let depth = self.open.len();

        if depth == 0 {
            if self.root.is_some() {
                return Err(ParseError::Malformed("more than one root element".into()));
            }
            self.root = Some(name.to_vec());
        } else if self.capture.is_none() && self.is_rss() {
            match depth {
                1 if name == CHANNEL && self.channel.is_none() => {
                    self.channel = Some(RawFields::default());
                    self.channel_open = true;
                }
                2 if self.channel_open && name == ITEM => {
                    self.items.push(RawFields::default());
                    self.item_open = true;
                }
                2 if self.channel_open => self.begin_capture(Owner::Channel, name, depth),
                3 if self.item_open => self.begin_capture(Owner::Item, name, depth),
                _ => {}
            }
        }

        if empty {
            self.close(depth, name);
        } else {
            self.open.push(name.to_vec());
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), ParseError> {
        match self.open.pop() {
            Some(open) if open == name => {
                let depth = self.open.len();
                self.close(depth, name);
                Ok(())
            }
            Some(open) => Err(ParseError::Malformed(format!(
                "expected </{}>, found </{}>",
                String::from_utf8_lossy(&open),
                String::from_utf8_lossy(name)
            ))),
            None => Err(ParseError::Malformed(format!(
                "unexpected </{}>",
                String::from_utf8_lossy(name)
            ))),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push_str(text);
        }
    }

    fn begin_capture(&mut self, owner: Owner, name: &[u8], depth: usize) {
        if let Some(field) = Field::from_name(name) {
            self.capture = Some(Capture {
                owner,
                field,
                depth,
                text: String::new(),
            });
        }
    }

    fn close(&mut self, depth: usize, name: &[u8]) {
        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(capture) = self.capture.take() {
                self.store(capture);
            }
            return;
        }

        match depth {
            1 if self.channel_open && name == CHANNEL => self.channel_open = false,
            2 if self.item_open && name == ITEM => self.item_open = false,
            _ => {}
        }
    }

    /// The first occurrence of a field wins.
    fn store(&mut self, capture: Capture) {
        let target = match capture.owner {
            Owner::Channel => self.channel.as_mut(),
            Owner::Item => self.items.last_mut(),
        };
        if let Some(fields) = target {
            let slot = fields.slot(capture.field);
            if slot.is_none() {
                *slot = Some(clean_text(&capture.text));
            }
        }
    }

    fn finish(self) -> Result<ParsedFeed, ParseError> {
        if let Some(open) = self.open.last() {
            return Err(ParseError::Malformed(format!(
                "document ends inside <{}>",
                String::from_utf8_lossy(open)
            )));
        }

        let root = self
            .root
            .ok_or_else(|| ParseError::Malformed("document has no root element".into()))?;
        if root != ROOT {
            return Err(ParseError::UnsupportedFormat(
                String::from_utf8_lossy(&root).into_owned(),
            ));
        }

        let (link, title, description) = self
            .channel
            .ok_or(ParseError::MissingElement("channel"))?
            .require("channel")?;

        let posts = self
            .items
            .into_iter()
            .map(|item| {
                let (url, title, description) = item.require("item")?;
                Ok(ParsedPost {
                    url,
                    title,
                    description,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(ParsedFeed {
            channel: ParsedChannel {
                link,
                title,
                description,
            },
            posts,
        })
    }
}
