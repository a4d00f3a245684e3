//! Event-driven RSS document parsing.
//!
//! Pulls the `<item>` elements out of an RSS channel into [`RawItem`]s.
//! Only the fields the extractor consumes are captured; everything else in
//! the document is skipped. A document either parses wholly or yields an
//! error; a broken feed never produces a partial item list.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::extract::RawItem;

enum Field {
    Title,
    Description,
    Link,
    PubDate,
    Guid,
    Company,
    Location,
}

impl Field {
    fn for_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"description" => Some(Self::Description),
            b"link" => Some(Self::Link),
            b"pubDate" => Some(Self::PubDate),
            b"guid" => Some(Self::Guid),
            b"job:company" => Some(Self::Company),
            b"job:location" => Some(Self::Location),
            _ => None,
        }
    }

    fn assign(self, item: &mut RawItem, value: &str) {
        if value.is_empty() {
            return;
        }
        let slot = match self {
            Field::Title => &mut item.title,
            Field::Description => &mut item.description,
            Field::Link => &mut item.link,
            Field::PubDate => &mut item.pub_date,
            Field::Guid => &mut item.guid,
            Field::Company => &mut item.company,
            Field::Location => &mut item.location,
        };
        *slot = Some(value.to_string());
    }
}

/// Parses the items of an RSS document.
pub fn parse_items(xml: &str) -> Result<Vec<RawItem>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut item: Option<RawItem> = None;
    // Depth below the <item> element; fields of interest live at depth 1.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if item.is_none() {
                    if start.name().as_ref() == b"item" {
                        item = Some(RawItem::default());
                        depth = 0;
                    }
                } else {
                    depth += 1;
                    if depth == 1 {
                        field = Field::for_name(start.name().as_ref());
                        text.clear();
                    }
                }
            }
            Event::Text(content) => {
                if field.is_some() {
                    text.push_str(&content.unescape()?);
                }
            }
            Event::CData(content) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(content.as_ref()));
                }
            }
            Event::End(end) => {
                if depth == 0 && end.name().as_ref() == b"item" {
                    if let Some(finished) = item.take() {
                        items.push(finished);
                    }
                } else if let Some(current) = item.as_mut() {
                    if depth == 1 {
                        if let Some(field) = field.take() {
                            field.assign(current, text.trim());
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}
