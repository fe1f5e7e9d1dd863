//! Streaming XMLTV parser
//! Event-driven over quick-xml so multi-hundred-megabyte guides never load
//! as a tree; the event buffer is cleared after every event.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{Error, Result};

/// Title used when a programme has no `<title>` child.
const DEFAULT_TITLE: &str = "Untitled";

/// A single programme entry. Timestamps are carried verbatim as XMLTV
/// strings ("20240101000000 +0000"); nothing downstream needs them decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Programme {
    pub start: String,
    pub stop: String,
    pub title: String,
    pub description: String,
}

/// Programmes grouped by channel identifier, in document order.
#[derive(Debug, Clone, Default)]
pub struct EpgGuide {
    pub programmes: HashMap<String, Vec<Programme>>,
}

impl EpgGuide {
    pub fn channel_count(&self) -> usize {
        self.programmes.len()
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.values().map(Vec::len).sum()
    }

    pub fn get(&self, channel_id: &str) -> Option<&[Programme]> {
        self.programmes.get(channel_id).map(Vec::as_slice)
    }
}

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Programme,
    Title,
    Desc,
}

/// Parse XMLTV text into an [`EpgGuide`].
pub fn parse_epg(xml: &str) -> Result<EpgGuide> {
    parse_epg_reader(xml.as_bytes())
}

/// Parse XMLTV from a reader, streaming. Malformed XML aborts this source
/// with [`Error::Parse`]; the caller decides whether the run survives.
pub fn parse_epg_reader<R: BufRead>(reader: R) -> Result<EpgGuide> {
    // No per-event trimming: entity references split text into separate
    // events, and the whitespace adjacent to them must survive. Assembled
    // text is trimmed once when the element closes.
    let mut xml_reader = Reader::from_reader(reader);

    let mut guide = EpgGuide::default();
    let mut buf = Vec::with_capacity(8192);

    let mut state = ParserState::Root;
    let mut current: Option<Programme> = None;
    let mut current_channel = String::new();
    let mut text_buf = String::new();

    loop {
        let position = xml_reader.buffer_position();
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"programme" => {
                    state = ParserState::Programme;
                    current_channel = get_attribute(e, b"channel").unwrap_or_default();
                    current = Some(Programme {
                        start: get_attribute(e, b"start").unwrap_or_default(),
                        stop: get_attribute(e, b"stop").unwrap_or_default(),
                        title: String::new(),
                        description: String::new(),
                    });
                }
                b"title" if state == ParserState::Programme => {
                    state = ParserState::Title;
                    text_buf.clear();
                }
                b"desc" if state == ParserState::Programme => {
                    state = ParserState::Desc;
                    text_buf.clear();
                }
                _ => {}
            },
            // Self-closing programme: no child text, no matching End event.
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"programme" => {
                let channel = get_attribute(e, b"channel").unwrap_or_default();
                if !channel.is_empty() {
                    guide.programmes.entry(channel).or_default().push(Programme {
                        start: get_attribute(e, b"start").unwrap_or_default(),
                        stop: get_attribute(e, b"stop").unwrap_or_default(),
                        title: DEFAULT_TITLE.to_string(),
                        description: String::new(),
                    });
                }
            }
            Ok(Event::Text(e)) => match state {
                ParserState::Title | ParserState::Desc => {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    text_buf.push_str(&decode_xml_entities(&raw));
                }
                _ => {}
            },
            // Entity references in text arrive as their own events, carrying
            // the name between '&' and ';'.
            Ok(Event::GeneralRef(e)) => match state {
                ParserState::Title | ParserState::Desc => {
                    let name = String::from_utf8_lossy(e.as_ref());
                    text_buf.push_str(&decode_xml_entities(&format!("&{name};")));
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"programme" => {
                    if let Some(mut programme) = current.take() {
                        if programme.title.is_empty() {
                            programme.title = DEFAULT_TITLE.to_string();
                        }
                        // A programme without a channel id cannot be matched
                        // to anything; drop it.
                        if !current_channel.is_empty() {
                            guide
                                .programmes
                                .entry(std::mem::take(&mut current_channel))
                                .or_default()
                                .push(programme);
                        }
                    }
                    state = ParserState::Root;
                }
                b"title" => {
                    if let Some(ref mut programme) = current {
                        programme.title = text_buf.trim().to_string();
                    }
                    state = ParserState::Programme;
                }
                b"desc" => {
                    if let Some(ref mut programme) = current {
                        programme.description = text_buf.trim().to_string();
                    }
                    state = ParserState::Programme;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Parse {
                    position,
                    source: e,
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(guide)
}

/// Get attribute value from an XML element.
fn get_attribute(e: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8(attr.value.as_ref().to_vec()).ok()?;
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}

/// Decode the XML entities that show up in guide feeds.
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = s.to_string();
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&apos;", "'");

    // Numeric entities, decimal and hex
    while let Some(start) = result.find("&#") {
        let Some(end) = result[start..].find(';') else {
            break;
        };
        let entity = result[start..start + end + 1].to_string();
        let num_str = &entity[2..entity.len() - 1];
        let decoded = if let Some(hex) = num_str.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            num_str.parse::<u32>().ok()
        };
        match decoded.and_then(char::from_u32) {
            Some(c) => result = result.replace(&entity, &c.to_string()),
            None => break,
        }
    }

    result.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groups_by_channel() {
        let xml = r#"<tv>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="ch1"><title>Show 1</title></programme>
  <programme start="20240115130000 +0000" stop="20240115140000 +0000" channel="ch1"><title>Show 2</title></programme>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="ch2"><title>Show 3</title></programme>
</tv>"#;

        let guide = parse_epg(xml).unwrap();
        assert_eq!(guide.channel_count(), 2);
        assert_eq!(guide.programme_count(), 3);
        assert_eq!(guide.get("ch1").unwrap().len(), 2);
        assert_eq!(guide.get("ch2").unwrap().len(), 1);
    }

    #[test]
    fn test_document_order_is_preserved() {
        let xml = r#"<tv>
  <programme start="2" stop="3" channel="ch1"><title>Second</title></programme>
  <programme start="1" stop="2" channel="ch1"><title>Earlier but later in the file</title></programme>
</tv>"#;

        let guide = parse_epg(xml).unwrap();
        let programmes = guide.get("ch1").unwrap();
        assert_eq!(programmes[0].title, "Second");
        assert_eq!(programmes[0].start, "2");
    }

    #[test]
    fn test_missing_title_and_desc_default() {
        let xml = r#"<tv><programme start="1" stop="2" channel="ch1"/></tv>"#;
        let guide = parse_epg(xml).unwrap();
        let programme = &guide.get("ch1").unwrap()[0];
        assert_eq!(programme.title, "Untitled");
        assert_eq!(programme.description, "");
    }

    #[test]
    fn test_desc_and_entities() {
        let xml = r#"<tv>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1">
    <title>News &amp; Weather</title>
    <desc>Tom &amp; Jerry at 5</desc>
  </programme>
</tv>"#;
        let guide = parse_epg(xml).unwrap();
        let programme = &guide.get("bbc1").unwrap()[0];
        assert_eq!(programme.title, "News & Weather");
        assert_eq!(programme.description, "Tom & Jerry at 5");
    }

    #[test]
    fn test_references_resolve_inside_text() {
        let xml = r#"<tv>
  <programme start="1" stop="2" channel="c">
    <title>caf&#233; &lt;late&gt;</title>
    <desc>5 &gt; 4 &amp; 4 &lt; 5; tone is &#x266A;</desc>
  </programme>
</tv>"#;
        let guide = parse_epg(xml).unwrap();
        let programme = &guide.get("c").unwrap()[0];
        assert_eq!(programme.title, "café <late>");
        assert_eq!(programme.description, "5 > 4 & 4 < 5; tone is ♪");
    }

    #[test]
    fn test_programme_without_channel_is_dropped() {
        let xml = r#"<tv><programme start="1" stop="2"><title>Nowhere</title></programme></tv>"#;
        let guide = parse_epg(xml).unwrap();
        assert_eq!(guide.programme_count(), 0);
    }

    #[test]
    fn test_malformed_xml_aborts() {
        let xml = "<tv><programme channel=\"ch1\"><title>Broken</desc></programme></tv>";
        assert!(matches!(parse_epg(xml), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(decode_xml_entities("caf&#233;"), "café");
        assert_eq!(decode_xml_entities("caf&#xE9;"), "café");
        assert_eq!(decode_xml_entities("A &amp;&amp; B"), "A && B");
    }
}
