//! Merger/filter
//! Joins playlist channels against the parsed guide and serializes the
//! intersection as a fresh XMLTV document.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::epg::EpgGuide;
use crate::error::Result;
use crate::m3u::PlaylistChannel;

/// Result of a merge: the serialized document plus the bookkeeping the
/// orphan-reporting policy feeds on.
#[derive(Debug)]
pub struct MergeOutcome {
    pub xml: String,
    pub matched_channels: usize,
    pub programme_count: usize,
    /// Playlist channels that had no guide entry (or no tvg-id) and were
    /// filtered out.
    pub unmatched_playlist: Vec<String>,
    /// Guide channel ids no playlist entry referenced.
    pub orphan_epg_ids: Vec<String>,
}

/// Build the filtered XMLTV document. Every emitted programme has a matching
/// channel element emitted right before it; output follows playlist order,
/// then per-channel document order.
pub fn merge(channels: &[PlaylistChannel], guide: &EpgGuide) -> Result<MergeOutcome> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("tv")))?;

    let mut matched_channels = 0;
    let mut programme_count = 0;
    let mut unmatched_playlist = Vec::new();
    let mut matched_ids: Vec<&str> = Vec::new();

    for channel in channels {
        let Some(tvg_id) = channel.tvg_id.as_deref() else {
            unmatched_playlist.push(channel.name.clone());
            continue;
        };
        let Some(programmes) = guide.get(tvg_id) else {
            unmatched_playlist.push(channel.name.clone());
            continue;
        };

        matched_channels += 1;
        matched_ids.push(tvg_id);

        let mut channel_elem = BytesStart::new("channel");
        channel_elem.push_attribute(("id", tvg_id));
        writer.write_event(Event::Start(channel_elem))?;
        writer.write_event(Event::Start(BytesStart::new("display-name")))?;
        writer.write_event(Event::Text(BytesText::new(&channel.name)))?;
        writer.write_event(Event::End(BytesEnd::new("display-name")))?;
        writer.write_event(Event::End(BytesEnd::new("channel")))?;

        for programme in programmes {
            programme_count += 1;
            let mut elem = BytesStart::new("programme");
            elem.push_attribute(("start", programme.start.as_str()));
            elem.push_attribute(("stop", programme.stop.as_str()));
            elem.push_attribute(("channel", tvg_id));
            writer.write_event(Event::Start(elem))?;

            writer.write_event(Event::Start(BytesStart::new("title")))?;
            writer.write_event(Event::Text(BytesText::new(&programme.title)))?;
            writer.write_event(Event::End(BytesEnd::new("title")))?;

            writer.write_event(Event::Start(BytesStart::new("desc")))?;
            writer.write_event(Event::Text(BytesText::new(&programme.description)))?;
            writer.write_event(Event::End(BytesEnd::new("desc")))?;

            writer.write_event(Event::End(BytesEnd::new("programme")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("tv")))?;

    // HashMap iteration order is arbitrary; sort so diagnostics are stable.
    let mut orphan_epg_ids: Vec<String> = guide
        .programmes
        .keys()
        .filter(|id| !matched_ids.contains(&id.as_str()))
        .cloned()
        .collect();
    orphan_epg_ids.sort();

    let xml = String::from_utf8(writer.into_inner())?;
    Ok(MergeOutcome {
        xml,
        matched_channels,
        programme_count,
        unmatched_playlist,
        orphan_epg_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epg::parse_epg;
    use crate::m3u::parse_playlist;

    fn channel(name: &str, tvg_id: Option<&str>) -> PlaylistChannel {
        PlaylistChannel {
            name: name.to_string(),
            tvg_id: tvg_id.map(str::to_string),
        }
    }

    #[test]
    fn test_round_trip_single_channel() {
        let guide = parse_epg(
            r#"<tv><programme start="20240101000000 +0000" stop="20240101010000 +0000" channel="chan1"><title>Show</title><desc>Desc</desc></programme></tv>"#,
        )
        .unwrap();
        let channels = [channel("Channel One", Some("chan1"))];

        let outcome = merge(&channels, &guide).unwrap();
        assert_eq!(outcome.matched_channels, 1);
        assert_eq!(outcome.programme_count, 1);
        assert_eq!(outcome.xml.matches("<channel id=\"chan1\">").count(), 1);
        assert_eq!(outcome.xml.matches("<programme ").count(), 1);
        assert!(outcome
            .xml
            .contains(r#"start="20240101000000 +0000" stop="20240101010000 +0000" channel="chan1""#));
        assert!(outcome.xml.contains("<title>Show</title>"));
        assert!(outcome.xml.contains("<desc>Desc</desc>"));
        assert!(outcome.xml.contains("<display-name>Channel One</display-name>"));
    }

    #[test]
    fn test_unmatched_playlist_channel_is_filtered() {
        let guide = parse_epg(
            r#"<tv><programme start="1" stop="2" channel="known"><title>T</title></programme></tv>"#,
        )
        .unwrap();
        let channels = [
            channel("Known", Some("known")),
            channel("Unknown", Some("missing")),
            channel("No Id", None),
        ];

        let outcome = merge(&channels, &guide).unwrap();
        assert_eq!(outcome.matched_channels, 1);
        assert!(!outcome.xml.contains("missing"));
        assert!(!outcome.xml.contains("No Id"));
        assert_eq!(
            outcome.unmatched_playlist,
            vec!["Unknown".to_string(), "No Id".to_string()]
        );
    }

    #[test]
    fn test_orphan_epg_ids_are_reported() {
        let guide = parse_epg(
            r#"<tv>
  <programme start="1" stop="2" channel="zeta"><title>T</title></programme>
  <programme start="1" stop="2" channel="used"><title>T</title></programme>
  <programme start="1" stop="2" channel="alpha"><title>T</title></programme>
</tv>"#,
        )
        .unwrap();
        let channels = [channel("Used", Some("used"))];

        let outcome = merge(&channels, &guide).unwrap();
        // Sorted regardless of guide map iteration order.
        assert_eq!(
            outcome.orphan_epg_ids,
            vec!["alpha".to_string(), "zeta".to_string()]
        );
        // Orphans stay out of the document itself.
        assert!(!outcome.xml.contains("alpha"));
        assert!(!outcome.xml.contains("zeta"));
    }

    #[test]
    fn test_no_orphan_programmes_in_output() {
        let content = "#EXTINF:-1 tvg-id=\"a\",A\nhttp://x/1.ts\n#EXTINF:-1 tvg-id=\"b\",B\nhttp://x/2.ts\n";
        let guide = parse_epg(
            r#"<tv>
  <programme start="1" stop="2" channel="b"><title>Only B has a guide</title></programme>
</tv>"#,
        )
        .unwrap();

        let outcome = merge(&parse_playlist(content), &guide).unwrap();
        assert_eq!(
            outcome.xml.matches("<channel id=").count(),
            outcome.matched_channels
        );
        assert!(outcome.xml.contains("channel=\"b\""));
        assert!(!outcome.xml.contains("channel=\"a\""));
    }

    #[test]
    fn test_text_content_is_escaped() {
        let guide = parse_epg(
            r#"<tv><programme start="1" stop="2" channel="c"><title>Tom &amp; Jerry &lt;HD&gt;</title></programme></tv>"#,
        )
        .unwrap();
        let channels = [channel("A & B", Some("c"))];

        let outcome = merge(&channels, &guide).unwrap();
        assert!(outcome.xml.contains("<title>Tom &amp; Jerry &lt;HD&gt;</title>"));
        assert!(outcome.xml.contains("<display-name>A &amp; B</display-name>"));
    }

    #[test]
    fn test_empty_inputs() {
        let outcome = merge(&[], &EpgGuide::default()).unwrap();
        assert_eq!(outcome.matched_channels, 0);
        assert!(outcome.xml.contains("<tv></tv>"));
    }
}
