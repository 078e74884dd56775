use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// The document was not a readable `rss > channel > item*` tree.
#[derive(Debug, Error)]
#[error("Malformed feed document: {0}")]
pub struct ParseError(pub String);

/// One retrieved syndication document. Lives only for the duration of a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<Entry>,
}

/// One `<item>` of a [`FeedDocument`], before persistence.
///
/// `published` is the raw `pubDate` text; see [`crate::feed::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: String,
}

/// Longest entity name considered when scanning for `&name;` references
const MAX_REFERENCE_LEN: usize = 32;

// Element depths: 1 = <rss>, 2 = <channel>, 3 = channel fields and <item>,
// 4 = item fields.
const CHANNEL_DEPTH: usize = 2;
const ITEM_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Published,
}

impl Field {
    /// Only unprefixed names count. `<atom:link/>`, `<itunes:title>` and
    /// friends share a local name with RSS fields but are not RSS fields.
    fn from_element(e: &BytesStart<'_>) -> Option<Self> {
        if e.name().prefix().is_some() {
            return None;
        }
        match e.local_name().as_ref() {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::Published),
            _ => None,
        }
    }
}

fn slot<'a>(
    doc: &'a mut FeedDocument,
    item: Option<&'a mut Entry>,
    field: Field,
) -> Option<&'a mut String> {
    match (item, field) {
        (Some(entry), Field::Title) => Some(&mut entry.title),
        (Some(entry), Field::Link) => Some(&mut entry.link),
        (Some(entry), Field::Description) => Some(&mut entry.description),
        (Some(entry), Field::Published) => Some(&mut entry.published),
        (None, Field::Title) => Some(&mut doc.title),
        (None, Field::Link) => Some(&mut doc.link),
        (None, Field::Description) => Some(&mut doc.description),
        (None, Field::Published) => None,
    }
}

/// Repeated fields keep the first non-empty value.
fn commit(slot: &mut String, text: &str) {
    let text = text.trim();
    if slot.is_empty() && !text.is_empty() {
        *slot = text.to_string();
    }
}

/// Decode an RSS 2.0 document and unescape HTML entities in its text fields.
///
/// Channel title/description and every item's title/description are passed
/// through [`unescape_html`]; links and dates are kept verbatim (after XML
/// decoding). Unknown elements, attributes, and namespaced extensions are
/// skipped.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ParseError(format!("body is not UTF-8: {}", e)))?;

    // SEC-002: quick-xml (0.37) never expands DOCTYPE entity declarations;
    // `unescape()` resolves only the five predefined XML entities and fails
    // on anything else.
    let mut reader = Reader::from_str(text);

    let mut doc = FeedDocument::default();
    let mut saw_channel = false;
    let mut in_channel = false;
    let mut item: Option<Entry> = None;
    // Field being read and the depth of its element
    let mut field: Option<(Field, usize)> = None;
    let mut field_text = String::new();
    let mut depth: usize = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == CHANNEL_DEPTH && e.local_name().as_ref() == b"channel" {
                    saw_channel = true;
                    in_channel = true;
                } else if in_channel && depth == ITEM_DEPTH && e.local_name().as_ref() == b"item" {
                    item = Some(Entry::default());
                } else if field.is_none() {
                    let field_depth = if item.is_some() { ITEM_DEPTH + 1 } else { ITEM_DEPTH };
                    if in_channel && depth == field_depth {
                        field = Field::from_element(&e).map(|f| (f, depth));
                        field_text.clear();
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if in_channel && depth + 1 == ITEM_DEPTH && e.local_name().as_ref() == b"item" {
                    doc.entries.push(Entry::default());
                }
            }
            Ok(Event::Text(e)) if field.is_some() => {
                let unescaped = e.unescape().map_err(|e| ParseError(e.to_string()))?;
                field_text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) if field.is_some() => {
                field_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                match field {
                    Some((f, d)) if d == depth => {
                        if let Some(target) = slot(&mut doc, item.as_mut(), f) {
                            commit(target, &field_text);
                        }
                        field = None;
                    }
                    _ => {}
                }
                if in_channel && depth == ITEM_DEPTH {
                    if let Some(entry) = item.take() {
                        doc.entries.push(entry);
                    }
                }
                if depth == CHANNEL_DEPTH {
                    in_channel = false;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => {
                if depth != 0 {
                    return Err(ParseError("unexpected end of document".to_string()));
                }
                break;
            }
            Err(e) => return Err(ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !saw_channel {
        return Err(ParseError("no <channel> element".to_string()));
    }

    doc.title = unescape_html(&doc.title);
    doc.description = unescape_html(&doc.description);
    for entry in &mut doc.entries {
        entry.title = unescape_html(&entry.title);
        entry.description = unescape_html(&entry.description);
    }
    Ok(doc)
}

/// Decode HTML character references (`&amp;`, `&#39;`, `&#x27;`, `&eacute;`, ...).
///
/// Feeds commonly double-encode entities, so after XML decoding the text can
/// still carry a layer of them. Each `&name;` reference is decoded on its
/// own; a bare `&` or an unknown reference stays as literal text.
pub fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let name_len = tail[1..]
            .bytes()
            .take(MAX_REFERENCE_LEN)
            .position(|b| !(b.is_ascii_alphanumeric() || b == b'#'));
        if let Some(n) = name_len.filter(|&n| n > 0 && tail.as_bytes()[n + 1] == b';') {
            if let Ok(decoded) = htmlescape::decode_html(&tail[..n + 2]) {
                out.push_str(&decoded);
                rest = &tail[n + 2..];
                continue;
            }
        }

        out.push('&');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <title>Tom &amp;amp; Jerry</title>
  <atom:link href="https://example.com/rss" rel="self" type="application/rss+xml"/>
  <link>https://example.com/</link>
  <description>Cat &amp;lt;3 mouse</description>
  <language>en-us</language>
  <item>
    <title>It&amp;#39;s alive</title>
    <link>https://example.com/1</link>
    <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    <guid>https://example.com/1</guid>
    <description>&lt;p&gt;First&lt;/p&gt;</description>
  </item>
  <item>
    <title><![CDATA[Second & last]]></title>
    <link>https://example.com/2</link>
    <pubDate>2006-01-03T10:00:00Z</pubDate>
  </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_channel_and_items() {
        let doc = parse_feed(SAMPLE.as_bytes()).unwrap();

        assert_eq!(doc.title, "Tom & Jerry");
        assert_eq!(doc.link, "https://example.com/");
        assert_eq!(doc.description, "Cat <3 mouse");
        assert_eq!(
            doc.entries,
            vec![
                Entry {
                    title: "It's alive".to_string(),
                    link: "https://example.com/1".to_string(),
                    description: "<p>First</p>".to_string(),
                    published: "Mon, 02 Jan 2006 15:04:05 -0700".to_string(),
                },
                Entry {
                    title: "Second & last".to_string(),
                    link: "https://example.com/2".to_string(),
                    description: String::new(),
                    published: "2006-01-03T10:00:00Z".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_wordpress_layout_atom_link_before_link() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
  <title>TechCrunch</title>
  <atom:link href="https://techcrunch.com/feed/" rel="self" type="application/rss+xml" />
  <link>https://techcrunch.com/</link>
  <description>Startup and Technology News</description>
  <item>
    <title>Funding round closes</title>
    <link>https://techcrunch.com/2024/05/01/funding/</link>
    <dc:creator><![CDATA[Staff]]></dc:creator>
    <pubDate>Wed, 01 May 2024 16:00:00 +0000</pubDate>
  </item>
</channel>
</rss>"#;
        let doc = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(doc.title, "TechCrunch");
        assert_eq!(doc.link, "https://techcrunch.com/");
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].link, "https://techcrunch.com/2024/05/01/funding/");
        assert_eq!(doc.entries[0].published, "Wed, 01 May 2024 16:00:00 +0000");
    }

    #[test]
    fn test_namespaced_item_fields_are_ignored() {
        let xml = r#"<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <title>Podcast</title>
  <item>
    <itunes:title>Episode 12 (iTunes)</itunes:title>
    <title>Episode 12</title>
    <atom:link href="https://pod.example/alt" rel="alternate"/>
    <link>https://pod.example/12</link>
    <itunes:summary>Not the description</itunes:summary>
    <description>Show notes</description>
  </item>
</channel>
</rss>"#;
        let doc = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(
            doc.entries,
            vec![Entry {
                title: "Episode 12".to_string(),
                link: "https://pod.example/12".to_string(),
                description: "Show notes".to_string(),
                published: String::new(),
            }]
        );
    }

    #[test]
    fn test_repeated_field_keeps_first_non_empty() {
        let xml = r#"<rss><channel>
  <link></link>
  <link>https://first.example/</link>
  <link>https://second.example/</link>
</channel></rss>"#;
        let doc = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(doc.link, "https://first.example/");
    }

    #[test]
    fn test_mixed_entities_in_title() {
        let xml = r#"<rss><channel><title>AT&amp;T &amp;amp; more</title>
  <item><title><![CDATA[Q&A: It&#39;s here]]></title><link>https://example.com/qa</link></item>
</channel></rss>"#;
        let doc = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(doc.title, "AT&T & more");
        assert_eq!(doc.entries[0].title, "Q&A: It's here");
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_feed(br#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert_eq!(doc, FeedDocument::default());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_feed(b"<not valid xml").unwrap_err();
        assert!(err.to_string().starts_with("Malformed feed document"));
    }

    #[test]
    fn test_truncated_document_is_parse_error() {
        assert!(parse_feed(b"<rss><channel><title>cut off").is_err());
    }

    #[test]
    fn test_missing_channel_is_parse_error() {
        assert!(parse_feed(br#"<rss version="2.0"></rss>"#).is_err());
    }

    #[test]
    fn test_non_utf8_is_parse_error() {
        assert!(parse_feed(&[0x3c, 0xff, 0xfe, 0x3e]).is_err());
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("plain"), "plain");
        assert_eq!(unescape_html("a &amp; b"), "a & b");
        assert_eq!(unescape_html("&lt;b&gt;"), "<b>");
        assert_eq!(unescape_html("&#39;&#x27;"), "''");
        assert_eq!(unescape_html("&quot;q&quot;"), "\"q\"");
    }

    #[test]
    fn test_unescape_html_keeps_stray_ampersands() {
        assert_eq!(unescape_html("Q&A: It&#39;s here"), "Q&A: It's here");
        assert_eq!(unescape_html("AT&T &amp; more"), "AT&T & more");
        assert_eq!(unescape_html("Tom & Jerry &eacute;t&eacute;"), "Tom & Jerry été");
        assert_eq!(unescape_html("&bogus; &amp;"), "&bogus; &");
        assert_eq!(unescape_html("&#xZZ; ok"), "&#xZZ; ok");
        assert_eq!(unescape_html("trailing &"), "trailing &");
        assert_eq!(unescape_html("&&amp;&"), "&&&");
    }
}
