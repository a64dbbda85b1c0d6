//! Parsing and flattening of `description.xml`.
//!
//! A GDTF description is a single XML document. Extraction only looks at the
//! root element (normally `<GDTF>`) and the elements directly below it
//! (normally `<FixtureType>`), merging their attributes into one map.
//! Anything nested deeper is ignored.

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use indexmap::IndexMap;
use roxmltree::{Document, Node, ParsingOptions};
use std::borrow::Cow;

use crate::error::{DocumentError, TextPosition};

/// Attribute name to value, in first-insertion order
pub type AttributeMap = IndexMap<String, String>;

/// Parse the raw bytes of a description document and flatten its attributes.
///
/// The encoding is taken from a byte-order mark, then from the `encoding` of
/// the XML declaration, defaulting to UTF-8.
pub fn parse_description(bytes: &[u8]) -> Result<AttributeMap, DocumentError> {
    let text = decode_document(bytes)?;

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(&text, options).map_err(|e| {
        let pos = e.pos();
        DocumentError::new(e.to_string()).with_position(TextPosition {
            row: pos.row,
            col: pos.col,
        })
    })?;

    Ok(flatten_attributes(&doc))
}

/// Decode a document to UTF-8 text without its byte-order mark.
fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>, DocumentError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (sniff_encoding(bytes)?, bytes),
    };

    if encoding == UTF_8 {
        return std::str::from_utf8(body).map(Cow::Borrowed).map_err(|e| {
            DocumentError::new(format!(
                "document is not valid UTF-8 (invalid byte at offset {})",
                e.valid_up_to()
            ))
        });
    }

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            DocumentError::new(format!("document is not valid {}", encoding.name()))
        })?;
    tracing::debug!(encoding = encoding.name(), "decoded description");

    // roxmltree sees UTF-8 now, so the declaration no longer describes the text
    Ok(Cow::Owned(blank_declaration(text.into_owned())))
}

/// Pick the encoding of a document that has no byte-order mark.
fn sniff_encoding(bytes: &[u8]) -> Result<&'static Encoding, DocumentError> {
    if bytes.starts_with(b"<\0?\0") {
        return Ok(UTF_16LE);
    }
    if bytes.starts_with(b"\0<\0?") {
        return Ok(UTF_16BE);
    }

    let Some(label) = declared_encoding(bytes) else {
        return Ok(UTF_8);
    };
    let encoding = Encoding::for_label(label).ok_or_else(|| {
        DocumentError::new(format!(
            "unknown encoding '{}'",
            String::from_utf8_lossy(label)
        ))
    })?;
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Err(DocumentError::new(format!(
            "document declares {} but is not UTF-16 encoded",
            encoding.name()
        )));
    }
    Ok(encoding)
}

/// The `encoding` value of a leading `<?xml ...?>` declaration
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let decl = bytes.strip_prefix(b"<?xml")?;
    if !decl.first().is_some_and(u8::is_ascii_whitespace) {
        return None;
    }
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = &decl[..end];

    let name = decl.windows(8).position(|w| w == b"encoding")?;
    let value = decl[name + 8..].trim_ascii_start().strip_prefix(b"=")?.trim_ascii_start();
    let quote = *value.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &value[1..];
    let len = value.iter().position(|&b| b == quote)?;
    Some(&value[..len])
}

/// Replace the XML declaration with whitespace, keeping line and column
/// numbers of everything after it unchanged.
fn blank_declaration(mut text: String) -> String {
    let is_declaration = text
        .strip_prefix("<?xml")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_whitespace()));
    if let (true, Some(end)) = (is_declaration, text.find("?>")) {
        let blank: String = text[..end + 2]
            .chars()
            .map(|c| if c == '\n' { c } else { ' ' })
            .collect();
        text.replace_range(..end + 2, &blank);
    }
    text
}

/// Collect the attributes of the root element and of each of its direct
/// child elements, later elements overwriting earlier ones on name clashes.
pub fn flatten_attributes(doc: &Document<'_>) -> AttributeMap {
    let root = doc.root_element();
    let mut attributes = AttributeMap::new();

    merge_attributes(&mut attributes, root);
    for child in root.children().filter(Node::is_element) {
        merge_attributes(&mut attributes, child);
    }

    attributes
}

fn merge_attributes(attributes: &mut AttributeMap, node: Node<'_, '_>) {
    tracing::trace!(
        element = node.tag_name().name(),
        count = node.attributes().count(),
        "merging attributes"
    );
    for attr in node.attributes() {
        attributes.insert(attribute_key(&attr), attr.value().to_string());
    }
}

/// Unqualified names stay as-is, namespaced ones become `{uri}local`
fn attribute_key(attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace() {
        Some(ns) => format!("{{{}}}{}", ns, attr.name()),
        None => attr.name().to_string(),
    }
}
