//! Storage-format XML parser with `ac:`/`ri:` namespace support.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::entities::{decode_named_entities, decode_reference};
use crate::error::StorageError;

/// Confluence XML namespaces.
const NAMESPACES: &[(&str, &str)] = &[
    ("ac", "http://www.atlassian.com/schema/confluence/4/ac/"),
    ("ri", "http://www.atlassian.com/schema/confluence/4/ri/"),
];

/// An element of a storage-format document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageNode {
    /// Qualified tag name (`ac:structured-macro`).
    pub tag: String,
    /// Attributes by qualified name, namespace declarations excluded.
    pub attrs: HashMap<String, String>,
    /// Direct text and CDATA content, entities decoded.
    pub text: String,
    pub children: Vec<StorageNode>,
}

impl StorageNode {
    /// Attribute value by qualified name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Child elements with the given tag.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a StorageNode> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Visit this node and all descendants in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a StorageNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Parse storage-format XML into a tree rooted at a synthetic `root` element.
///
/// Named HTML entities are decoded first and a leading XML declaration is
/// skipped. Elements left open at the end of input are closed.
pub fn parse_storage(xml: &str) -> Result<StorageNode, StorageError> {
    let xml = decode_named_entities(strip_declaration(xml));
    let namespace_decls = NAMESPACES
        .iter()
        .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
        .collect::<Vec<_>>()
        .join(" ");
    let wrapped = format!("<root {namespace_decls}>{xml}</root>");

    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    // Open elements; the first entry collects top-level nodes.
    let mut stack = vec![StorageNode::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(open_element(&reader, &e)),
            Event::Empty(e) => {
                let node = open_element(&reader, &e);
                current(&mut stack).children.push(node);
            }
            Event::End(e) => {
                if stack.len() <= 1 {
                    let tag = decode_name(&reader, e.name().as_ref());
                    return Err(StorageError::UnexpectedEnd(tag));
                }
                close_element(&mut stack);
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                current(&mut stack).text.push_str(&text);
            }
            Event::GeneralRef(e) => {
                let reference = reader.decoder().decode(&e)?;
                current(&mut stack).text.push_str(&decode_reference(&reference));
            }
            Event::CData(e) => {
                current(&mut stack).text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    while stack.len() > 1 {
        close_element(&mut stack);
    }
    let document = stack.pop().unwrap_or_default();
    Ok(document.children.into_iter().next().unwrap_or_default())
}

fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml")
        && let Some(end) = trimmed.find("?>")
    {
        return &trimmed[end + 2..];
    }
    xml
}

fn current(stack: &mut [StorageNode]) -> &mut StorageNode {
    // The stack always holds the document entry.
    let last = stack.len() - 1;
    &mut stack[last]
}

fn close_element(stack: &mut Vec<StorageNode>) {
    if let Some(node) = stack.pop() {
        current(stack).children.push(node);
    }
}

fn open_element<R>(reader: &Reader<R>, e: &BytesStart) -> StorageNode {
    StorageNode {
        tag: decode_name(reader, e.name().as_ref()),
        attrs: decode_attrs(reader, e),
        ..StorageNode::default()
    }
}

fn decode_name<R>(reader: &Reader<R>, name: &[u8]) -> String {
    reader
        .decoder()
        .decode(name)
        .map_or_else(|_| String::from_utf8_lossy(name).into_owned(), Cow::into_owned)
}

fn decode_attrs<R>(reader: &Reader<R>, e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = decode_name(reader, attr.key.as_ref());
            if key.starts_with("xmlns") {
                return None;
            }
            let value = attr
                .unescape_value()
                .map_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned(), Cow::into_owned);
            Some((key, value))
        })
        .collect()
}
