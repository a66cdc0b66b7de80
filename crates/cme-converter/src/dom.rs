//! Typed DOM built from the html5ever parse tree.
//!
//! html5ever performs the HTML5 error recovery (unclosed tags, stray cells,
//! implied `<tbody>`), so every input string yields a tree. The reference
//! counted `RcDom` is copied into owned [`Node`] values right away and
//! dropped, which keeps the rest of the crate free of `RefCell` borrows.

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// A node in the parsed document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Element with tag name, attributes and children.
    Element(Element),
    /// Character data, entities already decoded.
    Text(String),
}

impl Node {
    /// Element payload, if this node is an element.
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) => None,
        }
    }
}

/// An HTML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Lowercase local tag name (e.g. `td`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All child nodes in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given tag name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }
}

/// A parsed HTML document.
#[derive(Clone, Debug, Default)]
pub struct Document {
    root: Element,
}

impl Document {
    /// The `<body>` element. html5ever always synthesizes one.
    #[must_use]
    pub fn body(&self) -> Option<&Element> {
        self.root.child("html").and_then(|html| html.child("body"))
    }

    /// Trimmed text of `<head><title>`, if present and non-empty.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let title = self
            .root
            .child("html")?
            .child("head")?
            .child("title")?
            .text_content();
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_owned())
    }
}

/// Parse an HTML document or fragment.
///
/// Never fails: malformed markup is repaired by the HTML5 tree builder.
#[must_use]
pub fn parse_html(html: &str) -> Document {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let dom = parse_document(RcDom::default(), opts).one(html);

    Document {
        root: Element {
            name: "#document".to_owned(),
            attrs: Vec::new(),
            children: convert_children(&dom.document),
        },
    }
}

fn convert_children(handle: &Handle) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert_node)
        .collect()
}

fn convert_node(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            Some(Node::Element(Element {
                name: name.local.to_string(),
                attrs,
                children: convert_children(handle),
            }))
        }
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => None,
    }
}
