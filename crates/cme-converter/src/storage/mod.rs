//! Confluence storage format ("editor2") support.
//!
//! The view HTML of a page only carries placeholders for some macros; their
//! source lives in the storage-format XML. [`MacroIndex`] parses that XML and
//! indexes every `ac:structured-macro` by its `ac:macro-id`.

mod entities;
mod parser;

use std::collections::HashMap;

pub use parser::{StorageNode, parse_storage};

use crate::error::StorageError;

const MACRO_TAG: &str = "ac:structured-macro";
const PARAMETER_TAG: &str = "ac:parameter";
const PLAIN_TEXT_BODY_TAG: &str = "ac:plain-text-body";

/// A structured macro from storage XML.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredMacro {
    /// Macro name (`ac:name`), e.g. `plantuml`.
    pub name: String,
    /// Macro id (`ac:macro-id`), empty when absent.
    pub id: String,
    /// Parameters by `ac:name`.
    pub parameters: HashMap<String, String>,
    /// Plain-text body, if the macro has one.
    pub body: Option<String>,
}

impl StructuredMacro {
    fn from_node(node: &StorageNode) -> Self {
        let parameters = node
            .children_named(PARAMETER_TAG)
            .filter_map(|param| Some((param.attr("ac:name")?.to_owned(), param.text.trim().to_owned())))
            .collect();
        let body = node
            .children_named(PLAIN_TEXT_BODY_TAG)
            .next()
            .map(|body| body.text.clone());

        Self {
            name: node.attr("ac:name").unwrap_or_default().to_owned(),
            id: node.attr("ac:macro-id").unwrap_or_default().to_owned(),
            parameters,
            body,
        }
    }
}

/// Structured macros of a page, by macro id.
#[derive(Clone, Debug, Default)]
pub struct MacroIndex {
    macros: HashMap<String, StructuredMacro>,
}

impl MacroIndex {
    /// Parse storage XML and index its structured macros.
    ///
    /// Macros without an id are not indexed. When an id repeats, the first
    /// macro wins.
    pub fn parse(xml: &str) -> Result<Self, StorageError> {
        let root = parse_storage(xml)?;
        let mut macros = HashMap::new();
        root.walk(&mut |node| {
            if node.tag != MACRO_TAG {
                return;
            }
            let parsed = StructuredMacro::from_node(node);
            if !parsed.id.is_empty() {
                macros.entry(parsed.id.clone()).or_insert(parsed);
            }
        });

        tracing::debug!(macros = macros.len(), "Indexed storage macros");
        Ok(Self { macros })
    }

    /// Macro by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StructuredMacro> {
        self.macros.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EDITOR2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<p>Intro</p>
<ac:structured-macro ac:name="plantuml" ac:schema-version="1"
    ac:macro-id="uml-1">
    <ac:parameter ac:name="fileName">plantuml_test</ac:parameter>
    <ac:plain-text-body><![CDATA[{"umlDefinition":"@startuml\nA -> B\n@enduml"}]]></ac:plain-text-body>
</ac:structured-macro>
<div>
  <ac:structured-macro ac:name="info" ac:macro-id="info-1">
    <ac:rich-text-body><p>Note&nbsp;this</p></ac:rich-text-body>
  </ac:structured-macro>
</div>
<ac:structured-macro ac:name="toc"/>"#;

    #[test]
    fn test_index_macros_by_id() {
        let index = MacroIndex::parse(EDITOR2).unwrap();

        let uml = index.get("uml-1").unwrap();
        assert_eq!(uml.name, "plantuml");
        assert_eq!(
            uml.parameters.get("fileName").map(String::as_str),
            Some("plantuml_test")
        );
        assert_eq!(
            uml.body.as_deref(),
            Some(r#"{"umlDefinition":"@startuml\nA -> B\n@enduml"}"#)
        );
    }

    #[test]
    fn test_nested_macro_without_plain_body() {
        let index = MacroIndex::parse(EDITOR2).unwrap();
        let info = index.get("info-1").unwrap();
        assert_eq!(info.name, "info");
        assert_eq!(info.body, None);
    }

    #[test]
    fn test_macro_without_id_not_indexed() {
        let index = MacroIndex::parse(EDITOR2).unwrap();
        assert!(index.get("").is_none());
    }

    #[test]
    fn test_empty_input() {
        let index = MacroIndex::parse("").unwrap();
        assert!(index.get("x").is_none());
    }

    #[test]
    fn test_invalid_xml_is_error() {
        assert!(MacroIndex::parse("<ac:structured-macro></p>").is_err());
    }
}
