//! PlantUML macro conversion.
//!
//! In view HTML a PlantUML macro is an empty placeholder
//! `<div data-macro-name="plantuml" data-macro-id="…">`. The diagram source
//! is stored in the storage-format macro with the same id, as a JSON body
//! `{"umlDefinition": "…"}`. The handler replaces the placeholder with a
//! fenced `plantuml` code block, or with an HTML comment when the source
//! cannot be recovered.

use serde::Deserialize;

use crate::dom::Element;
use crate::markdown::{ElementHandler, HandleResult};
use crate::storage::MacroIndex;
use crate::util::longest_run;

const MACRO_NAME: &str = "plantuml";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantUmlBody {
    uml_definition: String,
}

/// Converts PlantUML macro placeholders using the page's storage macros.
#[derive(Debug, Default)]
pub struct PlantUmlHandler {
    index: Option<MacroIndex>,
    warnings: Vec<String>,
}

impl PlantUmlHandler {
    /// Create a handler backed by a macro index.
    ///
    /// Without an index every placeholder falls back to a comment.
    #[must_use]
    pub fn new(index: Option<MacroIndex>) -> Self {
        Self {
            index,
            warnings: Vec::new(),
        }
    }

    /// Create a handler from storage XML.
    ///
    /// A storage document that fails to parse is recorded as a warning and
    /// the handler continues without an index.
    #[must_use]
    pub fn from_storage(xml: Option<&str>) -> Self {
        let mut warnings = Vec::new();
        let index = xml.and_then(|xml| match MacroIndex::parse(xml) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse storage XML");
                warnings.push(format!("Failed to parse storage XML: {e}"));
                None
            }
        });
        Self {
            warnings,
            ..Self::new(index)
        }
    }

    /// Markdown for a PlantUML placeholder.
    pub fn convert(&mut self, element: &Element) -> String {
        let Some(id) = element
            .attr("data-macro-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            return self.fallback("<!-- PlantUML diagram: no macro-id found -->".to_owned());
        };

        let Some(body) = self
            .index
            .as_ref()
            .and_then(|index| index.get(id))
            .and_then(|found| found.body.as_deref())
        else {
            return self.fallback(format!("<!-- PlantUML diagram ({id}): not found in editor2 -->"));
        };

        match serde_json::from_str::<PlantUmlBody>(body) {
            Ok(parsed) => code_block(&parsed.uml_definition),
            Err(e) => {
                tracing::debug!(id, error = %e, "Invalid PlantUML macro body");
                self.fallback(format!("<!-- PlantUML diagram ({id}): invalid JSON -->"))
            }
        }
    }

    fn fallback(&mut self, comment: String) -> String {
        tracing::warn!(%comment, "PlantUML diagram not converted");
        self.warnings.push(comment.clone());
        comment
    }
}

impl ElementHandler for PlantUmlHandler {
    fn handle(&mut self, element: &Element) -> HandleResult {
        if element.attr("data-macro-name") == Some(MACRO_NAME) {
            HandleResult::Block(self.convert(element))
        } else {
            HandleResult::PassThrough
        }
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn code_block(source: &str) -> String {
    let source = source.trim_end_matches(['\n', '\r']);
    let fence = "`".repeat(longest_run(source, '`').max(2) + 1);
    format!("{fence}{MACRO_NAME}\n{source}\n{fence}")
}
