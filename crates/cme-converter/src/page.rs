//! Whole-page conversion.

use serde::Serialize;

use crate::markdown::{ConvertOptions, ConvertResult, HtmlConverter};
use crate::plantuml::PlantUmlHandler;

/// A Confluence page to convert.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub title: String,
    /// Rendered view HTML.
    pub html: String,
    /// Storage-format XML, used to recover macro sources.
    pub editor2: Option<String>,
    pub labels: Vec<String>,
    /// Ancestor page titles, root first.
    pub ancestors: Vec<String>,
}

/// Page conversion options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageOptions {
    /// Emit the page title as a level-1 heading.
    pub include_document_title: bool,
    /// Emit the ancestor trail above the content.
    pub page_breadcrumbs: bool,
    pub convert: ConvertOptions,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            include_document_title: true,
            page_breadcrumbs: true,
            convert: ConvertOptions::default(),
        }
    }
}

#[derive(Serialize)]
struct FrontMatter<'a> {
    tags: &'a [String],
}

/// Converts pages to Markdown documents.
#[derive(Clone, Debug, Default)]
pub struct PageConverter {
    options: PageOptions,
}

impl PageConverter {
    #[must_use]
    pub fn new(options: PageOptions) -> Self {
        Self { options }
    }

    /// Convert a page to a Markdown document.
    ///
    /// Output order: YAML front matter with the page labels, breadcrumbs,
    /// title heading, body. Each part is optional.
    pub fn convert(&self, page: &Page) -> ConvertResult {
        let mut converter = HtmlConverter::with_options(self.options.convert.clone())
            .with_handler(PlantUmlHandler::from_storage(page.editor2.as_deref()));
        let body = converter.convert(&page.html);
        let mut warnings = body.warnings;

        let mut sections = Vec::new();
        if !page.labels.is_empty() {
            match serde_yaml::to_string(&FrontMatter { tags: &page.labels }) {
                Ok(yaml) => sections.push(format!("---\n{yaml}---")),
                Err(e) => {
                    tracing::warn!(page = %page.id, error = %e, "Failed to serialize front matter");
                    warnings.push(format!("Failed to serialize front matter: {e}"));
                }
            }
        }
        if self.options.page_breadcrumbs && !page.ancestors.is_empty() {
            sections.push(page.ancestors.join(" > "));
        }
        if self.options.include_document_title && !page.title.trim().is_empty() {
            sections.push(format!("# {}", page.title.trim()));
        }
        let content = body.markdown.trim_end();
        if !content.is_empty() {
            sections.push(content.to_owned());
        }

        tracing::debug!(page = %page.id, warnings = warnings.len(), "Converted page");

        let markdown = if sections.is_empty() {
            String::new()
        } else {
            format!("{}\n", sections.join("\n\n"))
        };
        ConvertResult { markdown, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::HeaderPolicy;
    use pretty_assertions::assert_eq;

    fn page(html: &str) -> Page {
        Page {
            id: "12345".to_owned(),
            title: "Test Page".to_owned(),
            html: html.to_owned(),
            ..Page::default()
        }
    }

    fn options(title: bool, breadcrumbs: bool) -> PageOptions {
        PageOptions {
            include_document_title: title,
            page_breadcrumbs: breadcrumbs,
            ..PageOptions::default()
        }
    }

    #[test]
    fn test_title_and_body() {
        let result = PageConverter::default().convert(&page("<p>Body</p>"));
        assert_eq!(result.markdown, "# Test Page\n\nBody\n");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_title_disabled() {
        let result = PageConverter::new(options(false, false)).convert(&page("<p>Body</p>"));
        assert_eq!(result.markdown, "Body\n");
    }

    #[test]
    fn test_breadcrumbs() {
        let mut input = page("<p>Body</p>");
        input.ancestors = vec!["Space Home".to_owned(), "Parent".to_owned()];

        let with = PageConverter::new(options(false, true)).convert(&input);
        assert_eq!(with.markdown, "Space Home > Parent\n\nBody\n");

        let without = PageConverter::new(options(false, false)).convert(&input);
        assert_eq!(without.markdown, "Body\n");
    }

    #[test]
    fn test_front_matter_from_labels() {
        let mut input = page("<p>Body</p>");
        input.labels = vec!["howto".to_owned(), "ops".to_owned()];

        let result = PageConverter::new(options(true, true)).convert(&input);

        assert!(result.markdown.starts_with("---\ntags:\n"), "{}", result.markdown);
        assert!(result.markdown.contains("howto"));
        assert!(result.markdown.contains("ops"));
        assert!(result.markdown.ends_with("---\n\n# Test Page\n\nBody\n"));
    }

    #[test]
    fn test_table_options_applied() {
        let converter = PageConverter::new(PageOptions {
            include_document_title: false,
            page_breadcrumbs: false,
            convert: ConvertOptions {
                table_line_break: " ".to_owned(),
                header_policy: HeaderPolicy::Empty,
            },
        });
        let result = converter.convert(&page("<table><tr><td>a<br>b</td></tr></table>"));
        assert_eq!(result.markdown, "| |\n| --- |\n| a b |\n");
    }

    #[test]
    fn test_plantuml_from_editor2() {
        let mut input = page(
            r#"<h2>Flow</h2><div data-macro-name="plantuml" data-macro-id="m1"></div>"#,
        );
        input.editor2 = Some(
            r#"<ac:structured-macro ac:name="plantuml" ac:macro-id="m1"><ac:plain-text-body><![CDATA[{"umlDefinition":"@startuml\nA -> B\n@enduml"}]]></ac:plain-text-body></ac:structured-macro>"#
                .to_owned(),
        );

        let result = PageConverter::new(options(false, false)).convert(&input);

        assert_eq!(
            result.markdown,
            "## Flow\n\n```plantuml\n@startuml\nA -> B\n@enduml\n```\n"
        );
    }

    #[test]
    fn test_plantuml_fallback_reported() {
        let input = page(r#"<div data-macro-name="plantuml" data-macro-id="gone"></div>"#);
        let result = PageConverter::new(options(false, false)).convert(&input);
        assert_eq!(
            result.markdown,
            "<!-- PlantUML diagram (gone): not found in editor2 -->\n"
        );
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_page() {
        let mut input = page("");
        input.title = String::new();
        assert_eq!(PageConverter::default().convert(&input).markdown, "");
    }

    #[test]
    fn test_page_conversion_is_deterministic() {
        let mut input = page("<table><tr><th>a|b</th></tr><tr><td>1</td></tr></table>");
        input.labels = vec!["x".to_owned()];
        input.ancestors = vec!["Root".to_owned()];
        let converter = PageConverter::default();
        assert_eq!(converter.convert(&input), converter.convert(&input));
    }
}
