//! Generic HTML to Markdown writer.
//!
//! Walks the typed DOM and produces CommonMark with GitHub-flavored tables.
//! Every node renders to a [`Chunk`]: inline chunks are concatenated into
//! paragraphs, block chunks stand on their own and are separated by a blank
//! line (a single newline inside list items and table cells).
//!
//! Elements can be claimed before the generic rules by an [`ElementHandler`],
//! which is how Confluence macros are converted.

use crate::dom::{Element, Node, parse_html};
use crate::table::{CellRenderer, HeaderPolicy, TableConverter, escape_cell, table_text};
use crate::util::{
    code_span, collapse_whitespace, escape_line_start, escape_markdown, longest_run, prefix_lines,
    wrap_inline,
};

const BLOCK_SEPARATOR: &str = "\n\n";
const TIGHT_SEPARATOR: &str = "\n";

/// Options shared by the HTML writer and the table converter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Replacement for line breaks inside table cells.
    pub table_line_break: String,
    /// Header row for tables without header markup.
    pub header_policy: HeaderPolicy,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            table_line_break: "<br/>".to_owned(),
            header_policy: HeaderPolicy::default(),
        }
    }
}

/// Result of converting HTML to Markdown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvertResult {
    /// Markdown with a single trailing newline (empty for empty input).
    pub markdown: String,
    /// Warnings collected from element handlers.
    pub warnings: Vec<String>,
}

/// Result of handling an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleResult {
    /// Replace the element with a Markdown block.
    Block(String),
    /// Replace the element with inline Markdown.
    Inline(String),
    /// Not handled; apply the generic rules.
    PassThrough,
}

/// Claims elements before the generic conversion rules apply.
///
/// Handlers are consulted in registration order; the first result other than
/// [`HandleResult::PassThrough`] wins.
pub trait ElementHandler {
    /// Convert an element or pass it through.
    fn handle(&mut self, element: &Element) -> HandleResult;

    /// Warnings produced while handling elements.
    ///
    /// Default implementation returns empty slice.
    fn warnings(&self) -> &[String] {
        &[]
    }
}

/// HTML to Markdown converter.
///
/// # Example
///
/// ```
/// use cme_converter::HtmlConverter;
///
/// let result = HtmlConverter::new().convert("<h1>Title</h1><p>Some <b>bold</b> text</p>");
/// assert_eq!(result.markdown, "# Title\n\nSome **bold** text\n");
/// ```
#[derive(Default)]
pub struct HtmlConverter {
    tables: TableConverter,
    handlers: Vec<Box<dyn ElementHandler>>,
}

impl HtmlConverter {
    /// Create a converter with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a converter with the given options.
    #[must_use]
    pub fn with_options(options: ConvertOptions) -> Self {
        Self {
            tables: TableConverter::with_options(options),
            handlers: Vec::new(),
        }
    }

    /// Register an element handler.
    #[must_use]
    pub fn with_handler(mut self, handler: impl ElementHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Convert an HTML document or fragment to Markdown.
    pub fn convert(&mut self, html: &str) -> ConvertResult {
        let document = parse_html(html);
        let markdown = document
            .body()
            .map(|body| self.convert_element(body))
            .unwrap_or_default();

        ConvertResult {
            markdown,
            warnings: self.warnings(),
        }
    }

    /// Convert the children of an element to Markdown.
    pub fn convert_element(&mut self, root: &Element) -> String {
        let mut writer = Writer {
            tables: &self.tables,
            handlers: &mut self.handlers,
            cell_depth: 0,
        };
        finish(&writer.blocks(root, BLOCK_SEPARATOR))
    }

    /// Warnings from all registered handlers.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.handlers
            .iter()
            .flat_map(|handler| handler.warnings().iter().cloned())
            .collect()
    }
}

fn finish(markdown: &str) -> String {
    let trimmed = markdown.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// Rendered output of one node.
enum Chunk {
    Inline(String),
    Block(String),
}

struct Writer<'a> {
    tables: &'a TableConverter,
    handlers: &'a mut [Box<dyn ElementHandler>],
    /// Depth of table cells being rendered.
    cell_depth: usize,
}

impl Writer<'_> {
    fn in_cell(&self) -> bool {
        self.cell_depth > 0
    }

    /// Render children as blocks; inline runs become paragraphs.
    fn blocks(&mut self, el: &Element, separator: &str) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut inline = String::new();
        let in_cell = self.in_cell();

        for child in el.children() {
            match self.node(child) {
                Chunk::Inline(text) => inline.push_str(&text),
                Chunk::Block(text) => {
                    flush_paragraph(&mut inline, &mut blocks, in_cell);
                    if !text.trim().is_empty() {
                        blocks.push(text);
                    }
                }
            }
        }
        flush_paragraph(&mut inline, &mut blocks, in_cell);

        blocks.join(separator)
    }

    /// Render children as inline content.
    fn inline(&mut self, el: &Element) -> String {
        let mut out = String::new();
        for child in el.children() {
            match self.node(child) {
                Chunk::Inline(text) => out.push_str(&text),
                Chunk::Block(text) => {
                    out.push('\n');
                    out.push_str(&text);
                    out.push('\n');
                }
            }
        }
        out
    }

    fn node(&mut self, node: &Node) -> Chunk {
        match node {
            Node::Text(text) => {
                let text = escape_markdown(&collapse_whitespace(text));
                // Cell text has its pipes escaped once the cell is flattened.
                if self.in_cell() {
                    Chunk::Inline(text)
                } else {
                    Chunk::Inline(escape_cell(&text))
                }
            }
            Node::Element(el) => self.element(el),
        }
    }

    fn element(&mut self, el: &Element) -> Chunk {
        for handler in self.handlers.iter_mut() {
            match handler.handle(el) {
                HandleResult::Block(markdown) => return Chunk::Block(markdown),
                HandleResult::Inline(markdown) => return Chunk::Inline(markdown),
                HandleResult::PassThrough => {}
            }
        }

        match el.name() {
            "script" | "style" | "head" | "template" | "noscript" | "title" | "meta" | "link" => {
                Chunk::Inline(String::new())
            }
            "h1" => self.heading(el, 1),
            "h2" => self.heading(el, 2),
            "h3" => self.heading(el, 3),
            "h4" => self.heading(el, 4),
            "h5" => self.heading(el, 5),
            "h6" => self.heading(el, 6),
            "br" => Chunk::Inline("  \n".to_owned()),
            "hr" => Chunk::Block("---".to_owned()),
            "strong" | "b" => Chunk::Inline(wrap_inline(&self.inline(el), "**")),
            "em" | "i" => Chunk::Inline(wrap_inline(&self.inline(el), "*")),
            "del" | "s" | "strike" => Chunk::Inline(wrap_inline(&self.inline(el), "~~")),
            "code" | "kbd" | "samp" | "tt" => Chunk::Inline(inline_code(el)),
            "a" => Chunk::Inline(self.link(el)),
            "img" => Chunk::Inline(image(el)),
            "pre" => Chunk::Block(self.code_block(el)),
            "ul" => Chunk::Block(self.list(el, false)),
            "ol" => Chunk::Block(self.list(el, true)),
            "blockquote" => Chunk::Block(self.blockquote(el)),
            "table" => Chunk::Block(self.table(el)),
            name if is_block(name) => Chunk::Block(self.blocks(el, BLOCK_SEPARATOR)),
            _ => Chunk::Inline(self.inline(el)),
        }
    }

    fn heading(&mut self, el: &Element, level: usize) -> Chunk {
        let text = single_line(&self.inline(el));
        if text.is_empty() {
            return Chunk::Block(String::new());
        }
        if self.in_cell() {
            return Chunk::Block(wrap_inline(&text, "**"));
        }
        Chunk::Block(format!("{} {text}", "#".repeat(level)))
    }

    fn link(&mut self, el: &Element) -> String {
        let text = single_line(&self.inline(el));
        let Some(href) = el.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            return text;
        };
        if text.is_empty() {
            return String::new();
        }
        let href = href.replace(' ', "%20");
        if text == href {
            return format!("<{href}>");
        }
        match el.attr("title").map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("[{text}]({href} \"{}\")", title.replace('"', "\\\"")),
            None => format!("[{text}]({href})"),
        }
    }

    fn code_block(&self, el: &Element) -> String {
        let content = el.text_content();
        let code = content.strip_prefix('\n').unwrap_or(&content).trim_end();

        if self.in_cell() {
            return code
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(code_span)
                .collect::<Vec<_>>()
                .join("\n");
        }

        let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
        format!("{fence}{}\n{code}\n{fence}", code_language(el))
    }

    fn list(&mut self, el: &Element, ordered: bool) -> String {
        let mut number = if ordered {
            el.attr("start")
                .and_then(|start| start.trim().parse::<usize>().ok())
                .unwrap_or(1)
        } else {
            1
        };
        let mut items: Vec<String> = Vec::new();

        for child in el.child_elements() {
            match child.name() {
                "li" => {
                    let marker = if ordered {
                        format!("{number}. ")
                    } else {
                        "- ".to_owned()
                    };
                    number += 1;
                    let body = self.blocks(child, TIGHT_SEPARATOR);
                    items.push(list_item(&marker, &body));
                }
                // A list directly inside a list belongs to the previous item.
                "ul" | "ol" => {
                    let nested = self.list(child, child.name() == "ol");
                    match items.last_mut() {
                        Some(last) => {
                            last.push('\n');
                            last.push_str(&prefix_lines(&nested, "  "));
                        }
                        None => items.push(nested),
                    }
                }
                _ => {}
            }
        }
        items.join("\n")
    }

    fn blockquote(&mut self, el: &Element) -> String {
        let body = self.blocks(el, BLOCK_SEPARATOR);
        if self.in_cell() {
            body
        } else {
            prefix_lines(&body, "> ")
        }
    }

    fn table(&mut self, el: &Element) -> String {
        if self.in_cell() {
            return table_text(el);
        }
        let tables = self.tables;
        tables.render(el, self)
    }
}

impl CellRenderer for Writer<'_> {
    fn render_cell(&mut self, cell: &Element) -> String {
        self.cell_depth += 1;
        let text = self.blocks(cell, TIGHT_SEPARATOR);
        self.cell_depth -= 1;
        text
    }
}

/// Push the pending inline run as a paragraph.
///
/// Outside table cells, each line is guarded against starting a block.
fn flush_paragraph(inline: &mut String, blocks: &mut Vec<String>, in_cell: bool) {
    let text = inline.trim();
    if !text.is_empty() {
        let paragraph = if in_cell {
            text.to_owned()
        } else {
            text.split('\n').map(escape_line_start).collect::<Vec<_>>().join("\n")
        };
        blocks.push(paragraph);
    }
    inline.clear();
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "figure"
            | "figcaption"
            | "details"
            | "summary"
            | "dl"
            | "dt"
            | "dd"
            | "address"
            | "center"
            | "body"
            | "html"
    )
}

/// Join non-blank lines with single spaces.
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Item marker followed by the body; continuation lines align under the text.
fn list_item(marker: &str, body: &str) -> String {
    let mut lines = body.lines();
    let Some(first) = lines.next() else {
        return marker.trim_end().to_owned();
    };
    let indent = " ".repeat(marker.len());
    let mut out = format!("{marker}{first}");
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
    }
    out
}

fn inline_code(el: &Element) -> String {
    let text = collapse_whitespace(&el.text_content());
    if text.trim().is_empty() {
        return String::new();
    }
    code_span(&text)
}

fn image(el: &Element) -> String {
    let Some(src) = el.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let alt = el
        .attr("alt")
        .unwrap_or_default()
        .replace('[', "\\[")
        .replace(']', "\\]");
    let src = src.replace(' ', "%20");
    match el.attr("title").map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("![{alt}]({src} \"{}\")", title.replace('"', "\\\"")),
        None => format!("![{alt}]({src})"),
    }
}

/// Language of a code block, from `data-language`, a syntax highlighter
/// `brush:` parameter or a `language-*` class on `pre` or its `code` child.
fn code_language(el: &Element) -> String {
    if let Some(language) = el.attr("data-language").map(str::trim) {
        return language.to_owned();
    }
    if let Some(params) = el.attr("data-syntaxhighlighter-params") {
        let brush = params
            .split(';')
            .find_map(|param| param.trim().strip_prefix("brush:"));
        if let Some(brush) = brush {
            return brush.trim().to_owned();
        }
    }
    std::iter::once(el)
        .chain(el.child("code"))
        .find_map(|e| {
            e.attr("class")?
                .split_whitespace()
                .find_map(|class| class.strip_prefix("language-"))
        })
        .unwrap_or_default()
        .to_owned()
}
