//! HTML table to pipe-table conversion.
//!
//! A table is converted in two passes. [`TableConverter::collect`] walks the
//! table element and builds a [`Table`] of header/body rows whose cells are
//! already rendered to single-line, pipe-escaped Markdown.
//! [`TableConverter::render_table`] lays the rows out on a grid (expanding
//! `colspan`/`rowspan`, padding short rows) and writes the header line, the
//! separator line and one line per body row.
//!
//! Cell content is rendered by a [`CellRenderer`], which lets the generic
//! HTML writer supply inline Markdown (bold, links, code) for each cell.

use std::fmt::Write;

use crate::dom::Element;
use crate::markdown::{ConvertOptions, HtmlConverter};
use crate::util::collapse_whitespace;

/// Upper bound for `colspan`, as in the HTML table model.
const MAX_COLSPAN: usize = 1000;

/// Upper bound for `rowspan`, as in the HTML table model.
const MAX_ROWSPAN: usize = 65534;

/// Header row used for tables whose first row has no header markup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// Promote the first row to the header.
    #[default]
    FirstRow,
    /// Emit an empty header row; every source row becomes a body row.
    Empty,
}

/// Column alignment taken from the `align` attribute or `text-align` style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl Alignment {
    fn from_cell(cell: &Element) -> Self {
        if let Some(align) = cell.attr("align") {
            return Self::parse(align);
        }
        cell.attr("style")
            .and_then(|style| {
                style.split(';').find_map(|decl| {
                    let (prop, value) = decl.split_once(':')?;
                    prop.trim().eq_ignore_ascii_case("text-align").then(|| Self::parse(value))
                })
            })
            .unwrap_or_default()
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Self::Left,
            "center" => Self::Center,
            "right" | "end" => Self::Right,
            _ => Self::None,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Self::None => "---",
            Self::Left => ":---",
            Self::Center => ":---:",
            Self::Right => "---:",
        }
    }
}

/// Whether a row came from heading markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Body,
}

/// A rendered table cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Single-line Markdown with every `|` escaped.
    pub text: String,
    /// Number of grid columns the cell occupies (at least 1).
    pub colspan: usize,
    /// Number of grid rows the cell occupies (at least 1).
    pub rowspan: usize,
    pub align: Alignment,
}

impl Cell {
    /// A single-column, single-row cell. `text` is escaped here.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            text: escape_cell(text),
            colspan: 1,
            rowspan: 1,
            align: Alignment::None,
        }
    }
}

/// A table row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub kind: RowKind,
    pub cells: Vec<Cell>,
}

/// A collected table, rows in output order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub caption: Option<String>,
    pub rows: Vec<Row>,
}

/// Renders the content of one table cell as Markdown.
///
/// The returned text may span several lines; the converter flattens it.
pub trait CellRenderer {
    fn render_cell(&mut self, cell: &Element) -> String;
}

/// Escape the column delimiter in cell text.
///
/// Every `|` becomes `\|`, one-to-one; nothing else is touched.
///
/// ```
/// use cme_converter::escape_cell;
///
/// assert_eq!(escape_cell("a | b"), r"a \| b");
/// assert_eq!(escape_cell("plain"), "plain");
/// ```
#[must_use]
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Join the non-blank lines of cell content with `line_break`.
pub(crate) fn flatten_cell(text: &str, line_break: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(line_break)
}

/// Plain text of a table, one line per row, cells separated by spaces.
///
/// Used where a table cannot be rendered as a pipe table (inside a cell).
pub(crate) fn table_text(table: &Element) -> String {
    table_rows(table)
        .map(|(_, tr)| {
            cells_of(tr)
                .map(|cell| collapse_whitespace(&cell.text_content()).trim().to_owned())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows of a table in output order, flagged when inside `<thead>`.
///
/// `<tfoot>` rows come last regardless of their source position. Rows of
/// nested tables are not included.
fn table_rows(table: &Element) -> impl Iterator<Item = (bool, &Element)> {
    let (footer, sections): (Vec<&Element>, Vec<&Element>) = table
        .child_elements()
        .partition(|child| child.name() == "tfoot");
    sections
        .into_iter()
        .chain(footer)
        .flat_map(section_rows)
}

fn section_rows(section: &Element) -> Vec<(bool, &Element)> {
    match section.name() {
        "tr" => vec![(false, section)],
        "thead" | "tbody" | "tfoot" => {
            let in_head = section.name() == "thead";
            section
                .child_elements()
                .filter(|el| el.name() == "tr")
                .map(|tr| (in_head, tr))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn cells_of(tr: &Element) -> impl Iterator<Item = &Element> {
    tr.child_elements()
        .filter(|el| matches!(el.name(), "td" | "th"))
}

fn span_attr(cell: &Element, name: &str, max: usize) -> usize {
    cell.attr(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&span| span > 0)
        .map_or(1, |span| span.min(max))
}

/// Converts HTML tables to GitHub-flavored pipe tables.
#[derive(Clone, Debug, Default)]
pub struct TableConverter {
    options: ConvertOptions,
}

impl TableConverter {
    /// Create a converter with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a converter with the given options.
    #[must_use]
    pub fn with_options(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Convert HTML to Markdown, rendering every table as a pipe table.
    ///
    /// Content outside tables goes through the generic HTML writer; input
    /// without tables produces no pipe-table syntax. Never fails.
    #[must_use]
    pub fn convert(&self, html: &str) -> String {
        HtmlConverter::with_options(self.options.clone())
            .convert(html)
            .markdown
    }

    /// Render a `<table>` element as a pipe table.
    ///
    /// Returns an empty string for tables without rows.
    pub fn render(&self, table: &Element, renderer: &mut dyn CellRenderer) -> String {
        let collected = self.collect(table, renderer);
        self.render_table(&collected)
    }

    /// Collect rows and rendered cells of a `<table>` element.
    ///
    /// A row is a header row when it sits in `<thead>` or every cell is `<th>`.
    pub fn collect(&self, table: &Element, renderer: &mut dyn CellRenderer) -> Table {
        let caption = table
            .child("caption")
            .map(|caption| flatten_cell(&renderer.render_cell(caption), " "))
            .filter(|text| !text.is_empty());

        let rows = table_rows(table)
            .map(|(in_head, tr)| self.collect_row(tr, in_head, renderer))
            .collect();

        Table { caption, rows }
    }

    fn collect_row(&self, tr: &Element, in_head: bool, renderer: &mut dyn CellRenderer) -> Row {
        let all_th = cells_of(tr).next().is_some() && cells_of(tr).all(|c| c.name() == "th");
        let cells = cells_of(tr)
            .map(|cell| self.collect_cell(cell, renderer))
            .collect();
        let kind = if in_head || all_th {
            RowKind::Header
        } else {
            RowKind::Body
        };
        Row { kind, cells }
    }

    fn collect_cell(&self, cell: &Element, renderer: &mut dyn CellRenderer) -> Cell {
        let content = renderer.render_cell(cell);
        Cell {
            colspan: span_attr(cell, "colspan", MAX_COLSPAN),
            rowspan: span_attr(cell, "rowspan", MAX_ROWSPAN),
            align: Alignment::from_cell(cell),
            ..Cell::new(&flatten_cell(&content, &self.options.table_line_break))
        }
    }

    /// Write a collected table as Markdown.
    ///
    /// Every output row has as many columns as the widest source row.
    #[must_use]
    pub fn render_table(&self, table: &Table) -> String {
        let Some(first) = table.rows.first() else {
            tracing::debug!("Skipping table without rows");
            return String::new();
        };

        let mut grid = layout(&table.rows);
        let columns = grid.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let alignments = column_alignments(first);

        let header = if first.kind == RowKind::Header {
            grid.remove(0)
        } else {
            match self.options.header_policy {
                HeaderPolicy::FirstRow => grid.remove(0),
                HeaderPolicy::Empty => Vec::new(),
            }
        };

        tracing::debug!(
            rows = table.rows.len(),
            columns,
            synthesized_header = first.kind != RowKind::Header,
            "Rendering table"
        );

        let mut out = String::with_capacity((grid.len() + 2) * columns * 16);
        if let Some(caption) = &table.caption {
            out.push_str(caption);
            out.push_str("\n\n");
        }

        write_row(&mut out, &header, columns);
        out.push('\n');
        out.push('|');
        for col in 0..columns {
            let align = alignments.get(col).copied().unwrap_or_default();
            write!(out, " {} |", align.separator()).unwrap();
        }
        for row in &grid {
            out.push('\n');
            write_row(&mut out, row, columns);
        }
        out
    }
}

/// Place cells on a grid, expanding spans into empty cells.
///
/// A cell with `colspan = n` is followed by `n - 1` empty cells; a cell with
/// `rowspan = n` leaves an empty cell at its column in the next `n - 1` rows.
fn layout(rows: &[Row]) -> Vec<Vec<String>> {
    // Remaining rows each column is still occupied by a rowspan.
    let mut carry: Vec<usize> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());

    for row in rows {
        let mut line = Vec::with_capacity(carry.len().max(row.cells.len()));
        let mut col = 0;

        for cell in &row.cells {
            col = fill_carried(&mut carry, &mut line, col);
            for offset in 0..cell.colspan {
                line.push(if offset == 0 {
                    cell.text.clone()
                } else {
                    String::new()
                });
                if carry.len() <= col + offset {
                    carry.resize(col + offset + 1, 0);
                }
                carry[col + offset] = cell.rowspan - 1;
            }
            col += cell.colspan;
        }

        while col < carry.len() {
            carry[col] = carry[col].saturating_sub(1);
            line.push(String::new());
            col += 1;
        }

        grid.push(line);
    }
    grid
}

fn fill_carried(carry: &mut [usize], line: &mut Vec<String>, mut col: usize) -> usize {
    while col < carry.len() && carry[col] > 0 {
        carry[col] -= 1;
        line.push(String::new());
        col += 1;
    }
    col
}

fn column_alignments(row: &Row) -> Vec<Alignment> {
    row.cells
        .iter()
        .flat_map(|cell| std::iter::repeat_n(cell.align, cell.colspan))
        .collect()
}

fn write_row(out: &mut String, cells: &[String], columns: usize) {
    out.push('|');
    for col in 0..columns {
        match cells.get(col).map(String::as_str) {
            Some(text) if !text.is_empty() => write!(out, " {text} |").unwrap(),
            _ => out.push_str(" |"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use pretty_assertions::assert_eq;

    /// Renders cells as collapsed plain text.
    struct TextRenderer;

    impl CellRenderer for TextRenderer {
        fn render_cell(&mut self, cell: &Element) -> String {
            collapse_whitespace(&cell.text_content()).trim().to_owned()
        }
    }

    fn first_table(html: &str) -> Element {
        let doc = parse_html(html);
        doc.body().unwrap().child("table").unwrap().clone()
    }

    fn body_row(cells: &[&str]) -> Row {
        Row {
            kind: RowKind::Body,
            cells: cells.iter().map(|text| Cell::new(text)).collect(),
        }
    }

    fn header_row(cells: &[&str]) -> Row {
        Row {
            kind: RowKind::Header,
            ..body_row(cells)
        }
    }

    #[test]
    fn test_escape_cell_single_pipe() {
        assert_eq!(escape_cell("Value with | pipe"), r"Value with \| pipe");
    }

    #[test]
    fn test_escape_cell_counts_match() {
        let text = "a|b||c | d";
        let escaped = escape_cell(text);
        assert_eq!(escaped.matches(r"\|").count(), text.matches('|').count());
        assert_eq!(escaped.replace(r"\|", "").matches('|').count(), 0);
    }

    #[test]
    fn test_escape_cell_without_pipe_unchanged() {
        assert_eq!(escape_cell("Normal value"), "Normal value");
        assert_eq!(escape_cell(""), "");
    }

    #[test]
    fn test_flatten_cell() {
        assert_eq!(flatten_cell("a  \n b\n\n c", "<br/>"), "a<br/>b<br/>c");
        assert_eq!(flatten_cell("a\nb", " "), "a b");
        assert_eq!(flatten_cell("  ", "<br/>"), "");
    }

    #[test]
    fn test_pipe_character_in_cell() {
        let html = r"
        <table>
            <tr>
                <th>Column 1</th>
                <th>Column 2</th>
            </tr>
            <tr>
                <td>Value with | pipe</td>
                <td>Normal value</td>
            </tr>
        </table>
        ";
        let result = TableConverter::new().convert(html);

        assert!(result.contains(r"\|"));
        assert!(result.contains("Column 1"));
        assert!(result.contains("Column 2"));
        assert!(result.contains("Value with"));
        assert!(result.contains("pipe"));
        assert!(result.contains("Normal value"));
        assert_eq!(
            result,
            "| Column 1 | Column 2 |\n| --- | --- |\n| Value with \\| pipe | Normal value |\n"
        );
    }

    #[test]
    fn test_multiple_pipes_in_cell() {
        let html = r"
        <table>
            <tr><th>Header</th></tr>
            <tr><td>Value | with | multiple | pipes</td></tr>
        </table>
        ";
        let result = TableConverter::new().convert(html);

        assert_eq!(result.matches(r"\|").count(), 3);
        let body_line = result.lines().nth(2).unwrap();
        assert_eq!(body_line, r"| Value \| with \| multiple \| pipes |");
    }

    #[test]
    fn test_pipe_character_in_header() {
        let html = r"
        <table>
            <tr><th>Column | 1</th><th>Column | 2</th></tr>
            <tr><td>Value 1</td><td>Value 2</td></tr>
        </table>
        ";
        let result = TableConverter::new().convert(html);

        assert_eq!(result.matches(r"\|").count(), 2);
        assert!(result.starts_with(r"| Column \| 1 | Column \| 2 |"));
        assert!(result.contains("Value 1"));
        assert!(result.contains("Value 2"));
    }

    #[test]
    fn test_table_without_pipes() {
        let html = r"
        <table>
            <tr><th>Name</th><th>Age</th></tr>
            <tr><td>John</td><td>30</td></tr>
        </table>
        ";
        let result = TableConverter::new().convert(html);

        assert!(result.contains("Name"));
        assert!(result.contains("Age"));
        assert!(result.contains("John"));
        assert!(result.contains("30"));
        assert!(result.contains('|'));
        assert!(result.contains("---"));
        assert!(!result.contains(r"\|"));
    }

    #[test]
    fn test_no_table_produces_no_pipe_table() {
        let result = TableConverter::new().convert("<p>Just text, a | b</p>");
        assert_eq!(result, "Just text, a \\| b\n");
        assert!(!result.contains("---"));
    }

    #[test]
    fn test_header_and_separator_on_separate_lines() {
        let html = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>";
        let result = TableConverter::new().convert(html);
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines, vec!["| A | B |", "| --- | --- |", "| 1 | 2 |"]);
    }

    #[test]
    fn test_backslash_before_pipe_in_cell() {
        let html = r"<table><tr><th>Path</th><th>State</th></tr><tr><td>C:\|x</td><td>ok</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result.lines().nth(2).unwrap(), r"| C:\\\|x | ok |");
    }

    #[test]
    fn test_convert_is_deterministic() {
        let html = "<table><tr><th>a|b</th></tr><tr><td><b>x</b></td></tr></table>";
        let converter = TableConverter::new();
        assert_eq!(converter.convert(html), converter.convert(html));
    }

    #[test]
    fn test_multiple_tables_with_surrounding_content() {
        let html = "<p>Intro</p>\
            <table><tr><th>A</th></tr><tr><td>1</td></tr></table>\
            <p>Middle</p>\
            <table><tr><th>B</th></tr><tr><td>2</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(
            result,
            "Intro\n\n| A |\n| --- |\n| 1 |\n\nMiddle\n\n| B |\n| --- |\n| 2 |\n"
        );
    }

    #[test]
    fn test_thead_tbody_sections() {
        let html = "<table>\
            <thead><tr><td>H1</td><td>H2</td></tr></thead>\
            <tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></tbody>\
            </table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(
            result,
            "| H1 | H2 |\n| --- | --- |\n| a | b |\n| c | d |\n"
        );
    }

    #[test]
    fn test_tfoot_rows_last() {
        let html = "<table>\
            <thead><tr><th>H</th></tr></thead>\
            <tfoot><tr><td>total</td></tr></tfoot>\
            <tbody><tr><td>row</td></tr></tbody>\
            </table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result, "| H |\n| --- |\n| row |\n| total |\n");
    }

    #[test]
    fn test_missing_header_promotes_first_row() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result, "| a | b |\n| --- | --- |\n| c | d |\n");
    }

    #[test]
    fn test_missing_header_empty_policy() {
        let options = ConvertOptions {
            header_policy: HeaderPolicy::Empty,
            ..ConvertOptions::default()
        };
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
        let result = TableConverter::with_options(options).convert(html);
        assert_eq!(result, "| | |\n| --- | --- |\n| a | b |\n| c | d |\n");
    }

    #[test]
    fn test_short_rows_padded() {
        let html = "<table>\
            <tr><th>A</th><th>B</th><th>C</th></tr>\
            <tr><td>1</td></tr>\
            </table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result, "| A | B | C |\n| --- | --- | --- |\n| 1 | | |\n");
    }

    #[test]
    fn test_long_rows_widen_header() {
        let html = "<table>\
            <tr><th>A</th></tr>\
            <tr><td>1</td><td>2</td></tr>\
            </table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result, "| A | |\n| --- | --- |\n| 1 | 2 |\n");
    }

    #[test]
    fn test_empty_cells_kept() {
        let html = "<table><tr><th>A</th><th>B</th></tr><tr><td></td><td>x</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result.lines().nth(2).unwrap(), "| | x |");
    }

    #[test]
    fn test_colspan_expands() {
        let table = first_table(
            "<table><tr><th>A</th><th>B</th><th>C</th></tr>\
             <tr><td colspan=\"2\">wide</td><td>c</td></tr></table>",
        );
        let result = TableConverter::new().render(&table, &mut TextRenderer);
        assert_eq!(
            result,
            "| A | B | C |\n| --- | --- | --- |\n| wide | | c |"
        );
    }

    #[test]
    fn test_rowspan_shifts_following_rows() {
        let table = first_table(
            "<table><tr><th>A</th><th>B</th></tr>\
             <tr><td rowspan=\"2\">tall</td><td>1</td></tr>\
             <tr><td>2</td></tr></table>",
        );
        let result = TableConverter::new().render(&table, &mut TextRenderer);
        assert_eq!(
            result,
            "| A | B |\n| --- | --- |\n| tall | 1 |\n| | 2 |"
        );
    }

    #[test]
    fn test_rowspan_in_last_column() {
        let table = first_table(
            "<table><tr><th>A</th><th>B</th></tr>\
             <tr><td>1</td><td rowspan=\"3\">side</td></tr>\
             <tr><td>2</td></tr>\
             <tr><td>3</td></tr></table>",
        );
        let result = TableConverter::new().render(&table, &mut TextRenderer);
        assert_eq!(
            result,
            "| A | B |\n| --- | --- |\n| 1 | side |\n| 2 | |\n| 3 | |"
        );
    }

    #[test]
    fn test_invalid_spans_fall_back_to_one() {
        let table = first_table(
            "<table><tr><th colspan=\"0\">A</th><th rowspan=\"x\">B</th></tr></table>",
        );
        let collected = TableConverter::new().collect(&table, &mut TextRenderer);
        let cells = &collected.rows[0].cells;
        assert_eq!(cells[0].colspan, 1);
        assert_eq!(cells[1].rowspan, 1);
    }

    #[test]
    fn test_alignment_separator() {
        let html = "<table><tr>\
            <th align=\"left\">L</th>\
            <th style=\"color: red; text-align: center\">C</th>\
            <th align=\"right\">R</th>\
            <th>N</th>\
            </tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(
            result.lines().nth(1).unwrap(),
            "| :--- | :---: | ---: | --- |"
        );
    }

    #[test]
    fn test_header_only_table() {
        let result = TableConverter::new().convert("<table><tr><th>Only</th></tr></table>");
        assert_eq!(result, "| Only |\n| --- |\n");
    }

    #[test]
    fn test_table_without_rows_renders_nothing() {
        let result = TableConverter::new().convert("<p>a</p><table></table><p>b</p>");
        assert_eq!(result, "a\n\nb\n");
    }

    #[test]
    fn test_caption_before_table() {
        let html = "<table><caption>Totals</caption><tr><th>A</th></tr><tr><td>1</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result, "Totals\n\n| A |\n| --- |\n| 1 |\n");
    }

    #[test]
    fn test_line_breaks_in_cell() {
        let html = "<table><tr><th>A</th></tr><tr><td>one<br>two\nstill two</td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result.lines().nth(2).unwrap(), "| one<br/>two still two |");
    }

    #[test]
    fn test_custom_line_break_marker() {
        let options = ConvertOptions {
            table_line_break: " ".to_owned(),
            ..ConvertOptions::default()
        };
        let html = "<table><tr><th>A</th></tr><tr><td><p>one</p><p>two</p></td></tr></table>";
        let result = TableConverter::with_options(options).convert(html);
        assert_eq!(result.lines().nth(2).unwrap(), "| one two |");
    }

    #[test]
    fn test_inline_formatting_in_cells() {
        let html = "<table><tr><th><strong>Key</strong></th><th>Link</th></tr>\
            <tr><td><em>it</em> and <code>a|b</code></td>\
            <td><a href=\"https://example.com\">site</a></td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(
            result,
            "| **Key** | Link |\n| --- | --- |\n| *it* and `a\\|b` | [site](https://example.com) |\n"
        );
    }

    #[test]
    fn test_nested_table_flattened() {
        let html = "<table><tr><th>Outer</th></tr><tr><td>\
            <table><tr><td>x</td><td>y|z</td></tr><tr><td>w</td></tr></table>\
            </td></tr></table>";
        let result = TableConverter::new().convert(html);
        assert_eq!(result.lines().count(), 3);
        assert_eq!(result.lines().nth(2).unwrap(), r"| x y\|z<br/>w |");
    }

    #[test]
    fn test_malformed_table_does_not_panic() {
        let html = "<table><tr><th>A<th>B<tr><td>1<td>2<td>3</table";
        let result = TableConverter::new().convert(html);
        assert!(result.starts_with("| A | B | |\n| --- | --- | --- |\n"));
        assert!(result.contains("| 1 | 2 | 3 |"));
    }

    #[test]
    fn test_render_table_model_directly() {
        let table = Table {
            caption: None,
            rows: vec![header_row(&["h|1", "h2"]), body_row(&["a", "b|c"])],
        };
        let result = TableConverter::new().render_table(&table);
        assert_eq!(result, "| h\\|1 | h2 |\n| --- | --- |\n| a | b\\|c |");
    }

    #[test]
    fn test_every_row_has_header_width() {
        let html = "<table>\
            <tr><th>A</th><th>B</th></tr>\
            <tr><td>1</td></tr>\
            <tr><td>1</td><td>2</td><td>3</td></tr>\
            <tr></tr>\
            </table>";
        let result = TableConverter::new().convert(html);
        let widths: Vec<usize> = result
            .lines()
            .map(|line| line.replace(r"\|", "").matches('|').count())
            .collect();
        assert!(widths.iter().all(|&w| w == widths[0]), "{result}");
        assert_eq!(widths[0], 4);
    }

    #[test]
    fn test_table_text() {
        let table = first_table("<table><tr><td> a </td><td>b</td></tr><tr><td>c</td></tr></table>");
        assert_eq!(table_text(&table), "a b\nc");
    }
}
