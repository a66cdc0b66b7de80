//! Confluence page HTML to Markdown conversion.
//!
//! The centerpiece is [`TableConverter`], which turns HTML tables into
//! GitHub-flavored pipe tables. Every literal `|` in cell content is escaped
//! as `\|` so it cannot be read as a column delimiter.
//!
//! # Architecture
//!
//! - [`dom`]: html5ever parse tree copied into owned [`Element`] values
//! - [`table`]: row/cell collection, span layout and pipe-table output
//! - [`markdown`]: generic HTML writer with pluggable [`ElementHandler`]s
//! - [`storage`]: storage-format XML parsing and the [`MacroIndex`]
//! - [`plantuml`]: PlantUML macro placeholders to fenced code blocks
//! - [`page`]: front matter, breadcrumbs and title around the page body
//!
//! # Example
//!
//! ```
//! use cme_converter::TableConverter;
//!
//! let html = "<table><tr><th>Name</th></tr><tr><td>a | b</td></tr></table>";
//! let markdown = TableConverter::new().convert(html);
//! assert_eq!(markdown, "| Name |\n| --- |\n| a \\| b |\n");
//! ```

pub mod dom;
mod error;
pub mod markdown;
pub mod page;
pub mod plantuml;
pub mod storage;
pub mod table;
mod util;

pub use dom::{Document, Element, Node, parse_html};
pub use error::StorageError;
pub use markdown::{ConvertOptions, ConvertResult, ElementHandler, HandleResult, HtmlConverter};
pub use page::{Page, PageConverter, PageOptions};
pub use plantuml::PlantUmlHandler;
pub use storage::{MacroIndex, StructuredMacro};
pub use table::{Alignment, Cell, CellRenderer, HeaderPolicy, Row, RowKind, Table, TableConverter, escape_cell};
