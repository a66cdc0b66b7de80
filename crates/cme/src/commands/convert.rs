//! `cme convert` command implementation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use cme_config::{CliSettings, Config, ExportConfig, TableHeader};
use cme_converter::{ConvertOptions, HeaderPolicy, Page, PageConverter, PageOptions, parse_html};
use rayon::prelude::*;

use crate::error::CliError;
use crate::output::Output;

/// Suffix of the storage-format file exported next to a page.
const STORAGE_SUFFIX: &str = ".storage.xml";

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// HTML files to convert.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover cme.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write Markdown to stdout instead of files.
    #[arg(long)]
    stdout: bool,

    /// Page title (default: HTML title or file name).
    #[arg(long)]
    title: Option<String>,

    /// Do not emit the page title as a heading.
    #[arg(long)]
    no_title: bool,

    /// Do not emit ancestor breadcrumbs.
    #[arg(long)]
    no_breadcrumbs: bool,
}

/// A converted input file.
struct Converted {
    stem: String,
    markdown: String,
    warnings: Vec<String>,
}

impl ConvertArgs {
    /// Execute the convert command.
    ///
    /// Files are converted in parallel. A file that fails is reported and
    /// the rest of the batch continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, output cannot
    /// be written, or any input file failed to convert.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            output_path: self.output.clone(),
            include_document_title: self.no_title.then_some(false),
            page_breadcrumbs: self.no_breadcrumbs.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let converter = PageConverter::new(page_options(&config.export));

        let results: Vec<(&PathBuf, Result<Converted, CliError>)> = self
            .files
            .par_iter()
            .map(|path| (path, convert_file(&converter, path, self.title.as_deref())))
            .collect();

        let output_dir = &config.export.output_path;
        if !self.stdout {
            fs::create_dir_all(output_dir).map_err(|source| CliError::File {
                path: output_dir.clone(),
                source,
            })?;
        }

        let mut failed = 0;
        let mut written = HashSet::new();
        for (path, result) in results {
            let converted = match result {
                Ok(converted) => converted,
                Err(e) => {
                    failed += 1;
                    output.error(&format!("Failed to convert {}: {e}", path.display()));
                    continue;
                }
            };

            for warning in &converted.warnings {
                output.warning(&format!("{}: {warning}", path.display()));
            }

            if self.stdout {
                output.document(&converted.markdown)?;
            } else {
                let name = unique_name(&mut written, &converted.stem);
                if name != converted.stem {
                    output.warning(&format!(
                        "{}: {}.md already written, using {name}.md",
                        path.display(),
                        converted.stem
                    ));
                }
                let target = output_dir.join(format!("{name}.md"));
                fs::write(&target, &converted.markdown).map_err(|source| CliError::File {
                    path: target.clone(),
                    source,
                })?;
                output.success(&format!("{} -> {}", path.display(), target.display()));
            }
        }

        if failed > 0 {
            return Err(CliError::Validation(format!(
                "{failed} of {} file(s) failed to convert",
                self.files.len()
            )));
        }
        Ok(())
    }
}

/// Conversion options from the export configuration.
fn page_options(export: &ExportConfig) -> PageOptions {
    let header_policy = match export.table_header {
        TableHeader::FirstRow => HeaderPolicy::FirstRow,
        TableHeader::Empty => HeaderPolicy::Empty,
    };
    PageOptions {
        include_document_title: export.include_document_title,
        page_breadcrumbs: export.page_breadcrumbs,
        convert: ConvertOptions {
            table_line_break: export.table_line_break.clone(),
            header_policy,
        },
    }
}

/// Storage-format file exported next to `path` (`page.html` -> `page.storage.xml`).
fn storage_path(path: &Path) -> PathBuf {
    let stem = file_stem(path);
    path.with_file_name(format!("{stem}{STORAGE_SUFFIX}"))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "page".to_owned(), |stem| stem.to_string_lossy().into_owned())
}

/// Reserve an output name for `stem`, suffixing `-2`, `-3`, ... when an
/// earlier file of the batch already took it.
fn unique_name(taken: &mut HashSet<String>, stem: &str) -> String {
    let mut name = stem.to_owned();
    let mut n = 2;
    while !taken.insert(name.clone()) {
        name = format!("{stem}-{n}");
        n += 1;
    }
    name
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })
}

fn convert_file(
    converter: &PageConverter,
    path: &Path,
    title: Option<&str>,
) -> Result<Converted, CliError> {
    let html = read_file(path)?;

    let storage = storage_path(path);
    let editor2 = if storage.is_file() {
        Some(read_file(&storage)?)
    } else {
        None
    };

    let stem = file_stem(path);
    let title = title
        .map(str::to_owned)
        .or_else(|| parse_html(&html).title())
        .unwrap_or_else(|| stem.clone());

    let page = Page {
        id: stem.clone(),
        title,
        html,
        editor2,
        ..Page::default()
    };
    let result = converter.convert(&page);

    tracing::info!(
        path = %path.display(),
        storage = page.editor2.is_some(),
        warnings = result.warnings.len(),
        "Converted page"
    );

    Ok(Converted {
        stem,
        markdown: result.markdown,
        warnings: result.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_storage_path() {
        assert_eq!(
            storage_path(Path::new("/tmp/export/page.html")),
            PathBuf::from("/tmp/export/page.storage.xml")
        );
    }

    #[test]
    fn test_unique_name_suffixes_repeated_stems() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "page"), "page");
        assert_eq!(unique_name(&mut taken, "page"), "page-2");
        assert_eq!(unique_name(&mut taken, "other"), "other");
        assert_eq!(unique_name(&mut taken, "page"), "page-3");
    }

    #[test]
    fn test_unique_name_skips_existing_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "page-2"), "page-2");
        assert_eq!(unique_name(&mut taken, "page"), "page");
        assert_eq!(unique_name(&mut taken, "page"), "page-3");
    }

    #[test]
    fn test_page_options_from_export() {
        let export = ExportConfig {
            include_document_title: false,
            table_line_break: " ".to_owned(),
            table_header: TableHeader::Empty,
            ..ExportConfig::default()
        };
        let options = page_options(&export);
        assert!(!options.include_document_title);
        assert!(options.page_breadcrumbs);
        assert_eq!(options.convert.table_line_break, " ");
        assert_eq!(options.convert.header_policy, HeaderPolicy::Empty);
    }

    #[test]
    fn test_convert_file_uses_html_title_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let html_path = dir.path().join("page.html");
        fs::write(
            &html_path,
            r#"<html><head><title>Design</title></head><body>
<table><tr><th>Key</th></tr><tr><td>a|b</td></tr></table>
<div data-macro-name="plantuml" data-macro-id="m1"></div>
</body></html>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("page.storage.xml"),
            r#"<ac:structured-macro ac:name="plantuml" ac:macro-id="m1"><ac:plain-text-body><![CDATA[{"umlDefinition":"@startuml\n@enduml"}]]></ac:plain-text-body></ac:structured-macro>"#,
        )
        .unwrap();

        let converter = PageConverter::new(PageOptions::default());
        let converted = convert_file(&converter, &html_path, None).unwrap();

        assert_eq!(converted.stem, "page");
        assert_eq!(
            converted.markdown,
            "# Design\n\n| Key |\n| --- |\n| a\\|b |\n\n```plantuml\n@startuml\n@enduml\n```\n"
        );
        assert!(converted.warnings.is_empty());
    }

    #[test]
    fn test_convert_file_title_falls_back_to_stem() {
        let dir = tempfile::tempdir().unwrap();
        let html_path = dir.path().join("notes.html");
        fs::write(&html_path, "<p>x</p>").unwrap();

        let converter = PageConverter::new(PageOptions::default());
        let converted = convert_file(&converter, &html_path, None).unwrap();
        assert_eq!(converted.markdown, "# notes\n\nx\n");

        let titled = convert_file(&converter, &html_path, Some("Custom")).unwrap();
        assert_eq!(titled.markdown, "# Custom\n\nx\n");
    }

    #[test]
    fn test_convert_missing_file_is_error() {
        let converter = PageConverter::new(PageOptions::default());
        let err = convert_file(&converter, Path::new("/nonexistent/page.html"), None)
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("/nonexistent/page.html"));
    }
}
