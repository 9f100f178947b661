//! Template rendering.
//!
//! Templates are rendered by an external [`Renderer`]. Every call goes
//! through a [`RenderGuard`] that bounds it with a timeout and retries
//! transient failures.

mod guard;
mod text;
mod traits;

pub use guard::RenderGuard;
pub use text::TextTemplateRenderer;
pub use traits::{Renderer, RendererInfo};

use std::collections::BTreeMap;
use std::path::PathBuf;

use lopdf::Document;
use serde::Serialize;

/// A template as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    /// Template reference exactly as written in the report
    pub handle: String,
    /// Absolute path of the template file
    pub path: PathBuf,
}

/// Where page numbers go in a table of contents row.
///
/// Columns are 1-indexed; column 1 holds the entry title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TocColumns {
    pub start: usize,
    pub end: Option<usize>,
}

impl TocColumns {
    /// Cells of one row: indented title, then page numbers in their columns.
    pub fn row(&self, entry: &TocEntry, page_number_offset: i64, indent: &str) -> Vec<String> {
        let width = self.start.max(self.end.unwrap_or(0)).max(1);
        let mut cells = vec![String::new(); width];
        cells[0] = format!("{}{}", indent.repeat(entry.level), entry.title);
        if self.start >= 2 {
            cells[self.start - 1] = entry.display_start(page_number_offset).to_string();
        }
        if let Some(end) = self.end.filter(|&end| end >= 2) {
            cells[end - 1] = entry.display_end(page_number_offset).to_string();
        }
        cells
    }
}

/// One line of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub title: String,
    /// Nesting depth, 0 for top-level entries
    pub level: usize,
    /// 1-indexed page in the output document
    pub start_page: usize,
    pub end_page: usize,
}

impl TocEntry {
    pub fn display_start(&self, page_number_offset: i64) -> i64 {
        i64::try_from(self.start_page).unwrap_or(i64::MAX) + page_number_offset
    }

    pub fn display_end(&self, page_number_offset: i64) -> i64 {
        i64::try_from(self.end_page).unwrap_or(i64::MAX) + page_number_offset
    }
}

/// Table of contents parameters of a render call.
#[derive(Debug, Clone, Copy)]
pub struct TocRequest<'a> {
    pub columns: TocColumns,
    /// Added to every displayed page number
    pub page_number_offset: i64,
    /// `None` while the final page numbers are not known yet
    pub entries: Option<&'a [TocEntry]>,
}

/// One render call. Identical requests must produce identical documents.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Id of the report node being rendered
    pub node_id: &'a str,
    pub template: &'a TemplateRef,
    pub variables: &'a BTreeMap<String, String>,
    pub toc: Option<TocRequest<'a>>,
}

/// Editable copy of a rendered document, written next to the output for the
/// table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableDocument {
    /// File extension without the dot
    pub extension: String,
    pub content: Vec<u8>,
}

/// Output of a render call.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub document: Document,
    pub page_count: usize,
    pub editable: Option<EditableDocument>,
}

impl RenderedDocument {
    pub fn new(document: Document) -> Self {
        let page_count = document.get_pages().len();
        Self {
            document,
            page_count,
            editable: None,
        }
    }

    #[must_use]
    pub fn with_editable(mut self, editable: EditableDocument) -> Self {
        self.editable = Some(editable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: usize) -> TocEntry {
        TocEntry {
            title: "Metals".to_string(),
            level,
            start_page: 4,
            end_page: 9,
        }
    }

    #[test]
    fn test_row_places_numbers_in_columns() {
        let columns = TocColumns { start: 3, end: Some(4) };
        assert_eq!(columns.row(&entry(1), 0, "  "), vec!["  Metals", "", "4", "9"]);
    }

    #[test]
    fn test_row_applies_offset() {
        let columns = TocColumns { start: 2, end: None };
        assert_eq!(columns.row(&entry(0), -3, "  "), vec!["Metals", "1"]);
    }

    #[test]
    fn test_end_before_start_column() {
        let columns = TocColumns { start: 3, end: Some(2) };
        assert_eq!(columns.row(&entry(0), 0, ""), vec!["Metals", "9", "4"]);
    }
}
