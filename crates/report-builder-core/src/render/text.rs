//! Built-in renderer for plain text templates.
//!
//! A template is UTF-8 text with `${key}` placeholders. A form feed starts a
//! new page and long pages flow over as many pages as needed. For the table
//! of contents, rows are inserted in place of a line reading `${toc}`, or
//! appended when the template has no such line.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::debug;

use super::{
    EditableDocument, RenderRequest, RenderedDocument, Renderer, RendererInfo, TocRequest,
};
use crate::config::PageLayout;
use crate::error::{Error, Result};
use crate::pdf::text_document;

const PAGE_BREAK: char = '\x0c';
const TOC_PLACEHOLDER: &str = "${toc}";
const CELL_SEPARATOR: &str = "    ";

/// A `${key}` placeholder.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder pattern"));

/// Renders text templates into Helvetica pages.
#[derive(Debug, Clone)]
pub struct TextTemplateRenderer {
    layout: PageLayout,
    toc_indent: String,
}

impl TextTemplateRenderer {
    pub fn new(layout: PageLayout, toc_indent: impl Into<String>) -> Self {
        Self {
            layout,
            toc_indent: toc_indent.into(),
        }
    }

    /// Template text with variables substituted and TOC rows in place.
    pub fn expand(&self, template: &str, request: &RenderRequest<'_>) -> String {
        let template = template.replace("\r\n", "\n");
        // One pass, so substituted values are never expanded again
        let text = PLACEHOLDER.replace_all(&template, |caps: &Captures<'_>| {
            request
                .variables
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), Clone::clone)
        });

        let Some(toc) = request.toc else {
            return text.into_owned();
        };
        let rows = self.toc_rows(&toc);
        let mut lines: Vec<&str> = text.split('\n').collect();
        if let Some(at) = lines.iter().position(|line| line.trim() == TOC_PLACEHOLDER) {
            lines.splice(at..=at, rows.iter().map(String::as_str));
        } else {
            if lines.last().is_some_and(|line| line.is_empty()) {
                lines.pop();
            }
            lines.extend(rows.iter().map(String::as_str));
        }
        lines.join("\n")
    }

    fn toc_rows(&self, toc: &TocRequest<'_>) -> Vec<String> {
        let mut rows = Vec::new();
        let mut previous_level = None;
        for entry in toc.entries.unwrap_or_default() {
            if previous_level.is_some_and(|level| entry.level < level) {
                rows.push(String::new());
            }
            previous_level = Some(entry.level);
            let cells = toc.columns.row(entry, toc.page_number_offset, &self.toc_indent);
            rows.push(cells.join(CELL_SEPARATOR).trim_end().to_string());
        }
        rows
    }

    /// Split expanded text into pages of at most `lines_per_page` lines.
    pub fn paginate(&self, text: &str) -> Vec<Vec<String>> {
        let per_page = self.layout.lines_per_page.max(1);
        let mut pages = Vec::new();
        for chunk in text.split(PAGE_BREAK) {
            let lines: Vec<String> = chunk
                .trim_start_matches('\n')
                .lines()
                .map(str::to_string)
                .collect();
            if lines.is_empty() {
                pages.push(Vec::new());
                continue;
            }
            pages.extend(lines.chunks(per_page).map(<[String]>::to_vec));
        }
        pages
    }
}

#[async_trait]
impl Renderer for TextTemplateRenderer {
    fn info(&self) -> RendererInfo {
        RendererInfo {
            name: "Text template",
            produces_editable: true,
        }
    }

    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let path = &request.template.path;
        let template = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::RenderFailed {
                template: path.display().to_string(),
                reason: e.to_string(),
                retryable: false,
            })?;

        let text = self.expand(&template, request);
        let pages = self.paginate(&text);
        debug!("Rendered {} into {} page(s)", path.display(), pages.len());

        let rendered = RenderedDocument::new(text_document(&self.layout, &pages));
        Ok(rendered.with_editable(EditableDocument {
            extension: "txt".to_string(),
            content: text.into_bytes(),
        }))
    }
}
