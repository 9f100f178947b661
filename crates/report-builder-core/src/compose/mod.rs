//! Materializing a layout into one PDF document.

mod toc;

pub use toc::{Reconciliation, TocReconciler, TocState, toc_entries};

use lopdf::Document;
use tracing::{debug, info};

use crate::config::PageLayout;
use crate::diagnostics::RenderFailure;
use crate::error::{Error, Result};
use crate::layout::{LayoutPlan, PlacedContent};
use crate::pdf::{OutlineNode, PageIndex, PdfAssembler, blank_document};
use crate::render::{EditableDocument, RenderGuard, RenderRequest, TocRequest};

/// The table of contents as rendered during one composition.
#[derive(Debug, Clone)]
pub struct RealizedToc {
    /// Index of the TOC in the plan's placed items
    pub item_index: usize,
    pub node_id: String,
    /// Page count the layout reserved
    pub estimated: usize,
    /// Page count of the rendered table
    pub realized: usize,
    pub editable: Option<EditableDocument>,
}

impl RealizedToc {
    pub const fn converged(&self) -> bool {
        self.estimated == self.realized
    }
}

/// Output of one composition pass.
#[derive(Debug)]
pub struct Composition {
    pub document: Document,
    pub page_count: usize,
    pub toc: Option<RealizedToc>,
    /// Templates that failed during this pass and were replaced by blank pages
    pub render_failures: Vec<RenderFailure>,
}

/// Renders templates and imports source pages in layout order.
pub struct Composer<'a> {
    guard: &'a RenderGuard,
    layout: &'a PageLayout,
}

impl<'a> Composer<'a> {
    pub const fn new(guard: &'a RenderGuard, layout: &'a PageLayout) -> Self {
        Self { guard, layout }
    }

    /// Compose every placed item of `plan` into one document.
    ///
    /// The outline is attached only when the document has exactly the planned
    /// number of pages; a table of contents that changed length leaves it off,
    /// since the plan must be shifted and composed again.
    pub async fn compose(&self, plan: &LayoutPlan) -> Result<Composition> {
        let entries = toc_entries(&plan.bookmarks);
        let mut assembler = PdfAssembler::new();
        let mut toc = None;
        let mut render_failures = Vec::new();

        for (index, item) in plan.items.iter().enumerate() {
            match &item.content {
                PlacedContent::SectionMarker | PlacedContent::FileGroup => {}
                PlacedContent::FileData { pages } => {
                    assembler.append_source_pages(&plan.sources, pages)?;
                }
                PlacedContent::Placeholder { .. } => {
                    assembler.append_document(&blank_document(self.layout, item.page_count));
                }
                PlacedContent::Template {
                    template,
                    variables,
                    toc: toc_layout,
                } => {
                    let request = RenderRequest {
                        node_id: &item.node_id,
                        template,
                        variables,
                        toc: toc_layout.map(|layout| TocRequest {
                            columns: layout.columns,
                            page_number_offset: layout.page_number_offset,
                            entries: Some(&entries),
                        }),
                    };
                    match self.guard.render(&request).await {
                        Ok(rendered) => {
                            if toc_layout.is_some() {
                                toc = Some(RealizedToc {
                                    item_index: index,
                                    node_id: item.node_id.clone(),
                                    estimated: item.page_count,
                                    realized: rendered.page_count,
                                    editable: rendered.editable,
                                });
                            } else if rendered.page_count != item.page_count {
                                return Err(Error::LayoutInvariant(format!(
                                    "template '{}' rendered {} page(s) but {} were laid out",
                                    item.node_id, rendered.page_count, item.page_count
                                )));
                            }
                            assembler.append_document(&rendered.document);
                        }
                        Err(e) if e.is_render_failure() => {
                            render_failures.push(RenderFailure {
                                node_id: item.node_id.clone(),
                                template: template.path.clone(),
                                message: e.to_string(),
                                placeholder_pages: item.page_count,
                            });
                            assembler
                                .append_document(&blank_document(self.layout, item.page_count));
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let page_count = assembler.page_count();
        let outline = if page_count == plan.total_pages {
            outline_nodes(plan, page_count)
        } else if toc.as_ref().is_some_and(|t| !t.converged()) {
            debug!("Table of contents changed length; outline deferred");
            Vec::new()
        } else {
            return Err(Error::LayoutInvariant(format!(
                "composed {page_count} page(s) but {} were laid out",
                plan.total_pages
            )));
        };

        let document = assembler.finish(&outline)?;
        info!("Composed {} page(s), {} outline item(s)", page_count, outline.len());
        Ok(Composition {
            document,
            page_count,
            toc,
            render_failures,
        })
    }
}

/// Outline items for the plan's bookmarks, with 1-indexed pages converted to
/// page indices of the composed document.
fn outline_nodes(plan: &LayoutPlan, page_count: usize) -> Vec<OutlineNode> {
    plan.bookmarks
        .items()
        .iter()
        .map(|bookmark| OutlineNode {
            title: bookmark.title.clone(),
            page: PageIndex::new(bookmark.start_page.min(page_count).max(1) - 1),
            parent: bookmark.parent.map(|p| p.as_usize()),
        })
        .collect()
}

