//! Report Builder Core Library
//!
//! Assembles one bookmarked PDF report from a declarative report tree:
//! - Section, template and file group walking into a page layout
//! - Template rendering behind a pluggable renderer with timeout and retries
//! - Bookmark rules, page reordering and embedded outline recovery
//! - Table of contents reconciliation and final composition

pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod render;
pub mod reorder;
pub mod rules;
pub mod util;

pub use compose::{Composer, Composition, RealizedToc, Reconciliation, TocReconciler, TocState};
pub use config::{BuildConfig, PageLayout, RendererConfig};
pub use diagnostics::{Diagnostics, MissingResource, RenderFailure, ResourceKind};
pub use error::{Error, Result};
pub use layout::{BookmarkArena, BookmarkItem, LayoutPlan, TreeWalker};
pub use model::{ReportNode, check_paths, filter_by_method_codes, validate_report};
pub use render::{RenderGuard, RenderRequest, RenderedDocument, Renderer, TextTemplateRenderer};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::Document;
use tracing::{debug, info, warn};

use crate::render::EditableDocument;

/// Pipeline stages reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Validating,
    Walking,
    Composing,
    Saving,
}

impl BuildStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating report",
            Self::Walking => "laying out pages",
            Self::Composing => "composing document",
            Self::Saving => "saving output",
        }
    }
}

type ProgressCallback = Box<dyn Fn(BuildStage) + Send + Sync>;

/// A composed report that has not been written anywhere yet.
#[derive(Debug)]
pub struct AssembledReport {
    pub document: Document,
    pub page_count: usize,
    pub bookmarks: BookmarkArena,
    pub toc: Option<RealizedToc>,
    pub diagnostics: Diagnostics,
    pub state: TocState,
    /// Composition passes that ran
    pub passes: usize,
}

/// Summary of a build written to disk.
#[derive(Debug)]
pub struct BuildOutcome {
    pub output: PathBuf,
    pub page_count: usize,
    pub bookmarks: BookmarkArena,
    /// Editable table of contents written next to the output, if any
    pub toc_document: Option<PathBuf>,
    pub diagnostics: Diagnostics,
    pub passes: usize,
}

/// High-level report builder that combines all stages
pub struct ReportBuilder {
    guard: RenderGuard,
    config: BuildConfig,
    progress: Option<ProgressCallback>,
}

impl ReportBuilder {
    /// Create a builder around a renderer
    pub fn new(renderer: Arc<dyn Renderer>, config: BuildConfig) -> Self {
        let guard = RenderGuard::new(renderer, &config.renderer);
        Self {
            guard,
            config,
            progress: None,
        }
    }

    /// Create a builder using the built-in text template renderer
    pub fn with_text_renderer(config: BuildConfig) -> Self {
        let renderer = TextTemplateRenderer::new(config.layout, config.toc_indent.clone());
        Self::new(Arc::new(renderer), config)
    }

    /// Report each stage as it starts
    #[must_use]
    pub fn with_progress(mut self, callback: impl Fn(BuildStage) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub const fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn renderer_info(&self) -> render::RendererInfo {
        self.guard.renderer().info()
    }

    fn stage(&self, stage: BuildStage) {
        debug!("Stage: {}", stage.as_str());
        if let Some(callback) = &self.progress {
            callback(stage);
        }
    }

    /// Validate, lay out and compose `report` with relative paths resolved
    /// against `root`.
    pub async fn assemble(&self, report: &ReportNode, root: &Path) -> Result<AssembledReport> {
        self.stage(BuildStage::Validating);
        validate_report(report)?;

        self.stage(BuildStage::Walking);
        let mut plan = TreeWalker::new(&self.guard, &self.config, root)
            .walk(report)
            .await?;
        if plan.total_pages == 0 {
            return Err(Error::EmptyOutput);
        }

        self.stage(BuildStage::Composing);
        let composer = Composer::new(&self.guard, &self.config.layout);
        let reconciliation = TocReconciler::new(&composer).run(&mut plan).await?;

        let mut diagnostics = std::mem::take(&mut plan.diagnostics);
        let composition = reconciliation.composition;
        for failure in composition.render_failures {
            diagnostics.record_render_failure(failure);
        }

        Ok(AssembledReport {
            document: composition.document,
            page_count: composition.page_count,
            bookmarks: plan.bookmarks,
            toc: composition.toc,
            diagnostics,
            state: reconciliation.state,
            passes: reconciliation.passes,
        })
    }

    /// Build `report` into `output`.
    ///
    /// The PDF is written to a temporary file beside `output` and renamed into
    /// place, so a failed build never leaves a partial document behind.
    pub async fn build(
        &self,
        report: &ReportNode,
        root: &Path,
        output: &Path,
    ) -> Result<BuildOutcome> {
        let mut assembled = self.assemble(report, root).await?;

        self.stage(BuildStage::Saving);
        let bytes = pdf::save_document(&mut assembled.document)?;
        write_atomically(output, &bytes).await?;
        info!(
            "Wrote {} ({} page(s), {} bookmark(s))",
            output.display(),
            assembled.page_count,
            assembled.bookmarks.len()
        );

        let editable = assembled.toc.and_then(|toc| toc.editable);
        let toc_document = match editable {
            Some(editable) if self.config.write_toc_document => {
                Some(write_toc_document(output, &editable).await?)
            }
            _ => None,
        };

        if !assembled.diagnostics.is_empty() {
            warn!(
                "Build finished with {} missing resource(s), {} render failure(s), {} problem file(s)",
                assembled.diagnostics.missing.len(),
                assembled.diagnostics.render_failures.len(),
                assembled.diagnostics.problem_files.len()
            );
        }

        Ok(BuildOutcome {
            output: output.to_path_buf(),
            page_count: assembled.page_count,
            bookmarks: assembled.bookmarks,
            toc_document,
            diagnostics: assembled.diagnostics,
            passes: assembled.passes,
        })
    }
}

async fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report.pdf");
    let temp = output.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
    tokio::fs::write(&temp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&temp, output).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn write_toc_document(output: &Path, editable: &EditableDocument) -> Result<PathBuf> {
    let path = util::toc_document_path(output, &editable.extension);
    tokio::fs::write(&path, &editable.content).await?;
    debug!("Wrote table of contents to {}", path.display());
    Ok(path)
}
