//! Integration tests for report-builder-core
//!
//! These tests drive whole builds against PDF fixtures generated in a temp
//! directory:
//! - Page accounting and bookmark ranges across sections and file groups
//! - Table of contents reconciliation with a mock renderer
//! - Recoverable failures (missing resources, render errors)
//! - Page reordering and embedded outline recovery

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::{Dictionary, Object};
use report_builder_core::pdf::{
    OutlineNode, PageIndex, SourcePdf, blank_document, save_document, text_document,
    write_outline,
};
use report_builder_core::render::{RendererInfo, TocEntry};
use report_builder_core::{
    BuildConfig, Composer, Error, PageLayout, RenderGuard, RenderRequest, RenderedDocument,
    Renderer, ReportBuilder, ReportNode, ResourceKind, Result, TocState, TreeWalker,
};

// =============================================================================
// Mock Renderer for Testing
// =============================================================================

/// A mock renderer with a fixed page count per template file name.
///
/// The table of contents renders `toc_estimate` pages while its entries are
/// unknown and one page per `toc_rows_per_page` entries afterwards.
struct MockRenderer {
    pages: BTreeMap<&'static str, usize>,
    toc_estimate: usize,
    toc_rows_per_page: usize,
    /// Entries of the most recent table of contents render
    last_toc: Mutex<Vec<TocEntry>>,
    calls: AtomicUsize,
}

impl MockRenderer {
    fn new(pages: &[(&'static str, usize)]) -> Self {
        Self {
            pages: pages.iter().copied().collect(),
            toc_estimate: 1,
            toc_rows_per_page: 40,
            last_toc: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_toc(mut self, estimate: usize, rows_per_page: usize) -> Self {
        self.toc_estimate = estimate;
        self.toc_rows_per_page = rows_per_page;
        self
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    fn info(&self) -> RendererInfo {
        RendererInfo {
            name: "mock",
            produces_editable: false,
        }
    }

    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = request.template.handle.as_str();

        let pages = match request.toc {
            Some(toc) => match toc.entries {
                None => self.toc_estimate,
                Some(entries) => {
                    *self.last_toc.lock().unwrap() = entries.to_vec();
                    entries.len().div_ceil(self.toc_rows_per_page).max(1)
                }
            },
            None => self.pages.get(name).copied().ok_or_else(|| Error::RenderFailed {
                template: name.to_string(),
                reason: "Mock render failure".to_string(),
                retryable: false,
            })?,
        };
        Ok(RenderedDocument::new(blank_document(&PageLayout::default(), pages)))
    }
}

/// Renders a table of contents one page longer on every call.
struct GrowingToc(AtomicUsize);

#[async_trait]
impl Renderer for GrowingToc {
    fn info(&self) -> RendererInfo {
        RendererInfo {
            name: "growing",
            produces_editable: false,
        }
    }

    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let pages = if request.toc.is_some() {
            self.0.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            1
        };
        Ok(RenderedDocument::new(blank_document(&PageLayout::default(), pages)))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Write a PDF with one page per entry, each page showing its text.
fn write_pdf(path: &Path, pages: &[&str]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let pages: Vec<Vec<String>> = pages.iter().map(|p| vec![(*p).to_string()]).collect();
    let mut doc = text_document(&PageLayout::default(), &pages);
    std::fs::write(path, save_document(&mut doc).unwrap()).unwrap();
}

/// Write a PDF with an embedded outline of `(title, page index)` entries.
fn write_pdf_with_outline(path: &Path, pages: &[&str], outline: &[(&str, usize)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let texts: Vec<Vec<String>> = pages.iter().map(|p| vec![(*p).to_string()]).collect();
    let mut doc = text_document(&PageLayout::default(), &texts);
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let page_ids: Vec<_> = doc.get_pages().values().copied().collect();
    let nodes: Vec<OutlineNode> = outline
        .iter()
        .map(|(title, page)| OutlineNode {
            title: (*title).to_string(),
            page: PageIndex::new(*page),
            parent: None,
        })
        .collect();
    write_outline(&mut doc, catalog_id, &page_ids, &nodes).unwrap();
    std::fs::write(path, save_document(&mut doc).unwrap()).unwrap();
}

/// Write a PDF whose outline holds `nodes` and then one top-level entry
/// pointing at a page object that does not exist.
fn write_pdf_with_dangling_outline(path: &Path, pages: &[&str], nodes: &[OutlineNode]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let texts: Vec<Vec<String>> = pages.iter().map(|p| vec![(*p).to_string()]).collect();
    let mut doc = text_document(&PageLayout::default(), &texts);
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let page_ids: Vec<_> = doc.get_pages().values().copied().collect();
    let outlines_id = write_outline(&mut doc, catalog_id, &page_ids, nodes)
        .unwrap()
        .unwrap();

    let last_id = doc
        .get_dictionary(outlines_id)
        .unwrap()
        .get(b"Last")
        .unwrap()
        .as_reference()
        .unwrap();
    let dangling_id = doc.new_object_id();
    let mut dangling = Dictionary::new();
    dangling.set("Title", Object::string_literal("Dangling"));
    dangling.set("Parent", Object::Reference(outlines_id));
    dangling.set("Prev", Object::Reference(last_id));
    dangling.set(
        "Dest",
        Object::Array(vec![Object::Reference((9999, 0)), Object::Name(b"Fit".to_vec())]),
    );
    doc.objects.insert(dangling_id, Object::Dictionary(dangling));
    doc.get_object_mut(last_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Next", Object::Reference(dangling_id));
    doc.get_object_mut(outlines_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Last", Object::Reference(dangling_id));
    std::fs::write(path, save_document(&mut doc).unwrap()).unwrap();
}

fn read_output(path: &Path) -> SourcePdf {
    SourcePdf::from_file(path).unwrap()
}

/// `(level, title, 1-indexed page)` of an output's outline.
fn outline_of(pdf: &SourcePdf) -> Vec<(usize, String, usize)> {
    pdf.outline()
        .entries
        .into_iter()
        .map(|e| (e.level, e.title, e.page.as_page_number()))
        .collect()
}

fn bookmark_ranges(bookmarks: &report_builder_core::BookmarkArena) -> Vec<(&str, usize, usize)> {
    bookmarks
        .items()
        .iter()
        .map(|b| (b.title.as_str(), b.start_page, b.end_page.unwrap()))
        .collect()
}

fn quick_config() -> BuildConfig {
    let mut config = BuildConfig::default();
    config.renderer.retry_delay_ms = 0;
    config
}

// =============================================================================
// Page accounting
// =============================================================================

#[tokio::test]
async fn test_two_groups_under_one_section() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("one/a.pdf"), &["a1", "a2", "a3"]);
    write_pdf(&dir.path().join("two/b.pdf"), &["b1", "b2", "b3"]);

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "A", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "g1", "title": "First", "source_directory": "one",
                 "files": [{"id": "a", "path": "a.pdf"}]},
                {"type": "FileGroup", "id": "g2", "title": "Second", "source_directory": "two",
                 "files": [{"id": "b", "path": "b.pdf"}]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let output = dir.path().join("report.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(outcome.page_count, 6);
    assert_eq!(outcome.passes, 1);
    assert!(outcome.toc_document.is_none());
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![("A", 1, 6), ("First", 1, 3), ("Second", 4, 6)]
    );

    let pdf = read_output(&output);
    assert_eq!(pdf.page_count(), 6);
    assert_eq!(
        outline_of(&pdf),
        vec![
            (0, "A".to_string(), 1),
            (1, "First".to_string(), 1),
            (1, "Second".to_string(), 4),
        ]
    );
    let texts = pdf.page_texts();
    assert!(texts[0].contains("a1"));
    assert!(texts[5].contains("b3"));
}

#[tokio::test]
async fn test_rule_bookmarks_nest_under_file() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(
        &dir.path().join("data/run.pdf"),
        &[
            "Tune Report",
            "Tune Report continued",
            "Calibration Summary",
            "This page intentionally left blank",
        ],
    );

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "g", "title": "Raw Data", "source_directory": "data",
                 "bookmark_rules": [{"title": "Tune", "rule": "'Tune Report'"}],
                 "files": [{"id": "run", "path": "run.pdf", "title": "Run 1",
                            "bookmark_rules": [{"title": "Calibration", "rule": "'Calibration' and 'Summary'"}]}]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let assembled = builder.assemble(&report, dir.path()).await.unwrap();

    assert_eq!(assembled.page_count, 4);
    assert_eq!(
        bookmark_ranges(&assembled.bookmarks),
        vec![
            ("Raw Data", 1, 4),
            ("Run 1", 1, 4),
            ("Tune", 1, 2),
            ("Calibration", 3, 4),
        ]
    );
}

#[tokio::test]
async fn test_preserved_outline_keeps_its_own_nesting() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("data/cover.pdf"), &["Cover sheet"]);
    write_pdf_with_dangling_outline(
        &dir.path().join("data/run.pdf"),
        &["Intro", "Tune Report", "details"],
        &[
            OutlineNode {
                title: "Chapter".to_string(),
                page: PageIndex::new(0),
                parent: None,
            },
            OutlineNode {
                title: "Sub".to_string(),
                page: PageIndex::new(1),
                parent: Some(0),
            },
        ],
    );

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "keep_existing_bookmarks": true,
                 "bookmark_rules": [{"title": "Tune", "rule": "'Tune Report'"}],
                 "files": [{"id": "cover", "path": "cover.pdf"},
                           {"id": "run", "path": "run.pdf", "title": "Run 1"}]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(outcome.page_count, 4);
    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![
            ("Data", 1, 4),
            ("Run 1", 2, 4),
            ("Chapter", 2, 4),
            ("Tune", 3, 4),
            ("Sub", 3, 4),
        ]
    );

    let parents: Vec<(&str, Option<&str>, bool)> = outcome
        .bookmarks
        .items()
        .iter()
        .map(|b| {
            let parent = b
                .parent
                .and_then(|p| outcome.bookmarks.get(p))
                .map(|p| p.title.as_str());
            (b.title.as_str(), parent, b.include_in_toc)
        })
        .collect();
    assert_eq!(
        parents,
        vec![
            ("Data", None, true),
            ("Run 1", Some("Data"), true),
            ("Chapter", Some("Run 1"), false),
            ("Tune", Some("Run 1"), true),
            ("Sub", Some("Chapter"), false),
        ]
    );

    assert_eq!(outcome.diagnostics.problem_files.len(), 1);
    assert_eq!(outcome.diagnostics.problem_files[0].unparseable_bookmarks, 1);
    assert_eq!(
        outcome.diagnostics.problem_files[0].path,
        dir.path().join("data/run.pdf")
    );

    assert_eq!(
        outline_of(&read_output(&output)),
        vec![
            (0, "Data".to_string(), 1),
            (1, "Run 1".to_string(), 2),
            (2, "Chapter".to_string(), 2),
            (3, "Sub".to_string(), 3),
            (2, "Tune".to_string(), 3),
        ]
    );
}

#[tokio::test]
async fn test_section_with_only_missing_files_is_not_bookmarked() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("data/a.pdf"), &["a1", "a2", "a3"]);
    std::fs::create_dir_all(dir.path().join("appendix")).unwrap();

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "Report", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "files": [{"id": "a", "path": "a.pdf"}]},
                {"type": "Section", "id": "appendix", "title": "Appendix", "base_directory": "appendix",
                 "children": [
                    {"type": "FileGroup", "id": "extra", "source_directory": "",
                     "files": [{"id": "m", "path": "missing.pdf"}]}
                 ]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(outcome.page_count, 3);
    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![("Report", 1, 3), ("Data", 1, 3)]
    );
    assert_eq!(
        outline_of(&read_output(&output)),
        vec![(0, "Report".to_string(), 1), (1, "Data".to_string(), 1)]
    );
}

// =============================================================================
// Table of contents
// =============================================================================

fn toc_report() -> ReportNode {
    ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "Report", "base_directory": "",
            "children": [
                {"type": "TemplateItem", "id": "cover", "title": "Cover", "template": "cover.txt", "exists": true},
                {"type": "TemplateItem", "id": "toc", "title": "Contents", "template": "toc.txt",
                 "exists": true, "is_toc": true, "page_start_col": 2, "page_end_col": 3},
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "files": [{"id": "a", "path": "a.pdf"}]}
            ]
        }"#,
    )
    .unwrap()
}

fn toc_fixtures(dir: &Path) {
    std::fs::write(dir.join("cover.txt"), "cover").unwrap();
    std::fs::write(dir.join("toc.txt"), "toc").unwrap();
    write_pdf(&dir.join("data/a.pdf"), &["d1", "d2", "d3"]);
}

#[tokio::test]
async fn test_longer_toc_shifts_following_bookmarks_once() {
    let dir = tempfile::tempdir().unwrap();
    toc_fixtures(dir.path());

    // Report, Cover and Data are listed; one row per page gives 3 pages
    let renderer = Arc::new(MockRenderer::new(&[("cover.txt", 1)]).with_toc(2, 1));
    let builder = ReportBuilder::new(renderer.clone(), quick_config());
    let assembled = builder.assemble(&toc_report(), dir.path()).await.unwrap();

    assert_eq!(
        assembled.state,
        TocState::Recomposed {
            estimated: 2,
            realized: 3
        }
    );
    assert_eq!(assembled.passes, 2);
    assert_eq!(assembled.page_count, 7);
    assert_eq!(
        bookmark_ranges(&assembled.bookmarks),
        vec![
            ("Report", 1, 7),
            ("Cover", 1, 1),
            ("Contents", 2, 4),
            ("Data", 5, 7),
        ]
    );

    // The second pass rendered the table with the shifted page numbers
    let rendered: Vec<(String, usize, usize, usize)> = renderer
        .last_toc
        .lock()
        .unwrap()
        .iter()
        .map(|e| (e.title.clone(), e.level, e.start_page, e.end_page))
        .collect();
    assert_eq!(
        rendered,
        vec![
            ("Report".to_string(), 0, 1, 7),
            ("Cover".to_string(), 1, 1, 1),
            ("Data".to_string(), 1, 5, 7),
        ]
    );

    let toc = assembled.toc.unwrap();
    assert!(toc.converged());
    assert_eq!(toc.realized, 3);
}

#[tokio::test]
async fn test_matching_toc_estimate_needs_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    toc_fixtures(dir.path());

    let renderer = Arc::new(MockRenderer::new(&[("cover.txt", 1)]).with_toc(1, 40));
    let builder = ReportBuilder::new(renderer, quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&toc_report(), dir.path(), &output).await.unwrap();

    assert_eq!(outcome.passes, 1);
    assert_eq!(outcome.page_count, 5);
    // the mock offers no editable copy
    assert!(outcome.toc_document.is_none());
    assert_eq!(
        outline_of(&read_output(&output))
            .iter()
            .map(|(_, title, page)| (title.as_str(), *page))
            .collect::<Vec<_>>(),
        vec![("Report", 1), ("Cover", 1), ("Contents", 2), ("Data", 3)]
    );
}

#[tokio::test]
async fn test_toc_that_keeps_growing_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    toc_fixtures(dir.path());

    let builder = ReportBuilder::new(Arc::new(GrowingToc(AtomicUsize::new(0))), quick_config());
    let output = dir.path().join("out.pdf");
    let err = builder
        .build(&toc_report(), dir.path(), &output)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::TocNotConverged {
            estimated: 1,
            realized: 2,
            recomposed: 3
        }
    ));
    assert!(!output.exists());
}

// =============================================================================
// Recoverable failures
// =============================================================================

#[tokio::test]
async fn test_render_failure_leaves_placeholder_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.txt"), "x").unwrap();
    std::fs::write(dir.path().join("ok.txt"), "x").unwrap();

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "TemplateItem", "id": "broken", "title": "Broken", "template": "broken.txt", "exists": true},
                {"type": "TemplateItem", "id": "ok", "title": "Fine", "template": "ok.txt", "exists": true}
            ]
        }"#,
    )
    .unwrap();

    let renderer = Arc::new(MockRenderer::new(&[("ok.txt", 2)]));
    let builder = ReportBuilder::new(renderer, quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(outcome.page_count, 3);
    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![("Broken", 1, 1), ("Fine", 2, 3)]
    );
    assert_eq!(outcome.diagnostics.render_failures.len(), 1);
    assert_eq!(outcome.diagnostics.render_failures[0].node_id, "broken");
    assert_eq!(outcome.diagnostics.render_failures[0].placeholder_pages, 1);
    assert_eq!(read_output(&output).page_count(), 3);
}

#[tokio::test]
async fn test_missing_resources_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("data/a.pdf"), &["a1"]);
    std::fs::write(dir.path().join("data/broken.pdf"), b"not a pdf").unwrap();

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "Root", "base_directory": "",
            "children": [
                {"type": "Section", "id": "absent", "title": "Absent", "base_directory": "nowhere",
                 "children": [{"type": "TemplateItem", "id": "t", "template": "t.txt", "exists": true}]},
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "files": [
                    {"id": "a", "path": "a.pdf"},
                    {"id": "gone", "path": "gone.pdf"},
                    {"id": "broken", "path": "broken.pdf"}
                 ]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let outcome = builder
        .build(&report, dir.path(), &dir.path().join("out.pdf"))
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 1);
    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![("Root", 1, 1), ("Data", 1, 1)]
    );
    let missing: Vec<(ResourceKind, &str)> = outcome
        .diagnostics
        .missing
        .iter()
        .map(|m| (m.kind, m.node_id.as_str()))
        .collect();
    assert_eq!(
        missing,
        vec![
            (ResourceKind::Directory, "absent"),
            (ResourceKind::SourceFile, "gone"),
            (ResourceKind::UnreadablePdf, "broken"),
        ]
    );
}

#[tokio::test]
async fn test_report_without_pages_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let report = ReportNode::from_json(
        r#"{"type": "Section", "id": "root", "title": "Empty", "base_directory": "missing"}"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let err = builder
        .build(&report, dir.path(), &dir.path().join("out.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyOutput));
}

#[tokio::test]
async fn test_configuration_errors_abort_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("t.txt"), "x").unwrap();
    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "TemplateItem", "id": "one", "template": "t.txt", "exists": true, "is_toc": true},
                {"type": "TemplateItem", "id": "two", "template": "t.txt", "exists": true, "is_toc": true}
            ]
        }"#,
    )
    .unwrap();

    let renderer = Arc::new(MockRenderer::new(&[("t.txt", 1)]));
    let builder = ReportBuilder::new(renderer.clone(), quick_config());
    let err = builder
        .build(&report, dir.path(), &dir.path().join("out.pdf"))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, Error::DuplicateToc { .. }));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Composition
// =============================================================================

#[tokio::test]
async fn test_composing_same_plan_twice_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cover.txt"), "cover").unwrap();
    write_pdf(&dir.path().join("data/a.pdf"), &["a1", "a2"]);
    write_pdf(&dir.path().join("data/b.pdf"), &["b1"]);

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "Report", "base_directory": "",
            "children": [
                {"type": "TemplateItem", "id": "cover", "title": "Cover", "template": "cover.txt", "exists": true},
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "files": [{"id": "a", "path": "a.pdf", "title": "A"}, {"id": "b", "path": "b.pdf", "title": "B"}]}
            ]
        }"#,
    )
    .unwrap();

    let config = quick_config();
    let guard = RenderGuard::new(
        Arc::new(MockRenderer::new(&[("cover.txt", 1)])),
        &config.renderer,
    );
    let plan = TreeWalker::new(&guard, &config, dir.path())
        .walk(&report)
        .await
        .unwrap();
    let composer = Composer::new(&guard, &config.layout);

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let mut composition = composer.compose(&plan).await.unwrap();
        let bytes = save_document(&mut composition.document).unwrap();
        let pdf = SourcePdf::from_bytes(&bytes, "composed.pdf").unwrap();
        snapshots.push((pdf.page_texts(), outline_of(&pdf)));
    }

    assert_eq!(snapshots[0], snapshots[1]);
    let (texts, outline) = &snapshots[0];
    assert_eq!(texts.len(), 4);
    assert!(texts[1].contains("a1"));
    assert!(texts[3].contains("b1"));
    assert_eq!(
        outline
            .iter()
            .map(|(level, title, page)| (*level, title.as_str(), *page))
            .collect::<Vec<_>>(),
        vec![
            (0, "Report", 1),
            (1, "Cover", 1),
            (1, "Data", 2),
            (2, "A", 2),
            (2, "B", 4),
        ]
    );
}

// =============================================================================
// Reordering
// =============================================================================

#[tokio::test]
async fn test_attribute_reorder_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(
        &dir.path().join("metals/first.pdf"),
        &[
            "Lab Sample ID: B Data Set ID: 2",
            "Lab Sample ID: A Data Set ID: 9",
        ],
    );
    write_pdf(
        &dir.path().join("metals/second.pdf"),
        &["Lab Sample ID: B Data Set ID: 1", "no labels here"],
    );

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "metals", "title": "Metals", "source_directory": "metals",
                 "reorder_by_attribute": true,
                 "files": [{"id": "f1", "path": "first.pdf"}, {"id": "f2", "path": "second.pdf"}]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::new(Arc::new(MockRenderer::new(&[])), quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();
    assert_eq!(outcome.page_count, 4);

    let texts = read_output(&output).page_texts();
    assert!(texts[0].contains("no labels here"));
    assert!(texts[1].contains("Sample ID: A"));
    assert!(texts[2].contains("Data Set ID: 1"));
    assert!(texts[3].contains("Data Set ID: 2"));
}

#[tokio::test]
async fn test_datetime_reorder_recovers_bookmarks() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf_with_outline(
        &dir.path().join("runs/late.pdf"),
        &["02-Jan-2024 / 10:00 sample X", "continued"],
        &[("Sample X", 0), ("Integration", 1)],
    );
    write_pdf_with_outline(
        &dir.path().join("runs/early.pdf"),
        &["01-Jan-2024 / 08:00 sample Y"],
        &[("Sample Y", 0)],
    );

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "base_directory": "",
            "children": [
                {"type": "FileGroup", "id": "runs", "title": "Sequence", "source_directory": "runs",
                 "reorder_by_datetime": true,
                 "files": [{"id": "late", "path": "late.pdf"}, {"id": "early", "path": "early.pdf"}]}
            ]
        }"#,
    )
    .unwrap();

    let renderer = Arc::new(MockRenderer::new(&[]));
    let builder = ReportBuilder::new(renderer, quick_config());
    let output = dir.path().join("out.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(
        bookmark_ranges(&outcome.bookmarks),
        vec![("Sequence", 1, 3), ("Sample Y", 1, 1), ("Sample X", 2, 3)]
    );
    assert!(
        outcome
            .bookmarks
            .items()
            .iter()
            .skip(1)
            .all(|b| !b.include_in_toc)
    );

    let texts = read_output(&output).page_texts();
    assert!(texts[0].contains("sample Y"));
    assert!(texts[1].contains("sample X"));
    assert!(texts[2].contains("continued"));
}

// =============================================================================
// Built-in text renderer
// =============================================================================

#[tokio::test]
async fn test_text_renderer_writes_toc_mirror() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cover.txt"), "Project ${project}\nPrepared for ${client}\n").unwrap();
    std::fs::write(dir.path().join("toc.txt"), "Contents\n${toc}\n").unwrap();
    write_pdf(&dir.path().join("data/a.pdf"), &["a1", "a2"]);

    let report = ReportNode::from_json(
        r#"{
            "type": "Section", "id": "root", "title": "Report", "base_directory": "",
            "variables": [{"key": "project", "value": "P-17"}, {"key": "client", "value": "ACME"}],
            "children": [
                {"type": "TemplateItem", "id": "cover", "title": "Cover", "template": "cover.txt", "exists": true},
                {"type": "TemplateItem", "id": "toc", "title": "Contents", "template": "toc.txt",
                 "exists": true, "is_toc": true, "page_start_col": 2},
                {"type": "FileGroup", "id": "g", "title": "Data", "source_directory": "data",
                 "files": [{"id": "a", "path": "a.pdf"}]}
            ]
        }"#,
    )
    .unwrap();

    let builder = ReportBuilder::with_text_renderer(quick_config());
    let output = dir.path().join("final.pdf");
    let outcome = builder.build(&report, dir.path(), &output).await.unwrap();

    assert_eq!(outcome.page_count, 4);
    let mirror = outcome.toc_document.unwrap();
    assert_eq!(mirror, dir.path().join("final_toc.txt"));
    let mirror = std::fs::read_to_string(mirror).unwrap();
    assert!(mirror.contains("Contents"));
    assert!(mirror.contains("Cover    1"));
    assert!(mirror.contains("Data    3"));

    let pdf = read_output(&output);
    assert!(pdf.page_texts()[0].contains("P-17"));
}
