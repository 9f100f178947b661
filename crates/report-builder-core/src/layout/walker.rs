use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{
    BookmarkId, BookmarkItem, LayoutPlan, PlacedContent, PlacedItem, TocLayout, resolve_ranges,
};
use crate::config::BuildConfig;
use crate::diagnostics::{MissingResource, RenderFailure, ResourceKind};
use crate::error::Result;
use crate::extract::{PageExtractor, PageTitle};
use crate::model::{FileEntry, FileGroup, ReportNode, Section, TemplateItem};
use crate::pdf::{PageIndex, PageRef, SourceId, SourcePdf};
use crate::render::{RenderGuard, RenderRequest, TemplateRef, TocColumns, TocRequest};
use crate::reorder::{self, FilePages, LocalBookmark, PageRecord, ReorderStrategy};
use crate::rules::CompiledRule;
use crate::util::resolve_path;

/// Mutable state threaded through the walk.
struct WalkState {
    plan: LayoutPlan,
    /// 1-indexed page the next placed item starts on
    cursor: usize,
}

impl WalkState {
    fn bookmark(
        &mut self,
        title: &str,
        node_id: &str,
        parent: Option<BookmarkId>,
        is_toc: bool,
    ) -> Result<BookmarkId> {
        self.plan.bookmarks.push(BookmarkItem {
            title: title.to_string(),
            start_page: self.cursor,
            end_page: None,
            node_id: node_id.to_string(),
            parent,
            is_toc,
            include_in_toc: !is_toc,
            recovered: false,
        })
    }

    /// Append bookmarks positioned relative to `base_page`.
    ///
    /// Page titles hang directly from `parent`. Recovered outline entries nest
    /// by their own levels and never under a page title.
    fn local_bookmarks(
        &mut self,
        locals: &[LocalBookmark],
        base_page: usize,
        parent: Option<BookmarkId>,
        node_id: &str,
    ) -> Result<()> {
        let mut levels: Vec<BookmarkId> = Vec::new();
        for local in locals {
            let local_parent = if local.recovered {
                levels.truncate(local.level.min(levels.len()));
                levels.last().copied().or(parent)
            } else {
                parent
            };
            let id = self.plan.bookmarks.push(BookmarkItem {
                title: local.title.clone(),
                start_page: base_page + local.page_offset,
                end_page: None,
                node_id: node_id.to_string(),
                parent: local_parent,
                is_toc: false,
                include_in_toc: !local.recovered,
                recovered: local.recovered,
            })?;
            if local.recovered {
                levels.push(id);
            }
        }
        Ok(())
    }

    /// Drop every bookmark added since the arena held `len` entries when no
    /// page was placed after `start_page`.
    fn discard_if_empty(&mut self, len: usize, start_page: usize) {
        if self.cursor == start_page && self.plan.bookmarks.len() > len {
            debug!(
                "Dropping {} bookmark(s) that cover no pages",
                self.plan.bookmarks.len() - len
            );
            self.plan.bookmarks.truncate(len);
        }
    }

    fn place(&mut self, node_id: &str, page_count: usize, content: PlacedContent) {
        self.plan.items.push(PlacedItem {
            node_id: node_id.to_string(),
            start_page: self.cursor,
            page_count,
            content,
        });
        self.cursor += page_count;
    }

    /// Push a marker and return its index so its length can be set later.
    fn open_marker(&mut self, node_id: &str, content: PlacedContent) -> usize {
        self.plan.items.push(PlacedItem {
            node_id: node_id.to_string(),
            start_page: self.cursor,
            page_count: 0,
            content,
        });
        self.plan.items.len() - 1
    }

    fn close_marker(&mut self, index: usize) {
        let item = &mut self.plan.items[index];
        item.page_count = self.cursor - item.start_page;
    }

    fn missing(&mut self, kind: ResourceKind, node_id: &str, path: PathBuf) {
        self.plan
            .diagnostics
            .record_missing(MissingResource::new(kind, node_id, path));
    }
}

/// Lays a report tree out on the page axis.
///
/// The walk is depth-first and left to right. Templates are rendered once to
/// learn their length; the table of contents is rendered without entries.
pub struct TreeWalker<'a> {
    guard: &'a RenderGuard,
    config: &'a BuildConfig,
    root: &'a Path,
}

impl<'a> TreeWalker<'a> {
    pub const fn new(guard: &'a RenderGuard, config: &'a BuildConfig, root: &'a Path) -> Self {
        Self {
            guard,
            config,
            root,
        }
    }

    /// Walk `report` and return its layout with bookmark ranges resolved.
    pub async fn walk(&self, report: &ReportNode) -> Result<LayoutPlan> {
        let mut state = WalkState {
            plan: LayoutPlan::default(),
            cursor: 1,
        };
        self.walk_node(report, self.root, None, &BTreeMap::new(), &mut state)
            .await?;

        let mut plan = state.plan;
        plan.total_pages = state.cursor - 1;
        resolve_ranges(&mut plan.bookmarks, plan.total_pages);
        info!(
            "Laid out {} page(s), {} bookmark(s)",
            plan.total_pages,
            plan.bookmarks.len()
        );
        Ok(plan)
    }

    async fn walk_node(
        &self,
        node: &ReportNode,
        base: &Path,
        parent: Option<BookmarkId>,
        variables: &BTreeMap<String, String>,
        state: &mut WalkState,
    ) -> Result<()> {
        match node {
            ReportNode::Section(section) => {
                self.walk_section(section, base, parent, variables, state)
                    .await
            }
            ReportNode::Template(item) => {
                self.place_template(item, base, parent, variables, state)
                    .await
            }
            ReportNode::FileGroup(group) => self.place_file_group(group, base, parent, state),
        }
    }

    async fn walk_section(
        &self,
        section: &Section,
        base: &Path,
        parent: Option<BookmarkId>,
        inherited: &BTreeMap<String, String>,
        state: &mut WalkState,
    ) -> Result<()> {
        let dir = resolve_path(base, &section.base_directory);
        if !dir.is_dir() {
            state.missing(ResourceKind::Directory, &section.id, dir);
            return Ok(());
        }

        let variables = section.merged_variables(inherited);
        let marker = state.open_marker(&section.id, PlacedContent::SectionMarker);
        let (arena_len, start_page) = (state.plan.bookmarks.len(), state.cursor);

        // Leaves can still turn out missing or unreadable during the walk, so
        // the bookmark is withdrawn again when the subtree places nothing.
        let has_content = section.children.iter().any(ReportNode::has_content);
        let bookmark = match &section.title {
            Some(title) if has_content => Some(state.bookmark(title, &section.id, parent, false)?),
            _ => None,
        };

        for child in &section.children {
            Box::pin(self.walk_node(child, &dir, bookmark.or(parent), &variables, state)).await?;
        }

        state.discard_if_empty(arena_len, start_page);
        state.close_marker(marker);
        Ok(())
    }

    async fn place_template(
        &self,
        item: &TemplateItem,
        base: &Path,
        parent: Option<BookmarkId>,
        variables: &BTreeMap<String, String>,
        state: &mut WalkState,
    ) -> Result<()> {
        if !item.exists {
            debug!("Skipping '{}': template marked as absent", item.id);
            return Ok(());
        }
        let path = resolve_path(base, &item.template);
        if !path.is_file() {
            state.missing(ResourceKind::Template, &item.id, path);
            return Ok(());
        }

        let template = TemplateRef {
            handle: item.template.clone(),
            path,
        };
        let toc = item.is_toc.then_some(TocLayout {
            columns: TocColumns {
                start: item.page_start_col,
                end: item.page_end_col,
            },
            page_number_offset: item.page_number_offset,
        });
        let request = RenderRequest {
            node_id: &item.id,
            template: &template,
            variables,
            toc: toc.map(|toc| TocRequest {
                columns: toc.columns,
                page_number_offset: toc.page_number_offset,
                entries: None,
            }),
        };
        let result = self.guard.render(&request).await;

        let (page_count, content) = match result {
            Ok(rendered) => (
                rendered.page_count,
                PlacedContent::Template {
                    template,
                    variables: variables.clone(),
                    toc,
                },
            ),
            Err(e) if e.is_render_failure() => {
                state.plan.diagnostics.record_render_failure(RenderFailure {
                    node_id: item.id.clone(),
                    template: template.path.clone(),
                    message: e.to_string(),
                    placeholder_pages: 1,
                });
                (1, PlacedContent::Placeholder { template })
            }
            Err(e) => return Err(e),
        };

        if let Some(title) = &item.title {
            let is_toc = matches!(content, PlacedContent::Template { toc: Some(_), .. });
            state.bookmark(title, &item.id, parent, is_toc)?;
        }
        debug!("Placed '{}' at page {} ({} page(s))", item.id, state.cursor, page_count);
        state.place(&item.id, page_count, content);
        Ok(())
    }

    fn place_file_group(
        &self,
        group: &FileGroup,
        base: &Path,
        parent: Option<BookmarkId>,
        state: &mut WalkState,
    ) -> Result<()> {
        let dir = resolve_path(base, &group.source_directory);
        if !dir.is_dir() {
            state.missing(ResourceKind::Directory, &group.id, dir);
            return Ok(());
        }
        let policy = group.reorder_policy()?;

        let mut loaded: Vec<(&FileEntry, SourceId)> = Vec::new();
        for entry in &group.files {
            let path = resolve_path(&dir, &entry.path);
            if !path.is_file() {
                state.missing(ResourceKind::SourceFile, &entry.id, path);
                continue;
            }
            match SourcePdf::from_file(&path) {
                Ok(source) => {
                    debug!("Loaded {} ({} page(s))", path.display(), source.page_count());
                    loaded.push((entry, state.plan.sources.insert(source)));
                }
                Err(e) => {
                    warn!("{}", e);
                    state.missing(ResourceKind::UnreadablePdf, &entry.id, path);
                }
            }
        }
        if loaded.is_empty() {
            debug!("Skipping '{}': no readable files", group.id);
            return Ok(());
        }

        let marker = state.open_marker(&group.id, PlacedContent::FileGroup);
        let (arena_len, start_page) = (state.plan.bookmarks.len(), state.cursor);
        let group_bookmark = match &group.title {
            Some(title) => Some(state.bookmark(title, &group.id, parent, false)?),
            None => None,
        };
        let anchor = group_bookmark.or(parent);
        let extractor = PageExtractor::new(&self.config.skip_page_markers);

        match reorder::strategy_for(policy) {
            None => {
                for (entry, id) in &loaded {
                    place_file(group, entry, *id, anchor, extractor, state)?;
                }
            }
            Some(strategy) => {
                place_reordered(group, &loaded, strategy.as_ref(), anchor, extractor, state)?;
            }
        }

        state.discard_if_empty(arena_len, start_page);
        state.close_marker(marker);
        info!(
            "Placed group '{}' on pages {}-{}",
            group.id,
            state.plan.items[marker].start_page,
            state.cursor - 1
        );
        Ok(())
    }
}

fn title_bookmarks(titles: Vec<PageTitle>) -> impl Iterator<Item = LocalBookmark> {
    titles.into_iter().map(|t| LocalBookmark {
        page_offset: t.page_offset,
        level: 0,
        title: t.title,
        recovered: false,
    })
}

/// Place one file in its own order, with its title, rule and preserved bookmarks.
fn place_file(
    group: &FileGroup,
    entry: &FileEntry,
    id: SourceId,
    anchor: Option<BookmarkId>,
    extractor: PageExtractor<'_>,
    state: &mut WalkState,
) -> Result<()> {
    let rules = CompiledRule::compile_all(group.rules_for(entry))?;
    let source = state.plan.sources.get(id);
    let path = source.path().to_path_buf();
    let texts = if rules.is_empty() {
        Vec::new()
    } else {
        source.page_texts()
    };
    let outline = group.preserve_bookmarks.then(|| source.outline());
    let pages = state.plan.sources.page_refs(id);

    let file_start = state.cursor;
    let file_bookmark = match &entry.title {
        Some(title) => Some(state.bookmark(title, &entry.id, anchor, false)?),
        None => None,
    };

    let mut locals: Vec<LocalBookmark> = title_bookmarks(extractor.extract(&rules, &texts)).collect();
    if let Some(outline) = outline {
        state.plan.diagnostics.record_problem_file(path, outline.malformed);
        locals.extend(outline.entries.into_iter().map(|e| LocalBookmark {
            page_offset: e.page.as_usize(),
            level: e.level,
            title: e.title,
            recovered: true,
        }));
    }
    locals.sort_by_key(|b| b.page_offset);
    state.local_bookmarks(&locals, file_start, file_bookmark.or(anchor), &entry.id)?;

    let page_count = pages.len();
    state.place(&entry.id, page_count, PlacedContent::FileData { pages });
    Ok(())
}

/// Place all files of a group as one reordered page sequence.
fn place_reordered(
    group: &FileGroup,
    loaded: &[(&FileEntry, SourceId)],
    strategy: &dyn ReorderStrategy,
    anchor: Option<BookmarkId>,
    extractor: PageExtractor<'_>,
    state: &mut WalkState,
) -> Result<()> {
    let mut files = Vec::with_capacity(loaded.len());
    let mut rules: HashMap<SourceId, Vec<CompiledRule>> = HashMap::new();
    for (entry, id) in loaded {
        rules.insert(*id, CompiledRule::compile_all(group.rules_for(entry))?);

        let source = state.plan.sources.get(*id);
        let path = source.path().to_path_buf();
        let records = source
            .page_texts()
            .into_iter()
            .enumerate()
            .map(|(index, text)| PageRecord {
                page: PageRef::new(*id, PageIndex::new(index)),
                text,
            })
            .collect();
        let outline = if strategy.recovers_bookmarks() {
            let outline = source.outline();
            state
                .plan
                .diagnostics
                .record_problem_file(path.clone(), outline.malformed);
            outline.entries
        } else {
            Vec::new()
        };
        files.push(FilePages {
            path,
            records,
            outline,
        });
    }

    let outcome = strategy.reorder(&files);
    info!(
        "Reordered {} page(s) of '{}' by {}",
        outcome.pages.len(),
        group.id,
        strategy.name()
    );

    let texts: HashMap<PageRef, &str> = files
        .iter()
        .flat_map(|file| &file.records)
        .map(|record| (record.page, record.text.as_str()))
        .collect();
    let titles = extractor.extract_each(outcome.pages.iter().map(|page| {
        (
            rules.get(&page.source).map_or(&[][..], Vec::as_slice),
            texts.get(page).copied().unwrap_or_default(),
        )
    }));

    let mut locals: Vec<LocalBookmark> = title_bookmarks(titles).collect();
    locals.extend(outcome.recovered);
    locals.sort_by_key(|b| b.page_offset);
    state.local_bookmarks(&locals, state.cursor, anchor, &group.id)?;

    let page_count = outcome.pages.len();
    state.place(
        &group.id,
        page_count,
        PlacedContent::FileData {
            pages: outcome.pages,
        },
    );
    Ok(())
}
