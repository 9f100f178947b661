//! Page accounting for a report tree.
//!
//! The walker lays the report out on an absolute page axis: every node
//! becomes one or more [`PlacedItem`]s and bookmarks are collected in a flat
//! [`BookmarkArena`] in document order. The resulting [`LayoutPlan`] is
//! everything the composer needs to produce the output document.

mod bookmark;
mod ranges;
mod walker;

pub use bookmark::{BookmarkArena, BookmarkId, BookmarkItem};
pub use ranges::resolve_ranges;
pub use walker::TreeWalker;

use std::collections::BTreeMap;

use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::pdf::{PageRef, SourceStore};
use crate::render::{TemplateRef, TocColumns};

/// Table of contents settings of a template item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocLayout {
    pub columns: TocColumns,
    pub page_number_offset: i64,
}

/// What a placed item turns into when composed.
#[derive(Debug, Clone)]
pub enum PlacedContent {
    /// Start of a section; spans the pages of its children
    SectionMarker,
    /// Start of a file group; spans the group's pages
    FileGroup,
    /// Pages taken from decoded source documents
    FileData { pages: Vec<PageRef> },
    /// A rendered template
    Template {
        template: TemplateRef,
        variables: BTreeMap<String, String>,
        toc: Option<TocLayout>,
    },
    /// Blank pages standing in for a template that failed to render
    Placeholder { template: TemplateRef },
}

/// A contiguous range of output pages owned by one report node.
#[derive(Debug, Clone)]
pub struct PlacedItem {
    pub node_id: String,
    /// 1-indexed first page
    pub start_page: usize,
    pub page_count: usize,
    pub content: PlacedContent,
}

impl PlacedItem {
    /// Markers describe a range but contribute no pages of their own.
    pub const fn is_marker(&self) -> bool {
        matches!(
            self.content,
            PlacedContent::SectionMarker | PlacedContent::FileGroup
        )
    }

    pub const fn is_toc(&self) -> bool {
        matches!(
            self.content,
            PlacedContent::Template { toc: Some(_), .. }
        )
    }
}

/// Result of walking a report tree.
#[derive(Debug, Default)]
pub struct LayoutPlan {
    pub items: Vec<PlacedItem>,
    pub bookmarks: BookmarkArena,
    pub total_pages: usize,
    /// Decoded source documents referenced by `FileData` items
    pub sources: SourceStore,
    pub diagnostics: Diagnostics,
}

impl LayoutPlan {
    /// Index of the table of contents item, if the report has one.
    pub fn toc_item(&self) -> Option<usize> {
        self.items.iter().position(PlacedItem::is_toc)
    }

    /// Replace the estimated length of the table of contents at `item_index`
    /// with its realized length.
    ///
    /// Items and bookmarks starting after the estimated table move by the
    /// difference, ranges enclosing it grow or shrink, and bookmark ranges are
    /// resolved again.
    pub fn apply_toc_shift(&mut self, item_index: usize, realized: usize) -> Result<()> {
        let toc = self.items.get(item_index).ok_or_else(|| {
            Error::LayoutInvariant(format!("no placed item #{item_index} to resize"))
        })?;
        let toc_start = toc.start_page;
        let estimated = toc.page_count;
        let toc_end = toc_start + estimated;
        let delta = signed_delta(estimated, realized)?;
        if delta == 0 {
            return Ok(());
        }
        debug!(
            "Shifting layout after page {} by {:+} page(s)",
            toc_end - 1,
            delta
        );

        for (index, item) in self.items.iter_mut().enumerate() {
            if index == item_index {
                item.page_count = realized;
            } else if item.start_page >= toc_end {
                item.start_page = shift(item.start_page, delta)?;
            } else if item.is_marker()
                && item.start_page <= toc_start
                && item.start_page + item.page_count >= toc_end
            {
                item.page_count = shift(item.page_count, delta)?;
            }
        }

        for bookmark in self.bookmarks.items_mut() {
            if bookmark.start_page >= toc_end {
                bookmark.start_page = shift(bookmark.start_page, delta)?;
            }
        }

        self.total_pages = shift(self.total_pages, delta)?;
        resolve_ranges(&mut self.bookmarks, self.total_pages);
        Ok(())
    }
}

fn signed_delta(estimated: usize, realized: usize) -> Result<isize> {
    let estimated = isize::try_from(estimated)
        .map_err(|_| Error::LayoutInvariant(format!("page count {estimated} out of range")))?;
    let realized = isize::try_from(realized)
        .map_err(|_| Error::LayoutInvariant(format!("page count {realized} out of range")))?;
    Ok(realized - estimated)
}

fn shift(page: usize, delta: isize) -> Result<usize> {
    page.checked_add_signed(delta).ok_or_else(|| {
        Error::LayoutInvariant(format!("page {page} cannot move by {delta}"))
    })
}
