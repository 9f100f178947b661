use serde::Serialize;

use crate::error::{Error, Result};

/// Position of a bookmark in its [`BookmarkArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BookmarkId(usize);

impl BookmarkId {
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// One entry of the output outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkItem {
    pub title: String,
    /// 1-indexed absolute page
    pub start_page: usize,
    /// Last page covered, set by [`resolve_ranges`](super::resolve_ranges)
    pub end_page: Option<usize>,
    /// Id of the report node that produced this bookmark
    pub node_id: String,
    pub parent: Option<BookmarkId>,
    /// Set on the bookmark of the table of contents template
    pub is_toc: bool,
    /// Whether the entry is listed in the table of contents
    pub include_in_toc: bool,
    /// Copied from a source file's embedded outline
    pub recovered: bool,
}

/// Flat list of bookmarks in document order; parents always precede children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BookmarkArena {
    items: Vec<BookmarkItem>,
}

impl BookmarkArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bookmark. Its parent, if any, must already be in the arena.
    pub fn push(&mut self, item: BookmarkItem) -> Result<BookmarkId> {
        if let Some(parent) = item.parent
            && parent.0 >= self.items.len()
        {
            return Err(Error::LayoutInvariant(format!(
                "bookmark '{}' refers to unknown parent #{}",
                item.title, parent.0
            )));
        }
        self.items.push(item);
        Ok(BookmarkId(self.items.len() - 1))
    }

    /// Keep the first `len` bookmarks. Ids handed out for the dropped ones
    /// must not be used again.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn get(&self, id: BookmarkId) -> Option<&BookmarkItem> {
        self.items.get(id.0)
    }

    pub fn items(&self) -> &[BookmarkItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [BookmarkItem] {
        &mut self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = (BookmarkId, &BookmarkItem)> {
        self.items.iter().enumerate().map(|(i, item)| (BookmarkId(i), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of ancestors of every bookmark.
    pub fn depths(&self) -> Vec<usize> {
        let mut depths: Vec<usize> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let depth = item.parent.map_or(0, |p| depths[p.0] + 1);
            depths.push(depth);
        }
        depths
    }

    /// The chain of ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: BookmarkId) -> impl Iterator<Item = BookmarkId> + '_ {
        std::iter::successors(self.get(id).and_then(|item| item.parent), |p| {
            self.get(*p).and_then(|item| item.parent)
        })
    }
}
