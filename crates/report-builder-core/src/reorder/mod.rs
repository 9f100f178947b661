//! Page reordering for file groups.
//!
//! A strategy receives every page of every file in a group, in file order, and
//! returns one new page sequence. Strategies that understand the files'
//! embedded outlines also return the outline entries that survive, positioned
//! within the new sequence.

mod by_attribute;
mod by_datetime;

pub use by_attribute::AttributeReorder;
pub use by_datetime::DatetimeReorder;

use std::path::PathBuf;

use crate::model::ReorderPolicy;
use crate::pdf::{OutlineEntry, PageRef};

/// One page and its extracted text.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub page: PageRef,
    pub text: String,
}

/// The pages of one source file of a group.
#[derive(Debug, Clone)]
pub struct FilePages {
    pub path: PathBuf,
    /// Pages in document order
    pub records: Vec<PageRecord>,
    /// Readable entries of the file's embedded outline
    pub outline: Vec<OutlineEntry>,
}

/// A bookmark positioned relative to the first page of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBookmark {
    pub page_offset: usize,
    /// Nesting below the bookmark the group hangs from, 0 for direct children
    pub level: usize,
    pub title: String,
    /// Taken from an embedded outline rather than derived from page text
    pub recovered: bool,
}

/// Result of reordering one group.
#[derive(Debug, Clone, Default)]
pub struct ReorderOutcome {
    pub pages: Vec<PageRef>,
    pub recovered: Vec<LocalBookmark>,
}

/// A way of reordering the pages of a file group.
pub trait ReorderStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the strategy reads the files' embedded outlines.
    fn recovers_bookmarks(&self) -> bool {
        false
    }

    fn reorder(&self, files: &[FilePages]) -> ReorderOutcome;
}

/// The strategy for a group's policy, or `None` when pages keep file order.
pub fn strategy_for(policy: ReorderPolicy) -> Option<Box<dyn ReorderStrategy>> {
    match policy {
        ReorderPolicy::None => None,
        ReorderPolicy::ByAttribute => Some(Box::new(AttributeReorder)),
        ReorderPolicy::ByDatetime => Some(Box::new(DatetimeReorder)),
    }
}
