use std::path::{Path, PathBuf};

use lopdf::{Document, ObjectId};
use tracing::warn;

use super::outline::{EmbeddedOutline, read_outline};
use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// A decoded source PDF, kept in memory for the whole build.
pub struct SourcePdf {
    path: PathBuf,
    document: Document,
    /// Page object ids in document order
    page_ids: Vec<ObjectId>,
}

impl SourcePdf {
    /// Decode a PDF from bytes; `path` is only used for reporting.
    pub fn from_bytes(bytes: &[u8], path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = Document::load_mem(bytes).map_err(|e| {
            Error::PdfOpen(format!("Failed to parse {}: {e}", path.display()))
        })?;
        let page_ids = document.get_pages().values().copied().collect();

        Ok(Self {
            path,
            document,
            page_ids,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(&bytes, path.as_ref())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Plain text of one page.
    pub fn page_text(&self, index: PageIndex) -> Result<String> {
        let index = PageIndex::try_from_index(index.as_usize(), self.page_count())?;
        let page_number = index.as_lopdf_page_number()?;
        self.document
            .extract_text(&[page_number])
            .map_err(|e| Error::PdfTextExtraction {
                page: index.as_usize(),
                reason: e.to_string(),
            })
    }

    /// Text of every page; pages whose text cannot be extracted yield an empty string.
    pub fn page_texts(&self) -> Vec<String> {
        (0..self.page_count())
            .map(|i| {
                self.page_text(PageIndex::new(i)).unwrap_or_else(|e| {
                    warn!("{}: {}", self.path.display(), e);
                    String::new()
                })
            })
            .collect()
    }

    /// The document's embedded outline, with unreadable entries counted.
    pub fn outline(&self) -> EmbeddedOutline {
        read_outline(&self.document)
    }
}

impl std::fmt::Debug for SourcePdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePdf")
            .field("path", &self.path)
            .field("page_count", &self.page_ids.len())
            .finish()
    }
}

/// Handle to a PDF held by a [`SourceStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// One page of one source PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub source: SourceId,
    pub page: PageIndex,
}

impl PageRef {
    pub const fn new(source: SourceId, page: PageIndex) -> Self {
        Self { source, page }
    }
}

/// Every source PDF decoded during one build.
///
/// Sources stay loaded until the store is dropped at the end of the build,
/// because pages and outlines are read again during composition.
#[derive(Debug, Default)]
pub struct SourceStore {
    sources: Vec<SourcePdf>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourcePdf) -> SourceId {
        self.sources.push(source);
        SourceId::new(self.sources.len() - 1)
    }

    pub fn get(&self, id: SourceId) -> &SourcePdf {
        &self.sources[id.0]
    }

    /// All pages of a source, in document order.
    pub fn page_refs(&self, id: SourceId) -> Vec<PageRef> {
        (0..self.get(id).page_count())
            .map(|i| PageRef::new(id, PageIndex::new(i)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
