//! Page index newtype for safe conversion between page numbering schemes.
//!
//! Bookmarks and placed items use 1-indexed page numbers, the assembled
//! document addresses pages 0-indexed, and lopdf's page map is keyed by
//! 1-indexed `u32`. This newtype centralizes the conversions.

use std::fmt;

use crate::error::Error;

/// A 0-indexed page position inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// The 1-indexed page number of this page.
    #[must_use]
    pub const fn as_page_number(self) -> usize {
        self.0 + 1
    }

    /// The key of this page in lopdf's `get_pages()` map.
    pub fn as_lopdf_page_number(self) -> Result<u32, Error> {
        u32::try_from(self.0 + 1).map_err(|_| Error::PdfInvalidPage {
            page: self.0,
            total: 0,
        })
    }

    /// Convert a 1-indexed page number into an index, checking it against the
    /// document's page count.
    pub fn from_page_number(page_number: usize, total_pages: usize) -> Result<Self, Error> {
        if page_number == 0 || page_number > total_pages {
            return Err(Error::PdfInvalidPage {
                page: page_number,
                total: total_pages,
            });
        }
        Ok(Self(page_number - 1))
    }

    /// Validate a 0-indexed page against the document's page count.
    pub fn try_from_index(index: usize, total_pages: usize) -> Result<Self, Error> {
        if index >= total_pages {
            return Err(Error::PdfInvalidPage {
                page: index,
                total: total_pages,
            });
        }
        Ok(Self(index))
    }
}

impl From<PageIndex> for usize {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
