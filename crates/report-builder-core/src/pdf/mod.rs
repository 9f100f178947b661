mod assemble;
mod outline;
mod page_index;
mod pages;
mod source;

pub use assemble::PdfAssembler;
pub use outline::{EmbeddedOutline, OutlineEntry, OutlineNode, read_outline, write_outline};
pub use page_index::PageIndex;
pub use pages::{blank_document, save_document, text_document};
pub use source::{PageRef, SourceId, SourcePdf, SourceStore};
