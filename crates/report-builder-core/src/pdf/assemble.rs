//! Assembling pages from many PDFs into one document.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::outline::{OutlineNode, write_outline};
use super::source::{PageRef, SourceId, SourceStore};
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITED_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 32;

/// Builds one output document page by page.
///
/// Each source document is imported once: its non-structural objects are
/// renumbered into the output and its page dictionaries are kept aside with
/// inherited attributes flattened. Every appended page gets its own page
/// object, so a source page may be appended more than once and unused pages
/// never reach the output.
pub struct PdfAssembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    imported: HashMap<SourceId, Vec<Dictionary>>,
}

impl PdfAssembler {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append pages of documents held by `store`, in the given order.
    pub fn append_source_pages(&mut self, store: &SourceStore, pages: &[PageRef]) -> Result<()> {
        for page in pages {
            if !self.imported.contains_key(&page.source) {
                let dicts = self.import(store.get(page.source).document());
                self.imported.insert(page.source, dicts);
            }
            let dict = self
                .imported
                .get(&page.source)
                .and_then(|dicts| dicts.get(page.page.as_usize()))
                .cloned()
                .ok_or_else(|| Error::PdfInvalidPage {
                    page: page.page.as_usize(),
                    total: store.get(page.source).page_count(),
                })?;
            self.push_page(dict);
        }
        Ok(())
    }

    /// Append every page of `doc`. Returns the number of pages appended.
    pub fn append_document(&mut self, doc: &Document) -> usize {
        let dicts = self.import(doc);
        let count = dicts.len();
        for dict in dicts {
            self.push_page(dict);
        }
        count
    }

    /// Write the page tree, catalog and outline, and return the document.
    pub fn finish(mut self, outline: &[OutlineNode]) -> Result<Document> {
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        write_outline(&mut self.document, catalog_id, &self.kids, outline)?;
        self.document.compress();
        Ok(self.document)
    }

    fn push_page(&mut self, mut dict: Dictionary) {
        dict.set("Parent", Object::Reference(self.pages_id));
        let id = self.document.add_object(Object::Dictionary(dict));
        self.kids.push(id);
    }

    /// Copy `source`'s shared objects into the output and return its page
    /// dictionaries in order, with inherited attributes made explicit.
    fn import(&mut self, source: &Document) -> Vec<Dictionary> {
        let mut doc = source.clone();
        doc.renumber_objects_with(self.document.max_id + 1);

        let page_dicts: Vec<Dictionary> = doc
            .get_pages()
            .values()
            .filter_map(|&page_id| {
                let page = doc.get_dictionary(page_id).ok()?;
                Some(flatten_page(&doc, page))
            })
            .collect();

        let max_id = doc.max_id;
        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }
        self.document.max_id = self.document.max_id.max(max_id);

        page_dicts
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_page(doc: &Document, page: &Dictionary) -> Dictionary {
    let mut flat = page.clone();
    for key in INHERITED_KEYS {
        if flat.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page, key) {
            flat.set(key.to_vec(), value);
        }
    }
    if !flat.has(b"MediaBox") {
        flat.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
    }
    // Annotations refer to objects of the source page tree
    flat.remove(b"Annots");
    flat
}

fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}
