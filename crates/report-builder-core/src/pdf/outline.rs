//! Reading and writing PDF outlines (bookmark trees).
//!
//! Reading walks `/Outlines` through `/First` and `/Next` links and resolves
//! each entry's destination to a page of the same document. Entries without a
//! readable title or a resolvable destination are dropped and counted.
//!
//! Writing builds the full `/Outlines` dictionary tree from a flat list whose
//! parents always precede their children.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// Guards against reference cycles in malformed files.
const MAX_OUTLINE_DEPTH: usize = 64;

/// One readable entry of an embedded outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// 0 for top-level entries
    pub level: usize,
    pub title: String,
    pub page: PageIndex,
}

/// The outline embedded in a source document, in pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedOutline {
    pub entries: Vec<OutlineEntry>,
    /// Number of entries that were dropped because they could not be read
    pub malformed: usize,
}

/// Read the outline of `doc`. A document without an outline yields an empty result.
pub fn read_outline(doc: &Document) -> EmbeddedOutline {
    let mut outline = EmbeddedOutline::default();

    let Ok(catalog) = doc.catalog() else {
        return outline;
    };
    let Some(outlines) = catalog
        .get(b"Outlines")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
    else {
        return outline;
    };
    let Ok(Object::Reference(first)) = outlines.get(b"First") else {
        return outline;
    };

    let pages: HashMap<ObjectId, usize> = doc
        .get_pages()
        .values()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();
    let mut visited = HashSet::new();
    walk(doc, *first, 0, &pages, &mut visited, &mut outline);
    outline
}

fn walk(
    doc: &Document,
    first: ObjectId,
    level: usize,
    pages: &HashMap<ObjectId, usize>,
    visited: &mut HashSet<ObjectId>,
    outline: &mut EmbeddedOutline,
) {
    if level >= MAX_OUTLINE_DEPTH {
        return;
    }

    let mut current = Some(first);
    while let Some(node_id) = current {
        if !visited.insert(node_id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            outline.malformed += 1;
            break;
        };

        let title = node
            .get(b"Title")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(decode_text_string);
        let page = resolve_destination(doc, node, pages);

        match (title, page) {
            (Some(title), Some(page)) => outline.entries.push(OutlineEntry {
                level,
                title,
                page: PageIndex::new(page),
            }),
            _ => outline.malformed += 1,
        }

        if let Ok(Object::Reference(child)) = node.get(b"First") {
            walk(doc, *child, level + 1, pages, visited, outline);
        }

        current = match node.get(b"Next") {
            Ok(Object::Reference(next)) => Some(*next),
            _ => None,
        };
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Page index of an outline item's `/Dest` or GoTo `/A` action.
fn resolve_destination(
    doc: &Document,
    node: &Dictionary,
    pages: &HashMap<ObjectId, usize>,
) -> Option<usize> {
    if let Ok(dest) = node.get(b"Dest") {
        return destination_page(doc, dest, pages);
    }

    let action = node.get(b"A").ok().and_then(|obj| resolve(doc, obj))?.as_dict().ok()?;
    match action.get(b"S") {
        Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => {
            destination_page(doc, action.get(b"D").ok()?, pages)
        }
        _ => None,
    }
}

fn destination_page(
    doc: &Document,
    dest: &Object,
    pages: &HashMap<ObjectId, usize>,
) -> Option<usize> {
    match resolve(doc, dest)? {
        Object::Array(items) => match items.first()? {
            Object::Reference(page_id) => pages.get(page_id).copied(),
            _ => None,
        },
        // Named destination through the catalog's /Dests dictionary
        Object::Name(name) => {
            let dests = doc.catalog().ok()?.get(b"Dests").ok()?;
            let dests = resolve(doc, dests)?.as_dict().ok()?;
            let target = resolve(doc, dests.get(name).ok()?)?;
            let target = match target {
                Object::Dictionary(d) => d.get(b"D").ok()?,
                other => other,
            };
            destination_page(doc, target, pages)
        }
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding).
pub fn decode_text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        if utf16.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(utf8.to_vec()).ok();
    }
    // PDFDocEncoding agrees with Latin-1 for printable characters
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Encode a title as a PDF text string: literal ASCII or UTF-16BE with BOM.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// One outline item to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    pub page: PageIndex,
    /// Index of the parent node in the same list; must be smaller than the node's own index
    pub parent: Option<usize>,
}

/// Attach an outline built from `nodes` to `doc`'s catalog.
///
/// `page_ids` are the document's page objects in order. Returns the id of the
/// `/Outlines` dictionary, or `None` when there is nothing to write.
pub fn write_outline(
    doc: &mut Document,
    catalog_id: ObjectId,
    page_ids: &[ObjectId],
    nodes: &[OutlineNode],
) -> Result<Option<ObjectId>> {
    if nodes.is_empty() {
        return Ok(None);
    }

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        match node.parent {
            Some(p) if p < i => children[p].push(i),
            Some(p) => {
                return Err(Error::LayoutInvariant(format!(
                    "outline item {i} ('{}') refers to parent {p} that does not precede it",
                    node.title
                )));
            }
            None => roots.push(i),
        }
    }

    // descendants[i] = number of items below node i
    let mut descendants = vec![0_usize; nodes.len()];
    for i in (0..nodes.len()).rev() {
        if let Some(p) = nodes[i].parent {
            descendants[p] += descendants[i] + 1;
        }
    }

    let outlines_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = nodes.iter().map(|_| doc.new_object_id()).collect();

    for (i, node) in nodes.iter().enumerate() {
        let page_id = page_ids.get(node.page.as_usize()).ok_or(Error::PdfInvalidPage {
            page: node.page.as_usize(),
            total: page_ids.len(),
        })?;
        let siblings = node.parent.map_or(&roots, |p| &children[p]);
        let position = siblings.iter().position(|&s| s == i).unwrap_or(0);

        let mut dict = Dictionary::new();
        dict.set("Title", encode_text_string(&node.title));
        dict.set(
            "Parent",
            Object::Reference(node.parent.map_or(outlines_id, |p| item_ids[p])),
        );
        dict.set(
            "Dest",
            Object::Array(vec![Object::Reference(*page_id), Object::Name(b"Fit".to_vec())]),
        );
        if position > 0 {
            dict.set("Prev", Object::Reference(item_ids[siblings[position - 1]]));
        }
        if let Some(&next) = siblings.get(position + 1) {
            dict.set("Next", Object::Reference(item_ids[next]));
        }
        if let (Some(&first), Some(&last)) = (children[i].first(), children[i].last()) {
            dict.set("First", Object::Reference(item_ids[first]));
            dict.set("Last", Object::Reference(item_ids[last]));
            dict.set("Count", Object::Integer(i64::try_from(descendants[i]).unwrap_or(i64::MAX)));
        }
        doc.objects.insert(item_ids[i], Object::Dictionary(dict));
    }

    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::Name(b"Outlines".to_vec()));
    if let (Some(&first), Some(&last)) = (roots.first(), roots.last()) {
        outlines.set("First", Object::Reference(item_ids[first]));
        outlines.set("Last", Object::Reference(item_ids[last]));
    }
    outlines.set("Count", Object::Integer(i64::try_from(nodes.len()).unwrap_or(i64::MAX)));
    doc.objects.insert(outlines_id, Object::Dictionary(outlines));

    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::Lopdf(format!("Failed to get catalog: {e}")))?;
    catalog.set("Outlines", Object::Reference(outlines_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    Ok(Some(outlines_id))
}
