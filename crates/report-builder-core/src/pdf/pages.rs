//! Generated pages: blank placeholders and simple text pages.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::config::PageLayout;
use crate::error::{Error, Result};

const FONT_RESOURCE: &str = "F1";

/// A document of `page_count` empty pages.
pub fn blank_document(layout: &PageLayout, page_count: usize) -> Document {
    let pages = vec![Vec::new(); page_count];
    text_document(layout, &pages)
}

/// A document with one page per entry of `pages`, each page showing its lines
/// top to bottom in Helvetica.
pub fn text_document(layout: &PageLayout, pages: &[Vec<String>]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([(
            FONT_RESOURCE,
            Object::Reference(font_id),
        )])),
    )]));

    let kids: Vec<Object> = pages
        .iter()
        .map(|lines| {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                page_content(layout, lines),
            ));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Reference(resources_id)),
                ("MediaBox", media_box(layout)),
            ]));
            Object::Reference(page_id)
        })
        .collect();

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );
    let catalog_id: ObjectId = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

/// Serialize a document to bytes.
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;
    Ok(output)
}

fn media_box(layout: &PageLayout) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(layout.width),
        Object::Real(layout.height),
    ])
}

fn page_content(layout: &PageLayout, lines: &[String]) -> Vec<u8> {
    let top = layout.height - layout.margin - layout.font_size;
    let operations: Vec<Operation> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .flat_map(|(i, line)| {
            #[allow(clippy::cast_precision_loss)]
            let y = top - i as f32 * layout.line_height();
            [
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                        Object::Real(layout.font_size),
                    ],
                ),
                Operation::new("Td", vec![Object::Real(layout.margin), Object::Real(y)]),
                Operation::new("Tj", vec![Object::string_literal(win_ansi(line))]),
                Operation::new("ET", vec![]),
            ]
        })
        .collect();
    Content { operations }.encode().unwrap_or_default()
}

/// Encode text for a WinAnsiEncoding font; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => {
                u8::try_from(c as u32).unwrap_or(b'?')
            }
            _ => b'?',
        })
        .collect()
}
