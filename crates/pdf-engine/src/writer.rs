//! Serializes reflowed lines into a fresh PDF.
//!
//! One output page per page index referenced by the lines (gaps become blank pages),
//! a single standard font at a fixed size, left-aligned at the margin.

use std::fs;
use std::path::Path;

use doc_model::{page_count, LayoutLine, ReflowConfig};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

use crate::encoding::encode_win_ansi;
use crate::PdfEngineError;

pub const OUTPUT_FONT: &str = "Helvetica";

/// Builds the PDF bytes for `lines` laid out with `config`.
pub fn emit_document(lines: &[LayoutLine], config: &ReflowConfig) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => OUTPUT_FONT,
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let total_pages = page_count(lines).max(1);
    let mut kids: Vec<Object> = Vec::with_capacity(total_pages as usize);

    for page_index in 0..total_pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), config.font_size.into()]),
        ];

        for line in lines.iter().filter(|line| line.page_index == page_index) {
            let pdf_y = config.page_height - line.baseline_y;
            operations.push(Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    config.margin.into(),
                    pdf_y.into(),
                ],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(&line.content))]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), config.page_width.into(), config.page_height.into()],
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total_pages as i64,
        "Resources" => resources_id,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    debug!(pages = total_pages, lines = lines.len(), bytes = bytes.len(), "emitted document");
    Ok(bytes)
}

/// Writes the emitted document to `path`, creating parent directories.
pub fn write_document(
    lines: &[LayoutLine],
    config: &ReflowConfig,
    path: &Path,
) -> Result<(), PdfEngineError> {
    let bytes = emit_document(lines, config)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
