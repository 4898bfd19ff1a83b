//! Text extraction: concatenate the text of every page, in page order.
//!
//! Both backends are synchronous, so [`extract_text`] moves the work onto
//! the blocking pool. The document handle is owned by the blocking closure
//! and closed when it is dropped, on success and on every error path.

use crate::config::TextBackend;
use crate::error::ProofreadError;
use crate::pipeline::pdfium;
use lopdf::content::Content;
use lopdf::{Document, Object};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract the full text of the PDF at `pdf_path`.
///
/// Pages are joined without separators.
pub async fn extract_text(
    pdf_path: &Path,
    backend: TextBackend,
    pdfium_lib: Option<&Path>,
) -> Result<String, ProofreadError> {
    let path = pdf_path.to_path_buf();
    let lib = pdfium_lib.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || extract_text_blocking(&path, backend, lib.as_deref()))
        .await
        .map_err(|e| ProofreadError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
pub fn extract_text_blocking(
    pdf_path: &Path,
    backend: TextBackend,
    pdfium_lib: Option<&Path>,
) -> Result<String, ProofreadError> {
    check_readable(pdf_path)?;
    debug!("Extracting {} with {}", pdf_path.display(), backend);

    match backend {
        TextBackend::Pdfium => extract_with_pdfium(pdf_path, pdfium_lib),
        TextBackend::Lopdf => extract_with_lopdf(pdf_path),
    }
}

fn extract_with_pdfium(pdf_path: &Path, pdfium_lib: Option<&Path>) -> Result<String, ProofreadError> {
    let pdfium = pdfium::bind(pdfium_lib)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| classify_load_error(pdf_path, e))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| ProofreadError::DocumentCorrupt {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, page_text.chars().count());
        text.push_str(&page_text);
    }

    Ok(text)
}

/// Walks each page's content stream and collects the strings shown by the
/// text operators. Line-advancing operators become `\n`.
fn extract_with_lopdf(pdf_path: &Path) -> Result<String, ProofreadError> {
    let corrupt = |detail: String| ProofreadError::DocumentCorrupt {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let document = Document::load(pdf_path).map_err(|e| corrupt(e.to_string()))?;
    let pages = document.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut text = String::new();
    for (page_num, page_id) in pages {
        let raw = document
            .get_page_content(page_id)
            .map_err(|e| corrupt(format!("page {page_num}: {e}")))?;
        let content =
            Content::decode(&raw).map_err(|e| corrupt(format!("page {page_num}: {e}")))?;

        let mut page_text = String::new();
        for op in &content.operations {
            match op.operator.as_str() {
                "Tj" | "TJ" => op.operands.iter().for_each(|o| push_shown(&mut page_text, o)),
                "'" | "\"" => {
                    page_text.push('\n');
                    if let Some(last) = op.operands.last() {
                        push_shown(&mut page_text, last);
                    }
                }
                "T*" => page_text.push('\n'),
                _ => {}
            }
        }
        debug!("Page {}: {} chars", page_num, page_text.chars().count());
        text.push_str(&page_text);
    }

    Ok(text)
}

/// Append a text-showing operand. In `TJ` arrays a large negative kern
/// stands for a word gap.
fn push_shown(out: &mut String, operand: &Object) {
    match operand {
        Object::String(bytes, _) => out.push_str(&decode_pdf_string(bytes)),
        Object::Array(items) => {
            for item in items {
                match item {
                    Object::String(bytes, _) => out.push_str(&decode_pdf_string(bytes)),
                    Object::Integer(n) if *n < -100 => out.push(' '),
                    Object::Real(n) if *n < -100.0 => out.push(' '),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// UTF-16BE with a byte-order mark, then UTF-8, then Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// The path must name a file this process can open.
fn check_readable(path: &Path) -> Result<(), ProofreadError> {
    if !path.is_file() {
        return Err(ProofreadError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::File::open(path).map_err(|_| ProofreadError::DocumentNotFound {
        path: path.to_path_buf(),
    })?;
    Ok(())
}

fn classify_load_error(path: &Path, e: PdfiumError) -> ProofreadError {
    let detail = format!("{:?}", e);
    if detail.contains("FileError") {
        ProofreadError::DocumentNotFound {
            path: PathBuf::from(path),
        }
    } else {
        ProofreadError::DocumentCorrupt {
            path: path.to_path_buf(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Dictionary, Stream};

    /// One page per entry, each page a list of content operations.
    fn write_pdf(dir: &Path, pages: Vec<Vec<Operation>>) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = pages
            .into_iter()
            .map(|operations| {
                let content = Content { operations };
                let content_id =
                    doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                }))
            })
            .collect();
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = dir.join("fixture.pdf");
        doc.save(&path).unwrap();
        path
    }

    fn show(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn missing_file_is_not_found() {
        for backend in [TextBackend::Pdfium, TextBackend::Lopdf] {
            let err = extract_text_blocking(Path::new("/definitely/not/here.pdf"), backend, None)
                .unwrap_err();
            assert!(err.is_not_found(), "{backend}: got {err:?}");
        }
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_text_blocking(dir.path(), TextBackend::Lopdf, None).unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[test]
    fn lopdf_pages_are_concatenated_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), vec![show("Primera "), show("Segunda "), show("Tercera")]);

        let text = extract_text_blocking(&path, TextBackend::Lopdf, None).unwrap();
        assert_eq!(text, "Primera Segunda Tercera");
    }

    #[test]
    fn lopdf_reads_tj_arrays_and_line_operators() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Ay"),
                    Object::Integer(-250),
                    Object::string_literal("ay"),
                    Object::Integer(-20),
                    Object::string_literal("er"),
                ])],
            ),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("fui")]),
            Operation::new("ET", vec![]),
        ];
        let path = write_pdf(dir.path(), vec![ops]);

        let text = extract_text_blocking(&path, TextBackend::Lopdf, None).unwrap();
        assert_eq!(text, "Ay ayer\nfui");
    }

    #[test]
    fn lopdf_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roto.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();

        let err = extract_text_blocking(&path, TextBackend::Lopdf, None).unwrap_err();
        assert!(matches!(err, ProofreadError::DocumentCorrupt { .. }), "got {err:?}");
    }

    #[test]
    fn pdf_strings_decode_by_marker() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x61, 0x00, 0xF1]), "añ");
        assert_eq!(decode_pdf_string("escuela".as_bytes()), "escuela");
        assert_eq!(decode_pdf_string(&[b'a', 0xF1, b'o']), "año");
    }
}
