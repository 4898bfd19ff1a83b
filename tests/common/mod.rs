//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf_proofread::{GrammarChecker, GrammarMatch, ProofreadConfig, ProofreadError, TextBackend};
use std::path::Path;

/// Return early from a test when libpdfium cannot be loaded.
macro_rules! skip_unless_pdfium {
    () => {
        if pdf_proofread::pipeline::pdfium::bind(None).is_err() {
            println!("SKIP: pdfium library not available (set PDFIUM_LIB_PATH)");
            return;
        }
    };
}

/// A PDF with one line of Helvetica text per page.
pub fn make_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(14)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

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

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Config with every directory inside `root`.
pub fn config_in(root: &Path) -> ProofreadConfig {
    ProofreadConfig::builder()
        .upload_dir(root.join("uploads"))
        .output_dir(root.join("resultados"))
        .preview_dir(root.join("vistas_previas"))
        .preview_dpi(72)
        .build()
        .unwrap()
}

/// Like [`config_in`], extracting text with lopdf so runs reach the checker
/// without libpdfium.
pub fn lopdf_config_in(root: &Path) -> ProofreadConfig {
    ProofreadConfig::builder()
        .upload_dir(root.join("uploads"))
        .output_dir(root.join("resultados"))
        .preview_dir(root.join("vistas_previas"))
        .preview_dpi(72)
        .text_backend(TextBackend::Lopdf)
        .build()
        .unwrap()
}

/// Number of entries in `dir`, zero when it does not exist.
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Flags every occurrence of `word` with `rule_id`.
pub struct WordChecker {
    pub word: &'static str,
    pub rule_id: &'static str,
}

#[async_trait]
impl GrammarChecker for WordChecker {
    async fn check(&self, text: &str) -> Result<Vec<GrammarMatch>, ProofreadError> {
        Ok(text
            .match_indices(self.word)
            .map(|(byte_idx, _)| GrammarMatch {
                offset: text[..byte_idx].chars().count(),
                length: self.word.chars().count(),
                rule_id: self.rule_id.to_string(),
                message: "Posible error ortográfico.".to_string(),
                replacements: vec!["escuela".to_string()],
            })
            .collect())
    }
}

/// Always unreachable.
pub struct FailingChecker;

#[async_trait]
impl GrammarChecker for FailingChecker {
    async fn check(&self, _text: &str) -> Result<Vec<GrammarMatch>, ProofreadError> {
        Err(ProofreadError::CheckerUnavailable {
            endpoint: "http://127.0.0.1:9/v2/check".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}
