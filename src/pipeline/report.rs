//! Report rendering: lay out an [`AnnotatedDocument`] and write it as PDF.
//!
//! Layout is done here rather than by a typesetting engine: a Letter page,
//! 72 pt margins, the standard Helvetica font (WinAnsi encoded, so no font
//! embedding) and greedy word wrapping using the Helvetica AFM widths. Words
//! wider than a full line are broken by character. Newlines in the source
//! text are kept as line breaks; other whitespace collapses to one space.
//!
//! The body paragraph comes first, spelling spans in blue and grammar spans
//! in green. Each match then gets a five-line detail block followed by a
//! 12 pt gap.
//!
//! The file is written to a temp file next to its destination and renamed
//! into place, so a failed render never leaves a half-written PDF behind.

use crate::error::ProofreadError;
use crate::pipeline::annotate::{AnnotatedDocument, ErrorDetail, Segment};
use crate::pipeline::classify::ErrorCategory;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// US Letter, in points.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN: f32 = 72.0;

/// Vertical gap after the body and after each detail block.
const BLOCK_SPACING: f32 = 12.0;

const FONT_RESOURCE: &[u8] = b"F1";

/// Fill colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const BLUE: Rgb = Rgb(0.0, 0.0, 1.0);
    pub const GREEN: Rgb = Rgb(0.0, 0.5, 0.0);
    pub const RED: Rgb = Rgb(1.0, 0.0, 0.0);
    pub const PURPLE: Rgb = Rgb(0.5, 0.0, 0.5);
    pub const BROWN: Rgb = Rgb(0.65, 0.16, 0.16);
}

/// Highlight colour of a body span.
pub fn category_color(category: ErrorCategory) -> Rgb {
    match category {
        ErrorCategory::Spelling => Rgb::BLUE,
        ErrorCategory::Grammatical => Rgb::GREEN,
        ErrorCategory::Unknown => Rgb::BLACK,
    }
}

/// Text in a single colour, before layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub color: Rgb,
}

impl Run {
    pub fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Text placed on a page; `(x, y)` is the baseline origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: Rgb,
}

/// Everything drawn on one page.
pub type PageLayout = Vec<PlacedText>;

// ── Public entry points ──────────────────────────────────────────────────────

/// Render `doc` into `output_dir` under a fresh unique name.
///
/// The directory is created if needed. Returns the path of the new PDF.
pub fn render_report(
    doc: &AnnotatedDocument,
    output_dir: &Path,
    stem: &str,
    font_size: f32,
) -> Result<PathBuf, ProofreadError> {
    std::fs::create_dir_all(output_dir).map_err(|e| ProofreadError::RenderFailure {
        path: output_dir.to_path_buf(),
        detail: format!("cannot create output directory: {e}"),
    })?;

    let path = output_dir.join(report_file_name(stem));
    write_report(doc, &path, font_size)?;
    info!("Report written to {}", path.display());
    Ok(path)
}

/// Lay out `doc` and write it to exactly `path`.
pub fn write_report(
    doc: &AnnotatedDocument,
    path: &Path,
    font_size: f32,
) -> Result<(), ProofreadError> {
    let render_err = |detail: String| ProofreadError::RenderFailure {
        path: path.to_path_buf(),
        detail,
    };

    let pages = layout_document(doc, font_size);
    debug!(
        "Laid out {} body segments and {} details on {} pages",
        doc.body.len(),
        doc.details.len(),
        pages.len()
    );

    let mut pdf = build_pdf(&pages, font_size).map_err(render_err)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".pdf.tmp")
        .tempfile_in(&dir)
        .map_err(|e| render_err(format!("temp file: {e}")))?;

    pdf.save_to(tmp.as_file_mut())
        .map_err(|e| render_err(format!("save: {e}")))?;

    tmp.persist(path)
        .map_err(|e| render_err(format!("rename: {}", e.error)))?;
    Ok(())
}

/// `<stem>-<uuid>.pdf`, with `stem` reduced to a safe file-name fragment.
pub fn report_file_name(stem: &str) -> String {
    let mut safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(48)
        .collect();
    if safe.trim_matches('_').is_empty() {
        safe = "resultado".to_string();
    }
    format!("{}-{}.pdf", safe, Uuid::new_v4().simple())
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Lay out the body and detail blocks into pages. Always at least one page.
pub fn layout_document(doc: &AnnotatedDocument, font_size: f32) -> Vec<PageLayout> {
    let mut composer = Composer::new(font_size);

    composer.paragraph(&body_runs(doc));
    if !doc.details.is_empty() {
        composer.spacer(BLOCK_SPACING);
    }

    for detail in &doc.details {
        for runs in detail_paragraphs(detail) {
            composer.paragraph(&runs);
        }
        composer.spacer(BLOCK_SPACING);
    }

    composer.finish()
}

/// Body segments as coloured runs.
pub fn body_runs(doc: &AnnotatedDocument) -> Vec<Run> {
    doc.body
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => Run::new(text.as_str(), Rgb::BLACK),
            Segment::Highlighted { text, category } => {
                Run::new(text.as_str(), category_color(*category))
            }
        })
        .collect()
}

/// The five lines describing one match.
pub fn detail_paragraphs(detail: &ErrorDetail) -> Vec<Vec<Run>> {
    let replacements = if detail.replacements.is_empty() {
        "(ninguno)".to_string()
    } else {
        detail.replacements.join(", ")
    };

    vec![
        vec![
            Run::new("Palabra incorrecta: ", Rgb::BLACK),
            Run::new(detail.text.as_str(), Rgb::RED),
        ],
        vec![
            Run::new("Tipo de error: ", Rgb::BLACK),
            Run::new(detail.category.label(), Rgb::PURPLE),
        ],
        vec![
            Run::new("Mensaje: ", Rgb::BLACK),
            Run::new(detail.message.as_str(), Rgb::BROWN),
        ],
        vec![Run::new(
            format!("Reemplazos sugeridos: {replacements}"),
            Rgb::BLACK,
        )],
        vec![Run::new(
            format!("Posición del error: {}", detail.position()),
            Rgb::BLACK,
        )],
    ]
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Space,
    Newline,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if c == '\n' || c.is_whitespace() {
            if !word.is_empty() {
                tokens.push(Token::Word(std::mem::take(&mut word)));
            }
            if c == '\n' {
                tokens.push(Token::Newline);
            } else if c != '\r' && tokens.last() != Some(&Token::Space) {
                tokens.push(Token::Space);
            }
        } else {
            word.push(c);
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

/// Greedy line breaker and paginator.
struct Composer {
    font_size: f32,
    leading: f32,
    pages: Vec<PageLayout>,
    current: PageLayout,
    /// Baseline of the next line to be placed.
    y: f32,
    /// Fragments of the line being filled; `y` is set when it is placed.
    line: Vec<PlacedText>,
    /// Cursor, relative to the left margin.
    x: f32,
    pending_space: bool,
}

impl Composer {
    fn new(font_size: f32) -> Self {
        Self {
            font_size,
            leading: font_size * 1.2,
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN - font_size,
            line: Vec::new(),
            x: 0.0,
            pending_space: false,
        }
    }

    fn max_width() -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    fn paragraph(&mut self, runs: &[Run]) {
        for run in runs {
            for token in tokenize(&run.text) {
                match token {
                    Token::Newline => self.flush_line(),
                    Token::Space => {
                        if !self.line.is_empty() {
                            self.pending_space = true;
                        }
                    }
                    Token::Word(word) => self.word(&word, run.color),
                }
            }
        }
        if !self.line.is_empty() {
            self.flush_line();
        }
    }

    fn spacer(&mut self, height: f32) {
        self.y -= height;
    }

    fn word(&mut self, word: &str, color: Rgb) {
        let width = text_width(word, self.font_size);
        let space = if self.pending_space {
            text_width(" ", self.font_size)
        } else {
            0.0
        };

        if self.x + space + width > Self::max_width() && !self.line.is_empty() {
            self.flush_line();
        }

        if width > Self::max_width() {
            for c in word.chars() {
                let mut buf = [0u8; 4];
                let ch = c.encode_utf8(&mut buf);
                if self.x + text_width(ch, self.font_size) > Self::max_width()
                    && !self.line.is_empty()
                {
                    self.flush_line();
                }
                self.append(ch, color);
            }
        } else {
            self.append(word, color);
        }
    }

    /// Put `text` at the cursor, after the pending space if any.
    fn append(&mut self, text: &str, color: Rgb) {
        let space = if self.pending_space && !self.line.is_empty() {
            text_width(" ", self.font_size)
        } else {
            0.0
        };
        let width = text_width(text, self.font_size);

        match self.line.last_mut() {
            Some(last) if last.color == color => {
                if space > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
            }
            _ => self.line.push(PlacedText {
                x: MARGIN + self.x + space,
                y: 0.0,
                text: text.to_string(),
                color,
            }),
        }

        self.x += space + width;
        self.pending_space = false;
    }

    /// Place the current line (possibly empty) and move to the next one.
    fn flush_line(&mut self) {
        if self.y < MARGIN {
            self.new_page();
        }
        let y = self.y;
        self.current
            .extend(self.line.drain(..).map(|frag| PlacedText { y, ..frag }));
        self.y -= self.leading;
        self.x = 0.0;
        self.pending_space = false;
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN - self.font_size;
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.line.is_empty() {
            self.flush_line();
        }
        self.pages.push(self.current);
        self.pages
    }
}

// ── Font metrics and encoding ────────────────────────────────────────────────

/// Helvetica advance widths (1/1000 em) for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

const DEFAULT_WIDTH: u16 = 556;

fn glyph_width(c: char) -> u16 {
    let c = fold_accent(c);
    match c as u32 {
        0x20..=0x7E => HELVETICA_WIDTHS[(c as u32 - 0x20) as usize],
        _ => DEFAULT_WIDTH,
    }
}

/// Accented Latin letters share the width of their base letter.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        '¿' => '?',
        '¡' => '!',
        '\t' => ' ',
        other => other,
    }
}

/// Width of `text` in points at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(c) as u32).sum();
    units as f32 * font_size / 1000.0
}

/// Encode `text` for a WinAnsiEncoding font. Unmappable chars become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\t' => b' ',
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

// ── PDF objects ──────────────────────────────────────────────────────────────

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn page_content(items: &[PlacedText], font_size: f32) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.to_vec()), real(font_size)],
        ),
    ];

    let mut color: Option<Rgb> = None;
    for item in items {
        if color != Some(item.color) {
            let Rgb(r, g, b) = item.color;
            operations.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
            color = Some(item.color);
        }
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                real(item.x),
                real(item.y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&item.text),
                StringFormat::Hexadecimal,
            )],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

fn build_pdf(pages: &[PageLayout], font_size: f32) -> Result<Document, String> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for items in pages {
        let bytes = page_content(items, font_size)
            .encode()
            .map_err(|e| format!("content stream: {e}"))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                real(PAGE_WIDTH),
                real(PAGE_HEIGHT),
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
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("pdf-proofread"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::GrammarMatch;
    use crate::pipeline::annotate::annotate;

    fn spelling(offset: usize, length: usize) -> GrammarMatch {
        GrammarMatch {
            offset,
            length,
            rule_id: "MORFOLOGIK_RULE_ES".into(),
            message: "Posible error ortográfico.".into(),
            replacements: vec!["escuela".into()],
        }
    }

    fn all_text(pages: &[PageLayout]) -> Vec<String> {
        pages
            .iter()
            .flat_map(|p| p.iter().map(|t| t.text.clone()))
            .collect()
    }

    #[test]
    fn helvetica_widths() {
        assert!((text_width("a", 10.0) - 5.56).abs() < 1e-4);
        assert!((text_width("W", 1000.0) - 944.0).abs() < 1e-3);
        assert_eq!(text_width("ñ", 10.0), text_width("n", 10.0));
        assert_eq!(text_width("", 10.0), 0.0);
    }

    #[test]
    fn win_ansi_encoding() {
        assert_eq!(encode_win_ansi("año €"), vec![0x61, 0xF1, 0x6F, 0x20, 0x80]);
        assert_eq!(encode_win_ansi("¿Qué?"), vec![0xBF, b'Q', b'u', 0xE9, b'?']);
        assert_eq!(encode_win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn tokenizer_collapses_whitespace_and_keeps_newlines() {
        assert_eq!(
            tokenize("hola  mundo\r\nadiós"),
            vec![
                Token::Word("hola".into()),
                Token::Space,
                Token::Word("mundo".into()),
                Token::Newline,
                Token::Word("adiós".into()),
            ]
        );
    }

    #[test]
    fn highlighted_word_gets_its_colour() {
        let doc = annotate("Ay ayer fui a la escuala", &[spelling(17, 7)]);
        let pages = layout_document(&doc, 10.0);
        let body = &pages[0];
        assert_eq!(body[0].text, "Ay ayer fui a la");
        assert_eq!(body[0].color, Rgb::BLACK);
        assert_eq!(body[1].text, "escuala");
        assert_eq!(body[1].color, Rgb::BLUE);
        assert_eq!(body[0].y, body[1].y);
        assert!(body[1].x > body[0].x + text_width("Ay ayer fui a la", 10.0));
    }

    #[test]
    fn detail_block_lines() {
        let doc = annotate("Ay ayer fui a la escuala", &[spelling(17, 7)]);
        let text = all_text(&layout_document(&doc, 10.0));
        assert!(text.contains(&"Palabra incorrecta:".to_string()));
        assert!(text.contains(&"escuala".to_string()));
        assert!(text.contains(&"Ortografía".to_string()));
        assert!(text.contains(&"Posición del error: 17-24".to_string()));
        assert!(text.contains(&"Reemplazos sugeridos: escuela".to_string()));
    }

    #[test]
    fn empty_document_has_one_blank_page() {
        let pages = layout_document(&AnnotatedDocument::default(), 10.0);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn long_paragraph_wraps_inside_margins() {
        let text = "palabra ".repeat(200);
        let doc = annotate(&text, &[]);
        let pages = layout_document(&doc, 10.0);
        let lines: Vec<_> = pages.iter().flatten().collect();
        assert!(lines.len() > 5);
        for line in &lines {
            let right = line.x + text_width(&line.text, 10.0);
            assert!(right <= PAGE_WIDTH - MARGIN + 0.01, "overflow: {right}");
            assert!(line.y >= MARGIN - 10.0 * 1.2);
        }
    }

    #[test]
    fn overlong_word_is_split() {
        let word = "x".repeat(200);
        let doc = annotate(&word, &[]);
        let lines: Vec<_> = layout_document(&doc, 10.0).into_iter().flatten().collect();
        assert!(lines.len() >= 2);
        let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, word);
    }

    #[test]
    fn many_details_spill_onto_more_pages() {
        let text = "escuala ".repeat(40);
        let matches: Vec<_> = (0..40).map(|k| spelling(k * 8, 7)).collect();
        let doc = annotate(&text, &matches);
        let pages = layout_document(&doc, 10.0);
        assert!(pages.len() > 1, "got {} pages", pages.len());
        assert!(pages.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn report_file_names_are_unique_and_safe() {
        let a = report_file_name("mi tesis (final)");
        let b = report_file_name("mi tesis (final)");
        assert_ne!(a, b);
        assert!(a.starts_with("mi_tesis__final_-"));
        assert!(a.ends_with(".pdf"));
        assert!(report_file_name("???").starts_with("resultado-"));
    }

    #[test]
    fn written_report_is_a_loadable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let text = "escuala ".repeat(40);
        let matches: Vec<_> = (0..40).map(|k| spelling(k * 8, 7)).collect();
        let doc = annotate(&text, &matches);

        let path = render_report(&doc, &dir.path().join("resultados"), "prueba", 10.0).unwrap();
        assert!(path.starts_with(dir.path().join("resultados")));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.get_pages().len(), layout_document(&doc, 10.0).len());

        // No temp files left next to the report.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("resultados"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn unwritable_destination_is_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let err = render_report(&AnnotatedDocument::default(), &blocker, "x", 10.0).unwrap_err();
        assert!(matches!(err, ProofreadError::RenderFailure { .. }));
    }
}
