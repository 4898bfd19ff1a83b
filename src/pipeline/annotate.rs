//! Annotation: reconcile checker matches with the document text.
//!
//! Produces the body of the report as a sequence of [`Segment`]s and one
//! [`ErrorDetail`] per match. Positions are `char` indices; every slice is
//! clamped to the text so a match running past the end cannot panic.
//!
//! ## Overlaps
//!
//! At each position every match is examined in the order the checker
//! returned them and the last one covering the position wins. Matches are
//! neither sorted nor merged. The winner emits its whole span, which starts
//! at its own offset even when that lies before the current position, and
//! the scan jumps ahead by the winner's length.

use crate::checker::GrammarMatch;
use crate::pipeline::classify::ErrorCategory;
use serde::Serialize;

/// A run of body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    Plain(String),
    Highlighted { text: String, category: ErrorCategory },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain(text) | Segment::Highlighted { text, .. } => text,
        }
    }
}

/// Report entry for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Text under the match's own span.
    pub text: String,
    pub category: ErrorCategory,
    pub message: String,
    pub replacements: Vec<String>,
    pub start: usize,
    pub end: usize,
}

impl ErrorDetail {
    /// `"start-end"`, as printed in the report.
    pub fn position(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Body segments followed by per-match details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotatedDocument {
    pub body: Vec<Segment>,
    pub details: Vec<ErrorDetail>,
}

impl AnnotatedDocument {
    /// Body text with the highlighting dropped.
    pub fn plain_body(&self) -> String {
        self.body.iter().map(Segment::text).collect()
    }

    pub fn highlighted(&self) -> impl Iterator<Item = (&str, ErrorCategory)> {
        self.body.iter().filter_map(|s| match s {
            Segment::Highlighted { text, category } => Some((text.as_str(), *category)),
            Segment::Plain(_) => None,
        })
    }
}

/// Annotate `text` with `matches`, in the order supplied.
pub fn annotate(text: &str, matches: &[GrammarMatch]) -> AnnotatedDocument {
    let chars: Vec<char> = text.chars().collect();
    let mut body = BodyBuilder::default();

    let mut i = 0;
    while i < chars.len() {
        match matches.iter().filter(|m| m.covers(i)).last() {
            Some(m) => {
                let span = slice(&chars, m.offset, m.end());
                let category = ErrorCategory::from_rule_id(&m.rule_id);
                if category.is_highlighted() {
                    body.highlight(span, category);
                } else {
                    body.plain(&span);
                }
                i = i.saturating_add(m.length.max(1));
            }
            None => {
                body.push_char(chars[i]);
                i += 1;
            }
        }
    }

    let details = matches
        .iter()
        .map(|m| ErrorDetail {
            text: slice(&chars, m.offset, m.end()),
            category: ErrorCategory::from_rule_id(&m.rule_id),
            message: m.message.clone(),
            replacements: m.replacements.clone(),
            start: m.offset,
            end: m.end(),
        })
        .collect();

    AnnotatedDocument {
        body: body.finish(),
        details,
    }
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    chars[start..end].iter().collect()
}

/// Collects segments, merging consecutive plain text.
#[derive(Default)]
struct BodyBuilder {
    segments: Vec<Segment>,
    plain: String,
}

impl BodyBuilder {
    fn push_char(&mut self, c: char) {
        self.plain.push(c);
    }

    fn plain(&mut self, s: &str) {
        self.plain.push_str(s);
    }

    fn highlight(&mut self, text: String, category: ErrorCategory) {
        self.flush();
        self.segments.push(Segment::Highlighted { text, category });
    }

    fn flush(&mut self) {
        if !self.plain.is_empty() {
            self.segments
                .push(Segment::Plain(std::mem::take(&mut self.plain)));
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush();
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(offset: usize, length: usize, rule_id: &str) -> GrammarMatch {
        GrammarMatch {
            offset,
            length,
            rule_id: rule_id.to_string(),
            message: format!("msg {rule_id}"),
            replacements: vec![],
        }
    }

    const SPELL: &str = "MORFOLOGIK_RULE_ES";
    const GRAMMAR: &str = "ES_SIMPLE_REPLACE_SIMPLE_TAMBIEN";

    #[test]
    fn empty_match_list_is_plain_text() {
        let doc = annotate("Hola mundo.\nSegunda línea.", &[]);
        assert_eq!(
            doc.body,
            vec![Segment::Plain("Hola mundo.\nSegunda línea.".into())]
        );
        assert!(doc.details.is_empty());
    }

    #[test]
    fn empty_text_yields_nothing() {
        let doc = annotate("", &[]);
        assert!(doc.body.is_empty());
        assert_eq!(doc.plain_body(), "");
    }

    #[test]
    fn misspelled_word_is_highlighted_and_reported() {
        let text = "Ay ayer fui a la escuala";
        let mut spelling = m(17, 7, "MORFOLOGIK_RULE_ES_ES");
        spelling.replacements = vec!["escuela".into()];
        let doc = annotate(text, &[spelling]);

        assert_eq!(
            doc.body,
            vec![
                Segment::Plain("Ay ayer fui a la ".into()),
                Segment::Highlighted {
                    text: "escuala".into(),
                    category: ErrorCategory::Spelling
                },
            ]
        );
        let detail = &doc.details[0];
        assert_eq!(detail.text, "escuala");
        assert_eq!(detail.category.label(), "Ortografía");
        assert_eq!(detail.position(), "17-24");
        assert_eq!(detail.replacements, vec!["escuela"]);
    }

    #[test]
    fn span_past_end_is_clamped_but_position_is_reported_as_given() {
        let text = "Ay ayer fui a la escuala";
        let doc = annotate(text, &[m(19, 6, SPELL)]);
        assert_eq!(doc.details[0].text, "cuala");
        assert_eq!(doc.details[0].position(), "19-25");
        assert_eq!(doc.plain_body(), text);
    }

    #[test]
    fn huge_lengths_do_not_overflow_the_scan() {
        let text = "ab cd";
        let doc = annotate(text, &[m(1, usize::MAX, SPELL), m(3, usize::MAX, GRAMMAR)]);
        assert_eq!(doc.details[0].text, "b cd");
        assert_eq!(doc.details[1].text, "cd");
        assert_eq!(doc.details[0].end, usize::MAX);
    }

    #[test]
    fn non_overlapping_matches_round_trip() {
        let text = "Yo tanbien fui a la escuala ayer, tanbien.";
        let matches = vec![
            m(3, 7, GRAMMAR),
            m(20, 7, SPELL),
            m(28, 4, "UPPERCASE_SENTENCE_START"),
            m(34, 7, GRAMMAR),
        ];
        let doc = annotate(text, &matches);
        assert_eq!(doc.plain_body(), text);
        let highlighted: Vec<_> = doc.highlighted().collect();
        assert_eq!(
            highlighted,
            vec![
                ("tanbien", ErrorCategory::Grammatical),
                ("escuala", ErrorCategory::Spelling),
                ("tanbien", ErrorCategory::Grammatical),
            ]
        );
        assert_eq!(doc.details.len(), 4);
    }

    #[test]
    fn unknown_rule_is_emitted_as_plain_text() {
        let doc = annotate("abc def", &[m(4, 3, "WHITESPACE_RULE")]);
        assert_eq!(doc.body, vec![Segment::Plain("abc def".into())]);
        assert_eq!(doc.details[0].category, ErrorCategory::Unknown);
    }

    #[test]
    fn last_overlapping_match_wins() {
        // Both cover position 0; the grammar match comes last and wins even
        // though the spelling match is longer. At 7 only the spelling match
        // still covers, and it is emitted whole from offset 0.
        let text = "tambien dijo";
        let doc = annotate(text, &[m(0, 12, SPELL), m(0, 7, GRAMMAR)]);
        assert_eq!(
            doc.body,
            vec![
                Segment::Highlighted {
                    text: "tambien".into(),
                    category: ErrorCategory::Grammatical
                },
                Segment::Highlighted {
                    text: "tambien dijo".into(),
                    category: ErrorCategory::Spelling
                },
            ]
        );

        // Reversed order: the long spelling span wins.
        let doc = annotate(text, &[m(0, 7, GRAMMAR), m(0, 12, SPELL)]);
        assert_eq!(
            doc.body,
            vec![Segment::Highlighted {
                text: "tambien dijo".into(),
                category: ErrorCategory::Spelling
            }]
        );
    }

    #[test]
    fn winner_is_emitted_from_its_own_offset() {
        let text = "abcdef";
        // i=0: both cover, the short spelling match wins and the scan moves
        // to 1. i=1: only the grammar match covers and it is emitted from
        // offset 0, so "a" appears twice.
        let doc = annotate(text, &[m(0, 3, GRAMMAR), m(0, 1, SPELL)]);
        assert_eq!(
            doc.body,
            vec![
                Segment::Highlighted {
                    text: "a".into(),
                    category: ErrorCategory::Spelling
                },
                Segment::Highlighted {
                    text: "abc".into(),
                    category: ErrorCategory::Grammatical
                },
                Segment::Plain("ef".into()),
            ]
        );

        // i=0: #0 and #2 cover, #2 wins with "abc" and the scan jumps to 3.
        let doc = annotate(text, &[m(0, 1, SPELL), m(1, 2, GRAMMAR), m(0, 3, SPELL)]);
        assert_eq!(doc.highlighted().next(), Some(("abc", ErrorCategory::Spelling)));
        assert_eq!(doc.plain_body(), "abcdef");
    }

    #[test]
    fn details_keep_service_order_and_own_span() {
        let text = "tambien dijo";
        let doc = annotate(text, &[m(0, 12, SPELL), m(0, 7, GRAMMAR)]);
        assert_eq!(doc.details[0].text, "tambien dijo");
        assert_eq!(doc.details[1].text, "tambien");
        assert_eq!(doc.details[0].position(), "0-12");
        assert_eq!(doc.details[1].message, format!("msg {GRAMMAR}"));
    }

    #[test]
    fn zero_length_match_never_covers() {
        let doc = annotate("abc", &[m(1, 0, SPELL)]);
        assert_eq!(doc.body, vec![Segment::Plain("abc".into())]);
        assert_eq!(doc.details[0].position(), "1-1");
        assert_eq!(doc.details[0].text, "");
    }

    #[test]
    fn multibyte_text_is_indexed_by_char() {
        let text = "Él pidió pingüino";
        let doc = annotate(text, &[m(9, 8, SPELL)]);
        assert_eq!(doc.highlighted().next(), Some(("pingüino", ErrorCategory::Spelling)));
        assert_eq!(doc.plain_body(), text);
    }
}
