//! Rule identifier → error category.
//!
//! A closed, hardcoded lookup. Rule families LanguageTool adds later land in
//! [`ErrorCategory::Unknown`] until they are listed here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by the Spanish Morfologik speller rules.
pub const SPELLING_RULE_PREFIX: &str = "MORFOLOGIK_RULE_ES";

/// The one grammatical substitution rule given its own category.
pub const GRAMMAR_RULE_ID: &str = "ES_SIMPLE_REPLACE_SIMPLE_TAMBIEN";

/// Coarse classification of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Spelling,
    Grammatical,
    Unknown,
}

impl ErrorCategory {
    pub fn from_rule_id(rule_id: &str) -> Self {
        if rule_id.starts_with(SPELLING_RULE_PREFIX) {
            ErrorCategory::Spelling
        } else if rule_id == GRAMMAR_RULE_ID {
            ErrorCategory::Grammatical
        } else {
            ErrorCategory::Unknown
        }
    }

    /// Label printed in the report.
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Spelling => "Ortografía",
            ErrorCategory::Grammatical => "Error gramatical",
            ErrorCategory::Unknown => "Desconocido",
        }
    }

    /// Whether spans of this category are highlighted in the body text.
    pub fn is_highlighted(self) -> bool {
        !matches!(self, ErrorCategory::Unknown)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
