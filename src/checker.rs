//! Grammar checking: the [`GrammarChecker`] seam and its LanguageTool client.
//!
//! The orchestrator never builds a checker itself. Callers construct one
//! (usually [`LanguageToolClient::from_config`]) and pass it in, which is also
//! how tests substitute a stub that returns canned matches.
//!
//! ## Offsets
//!
//! LanguageTool is a Java service and reports `offset`/`length` in UTF-16
//! code units. Everything downstream indexes the document by `char`, so the
//! client converts before returning. For text without characters outside
//! the Basic Multilingual Plane the two agree and the conversion is skipped.

use crate::config::ProofreadConfig;
use crate::error::ProofreadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One issue reported by the checker.
///
/// `offset` and `length` count `char`s of the checked text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarMatch {
    pub offset: usize,
    pub length: usize,
    pub rule_id: String,
    pub message: String,
    pub replacements: Vec<String>,
}

impl GrammarMatch {
    /// Exclusive end of the flagged span.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    /// Whether the span `[offset, end)` covers char position `pos`.
    pub fn covers(&self, pos: usize) -> bool {
        self.offset <= pos && pos < self.end()
    }
}

/// An external grammar-checking capability bound to one language.
///
/// Matches are returned in service order. Implementations must not retry:
/// a failure is terminal for the run.
#[async_trait]
pub trait GrammarChecker: Send + Sync {
    async fn check(&self, text: &str) -> Result<Vec<GrammarMatch>, ProofreadError>;
}

/// Client for a LanguageTool `/v2/check` endpoint.
#[derive(Debug, Clone)]
pub struct LanguageToolClient {
    http: reqwest::Client,
    endpoint: String,
    language: String,
}

impl LanguageToolClient {
    /// Client for `endpoint` checking `language` with no request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, ProofreadError> {
        Self::with_timeout(endpoint, language, None)
    }

    /// Client built from the checker settings of a [`ProofreadConfig`].
    pub fn from_config(config: &ProofreadConfig) -> Result<Self, ProofreadError> {
        Self::with_timeout(
            config.checker_url.clone(),
            config.language.clone(),
            config.checker_timeout_secs,
        )
    }

    fn with_timeout(
        endpoint: impl Into<String>,
        language: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, ProofreadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| ProofreadError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            language: language.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn unavailable(&self, reason: impl Into<String>) -> ProofreadError {
        ProofreadError::CheckerUnavailable {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GrammarChecker for LanguageToolClient {
    async fn check(&self, text: &str) -> Result<Vec<GrammarMatch>, ProofreadError> {
        let start = Instant::now();
        info!(
            "Checking {} chars with LanguageTool ({}) at {}",
            text.chars().count(),
            self.language,
            self.endpoint
        );

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("text", text), ("language", self.language.as_str())])
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("HTTP {status}: {}", body.trim())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let matches = parse_matches(&body, text)
            .map_err(|e| self.unavailable(format!("malformed response: {e}")))?;

        debug!(
            "LanguageTool returned {} matches in {:?}",
            matches.len(),
            start.elapsed()
        );
        Ok(matches)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Deserialize)]
struct ApiMatch {
    #[serde(default)]
    message: String,
    offset: usize,
    length: usize,
    #[serde(default)]
    replacements: Vec<ApiReplacement>,
    rule: ApiRule,
}

#[derive(Deserialize)]
struct ApiReplacement {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct ApiRule {
    id: String,
}

/// Decode a LanguageTool `/v2/check` JSON body into matches over `text`.
///
/// Offsets are converted from UTF-16 units to `char` positions of `text`.
pub fn parse_matches(body: &str, text: &str) -> Result<Vec<GrammarMatch>, serde_json::Error> {
    let response: CheckResponse = serde_json::from_str(body)?;
    let index = Utf16Index::new(text);

    Ok(response
        .matches
        .into_iter()
        .map(|m| {
            let (offset, length) = index.to_char_span(m.offset, m.length);
            GrammarMatch {
                offset,
                length,
                rule_id: m.rule.id,
                message: m.message,
                replacements: m.replacements.into_iter().map(|r| r.value).collect(),
            }
        })
        .collect())
}

/// Maps UTF-16 code-unit offsets to `char` offsets.
///
/// `None` when every char is a single unit and the mapping is the identity.
struct Utf16Index {
    starts: Option<Vec<usize>>,
}

impl Utf16Index {
    fn new(text: &str) -> Self {
        if text.chars().all(|c| c.len_utf16() == 1) {
            return Self { starts: None };
        }
        let mut starts = Vec::with_capacity(text.len() + 1);
        let mut unit = 0;
        for c in text.chars() {
            starts.push(unit);
            unit += c.len_utf16();
        }
        starts.push(unit);
        Self {
            starts: Some(starts),
        }
    }

    /// A unit offset inside a surrogate pair rounds up to the next char.
    fn to_char(&self, unit: usize) -> usize {
        match &self.starts {
            None => unit,
            Some(starts) => match starts.binary_search(&unit) {
                Ok(i) | Err(i) => i,
            },
        }
    }

    fn to_char_span(&self, offset: usize, length: usize) -> (usize, usize) {
        let start = self.to_char(offset);
        let end = self.to_char(offset.saturating_add(length));
        (start, end.saturating_sub(start))
    }
}
