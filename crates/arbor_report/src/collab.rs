//! Collaborator boundaries.
//!
//! Extraction and backstop classification happen outside this crate. The
//! coordinator receives them as trait objects and never looks them up
//! globally.

use crate::backstop::BackstopGuess;
use crate::section::SectionId;
use crate::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the extractor should read the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// New facts for the section.
    Statement,
    /// A correction of facts already in the section.
    Correction,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Statement => "statement",
            ExtractionMode::Correction => "correction",
        }
    }
}

/// Input to one extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRequest<'a> {
    pub section: SectionId,
    pub text: &'a str,
    pub mode: ExtractionMode,
}

/// Raw extractor output. The payload is parsed and filtered by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub usage: TokenUsage,
    pub extractor_id: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl Extraction {
    pub fn new(extractor_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            payload,
            usage: TokenUsage::default(),
            extractor_id: extractor_id.into(),
            model_id: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// Turns section-scoped text into a proposed update.
///
/// `None` means the extractor produced nothing usable; there is no error
/// channel because every failure degrades to the same outcome.
pub trait Extractor {
    fn extract(&self, request: ExtractionRequest<'_>) -> Option<Extraction>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator returned malformed output: {0}")]
    Malformed(String),
}

/// Backstop classifier output with its token usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub guess: BackstopGuess,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Probabilistic service classifier consulted when the deterministic router
/// finds nothing.
pub trait BackstopClassifier {
    fn classify(&self, utterance: &str) -> Result<Classification, CollaboratorError>;
}

/// Extractor that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExtractor;

impl Extractor for NullExtractor {
    fn extract(&self, _request: ExtractionRequest<'_>) -> Option<Extraction> {
        None
    }
}

/// Classifier that is never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClassifier;

impl BackstopClassifier for OfflineClassifier {
    fn classify(&self, _utterance: &str) -> Result<Classification, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no backstop classifier configured".into()))
    }
}
