//! Replay scripts and the scripted collaborators that serve them.
//!
//! A script is JSON:
//!
//! ```json
//! {
//!   "context": { "job_id": "J-1", ... },
//!   "turns": [
//!     {
//!       "utterance": "tree description: DBH 28 inches",
//!       "intent": "provide_statement",
//!       "extractions": [
//!         {"section": "tree_description", "payload": {"dbh_in": "28 inches"}}
//!       ]
//!     },
//!     {
//!       "utterance": "can you wrap this up",
//!       "intent": "request_service",
//!       "backstop": {"guess": {"service": "report_draft", "section": null, "confidence": 0.8}}
//!     }
//!   ]
//! }
//! ```
//!
//! Each extraction is consumed by the first request it matches. `section` and
//! `text` narrow the match when present; a missing or null `payload` makes the
//! extractor come back empty.

use anyhow::Context;
use arbor_report::{
    BackstopClassifier, BackstopGuess, Classification, CollaboratorError, Extraction,
    ExtractionMode, ExtractionRequest, Extractor, ReportContext, SectionId, TokenUsage,
    TurnIntent,
};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    #[serde(default)]
    pub context: ReportContext,
    pub turns: Vec<ScriptedTurn>,
}

impl ReplayScript {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Replay script is not valid")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedTurn {
    pub utterance: String,
    pub intent: TurnIntent,
    #[serde(default)]
    pub extractions: Vec<ScriptedExtraction>,
    #[serde(default)]
    pub backstop: Option<ScriptedBackstop>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedExtraction {
    #[serde(default)]
    pub section: Option<SectionId>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mode: Option<ExtractionMode>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default = "default_extractor_id")]
    pub extractor_id: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

fn default_extractor_id() -> String {
    "scripted".to_string()
}

impl ScriptedExtraction {
    fn matches(&self, request: &ExtractionRequest<'_>) -> bool {
        self.section.map_or(true, |s| s == request.section)
            && self.mode.map_or(true, |m| m == request.mode)
            && self
                .text
                .as_deref()
                .map_or(true, |t| t.trim() == request.text.trim())
    }

    fn to_extraction(&self) -> Option<Extraction> {
        let payload = self.payload.clone().filter(|p| !p.is_null())?;
        let extraction = Extraction::new(self.extractor_id.clone(), payload).with_usage(self.usage);
        Some(match &self.model_id {
            Some(model) => extraction.with_model(model.clone()),
            None => extraction,
        })
    }
}

/// Canned backstop outcome: a guess, or an error message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedBackstop {
    #[serde(default)]
    pub guess: Option<BackstopGuess>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ScriptedBackstop {
    fn to_result(&self) -> Result<Classification, CollaboratorError> {
        if let Some(message) = &self.error {
            return Err(CollaboratorError::Unavailable(message.clone()));
        }
        match self.guess {
            Some(guess) => Ok(Classification {
                guess,
                usage: self.usage,
            }),
            None => Err(CollaboratorError::Malformed(
                "scripted backstop has neither guess nor error".to_string(),
            )),
        }
    }
}

/// Extractor answering from the current turn's scripted extractions.
#[derive(Debug, Default)]
pub struct ScriptExtractor {
    pending: RefCell<Vec<ScriptedExtraction>>,
}

impl ScriptExtractor {
    /// Replace the pending extractions with those of the next turn.
    pub fn load(&self, extractions: &[ScriptedExtraction]) {
        *self.pending.borrow_mut() = extractions.to_vec();
    }

    /// Scripted extractions no request consumed.
    pub fn unused(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Extractor for ScriptExtractor {
    fn extract(&self, request: ExtractionRequest<'_>) -> Option<Extraction> {
        let mut pending = self.pending.borrow_mut();
        let idx = pending.iter().position(|e| e.matches(&request))?;
        let scripted = pending.remove(idx);
        debug!(
            section = %request.section,
            mode = request.mode.as_str(),
            extractor = %scripted.extractor_id,
            "Serving scripted extraction"
        );
        scripted.to_extraction()
    }
}

/// Backstop classifier answering from the current turn's script entry.
#[derive(Debug, Default)]
pub struct ScriptClassifier {
    pending: RefCell<Option<ScriptedBackstop>>,
}

impl ScriptClassifier {
    pub fn load(&self, backstop: Option<ScriptedBackstop>) {
        *self.pending.borrow_mut() = backstop;
    }
}

impl BackstopClassifier for ScriptClassifier {
    fn classify(&self, _utterance: &str) -> Result<Classification, CollaboratorError> {
        match self.pending.borrow_mut().take() {
            Some(scripted) => scripted.to_result(),
            None => Err(CollaboratorError::Unavailable(
                "no backstop scripted for this turn".to_string(),
            )),
        }
    }
}
