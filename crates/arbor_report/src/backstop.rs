//! Confidence gate for the probabilistic backstop classifier.

use crate::router::{Route, ServiceKind};
use crate::section::SectionId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Threshold used when none is configured.
pub const DEFAULT_BACKSTOP_THRESHOLD: f64 = 0.60;

/// A guess returned by the backstop classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackstopGuess {
    pub service: ServiceKind,
    pub section: Option<SectionId>,
    pub confidence: f64,
}

impl BackstopGuess {
    pub fn new(service: ServiceKind, section: Option<SectionId>, confidence: f64) -> Self {
        Self {
            service,
            section,
            confidence,
        }
    }

    /// Substitute used when the classifier is unreachable or errors.
    pub fn unavailable() -> Self {
        Self::new(ServiceKind::None, None, 0.0)
    }
}

/// Outcome of gating a guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Accept(Route),
    /// Ambiguous: ask the user. Section is always dropped.
    Clarify,
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept(_))
    }
}

/// Accept iff `confidence >= threshold` and the service is not `None`.
///
/// Non-finite confidences never pass.
pub fn gate(guess: &BackstopGuess, threshold: f64) -> GateDecision {
    let confidence = guess.confidence;
    let confident = confidence.is_finite() && confidence >= threshold;

    if guess.service != ServiceKind::None && confident {
        info!(
            service = %guess.service,
            section = ?guess.section,
            confidence,
            threshold,
            "Backstop accepted"
        );
        GateDecision::Accept(Route::new(guess.service, guess.section))
    } else {
        debug!(
            service = %guess.service,
            confidence,
            threshold,
            "Backstop below threshold; clarifying"
        );
        GateDecision::Clarify
    }
}
