//! Deterministic service router.
//!
//! Lexicon matching over a normalized utterance, in fixed priority order:
//! correction, outline, section summary, report draft, none. Word-like cues
//! match on word boundaries; assignment phrases match as raw substrings.

use crate::section::SectionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Service requested by an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Correction,
    SectionSummary,
    Outline,
    ReportDraft,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service kind: {0}")]
pub struct ServiceParseError(pub String);

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Correction => "correction",
            ServiceKind::SectionSummary => "section_summary",
            ServiceKind::Outline => "outline",
            ServiceKind::ReportDraft => "report_draft",
            ServiceKind::None => "none",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ServiceParseError;

    /// Accepts the snake_case names and the upper-case labels classifiers
    /// tend to emit (`MAKE_CORRECTION`, `MAKE_REPORT_DRAFT`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correction" | "make_correction" => Ok(ServiceKind::Correction),
            "section_summary" => Ok(ServiceKind::SectionSummary),
            "outline" => Ok(ServiceKind::Outline),
            "report_draft" | "make_report_draft" => Ok(ServiceKind::ReportDraft),
            "none" | "" => Ok(ServiceKind::None),
            _ => Err(ServiceParseError(s.to_string())),
        }
    }
}

/// A `(service, section)` routing guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub service: ServiceKind,
    pub section: Option<SectionId>,
}

impl Route {
    pub const NONE: Route = Route {
        service: ServiceKind::None,
        section: None,
    };

    pub fn new(service: ServiceKind, section: Option<SectionId>) -> Self {
        Self { service, section }
    }

    pub fn is_none(&self) -> bool {
        self.service == ServiceKind::None
    }
}

// ============================================================================
// Lexicons
// ============================================================================

const CORRECTION_VERBS: &[&str] = &[
    "update", "fix", "adjust", "replace", "amend", "edit", "modify", "revise", "set", "switch",
    "change", "correct", "make", "alter", "add", "append", "insert", "remove", "delete",
];

/// Assignment-like phrases; matched as raw substrings of the padded text.
const ASSIGNERS: &[&str] = &[" to ", " = ", " should be ", " set to ", " replace ", " with "];

/// Explicit section mentions, checked in this order.
const SECTION_TOKENS: &[(SectionId, &[&str])] = &[
    (SectionId::TreeDescription, &["tree description", "treedescription", "tree_description"]),
    (SectionId::Risks, &["risk", "risks"]),
    (SectionId::Targets, &["target", "targets"]),
    (SectionId::AreaDescription, &["area description", "areadescription", "area_description"]),
    (SectionId::Recommendations, &["recommendation", "recommendations"]),
];

/// Field name to section hints. First match wins; order is significant.
const FIELD_HINTS: &[(&str, SectionId)] = &[
    ("species", SectionId::TreeDescription),
    ("scientific name", SectionId::TreeDescription),
    ("type_common", SectionId::TreeDescription),
    ("type scientific", SectionId::TreeDescription),
    ("type_scientific", SectionId::TreeDescription),
    ("height", SectionId::TreeDescription),
    ("dbh", SectionId::TreeDescription),
    ("dbh_in", SectionId::TreeDescription),
    ("diameter", SectionId::TreeDescription),
    ("crown shape", SectionId::TreeDescription),
    ("canopy", SectionId::TreeDescription),
    ("canopy width", SectionId::TreeDescription),
    ("site", SectionId::AreaDescription),
    ("site description", SectionId::AreaDescription),
    ("site use", SectionId::AreaDescription),
    ("context", SectionId::AreaDescription),
    ("foot traffic", SectionId::AreaDescription),
    ("risk", SectionId::Risks),
    ("risks", SectionId::Risks),
    ("likelihood", SectionId::Risks),
    ("severity", SectionId::Risks),
    ("rationale", SectionId::Risks),
    ("included bark", SectionId::Risks),
    ("deadwood", SectionId::Risks),
    ("target", SectionId::Targets),
    ("targets", SectionId::Targets),
    ("occupied frequency", SectionId::Targets),
    ("proximity", SectionId::Targets),
    ("strike potential", SectionId::Targets),
    ("label", SectionId::Targets),
    ("walkway", SectionId::Targets),
    ("parking lot", SectionId::Targets),
    ("playground", SectionId::Targets),
    ("driveway", SectionId::Targets),
    ("roof", SectionId::Targets),
    ("house", SectionId::Targets),
    ("building", SectionId::Targets),
    ("vehicles", SectionId::Targets),
    ("recommendation", SectionId::Recommendations),
    ("recommendations", SectionId::Recommendations),
    ("pruning", SectionId::Recommendations),
    ("removal", SectionId::Recommendations),
    ("continued maintenance", SectionId::Recommendations),
    ("work scope", SectionId::Recommendations),
    ("scope", SectionId::Recommendations),
    ("limitations", SectionId::Recommendations),
    ("notes", SectionId::Recommendations),
    ("treatment plan", SectionId::Recommendations),
];

const SECTION_SUMMARY_CUES: &[&str] = &[
    "section summary",
    "summary of the",
    "recap",
    "overview of",
    "synopsis of",
    "tldr of the",
    "tl;dr of the",
    "summarize the",
    "section overview",
    "describe the",
    "breakdown of",
    "condensed summary of",
    "brief summary of",
    "section overview requested",
    "summary of",
];

const OUTLINE_CUES: &[&str] = &[
    "outline",
    "report outline",
    "overall outline",
    "outline everything",
    "outline the report",
    "give me an outline",
    "outline please",
];

const REPORT_DRAFT_CUES: &[&str] = &[
    "draft a report",
    "report draft",
    "generate a report",
    "build a report",
    "produce the final report",
    "prepare my report",
    "draft this report",
    "generate the report",
    "preliminary report",
    "produce a report",
    "make the report",
    "assemble a report draft",
    "create the report draft",
    "start a report draft",
    "compile a report",
    "spin up a report draft",
    "initiate the report draft",
    "draft the report",
    "prepare a draft report",
    "put together a report",
    "create a report now",
    "draft write-up (report)",
    "get me a report draft",
    "start drafting the report",
    "write a report draft",
    "construct a report",
    "assemble a report",
];

const REPORT_CREATION_VERBS: &[&str] = &[
    "draft", "generate", "produce", "prepare", "build", "create", "compile", "write",
    "put together", "start",
];

// ============================================================================
// Matching
// ============================================================================

/// Trim, lowercase and collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `phrase` occurs in `text` with no word character touching
/// either end.
fn has_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, matched)| {
        let end = start + matched.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_word_char(c));
        before_ok && after_ok
    })
}

fn has_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| has_phrase(text, p))
}

/// Detect the section an utterance is about: explicit tokens first, then the
/// field hint table.
pub fn detect_section(normalized: &str) -> Option<SectionId> {
    SECTION_TOKENS
        .iter()
        .find(|(_, tokens)| has_any(normalized, tokens))
        .map(|(section, _)| *section)
        .or_else(|| {
            FIELD_HINTS
                .iter()
                .find(|(hint, _)| has_phrase(normalized, hint))
                .map(|(_, section)| *section)
        })
}

fn has_assigner(normalized: &str) -> bool {
    let padded = format!(" {} ", normalized);
    ASSIGNERS.iter().any(|a| padded.contains(a))
}

fn looks_like_correction(normalized: &str, section: Option<SectionId>) -> bool {
    has_any(normalized, CORRECTION_VERBS) && (section.is_some() || has_assigner(normalized))
}

fn looks_like_section_summary(normalized: &str) -> bool {
    if has_any(normalized, SECTION_SUMMARY_CUES) {
        return true;
    }
    (normalized.contains("tldr") || normalized.contains("tl;dr"))
        && has_phrase(normalized, "section")
}

fn looks_like_report_draft(normalized: &str) -> bool {
    has_any(normalized, REPORT_DRAFT_CUES)
        || (has_phrase(normalized, "report") && has_any(normalized, REPORT_CREATION_VERBS))
}

/// Classify an utterance into a service request.
pub fn classify(text: &str) -> Route {
    let normalized = normalize(text);
    let section = detect_section(&normalized);

    let route = if looks_like_correction(&normalized, section) {
        Route::new(ServiceKind::Correction, section)
    } else if has_any(&normalized, OUTLINE_CUES) {
        // An outline of one section is rendered as that section's summary.
        match section {
            Some(section) => Route::new(ServiceKind::SectionSummary, Some(section)),
            None => Route::new(ServiceKind::Outline, None),
        }
    } else if let (true, Some(section)) = (looks_like_section_summary(&normalized), section) {
        Route::new(ServiceKind::SectionSummary, Some(section))
    } else if looks_like_report_draft(&normalized) {
        Route::new(ServiceKind::ReportDraft, None)
    } else {
        Route::NONE
    };

    debug!(service = %route.service, section = ?route.section, "Deterministic route");
    route
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(service: ServiceKind, section: Option<SectionId>) -> Route {
        Route::new(service, section)
    }

    #[test]
    fn test_correction_with_field_hint() {
        assert_eq!(
            classify("set dbh to 30 inches"),
            route(ServiceKind::Correction, Some(SectionId::TreeDescription))
        );
    }

    #[test]
    fn test_correction_with_assigner_but_no_section() {
        assert_eq!(
            classify("change it to 40"),
            route(ServiceKind::Correction, None)
        );
    }

    #[test]
    fn test_casual_verb_without_second_signal() {
        assert_eq!(classify("make sense?"), Route::NONE);
    }

    #[test]
    fn test_verbs_match_whole_words() {
        // "address" must not read as "add", "offset" not as "set"
        assert_eq!(classify("the address offset"), Route::NONE);
    }

    #[test]
    fn test_outline_without_section() {
        assert_eq!(classify("outline"), route(ServiceKind::Outline, None));
        assert_eq!(classify("  Give me an OUTLINE  "), route(ServiceKind::Outline, None));
    }

    #[test]
    fn test_outline_with_section_is_summary() {
        assert_eq!(
            classify("outline the risks"),
            route(ServiceKind::SectionSummary, Some(SectionId::Risks))
        );
    }

    #[test]
    fn test_summary_words_do_not_trigger_outline() {
        assert_eq!(classify("overview of everything"), Route::NONE);
        assert_eq!(
            classify("recap the targets"),
            route(ServiceKind::SectionSummary, Some(SectionId::Targets))
        );
    }

    #[test]
    fn test_summary_requires_section() {
        assert_eq!(classify("summary of the day"), Route::NONE);
        assert_eq!(
            classify("summary of the tree description"),
            route(ServiceKind::SectionSummary, Some(SectionId::TreeDescription))
        );
    }

    #[test]
    fn test_tldr_section_rule() {
        assert_eq!(
            classify("TL;DR for recommendations section"),
            route(ServiceKind::SectionSummary, Some(SectionId::Recommendations))
        );
    }

    #[test]
    fn test_report_draft() {
        assert_eq!(classify("draft the report"), route(ServiceKind::ReportDraft, None));
        assert_eq!(
            classify("please write up the report now"),
            route(ServiceKind::ReportDraft, None)
        );
    }

    #[test]
    fn test_section_token_beats_field_hint() {
        // "height" hints tree, but the explicit "risks" token is checked first
        assert_eq!(
            detect_section("height related risks"),
            Some(SectionId::Risks)
        );
    }

    #[test]
    fn test_field_hint_order() {
        // "canopy" comes before "canopy width" and both map to tree
        assert_eq!(detect_section("canopy width"), Some(SectionId::TreeDescription));
        assert_eq!(detect_section("work scope"), Some(SectionId::Recommendations));
        assert_eq!(detect_section("nothing here"), None);
    }

    #[test]
    fn test_none() {
        assert_eq!(classify("the tree is healthy"), Route::NONE);
        assert_eq!(classify(""), Route::NONE);
    }

    #[test]
    fn test_service_kind_parse() {
        assert_eq!("MAKE_CORRECTION".parse::<ServiceKind>().unwrap(), ServiceKind::Correction);
        assert_eq!("outline".parse::<ServiceKind>().unwrap(), ServiceKind::Outline);
        assert!("QUICK_SUMMARY".parse::<ServiceKind>().is_err());
    }
}
