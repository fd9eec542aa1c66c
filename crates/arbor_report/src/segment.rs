//! Splitting an utterance into section-scoped segments.
//!
//! Two marker forms are recognized, case-insensitively:
//!
//! - `<label>:` such as `tree description: DBH 28 in`
//! - `<in|for|under|to> <label>` such as `note a cavity in risks`, unless the
//!   label is itself followed by a colon (so the unit in `30 in targets:`
//!   is not mistaken for a scope)
//!
//! Each marker owns the text up to the next marker. Text before the first
//! marker belongs to the cursor section unless it is boilerplate.

use crate::section::SectionId;
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

static SCOPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(area description|tree description|targets|risks|recommendations)\s*:\s*|\b(?:in|for|under|to)\s+(area description|tree description|targets|risks|recommendations)\b\s*",
    )
    .expect("valid regex")
});

static COLON_AHEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:").expect("valid regex"));

/// Lead-ins that carry no information on their own.
const BOILERPLATE_LEAD_INS: &[&str] = &[
    "please",
    "please note",
    "please note that",
    "note",
    "update",
    "adjust",
    "set",
    "change",
    "edit",
    "modify",
];

/// One `(section, payload)` unit of an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub section: SectionId,
    pub payload: String,
}

impl Segment {
    pub fn new(section: SectionId, payload: impl Into<String>) -> Self {
        Self {
            section,
            payload: payload.into(),
        }
    }

    /// Moves the cursor without supplying anything to extract.
    pub fn is_navigation_only(&self) -> bool {
        self.payload.trim().is_empty()
    }
}

/// A scope marker located in the utterance (byte offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeMarker {
    pub start: usize,
    pub end: usize,
    pub section: SectionId,
}

/// Locate every scope marker, left to right, without overlaps.
pub fn find_scopes(text: &str) -> Vec<ScopeMarker> {
    let mut scopes = Vec::new();
    let mut pos = 0;
    while pos <= text.len() {
        let Some(caps) = SCOPE.captures_at(text, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        match accept_marker(text, &caps) {
            Some(section) => {
                scopes.push(ScopeMarker {
                    start: whole.start(),
                    end: whole.end(),
                    section,
                });
                pos = whole.end();
            }
            None => {
                // Rejected prepositional form; resume one character later.
                pos = next_char_boundary(text, whole.start());
            }
        }
    }
    scopes
}

fn accept_marker(text: &str, caps: &Captures<'_>) -> Option<SectionId> {
    if let Some(label) = caps.get(1) {
        return SectionId::from_label(label.as_str());
    }
    let label = caps.get(2)?;
    if COLON_AHEAD.is_match(&text[label.end()..]) {
        return None;
    }
    SectionId::from_label(label.as_str())
}

fn next_char_boundary(text: &str, from: usize) -> usize {
    text[from..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| from + c.len_utf8())
}

/// True when a lead-in is bare boilerplate ("please", "update", ...).
pub fn is_throwaway_lead_in(text: &str) -> bool {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    BOILERPLATE_LEAD_INS.contains(&normalized.as_str())
}

/// Split `utterance` into ordered segments.
///
/// Returns an empty list when the utterance has no explicit scope; the caller
/// decides how to fall back (see [`segment_or_cursor`]).
pub fn segment(utterance: &str, current_section: SectionId) -> Vec<Segment> {
    let scopes = find_scopes(utterance);
    let Some(first) = scopes.first() else {
        return Vec::new();
    };

    let mut segments = Vec::with_capacity(scopes.len() + 1);

    if first.start > 0 {
        let lead = utterance[..first.start]
            .trim()
            .trim_end_matches([' ', ';', ',']);
        if !lead.is_empty() && !is_throwaway_lead_in(lead) {
            segments.push(Segment::new(current_section, lead));
        }
    }

    for (idx, scope) in scopes.iter().enumerate() {
        let next_start = scopes
            .get(idx + 1)
            .map_or(utterance.len(), |next| next.start);
        let payload = utterance[scope.end..next_start].trim();
        segments.push(Segment::new(scope.section, payload));
    }

    debug!(
        cursor = %current_section,
        count = segments.len(),
        "Segmented utterance"
    );
    segments
}

/// [`segment`], falling back to a single cursor segment holding the whole
/// utterance when no scope is present.
pub fn segment_or_cursor(utterance: &str, current_section: SectionId) -> Vec<Segment> {
    let segments = segment(utterance, current_section);
    if segments.is_empty() {
        vec![Segment::new(current_section, utterance.trim())]
    } else {
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(segments: &[Segment]) -> Vec<(&'static str, &str)> {
        segments
            .iter()
            .map(|s| (s.section.as_str(), s.payload.as_str()))
            .collect()
    }

    #[test]
    fn test_single_colon_scope() {
        let out = segment("tree description: DBH 28 in", SectionId::AreaDescription);
        assert_eq!(pairs(&out), vec![("tree_description", "DBH 28 in")]);
    }

    #[test]
    fn test_colon_scope_keeps_trailing_separators() {
        let out = segment("tree description: DBH 28 in; height 60 ft;", SectionId::Risks);
        assert_eq!(pairs(&out), vec![("tree_description", "DBH 28 in; height 60 ft;")]);
    }

    #[test]
    fn test_navigation_only_scope() {
        let out = segment(
            "area description:\n\ntree description: DBH 24 in",
            SectionId::AreaDescription,
        );
        assert_eq!(
            pairs(&out),
            vec![("area_description", ""), ("tree_description", "DBH 24 in")]
        );
        assert!(out[0].is_navigation_only());
        assert!(!out[1].is_navigation_only());
    }

    #[test]
    fn test_whitespace_only_scopes() {
        let out = segment(
            " \n  targets:   \n\n   risks: severity high  ",
            SectionId::TreeDescription,
        );
        assert_eq!(pairs(&out), vec![("targets", ""), ("risks", "severity high")]);
    }

    #[test]
    fn test_multiline_payload_trimmed() {
        let out = segment(
            concat!(
                "risks:\n  limb over driveway\n  included bark at union\n\n",
                "recommendations: reduce end weight\n",
            ),
            SectionId::AreaDescription,
        );
        assert_eq!(
            pairs(&out),
            vec![
                ("risks", "limb over driveway\n  included bark at union"),
                ("recommendations", "reduce end weight"),
            ]
        );
    }

    #[test]
    fn test_no_scope_returns_empty() {
        assert!(segment("DBH is 28 inches", SectionId::TreeDescription).is_empty());
        assert!(segment("", SectionId::TreeDescription).is_empty());
    }

    #[test]
    fn test_cursor_fallback() {
        let out = segment_or_cursor("  DBH is 28 inches ", SectionId::TreeDescription);
        assert_eq!(pairs(&out), vec![("tree_description", "DBH is 28 inches")]);
    }

    #[test]
    fn test_lead_in_attached_to_cursor() {
        let out = segment(
            "crown is asymmetric; tree description: DBH 28 in",
            SectionId::AreaDescription,
        );
        assert_eq!(
            pairs(&out),
            vec![
                ("area_description", "crown is asymmetric"),
                ("tree_description", "DBH 28 in"),
            ]
        );
    }

    #[test]
    fn test_boilerplate_lead_in_dropped() {
        let out = segment("Please note, risks: deadwood over path", SectionId::TreeDescription);
        assert_eq!(pairs(&out), vec![("risks", "deadwood over path")]);

        let out = segment("update  targets: playground", SectionId::TreeDescription);
        assert_eq!(pairs(&out), vec![("targets", "playground")]);
    }

    #[test]
    fn test_prepositional_scope() {
        let out = segment("add a cavity note in risks", SectionId::TreeDescription);
        assert_eq!(
            pairs(&out),
            vec![("tree_description", "add a cavity note"), ("risks", "")]
        );
    }

    #[test]
    fn test_unit_in_before_colon_scope_not_a_scope() {
        let out = segment(
            "tree description: DBH 30 in targets: driveway",
            SectionId::AreaDescription,
        );
        assert_eq!(
            pairs(&out),
            vec![("tree_description", "DBH 30 in"), ("targets", "driveway")]
        );
    }

    #[test]
    fn test_case_insensitive_labels() {
        let out = segment("TREE DESCRIPTION: height 60 ft", SectionId::Risks);
        assert_eq!(pairs(&out), vec![("tree_description", "height 60 ft")]);
    }

    #[test]
    fn test_deterministic() {
        let text = "note: for targets the walkway; risks: high";
        assert_eq!(
            segment(text, SectionId::AreaDescription),
            segment(text, SectionId::AreaDescription)
        );
    }

    #[test]
    fn test_non_ascii_text_is_safe() {
        let out = segment("été in risks — écorce incluse", SectionId::TreeDescription);
        assert_eq!(out.last().map(|s| s.section), Some(SectionId::Risks));
    }
}
