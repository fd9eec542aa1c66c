//! Provenance ledger: the audit trail of applied fields and no-op segments.

use crate::merge::MergePolicy;
use crate::section::SectionId;
use arbor_ids::TurnId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering of [`Recorded::NotFound`].
pub const NOT_FOUND: &str = "Not Found";

/// A ledger cell that is either a concrete value or the "Not Found" marker.
///
/// "Not Found" means the segment was processed and nothing applied. It is not
/// the same thing as a field being not provided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Recorded {
    Value(String),
    NotFound,
}

impl Recorded {
    pub fn value(v: impl Into<String>) -> Self {
        Recorded::Value(v.into())
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Recorded::Value(v) => Some(v),
            Recorded::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Recorded::NotFound)
    }
}

impl fmt::Display for Recorded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_deref().unwrap_or(NOT_FOUND))
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub turn_id: TurnId,
    pub section: SectionId,
    /// The scoped user text that was handed to the extractor.
    pub source_text: String,
    pub path: Recorded,
    pub applied_value: Recorded,
    pub timestamp: DateTime<Utc>,
    pub extractor_id: String,
    pub model_id: String,
    pub policy: MergePolicy,
}

impl ProvenanceEvent {
    pub fn is_not_found(&self) -> bool {
        self.path.is_not_found()
    }

    fn matches(&self, section: SectionId, path: &str) -> bool {
        self.section == section && self.path.as_deref() == Some(path)
    }
}

/// Metadata stamped onto every row a merge produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeMeta {
    pub turn_id: TurnId,
    pub section: SectionId,
    pub source_text: String,
    pub timestamp: DateTime<Utc>,
    pub extractor_id: String,
    pub model_id: String,
}

impl MergeMeta {
    pub fn new(turn_id: TurnId, section: SectionId) -> Self {
        Self {
            turn_id,
            section,
            source_text: String::new(),
            timestamp: Utc::now(),
            extractor_id: "unknown".to_string(),
            model_id: "unspecified".to_string(),
        }
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = text.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_extractor(mut self, extractor_id: impl Into<String>) -> Self {
        self.extractor_id = extractor_id.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub(crate) fn row(
        &self,
        path: Recorded,
        value: Recorded,
        policy: MergePolicy,
    ) -> ProvenanceEvent {
        ProvenanceEvent {
            turn_id: self.turn_id.clone(),
            section: self.section,
            source_text: self.source_text.clone(),
            path,
            applied_value: value,
            timestamp: self.timestamp,
            extractor_id: self.extractor_id.clone(),
            model_id: self.model_id.clone(),
            policy,
        }
    }
}

/// Append-ordered sequence of provenance rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceLedger {
    rows: Vec<ProvenanceEvent>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ProvenanceEvent] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows recorded for a concrete `(section, path)` pair.
    pub fn rows_for<'a>(
        &'a self,
        section: SectionId,
        path: &'a str,
    ) -> impl Iterator<Item = &'a ProvenanceEvent> + 'a {
        self.rows.iter().filter(move |row| row.matches(section, path))
    }

    /// Rows appended for one turn.
    pub fn rows_for_turn<'a>(
        &'a self,
        turn_id: &'a TurnId,
    ) -> impl Iterator<Item = &'a ProvenanceEvent> + 'a {
        self.rows.iter().filter(move |row| &row.turn_id == turn_id)
    }

    pub fn not_found_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_not_found()).count()
    }

    pub(crate) fn push(&mut self, row: ProvenanceEvent) {
        self.rows.push(row);
    }

    /// Remove prior rows for `(section, path)`. Returns how many were removed.
    pub(crate) fn supersede(&mut self, section: SectionId, path: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !row.matches(section, path));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MergeMeta {
        MergeMeta::new(TurnId::new(), SectionId::TreeDescription)
            .with_source_text("DBH 28 in")
            .with_extractor("tree_extractor")
            .with_model("test-model")
    }

    #[test]
    fn test_recorded_display() {
        assert_eq!(Recorded::NotFound.to_string(), "Not Found");
        assert_eq!(Recorded::value("28 in").to_string(), "28 in");
    }

    #[test]
    fn test_recorded_value_named_not_found_is_distinct() {
        assert_ne!(Recorded::value(NOT_FOUND), Recorded::NotFound);
    }

    #[test]
    fn test_supersede_only_matching_pair() {
        let m = meta();
        let mut ledger = ProvenanceLedger::new();
        ledger.push(m.row(
            Recorded::value("tree_description.dbh_in"),
            Recorded::value("24 in"),
            MergePolicy::LastWrite,
        ));
        ledger.push(m.row(
            Recorded::value("tree_description.height_ft"),
            Recorded::value("60 ft"),
            MergePolicy::LastWrite,
        ));
        ledger.push(m.row(Recorded::NotFound, Recorded::NotFound, MergePolicy::LastWrite));

        assert_eq!(ledger.supersede(SectionId::TreeDescription, "tree_description.dbh_in"), 1);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.supersede(SectionId::Risks, "tree_description.height_ft"), 0);
        assert_eq!(ledger.not_found_count(), 1);
    }

    #[test]
    fn test_ledger_json_is_a_plain_array() {
        let m = meta();
        let mut ledger = ProvenanceLedger::new();
        ledger.push(m.row(Recorded::NotFound, Recorded::NotFound, MergePolicy::PreferExisting));
        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["path"]["state"], "not_found");
        assert_eq!(json[0]["policy"], "prefer_existing");

        let back: ProvenanceLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back, ledger);
    }
}
