//! The merge engine.
//!
//! [`merge`] applies one update envelope onto a report snapshot and returns the
//! next snapshot together with the next ledger. Inputs are never modified, so
//! callers can keep prior versions for undo or audit.
//!
//! Rules, applied per envelope path in order:
//!
//! - under [`MergePolicy::PreferExisting`], a provided value is never replaced
//!   by a not-provided one
//! - list fields always append; empty incoming lists are ignored
//! - scalars are written unconditionally; provided writes get a ledger row,
//!   and under [`MergePolicy::LastWrite`] that row supersedes earlier rows for
//!   the same `(section, path)`
//! - a merge that records no row records exactly one "Not Found" row

use crate::envelope::{UpdateEnvelope, UpdateValue};
use crate::fields::FieldMut;
use crate::provenance::{MergeMeta, ProvenanceLedger, Recorded};
use crate::sentinel::Scalar;
use crate::state::{ReportState, RiskItem, TargetItem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Scalar conflict policy. Lists always append regardless of policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep confirmed facts when the incoming value is not provided.
    #[default]
    PreferExisting,
    /// Explicit correction: the incoming value wins, even when blank.
    LastWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge policy: {0}")]
pub struct PolicyParseError(pub String);

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::PreferExisting => "prefer_existing",
            MergePolicy::LastWrite => "last_write",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefer_existing" => Ok(MergePolicy::PreferExisting),
            "last_write" => Ok(MergePolicy::LastWrite),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}

/// Whether the merge applied anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Applied,
    NoUsableUpdate,
}

/// Result of one merge transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub state: ReportState,
    pub ledger: ProvenanceLedger,
    pub status: MergeStatus,
    /// Paths that received a ledger row, in application order.
    pub applied_paths: Vec<&'static str>,
    /// Scalars blanked by a last-write correction. These change state but do
    /// not produce ledger rows.
    pub cleared_paths: Vec<&'static str>,
    /// Paths left alone to protect an existing value.
    pub protected_paths: Vec<&'static str>,
}

impl MergeOutcome {
    pub fn applied(&self) -> bool {
        self.status == MergeStatus::Applied
    }
}

/// Apply `envelope` to `state` under `policy`.
///
/// Never fails: an absent envelope is the "no usable update" outcome.
pub fn merge(
    state: &ReportState,
    ledger: &ProvenanceLedger,
    envelope: Option<&UpdateEnvelope>,
    policy: MergePolicy,
    meta: &MergeMeta,
) -> MergeOutcome {
    let mut next_state = state.clone();
    let mut next_ledger = ledger.clone();
    let mut outcome_paths = Vec::new();
    let mut cleared_paths = Vec::new();
    let mut protected_paths = Vec::new();

    let Some(envelope) = envelope else {
        debug!(section = %meta.section, "No envelope; recording Not Found");
        next_ledger.push(meta.row(Recorded::NotFound, Recorded::NotFound, policy));
        return MergeOutcome {
            state: next_state,
            ledger: next_ledger,
            status: MergeStatus::NoUsableUpdate,
            applied_paths: outcome_paths,
            cleared_paths,
            protected_paths,
        };
    };

    for (path, incoming) in envelope.entries() {
        let existing_provided = state
            .field(path)
            .is_some_and(|field| field.is_provided());

        if policy == MergePolicy::PreferExisting && existing_provided && !incoming.is_provided() {
            debug!(path, "Keeping existing value over not-provided update");
            protected_paths.push(*path);
            continue;
        }

        let Some(target) = next_state.field_mut(path) else {
            debug!(path, "Path missing from report schema; skipping");
            continue;
        };

        let rendered = match (target, incoming) {
            (FieldMut::Texts(list), UpdateValue::Texts(new)) => append(list, new, render_texts),
            (FieldMut::Targets(list), UpdateValue::Targets(new)) => {
                append(list, new, render_targets)
            }
            (FieldMut::Risks(list), UpdateValue::Risks(new)) => append(list, new, render_risks),
            (FieldMut::Scalar(slot), UpdateValue::Scalar(new)) => {
                *slot = new.clone();
                match new {
                    Scalar::Provided(value) => {
                        if policy == MergePolicy::LastWrite {
                            let removed = next_ledger.supersede(meta.section, path);
                            if removed > 0 {
                                debug!(path, removed, "Superseded earlier ledger rows");
                            }
                        }
                        Some(value.clone())
                    }
                    Scalar::NotProvided => {
                        if existing_provided {
                            cleared_paths.push(*path);
                        }
                        None
                    }
                }
            }
            (_, other) => {
                debug!(path, kind = ?other.kind(), "Update kind does not match field; skipping");
                None
            }
        };

        if let Some(value) = rendered {
            next_ledger.push(meta.row(Recorded::value(*path), Recorded::Value(value), policy));
            outcome_paths.push(*path);
        }
    }

    let status = if outcome_paths.is_empty() {
        next_ledger.push(meta.row(Recorded::NotFound, Recorded::NotFound, policy));
        MergeStatus::NoUsableUpdate
    } else {
        MergeStatus::Applied
    };

    debug!(
        section = %meta.section,
        %policy,
        applied = outcome_paths.len(),
        protected = protected_paths.len(),
        "Merge complete"
    );

    MergeOutcome {
        state: next_state,
        ledger: next_ledger,
        status,
        applied_paths: outcome_paths,
        cleared_paths,
        protected_paths,
    }
}

fn append<T: Clone>(list: &mut Vec<T>, new: &[T], render: fn(&[T]) -> String) -> Option<String> {
    if new.is_empty() {
        return None;
    }
    list.extend_from_slice(new);
    Some(render(new))
}

// ============================================================================
// Ledger rendering of appended lists
// ============================================================================

fn render_texts(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

fn render_targets(items: &[TargetItem]) -> String {
    let values: Vec<Value> = items
        .iter()
        .map(|t| {
            json!({
                "label": t.label.to_wire(),
                "damage_modes": t.damage_modes,
                "proximity_note": t.proximity_note.to_wire(),
                "occupied_frequency": t.occupied_frequency.to_wire(),
                "narratives": t.narratives,
            })
        })
        .collect();
    Value::Array(values).to_string()
}

fn render_risks(items: &[RiskItem]) -> String {
    let values: Vec<Value> = items
        .iter()
        .map(|r| {
            json!({
                "description": r.description.to_wire(),
                "likelihood": r.likelihood.to_wire(),
                "severity": r.severity.to_wire(),
                "rationale": r.rationale.to_wire(),
                "narratives": r.narratives,
            })
        })
        .collect();
    Value::Array(values).to_string()
}
