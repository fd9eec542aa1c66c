//! Canonical report state.
//!
//! Each section is a closed record of scalar, list and nested fields. Lists use
//! emptiness as their not-provided state; scalars use [`Scalar`].

use crate::fields::FIELDS;
use crate::section::SectionId;
use crate::sentinel::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Section records
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaDescription {
    pub context: Vec<String>,
    pub other_context_note: Vec<String>,
    pub site_use: Vec<String>,
    pub foot_traffic_level: Scalar,
    pub narratives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeDescription {
    pub type_common: Scalar,
    pub type_scientific: Scalar,
    pub height_ft: Scalar,
    pub canopy_width_ft: Scalar,
    pub crown_shape: Scalar,
    pub dbh_in: Scalar,
    pub trunk_notes: Vec<String>,
    pub roots: Vec<String>,
    pub defects: Vec<String>,
    pub general_observations: Vec<String>,
    pub health_overview: Vec<String>,
    pub pests_pathogens_observed: Vec<String>,
    pub physiological_stress_signs: Vec<String>,
    pub narratives: Vec<String>,
}

/// Something that could be struck if the tree or a part of it fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetItem {
    pub label: Scalar,
    pub damage_modes: Vec<String>,
    pub proximity_note: Scalar,
    pub occupied_frequency: Scalar,
    pub narratives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub items: Vec<TargetItem>,
    pub narratives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskItem {
    pub description: Scalar,
    pub likelihood: Scalar,
    pub severity: Scalar,
    pub rationale: Scalar,
    pub narratives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Risks {
    pub items: Vec<RiskItem>,
    pub narratives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationDetail {
    pub narrative: Scalar,
    pub scope: Scalar,
    pub limitations: Scalar,
    pub notes: Scalar,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendations {
    pub pruning: RecommendationDetail,
    pub removal: RecommendationDetail,
    pub continued_maintenance: RecommendationDetail,
    pub narratives: Vec<String>,
}

// ============================================================================
// Aggregate
// ============================================================================

/// The aggregate record of all sections.
///
/// Only the merge engine produces new versions of this value; superseded
/// versions are never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportState {
    pub area_description: AreaDescription,
    pub tree_description: TreeDescription,
    pub targets: Targets,
    pub risks: Risks,
    pub recommendations: Recommendations,
}

impl ReportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths that still have no value, grouped by section and sorted.
    ///
    /// Every section appears in the map, possibly with an empty list.
    pub fn whats_left(&self) -> BTreeMap<SectionId, Vec<&'static str>> {
        let mut left: BTreeMap<SectionId, Vec<&'static str>> =
            SectionId::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for spec in FIELDS {
            let provided = self
                .field(spec.path)
                .is_some_and(|field| field.is_provided());
            if !provided {
                left.entry(spec.section).or_default().push(spec.path);
            }
        }
        for paths in left.values_mut() {
            paths.sort_unstable();
        }
        left
    }

    /// Fraction of fields holding a value, in `[0, 1]`.
    pub fn completeness(&self) -> f64 {
        let filled = FIELDS
            .iter()
            .filter(|spec| self.field(spec.path).is_some_and(|f| f.is_provided()))
            .count();
        filled as f64 / FIELDS.len() as f64
    }
}
