//! Closed path table over the report schema.
//!
//! One macro invocation lists every leaf field once. It generates the static
//! [`FIELDS`] table together with the read and write accessors, so a path can
//! never exist in one representation and be missing from another.

use crate::section::SectionId;
use crate::sentinel::Scalar;
use crate::state::{ReportState, RiskItem, TargetItem};
use serde::Serialize;

/// Shape of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    Texts,
    Targets,
    Risks,
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        !matches!(self, FieldKind::Scalar)
    }
}

/// One addressable leaf of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub section: SectionId,
    /// Full dotted path, starting with the section name.
    pub path: &'static str,
    pub kind: FieldKind,
}

/// Read access to one leaf.
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Scalar(&'a Scalar),
    Texts(&'a [String]),
    Targets(&'a [TargetItem]),
    Risks(&'a [RiskItem]),
}

impl FieldRef<'_> {
    pub fn is_provided(&self) -> bool {
        match self {
            FieldRef::Scalar(s) => s.is_provided(),
            FieldRef::Texts(v) => !v.is_empty(),
            FieldRef::Targets(v) => !v.is_empty(),
            FieldRef::Risks(v) => !v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldRef::Scalar(s) => usize::from(s.is_provided()),
            FieldRef::Texts(v) => v.len(),
            FieldRef::Targets(v) => v.len(),
            FieldRef::Risks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access to one leaf.
#[derive(Debug)]
pub enum FieldMut<'a> {
    Scalar(&'a mut Scalar),
    Texts(&'a mut Vec<String>),
    Targets(&'a mut Vec<TargetItem>),
    Risks(&'a mut Vec<RiskItem>),
}

macro_rules! field_table {
    ($( $section:ident, $path:literal, $kind:ident => $($access:ident).+ ;)*) => {
        /// Every leaf field in report order.
        pub static FIELDS: &[FieldSpec] = &[
            $( FieldSpec { section: SectionId::$section, path: $path, kind: FieldKind::$kind }, )*
        ];

        impl ReportState {
            /// Read the leaf at a full dotted path.
            pub fn field(&self, path: &str) -> Option<FieldRef<'_>> {
                match path {
                    $( $path => Some(FieldRef::$kind(&self.$($access).+)), )*
                    _ => None,
                }
            }

            /// Write access to the leaf at a full dotted path.
            pub fn field_mut(&mut self, path: &str) -> Option<FieldMut<'_>> {
                match path {
                    $( $path => Some(FieldMut::$kind(&mut self.$($access).+)), )*
                    _ => None,
                }
            }
        }
    };
}

field_table! {
    AreaDescription, "area_description.context", Texts => area_description.context;
    AreaDescription, "area_description.other_context_note", Texts => area_description.other_context_note;
    AreaDescription, "area_description.site_use", Texts => area_description.site_use;
    AreaDescription, "area_description.foot_traffic_level", Scalar => area_description.foot_traffic_level;
    AreaDescription, "area_description.narratives", Texts => area_description.narratives;

    TreeDescription, "tree_description.type_common", Scalar => tree_description.type_common;
    TreeDescription, "tree_description.type_scientific", Scalar => tree_description.type_scientific;
    TreeDescription, "tree_description.height_ft", Scalar => tree_description.height_ft;
    TreeDescription, "tree_description.canopy_width_ft", Scalar => tree_description.canopy_width_ft;
    TreeDescription, "tree_description.crown_shape", Scalar => tree_description.crown_shape;
    TreeDescription, "tree_description.dbh_in", Scalar => tree_description.dbh_in;
    TreeDescription, "tree_description.trunk_notes", Texts => tree_description.trunk_notes;
    TreeDescription, "tree_description.roots", Texts => tree_description.roots;
    TreeDescription, "tree_description.defects", Texts => tree_description.defects;
    TreeDescription, "tree_description.general_observations", Texts => tree_description.general_observations;
    TreeDescription, "tree_description.health_overview", Texts => tree_description.health_overview;
    TreeDescription, "tree_description.pests_pathogens_observed", Texts => tree_description.pests_pathogens_observed;
    TreeDescription, "tree_description.physiological_stress_signs", Texts => tree_description.physiological_stress_signs;
    TreeDescription, "tree_description.narratives", Texts => tree_description.narratives;

    Targets, "targets.items", Targets => targets.items;
    Targets, "targets.narratives", Texts => targets.narratives;

    Risks, "risks.items", Risks => risks.items;
    Risks, "risks.narratives", Texts => risks.narratives;

    Recommendations, "recommendations.pruning.narrative", Scalar => recommendations.pruning.narrative;
    Recommendations, "recommendations.pruning.scope", Scalar => recommendations.pruning.scope;
    Recommendations, "recommendations.pruning.limitations", Scalar => recommendations.pruning.limitations;
    Recommendations, "recommendations.pruning.notes", Scalar => recommendations.pruning.notes;
    Recommendations, "recommendations.removal.narrative", Scalar => recommendations.removal.narrative;
    Recommendations, "recommendations.removal.scope", Scalar => recommendations.removal.scope;
    Recommendations, "recommendations.removal.limitations", Scalar => recommendations.removal.limitations;
    Recommendations, "recommendations.removal.notes", Scalar => recommendations.removal.notes;
    Recommendations, "recommendations.continued_maintenance.narrative", Scalar => recommendations.continued_maintenance.narrative;
    Recommendations, "recommendations.continued_maintenance.scope", Scalar => recommendations.continued_maintenance.scope;
    Recommendations, "recommendations.continued_maintenance.limitations", Scalar => recommendations.continued_maintenance.limitations;
    Recommendations, "recommendations.continued_maintenance.notes", Scalar => recommendations.continued_maintenance.notes;
    Recommendations, "recommendations.narratives", Texts => recommendations.narratives;
}

/// Look up the spec for a full dotted path.
pub fn spec_for(path: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.path == path)
}

/// True when `prefix` names an interior node (a section or nested record).
pub fn is_interior(prefix: &str) -> bool {
    FIELDS.iter().any(|spec| {
        spec.path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Fields belonging to one section, in report order.
pub fn fields_in(section: SectionId) -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(move |spec| spec.section == section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_paths_unique_and_prefixed_by_section() {
        let mut seen = HashSet::new();
        for spec in FIELDS {
            assert!(seen.insert(spec.path), "duplicate path {}", spec.path);
            let root = spec.path.split('.').next().unwrap();
            assert_eq!(root, spec.section.as_str());
        }
    }

    #[test]
    fn test_every_path_readable_and_writable() {
        let mut state = ReportState::new();
        for spec in FIELDS {
            let kind = match state.field(spec.path).unwrap() {
                FieldRef::Scalar(_) => FieldKind::Scalar,
                FieldRef::Texts(_) => FieldKind::Texts,
                FieldRef::Targets(_) => FieldKind::Targets,
                FieldRef::Risks(_) => FieldKind::Risks,
            };
            assert_eq!(kind, spec.kind, "{}", spec.path);
            assert!(state.field_mut(spec.path).is_some());
        }
    }

    #[test]
    fn test_field_mut_writes_through() {
        let mut state = ReportState::new();
        if let Some(FieldMut::Scalar(s)) = state.field_mut("recommendations.removal.scope") {
            *s = Scalar::provided("whole tree");
        }
        assert_eq!(
            state.recommendations.removal.scope,
            Scalar::provided("whole tree")
        );
    }

    #[test]
    fn test_interior_nodes() {
        assert!(is_interior("tree_description"));
        assert!(is_interior("recommendations.pruning"));
        assert!(!is_interior("tree_description.dbh_in"));
        assert!(!is_interior("customer_info"));
        assert!(!is_interior("tree"));
    }

    #[test]
    fn test_unknown_path() {
        assert!(ReportState::new().field("tree_description.colour").is_none());
        assert!(spec_for("customer_info.name").is_none());
    }

    #[test]
    fn test_fields_in_section() {
        assert_eq!(fields_in(SectionId::Targets).count(), 2);
        assert_eq!(fields_in(SectionId::TreeDescription).count(), 14);
    }
}
