//! Pre-pass filters applied to an envelope before it reaches the merge engine.
//!
//! Each step is independent and order-preserving; [`Prefilter`] runs a
//! configured sequence of them.

use crate::envelope::{UpdateEnvelope, UpdateValue};
use crate::fields::FieldRef;
use crate::sentinel::Scalar;
use crate::state::{ReportState, RiskItem, TargetItem};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Values that carry no information.
const NOISE: &[&str] = &["", "n/a", "na", "none", "none provided", "not provided"];

static FEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:feet|foot|ft\.?|')?\s*$"#).expect("valid regex")
});

static INCHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:inches|inch|in\.?|")?\s*$"#).expect("valid regex")
});

/// Numeric-as-string fields and their canonical unit suffix.
const UNIT_FIELDS: &[(&str, Unit)] = &[
    ("tree_description.height_ft", Unit::Feet),
    ("tree_description.canopy_width_ft", Unit::Feet),
    ("tree_description.dbh_in", Unit::Inches),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Feet,
    Inches,
}

/// Which steps to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefilterConfig {
    pub normalize_units: bool,
    pub drop_unchanged: bool,
    pub drop_not_provided: bool,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            normalize_units: true,
            drop_unchanged: true,
            drop_not_provided: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefilterStep {
    /// Turn noise strings into `NotProvided` and strip them from lists.
    NormalizeNoise,
    /// Canonicalize `"28 inches"` to `"28 in"` and `"60 feet"` to `"60 ft"`.
    NormalizeUnits,
    /// Remove scalars equal to the current value and list items already present.
    DropUnchanged,
    /// Remove `NotProvided` scalars and empty lists.
    DropNotProvided,
}

/// An ordered pipeline of filter steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefilter {
    steps: Vec<PrefilterStep>,
}

impl Default for Prefilter {
    fn default() -> Self {
        Self::from_config(&PrefilterConfig::default())
    }
}

impl Prefilter {
    /// A pipeline that passes envelopes through untouched.
    pub fn passthrough() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn from_config(config: &PrefilterConfig) -> Self {
        let mut prefilter = Self::passthrough().with_step(PrefilterStep::NormalizeNoise);
        if config.normalize_units {
            prefilter = prefilter.with_step(PrefilterStep::NormalizeUnits);
        }
        if config.drop_unchanged {
            prefilter = prefilter.with_step(PrefilterStep::DropUnchanged);
        }
        if config.drop_not_provided {
            prefilter = prefilter.with_step(PrefilterStep::DropNotProvided);
        }
        prefilter
    }

    pub fn with_step(mut self, step: PrefilterStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[PrefilterStep] {
        &self.steps
    }

    pub fn apply(&self, envelope: UpdateEnvelope, state: &ReportState) -> UpdateEnvelope {
        let before = envelope.len();
        let filtered = self
            .steps
            .iter()
            .fold(envelope, |env, step| apply_step(*step, env, state));
        if filtered.len() != before {
            debug!(before, after = filtered.len(), "Prefilter removed entries");
        }
        filtered
    }
}

pub fn apply_step(
    step: PrefilterStep,
    mut envelope: UpdateEnvelope,
    state: &ReportState,
) -> UpdateEnvelope {
    match step {
        PrefilterStep::NormalizeNoise => envelope.map_values(|_, value| denoise(value)),
        PrefilterStep::NormalizeUnits => envelope.map_values(|path, value| {
            match (unit_for(path), value) {
                (Some(unit), UpdateValue::Scalar(Scalar::Provided(raw))) => {
                    UpdateValue::Scalar(Scalar::Provided(normalize_unit(&raw, unit)))
                }
                (_, other) => other,
            }
        }),
        PrefilterStep::DropUnchanged => {
            envelope.map_values(|path, value| match (state.field(path), value) {
                (Some(FieldRef::Texts(existing)), UpdateValue::Texts(items)) => UpdateValue::Texts(
                    items.into_iter().filter(|i| !existing.contains(i)).collect(),
                ),
                (_, other) => other,
            });
            envelope.retain(|path, value| match (state.field(path), value) {
                (Some(FieldRef::Scalar(current)), UpdateValue::Scalar(incoming)) => {
                    current != incoming
                }
                (Some(FieldRef::Texts(_)), UpdateValue::Texts(items)) => !items.is_empty(),
                _ => true,
            });
        }
        PrefilterStep::DropNotProvided => envelope.retain(|_, value| value.is_provided()),
    }
    envelope
}

pub fn is_noise(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    NOISE.contains(&lowered.as_str())
}

fn denoise_scalar(value: Scalar) -> Scalar {
    match value {
        Scalar::Provided(v) if is_noise(&v) => Scalar::NotProvided,
        other => other,
    }
}

fn denoise_texts(items: Vec<String>) -> Vec<String> {
    items.into_iter().filter(|item| !is_noise(item)).collect()
}

fn denoise(value: UpdateValue) -> UpdateValue {
    match value {
        UpdateValue::Scalar(s) => UpdateValue::Scalar(denoise_scalar(s)),
        UpdateValue::Texts(items) => UpdateValue::Texts(denoise_texts(items)),
        UpdateValue::Targets(items) => UpdateValue::Targets(
            items
                .into_iter()
                .map(|t| TargetItem {
                    label: denoise_scalar(t.label),
                    damage_modes: denoise_texts(t.damage_modes),
                    proximity_note: denoise_scalar(t.proximity_note),
                    occupied_frequency: denoise_scalar(t.occupied_frequency),
                    narratives: denoise_texts(t.narratives),
                })
                .filter(|t| *t != TargetItem::default())
                .collect(),
        ),
        UpdateValue::Risks(items) => UpdateValue::Risks(
            items
                .into_iter()
                .map(|r| RiskItem {
                    description: denoise_scalar(r.description),
                    likelihood: denoise_scalar(r.likelihood),
                    severity: denoise_scalar(r.severity),
                    rationale: denoise_scalar(r.rationale),
                    narratives: denoise_texts(r.narratives),
                })
                .filter(|r| *r != RiskItem::default())
                .collect(),
        ),
    }
}

fn unit_for(path: &str) -> Option<Unit> {
    UNIT_FIELDS
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, unit)| *unit)
}

/// Canonicalize a bare measurement. Anything that is not a single number with
/// an optional unit is returned unchanged.
fn normalize_unit(raw: &str, unit: Unit) -> String {
    let (pattern, suffix) = match unit {
        Unit::Feet => (&*FEET, "ft"),
        Unit::Inches => (&*INCHES, "in"),
    };
    match pattern.captures(raw) {
        Some(caps) => format!("{} {}", &caps[1], suffix),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_becomes_not_provided() {
        let env = UpdateEnvelope::new()
            .with_scalar("tree_description.crown_shape", "N/A")
            .with_texts("tree_description.roots", ["none", "girdling root", "  "]);
        let out = apply_step(PrefilterStep::NormalizeNoise, env, &ReportState::new());
        assert_eq!(
            out.get("tree_description.crown_shape"),
            Some(&UpdateValue::Scalar(Scalar::NotProvided))
        );
        assert_eq!(
            out.get("tree_description.roots"),
            Some(&UpdateValue::Texts(vec!["girdling root".into()]))
        );
    }

    #[test]
    fn test_units_normalized() {
        assert_eq!(normalize_unit("28 inches", Unit::Inches), "28 in");
        assert_eq!(normalize_unit("28\"", Unit::Inches), "28 in");
        assert_eq!(normalize_unit("28in", Unit::Inches), "28 in");
        assert_eq!(normalize_unit("30", Unit::Inches), "30 in");
        assert_eq!(normalize_unit("60 feet", Unit::Feet), "60 ft");
        assert_eq!(normalize_unit("62.5'", Unit::Feet), "62.5 ft");
        assert_eq!(normalize_unit("about 60 feet", Unit::Feet), "about 60 feet");
    }

    #[test]
    fn test_units_only_touch_measurement_fields() {
        let env = UpdateEnvelope::new()
            .with_scalar("tree_description.dbh_in", "30 inches")
            .with_scalar("tree_description.crown_shape", "30 inches");
        let out = apply_step(PrefilterStep::NormalizeUnits, env, &ReportState::new());
        assert_eq!(
            out.get("tree_description.dbh_in"),
            Some(&UpdateValue::Scalar(Scalar::provided("30 in")))
        );
        assert_eq!(
            out.get("tree_description.crown_shape"),
            Some(&UpdateValue::Scalar(Scalar::provided("30 inches")))
        );
    }

    #[test]
    fn test_drop_unchanged() {
        let mut state = ReportState::new();
        state.tree_description.dbh_in = Scalar::provided("28 in");
        state.tree_description.defects.push("cavity".into());

        let env = UpdateEnvelope::new()
            .with_scalar("tree_description.dbh_in", "28 in")
            .with_scalar("tree_description.height_ft", "60 ft")
            .with_texts("tree_description.defects", ["cavity"]);
        let out = apply_step(PrefilterStep::DropUnchanged, env, &state);
        assert_eq!(out.len(), 1);
        assert!(out.get("tree_description.height_ft").is_some());
    }

    #[test]
    fn test_default_pipeline_keeps_only_real_changes() {
        let mut state = ReportState::new();
        state.tree_description.type_common = Scalar::provided("red oak");

        let env = UpdateEnvelope::new()
            .with_scalar("tree_description.type_common", "Not provided")
            .with_scalar("tree_description.type_scientific", "none")
            .with_scalar("tree_description.dbh_in", "30 inches");
        let out = Prefilter::default().apply(env, &state);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out.get("tree_description.dbh_in"),
            Some(&UpdateValue::Scalar(Scalar::provided("30 in")))
        );
    }

    #[test]
    fn test_passthrough_keeps_not_provided() {
        let env = UpdateEnvelope::new().with_scalar("tree_description.type_common", "Not provided");
        let out = Prefilter::passthrough().apply(env.clone(), &ReportState::new());
        assert_eq!(out, env);
    }

    #[test]
    fn test_config_selects_steps() {
        let config = PrefilterConfig {
            normalize_units: false,
            drop_unchanged: true,
            drop_not_provided: false,
        };
        assert_eq!(
            Prefilter::from_config(&config).steps(),
            &[PrefilterStep::NormalizeNoise, PrefilterStep::DropUnchanged]
        );
    }
}
