//! Typed update envelopes parsed from collaborator JSON.
//!
//! Extraction output is untrusted. Parsing never fails: anything that does not
//! line up with the report schema is dropped and recorded in
//! [`UpdateEnvelope::dropped`], and an input with no usable root object yields
//! `None`.

use crate::fields::{is_interior, spec_for, FieldKind, FIELDS};
use crate::section::SectionId;
use crate::sentinel::Scalar;
use crate::state::{RiskItem, TargetItem};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Roots owned by the job context. Never merged.
pub const CONTEXT_ROOTS: &[&str] = &["arborist_info", "customer_info", "location", "job_id"];

/// One proposed leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UpdateValue {
    Scalar(Scalar),
    Texts(Vec<String>),
    Targets(Vec<TargetItem>),
    Risks(Vec<RiskItem>),
}

impl UpdateValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            UpdateValue::Scalar(_) => FieldKind::Scalar,
            UpdateValue::Texts(_) => FieldKind::Texts,
            UpdateValue::Targets(_) => FieldKind::Targets,
            UpdateValue::Risks(_) => FieldKind::Risks,
        }
    }

    /// Scalar `Provided` or a non-empty list.
    pub fn is_provided(&self) -> bool {
        match self {
            UpdateValue::Scalar(s) => s.is_provided(),
            UpdateValue::Texts(v) => !v.is_empty(),
            UpdateValue::Targets(v) => !v.is_empty(),
            UpdateValue::Risks(v) => !v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UnknownKey,
    ContextField,
    KindMismatch,
    /// A valid path outside the section being processed.
    OutOfScope,
}

/// A key removed while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedKey {
    pub path: String,
    pub reason: DropReason,
}

/// A partial mirror of the report: proposed values keyed by full dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateEnvelope {
    entries: Vec<(&'static str, UpdateValue)>,
    dropped: Vec<DroppedKey>,
}

impl UpdateEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value. Paths outside the schema or with the wrong
    /// shape are recorded as dropped.
    pub fn with(mut self, path: &str, value: UpdateValue) -> Self {
        match spec_for(path) {
            Some(spec) if spec.kind == value.kind() => {
                self.entries.retain(|(p, _)| *p != spec.path);
                self.entries.push((spec.path, value));
            }
            Some(_) => self.drop_key(path.to_string(), DropReason::KindMismatch),
            None => self.drop_key(path.to_string(), classify_unknown(path)),
        }
        self
    }

    pub fn with_scalar(self, path: &str, value: impl Into<String>) -> Self {
        self.with(path, UpdateValue::Scalar(Scalar::from_wire(&value.into())))
    }

    pub fn with_texts<I, S>(self, path: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(
            path,
            UpdateValue::Texts(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Parse a collaborator payload.
    ///
    /// Accepts either `{"updates": {...}}` or the bare root mapping of section
    /// names to section bodies. Returns `None` when there is no usable root
    /// object.
    pub fn from_json(value: &Value) -> Option<UpdateEnvelope> {
        let root = unwrap_root(value)?;
        let mut envelope = UpdateEnvelope::new();
        envelope.walk("", root);
        envelope.sort_by_schema();
        Some(envelope)
    }

    /// Parse a payload produced for one section.
    ///
    /// Like [`from_json`](Self::from_json), but a root that names no section at
    /// all is treated as the body of `section`.
    pub fn from_json_scoped(value: &Value, section: SectionId) -> Option<UpdateEnvelope> {
        let root = unwrap_root(value)?;
        let names_a_section = root
            .keys()
            .any(|k| k.parse::<SectionId>().is_ok() || CONTEXT_ROOTS.contains(&k.as_str()));
        let mut envelope = UpdateEnvelope::new();
        if names_a_section {
            envelope.walk("", root);
        } else {
            envelope.walk(section.as_str(), root);
        }
        envelope.sort_by_schema();
        Some(envelope)
    }

    pub fn entries(&self) -> &[(&'static str, UpdateValue)] {
        &self.entries
    }

    pub fn dropped(&self) -> &[DroppedKey] {
        &self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<&UpdateValue> {
        self.entries
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, v)| v)
    }

    /// Keep only entries for `section`; the rest become `OutOfScope` drops.
    pub fn restrict_to(mut self, section: SectionId) -> Self {
        let entries = std::mem::take(&mut self.entries);
        for (path, value) in entries {
            if spec_for(path).is_some_and(|spec| spec.section == section) {
                self.entries.push((path, value));
            } else {
                self.drop_key(path.to_string(), DropReason::OutOfScope);
            }
        }
        self
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&'static str, &UpdateValue) -> bool) {
        self.entries.retain(|(p, v)| keep(p, v));
    }

    pub(crate) fn map_values(
        &mut self,
        mut f: impl FnMut(&'static str, UpdateValue) -> UpdateValue,
    ) {
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries.into_iter().map(|(p, v)| (p, f(p, v))).collect();
    }

    /// Order entries as the report schema lists them.
    fn sort_by_schema(&mut self) {
        self.entries
            .sort_by_key(|(path, _)| FIELDS.iter().position(|spec| spec.path == *path));
    }

    fn drop_key(&mut self, path: String, reason: DropReason) {
        debug!(path = %path, ?reason, "Dropping envelope key");
        self.dropped.push(DroppedKey { path, reason });
    }

    fn walk(&mut self, prefix: &str, object: &Map<String, Value>) {
        for (key, value) in object {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            if let Some(spec) = spec_for(&path) {
                match leaf_value(spec.kind, value) {
                    Some(v) => self.entries.push((spec.path, v)),
                    None => self.drop_key(path, DropReason::KindMismatch),
                }
            } else if is_interior(&path) {
                match value {
                    Value::Object(inner) => self.walk(&path, inner),
                    _ => self.drop_key(path, DropReason::KindMismatch),
                }
            } else {
                let reason = classify_unknown(&path);
                self.drop_key(path, reason);
            }
        }
    }
}

fn unwrap_root(value: &Value) -> Option<&Map<String, Value>> {
    let object = value.as_object()?;
    let root = match object.get("updates") {
        Some(inner) => inner.as_object()?,
        None => object,
    };
    if root.is_empty() {
        None
    } else {
        Some(root)
    }
}

fn classify_unknown(path: &str) -> DropReason {
    let root = path.split('.').next().unwrap_or(path);
    if CONTEXT_ROOTS.contains(&root) {
        DropReason::ContextField
    } else {
        DropReason::UnknownKey
    }
}

// ============================================================================
// Leaf conversion
// ============================================================================

fn leaf_value(kind: FieldKind, value: &Value) -> Option<UpdateValue> {
    match kind {
        FieldKind::Scalar => scalar_value(value).map(UpdateValue::Scalar),
        FieldKind::Texts => text_list(value).map(UpdateValue::Texts),
        FieldKind::Targets => {
            object_list(value, target_item).map(UpdateValue::Targets)
        }
        FieldKind::Risks => object_list(value, risk_item).map(UpdateValue::Risks),
    }
}

fn scalar_value(value: &Value) -> Option<Scalar> {
    match value {
        Value::Null => Some(Scalar::NotProvided),
        Value::String(s) => Some(Scalar::from_wire(s)),
        Value::Number(n) => Some(Scalar::Provided(n.to_string())),
        Value::Bool(b) => Some(Scalar::Provided(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn object_list<T>(value: &Value, convert: fn(&Map<String, Value>) -> Option<T>) -> Option<Vec<T>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_object().and_then(convert))
            .collect(),
        _ => None,
    }
}

fn item_scalar(object: &Map<String, Value>, key: &str) -> Option<Scalar> {
    object.get(key).map_or(Some(Scalar::NotProvided), scalar_value)
}

fn item_texts(object: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    object.get(key).map_or(Some(Vec::new()), text_list)
}

fn target_item(object: &Map<String, Value>) -> Option<TargetItem> {
    Some(TargetItem {
        label: item_scalar(object, "label")?,
        damage_modes: item_texts(object, "damage_modes")?,
        proximity_note: item_scalar(object, "proximity_note")?,
        occupied_frequency: item_scalar(object, "occupied_frequency")?,
        narratives: item_texts(object, "narratives")?,
    })
}

fn risk_item(object: &Map<String, Value>) -> Option<RiskItem> {
    Some(RiskItem {
        description: item_scalar(object, "description")?,
        likelihood: item_scalar(object, "likelihood")?,
        severity: item_scalar(object, "severity")?,
        rationale: item_scalar(object, "rationale")?,
        narratives: item_texts(object, "narratives")?,
    })
}
