//! Presence-tracking scalar values.
//!
//! A [`Scalar`] is either `Provided(text)` or `NotProvided`. Presence checks are
//! exhaustive matches, never string comparisons against a magic constant. The
//! wire sentinel [`NOT_PROVIDED`] only exists at the JSON boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text used at the JSON boundary for "no value yet".
pub const NOT_PROVIDED: &str = "Not provided";

/// A scalar report field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Provided(String),
    #[default]
    NotProvided,
}

impl Scalar {
    pub fn provided(value: impl Into<String>) -> Self {
        Scalar::Provided(value.into())
    }

    /// Interpret a raw wire string. The wire sentinel maps to `NotProvided`.
    pub fn from_wire(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case(NOT_PROVIDED) {
            Scalar::NotProvided
        } else {
            Scalar::Provided(raw.to_string())
        }
    }

    pub fn is_provided(&self) -> bool {
        matches!(self, Scalar::Provided(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Scalar::Provided(v) => Some(v),
            Scalar::NotProvided => None,
        }
    }

    /// Render for the wire: the value itself or [`NOT_PROVIDED`].
    pub fn to_wire(&self) -> &str {
        self.as_deref().unwrap_or(NOT_PROVIDED)
    }
}

impl From<Option<String>> for Scalar {
    fn from(value: Option<String>) -> Self {
        value.map_or(Scalar::NotProvided, Scalar::Provided)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::provided(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_provided() {
        assert_eq!(Scalar::default(), Scalar::NotProvided);
        assert!(!Scalar::default().is_provided());
    }

    #[test]
    fn test_from_wire_recognizes_sentinel() {
        assert_eq!(Scalar::from_wire("Not provided"), Scalar::NotProvided);
        assert_eq!(Scalar::from_wire(" not PROVIDED "), Scalar::NotProvided);
        assert_eq!(Scalar::from_wire("Quercus rubra"), Scalar::provided("Quercus rubra"));
    }

    #[test]
    fn test_provided_empty_string_is_still_provided() {
        // Noise handling lives in the prefilter, not here.
        assert!(Scalar::provided("").is_provided());
    }

    #[test]
    fn test_serialization_is_distinguishable() {
        let provided = serde_json::to_string(&Scalar::provided("Not provided")).unwrap();
        let missing = serde_json::to_string(&Scalar::NotProvided).unwrap();
        assert_eq!(provided, r#"{"state":"provided","value":"Not provided"}"#);
        assert_eq!(missing, r#"{"state":"not_provided"}"#);

        let back: Scalar = serde_json::from_str(&provided).unwrap();
        assert_eq!(back, Scalar::provided("Not provided"));
    }
}
