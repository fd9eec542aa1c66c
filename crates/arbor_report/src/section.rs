//! The fixed set of report sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the named groupings of the canonical report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    #[default]
    AreaDescription,
    TreeDescription,
    Targets,
    Risks,
    Recommendations,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section: {0}")]
pub struct SectionParseError(pub String);

impl SectionId {
    /// All sections in report order.
    pub const ALL: [SectionId; 5] = [
        SectionId::AreaDescription,
        SectionId::TreeDescription,
        SectionId::Targets,
        SectionId::Risks,
        SectionId::Recommendations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::AreaDescription => "area_description",
            SectionId::TreeDescription => "tree_description",
            SectionId::Targets => "targets",
            SectionId::Risks => "risks",
            SectionId::Recommendations => "recommendations",
        }
    }

    /// Spoken label as it appears in utterances ("tree description").
    pub fn label(&self) -> &'static str {
        match self {
            SectionId::AreaDescription => "area description",
            SectionId::TreeDescription => "tree description",
            SectionId::Targets => "targets",
            SectionId::Risks => "risks",
            SectionId::Recommendations => "recommendations",
        }
    }

    /// Look up a section by its spoken label, ignoring case and inner whitespace.
    pub fn from_label(label: &str) -> Option<SectionId> {
        let normalized = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        SectionId::ALL
            .into_iter()
            .find(|s| s.label() == normalized)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionId {
    type Err = SectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SectionId::ALL
            .into_iter()
            .find(|sec| sec.as_str().eq_ignore_ascii_case(trimmed))
            .or_else(|| SectionId::from_label(trimmed))
            .ok_or_else(|| SectionParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_as_str() {
        for section in SectionId::ALL {
            assert_eq!(section.as_str().parse::<SectionId>().unwrap(), section);
        }
    }

    #[test]
    fn test_parse_spoken_label() {
        assert_eq!(
            "Tree   Description".parse::<SectionId>().unwrap(),
            SectionId::TreeDescription
        );
        assert_eq!(SectionId::from_label("RISKS"), Some(SectionId::Risks));
    }

    #[test]
    fn test_parse_unknown() {
        let err = "customer_info".parse::<SectionId>().unwrap_err();
        assert_eq!(err, SectionParseError("customer_info".to_string()));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&SectionId::AreaDescription).unwrap();
        assert_eq!(json, r#""area_description""#);
    }
}
