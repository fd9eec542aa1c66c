//! Identifier wrappers for arbor report sessions.
//!
//! Every identifier is a UUID v4 carrying a short kind prefix
//! (`turn-3f2c...`) so ledger rows and tape lines stay greppable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when parsing a prefixed identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("invalid {label}: expected prefix '{prefix}-'")]
    MissingPrefix {
        label: &'static str,
        prefix: &'static str,
    },

    #[error("invalid {label}: {reason}")]
    InvalidUuid { label: &'static str, reason: String },
}

macro_rules! define_prefixed_id {
    ($name:ident, $prefix:expr, $label:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                let raw = value
                    .strip_prefix($prefix)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .ok_or(IdParseError::MissingPrefix {
                        label: $label,
                        prefix: $prefix,
                    })?;
                Uuid::parse_str(raw).map_err(|e| IdParseError::InvalidUuid {
                    label: $label,
                    reason: e.to_string(),
                })?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

define_prefixed_id!(SessionId, "session", "session ID");
define_prefixed_id!(TurnId, "turn", "turn ID");
define_prefixed_id!(CorrelationId, "corr", "correlation ID");
