//! Read-only job context: who the report is for and where the tree is.
//!
//! Supplied once when a session starts. Nothing in this crate mutates it, and
//! turns that try to edit it are blocked by [`crate::guard`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArboristInfo {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub license: String,
    pub certification: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerInfo {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// The externally owned identity and location record for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportContext {
    pub job_id: String,
    pub arborist: ArboristInfo,
    pub customer: CustomerInfo,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_rejects_unknown_fields() {
        let json = serde_json::json!({
            "job_id": "J-1",
            "arborist": ArboristInfo::default(),
            "customer": CustomerInfo::default(),
            "location": {"latitude": 1.0, "longitude": 2.0, "altitude": 3.0}
        });
        assert!(serde_json::from_value::<ReportContext>(json).is_err());
    }

    #[test]
    fn test_context_roundtrip() {
        let ctx = ReportContext {
            job_id: "J-1042".into(),
            location: Location {
                latitude: 38.58,
                longitude: -121.49,
            },
            ..ReportContext::default()
        };
        let back: ReportContext =
            serde_json::from_str(&serde_json::to_string(&ctx).unwrap()).unwrap();
        assert_eq!(back, ctx);
    }
}
