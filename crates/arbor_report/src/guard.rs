//! Context guard: detects attempts to edit the job context through a turn.

use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

/// Identity and location vocabulary owned by the job context.
pub const CONTEXT_TOKENS: &[&str] = &[
    "customer",
    "client",
    "arborist",
    "job id",
    "job_id",
    "job number",
    "my name",
    "my phone",
    "my email",
    "my license",
    "my address",
    "phone number",
    "email address",
    "license number",
    "latitude",
    "longitude",
    "lat",
    "lon",
    "gps",
    "coordinate",
    "coordinates",
];

static CONTEXT_EDIT: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = CONTEXT_TOKENS
        .iter()
        .map(|token| regex::escape(token).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).expect("valid regex")
});

/// True when `text` mentions identity or location fields of the job context.
pub fn is_context_edit(text: &str) -> bool {
    let hit = CONTEXT_EDIT.find(text);
    if let Some(m) = hit {
        info!(token = m.as_str(), "Context edit blocked");
    }
    hit.is_some()
}
