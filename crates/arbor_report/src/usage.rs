//! Token accounting for collaborator calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tokens consumed by one collaborator call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

/// Session totals with a per-component breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    pub total_in: u64,
    pub total_out: u64,
    pub by_component: BTreeMap<String, TokenUsage>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage under `component` (e.g. `extractor:tree_description`).
    pub fn record(&mut self, component: impl Into<String>, usage: TokenUsage) {
        self.total_in = self.total_in.saturating_add(usage.input);
        self.total_out = self.total_out.saturating_add(usage.output);
        let entry = self.by_component.entry(component.into()).or_default();
        entry.input = entry.input.saturating_add(usage.input);
        entry.output = entry.output.saturating_add(usage.output);
    }

    pub fn total(&self) -> u64 {
        self.total_in.saturating_add(self.total_out)
    }
}
