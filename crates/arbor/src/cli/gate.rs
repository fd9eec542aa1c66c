//! `arbor gate`: apply the backstop confidence gate to a hand-written guess.

use crate::cli::config::resolve_config;
use crate::cli::output::print_json;
use anyhow::Context;
use arbor_report::{gate, BackstopGuess, SectionId, ServiceKind};

#[derive(Debug)]
pub struct GateArgs {
    pub service: String,
    pub section: Option<String>,
    pub confidence: f64,
    pub threshold: Option<f64>,
}

pub fn run(args: GateArgs) -> anyhow::Result<()> {
    let service: ServiceKind = args
        .service
        .parse()
        .with_context(|| format!("Invalid --service '{}'", args.service))?;
    let section = args
        .section
        .as_deref()
        .map(str::parse::<SectionId>)
        .transpose()
        .context("Invalid --section")?;
    let threshold = match args.threshold {
        Some(t) => t,
        None => resolve_config(None)?.backstop_threshold,
    };

    let guess = BackstopGuess::new(service, section, args.confidence);
    let decision = gate(&guess, threshold);

    print_json(&serde_json::json!({
        "guess": guess,
        "threshold": threshold,
        "decision": decision,
    }))
}
