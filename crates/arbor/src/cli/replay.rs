//! `arbor replay`: run a scripted session through the turn coordinator.

use crate::cli::config::resolve_config;
use crate::cli::output::print_json;
use crate::cli::script::{ReplayScript, ScriptClassifier, ScriptExtractor};
use anyhow::Context;
use arbor_report::{
    Coordinator, EngineConfig, ProvenanceEvent, ProvenanceLedger, ReportState, SectionId,
    TokenLedger, TurnPacket,
};
use arbor_tape::{RedactionMode, TapeWriter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub struct ReplayArgs {
    pub script: PathBuf,
    pub config: Option<PathBuf>,
    pub tape: Option<PathBuf>,
    pub redact: bool,
}

/// Everything a replayed session produced.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub session_id: String,
    pub turns: Vec<TurnPacket>,
    pub cursor: SectionId,
    pub report: ReportState,
    pub ledger: ProvenanceLedger,
    pub tokens: TokenLedger,
    pub whats_left: BTreeMap<SectionId, Vec<&'static str>>,
    pub completeness: f64,
}

pub fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let script = ReplayScript::from_path(&args.script)?;
    let config = resolve_config(args.config.as_deref())?;
    let redaction = if args.redact {
        RedactionMode::Hash
    } else {
        RedactionMode::Plaintext
    };

    let tape = args.tape.as_deref().map(|path| (path, redaction));
    let summary = replay_session(&script, config, tape)?;
    print_json(&summary)
}

/// Drive every scripted turn, optionally recording to a tape.
pub fn replay_session(
    script: &ReplayScript,
    config: EngineConfig,
    tape: Option<(&Path, RedactionMode)>,
) -> anyhow::Result<ReplaySummary> {
    let extractor = ScriptExtractor::default();
    let classifier = ScriptClassifier::default();
    let mut coordinator =
        Coordinator::new(script.context.clone(), &extractor, &classifier).with_config(config);

    let tape = match tape {
        Some((path, redaction)) => Some(
            TapeWriter::create(path, coordinator.session_id().as_str(), redaction)
                .with_context(|| format!("Failed to create tape {}", path.display()))?,
        ),
        None => None,
    };

    let mut turns = Vec::with_capacity(script.turns.len());
    for (idx, turn) in script.turns.iter().enumerate() {
        extractor.load(&turn.extractions);
        classifier.load(turn.backstop.clone());

        let packet = coordinator.handle_turn(&turn.utterance, turn.intent);
        info!(
            turn = idx + 1,
            routed_to = ?packet.routed_to,
            result = packet.result.label(),
            "Replayed turn"
        );

        let unused = extractor.unused();
        if unused > 0 {
            warn!(turn = idx + 1, unused, "Scripted extractions were never requested");
        }

        if let Some(tape) = &tape {
            let correlation = packet.correlation_id.as_str();
            tape.record_turn(Some(correlation), serde_json::to_value(&packet)?)
                .context("Failed to record turn to tape")?;
            let rows: Vec<&ProvenanceEvent> =
                coordinator.ledger().rows_for_turn(&packet.turn_id).collect();
            if !rows.is_empty() {
                tape.record_ledger_rows(Some(correlation), serde_json::to_value(&rows)?)
                    .context("Failed to record ledger rows to tape")?;
            }
        }

        turns.push(packet);
    }

    if let Some(tape) = tape {
        let events = tape.finish().context("Failed to close tape")?;
        info!(events, "Tape closed");
    }

    let report = coordinator.report().clone();
    Ok(ReplaySummary {
        session_id: coordinator.session_id().to_string(),
        turns,
        cursor: coordinator.cursor(),
        whats_left: report.whats_left(),
        completeness: report.completeness(),
        ledger: coordinator.ledger().clone(),
        tokens: coordinator.tokens().clone(),
        report,
    })
}
