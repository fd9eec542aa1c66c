//! Turn coordinator.
//!
//! One [`Coordinator`] owns one conversation session: the canonical report,
//! its provenance ledger, the section cursor and token totals. Each call to
//! [`Coordinator::handle_turn`] runs a single turn to completion:
//!
//! 1. context guard (blocks before anything else runs)
//! 2. statements: segment, then extract, filter and merge each segment in
//!    utterance order
//! 3. service requests: deterministic router, then the gated backstop
//!
//! Non-nominal outcomes are ordinary [`TurnResult`] variants.

use crate::backstop::{gate, BackstopGuess, GateDecision};
use crate::collab::{BackstopClassifier, ExtractionMode, ExtractionRequest, Extractor};
use crate::config::EngineConfig;
use crate::context::ReportContext;
use crate::envelope::{DroppedKey, UpdateEnvelope};
use crate::fields::fields_in;
use crate::guard::is_context_edit;
use crate::merge::{merge, MergeOutcome, MergePolicy};
use crate::prefilter::Prefilter;
use crate::provenance::{MergeMeta, ProvenanceLedger};
use crate::router::{classify, Route, ServiceKind};
use crate::section::SectionId;
use crate::segment::{segment_or_cursor, Segment};
use crate::state::ReportState;
use crate::usage::TokenLedger;
use arbor_ids::{CorrelationId, SessionId, TurnId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

// ============================================================================
// Turn types
// ============================================================================

/// What the caller's intent classifier decided the turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnIntent {
    ProvideStatement,
    RequestService,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown turn intent: {0}")]
pub struct IntentParseError(pub String);

impl TurnIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnIntent::ProvideStatement => "provide_statement",
            TurnIntent::RequestService => "request_service",
        }
    }
}

impl fmt::Display for TurnIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnIntent {
    type Err = IntentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "provide_statement" | "statement" => Ok(TurnIntent::ProvideStatement),
            "request_service" | "service" => Ok(TurnIntent::RequestService),
            other => Err(IntentParseError(other.to_string())),
        }
    }
}

/// Where the turn ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutedTo {
    BlockedContextEdit,
    ProvideStatement,
    Correction,
    SectionSummary,
    Outline,
    ReportDraft,
    Clarify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Captured,
    NoCapture,
    NavigationOnly,
}

/// What happened to one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    pub section: SectionId,
    pub payload: String,
    pub status: SegmentStatus,
    pub applied_paths: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClarifyReason {
    /// Neither the router nor the backstop produced a usable route.
    AmbiguousRoute,
    /// The service needs a section and none was found.
    MissingSection { service: ServiceKind },
}

/// Outcome of a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnResult {
    /// At least one segment (or the correction) changed the report.
    Applied {
        segments: Vec<SegmentReport>,
        applied_paths: Vec<&'static str>,
        cleared_paths: Vec<&'static str>,
    },
    /// Only navigation-only segments: the cursor moved, nothing was extracted.
    Navigated { section: SectionId },
    /// Extraction ran and nothing applied.
    NoUsableUpdate { segments: Vec<SegmentReport> },
    /// A rendering service was selected. Rendering happens outside this crate.
    Service {
        service: ServiceKind,
        section: Option<SectionId>,
        provided_paths: Vec<&'static str>,
    },
    /// Routing was ambiguous; the user must choose.
    Clarify(ClarifyReason),
    /// The turn tried to edit the job context. Nothing ran.
    Blocked,
}

impl TurnResult {
    pub fn label(&self) -> &'static str {
        match self {
            TurnResult::Applied { .. } => "applied",
            TurnResult::Navigated { .. } => "navigated",
            TurnResult::NoUsableUpdate { .. } => "no_usable_update",
            TurnResult::Service { .. } => "service",
            TurnResult::Clarify(_) => "clarify",
            TurnResult::Blocked => "blocked",
        }
    }

    /// False for the three non-nominal outcomes.
    pub fn is_nominal(&self) -> bool {
        !matches!(
            self,
            TurnResult::NoUsableUpdate { .. } | TurnResult::Clarify(_) | TurnResult::Blocked
        )
    }
}

/// How the service decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouterTrace {
    pub deterministic: Route,
    pub deterministic_hit: bool,
    pub backstop_used: bool,
    pub backstop_guess: Option<BackstopGuess>,
    pub backstop_threshold: Option<f64>,
    pub backstop_accept: Option<bool>,
    /// True when the classifier failed and the unavailable guess was used.
    pub backstop_substituted: bool,
}

impl RouterTrace {
    fn deterministic(route: Route) -> Self {
        Self {
            deterministic: route,
            deterministic_hit: !route.is_none(),
            backstop_used: false,
            backstop_guess: None,
            backstop_threshold: None,
            backstop_accept: None,
            backstop_substituted: false,
        }
    }
}

/// Everything a turn produced, ready for logging or rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnPacket {
    pub turn_id: TurnId,
    pub correlation_id: CorrelationId,
    pub utterance: String,
    pub intent: TurnIntent,
    pub routed_to: RoutedTo,
    pub cursor: SectionId,
    pub result: TurnResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterTrace>,
}

/// Serializable session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub cursor: SectionId,
    pub report: ReportState,
    pub ledger: ProvenanceLedger,
    pub tokens: TokenLedger,
    pub last_utterance: Option<String>,
}

#[derive(Debug, Clone)]
struct Checkpoint {
    report: ReportState,
    ledger: ProvenanceLedger,
    cursor: SectionId,
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct Coordinator<'c> {
    session_id: SessionId,
    report: ReportState,
    ledger: ProvenanceLedger,
    cursor: SectionId,
    last_utterance: Option<String>,
    tokens: TokenLedger,
    context: ReportContext,
    config: EngineConfig,
    prefilter: Prefilter,
    extractor: &'c dyn Extractor,
    backstop: &'c dyn BackstopClassifier,
    /// Oldest first, at most `config.undo_depth` entries.
    history: VecDeque<Checkpoint>,
    /// State from before the current turn's first change.
    pending: Option<Checkpoint>,
    turn_cursor: SectionId,
}

impl<'c> Coordinator<'c> {
    pub fn new(
        context: ReportContext,
        extractor: &'c dyn Extractor,
        backstop: &'c dyn BackstopClassifier,
    ) -> Self {
        let config = EngineConfig::default();
        let session_id = SessionId::new();
        info!(session_id = %session_id, job_id = %context.job_id, "Session started");
        Self {
            session_id,
            report: ReportState::new(),
            ledger: ProvenanceLedger::new(),
            cursor: SectionId::default(),
            last_utterance: None,
            tokens: TokenLedger::new(),
            context,
            prefilter: Prefilter::from_config(&config.prefilter),
            config,
            extractor,
            backstop,
            history: VecDeque::new(),
            pending: None,
            turn_cursor: SectionId::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.prefilter = Prefilter::from_config(&config.prefilter);
        self.config = config;
        while self.history.len() > self.config.undo_depth {
            self.history.pop_front();
        }
        self
    }

    /// Replace the filter pipeline built from the config.
    pub fn with_prefilter(mut self, prefilter: Prefilter) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Resume a previously saved session.
    pub fn with_snapshot(mut self, snapshot: SessionSnapshot) -> Self {
        self.session_id = snapshot.session_id;
        self.cursor = snapshot.cursor;
        self.report = snapshot.report;
        self.ledger = snapshot.ledger;
        self.tokens = snapshot.tokens;
        self.last_utterance = snapshot.last_utterance;
        self.history.clear();
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn report(&self) -> &ReportState {
        &self.report
    }

    pub fn ledger(&self) -> &ProvenanceLedger {
        &self.ledger
    }

    pub fn cursor(&self) -> SectionId {
        self.cursor
    }

    pub fn last_utterance(&self) -> Option<&str> {
        self.last_utterance.as_deref()
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn context(&self) -> &ReportContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            cursor: self.cursor,
            report: self.report.clone(),
            ledger: self.ledger.clone(),
            tokens: self.tokens.clone(),
            last_utterance: self.last_utterance.clone(),
        }
    }

    /// Restore report, ledger and cursor to before the last state-changing
    /// turn. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some(checkpoint) => {
                self.report = checkpoint.report;
                self.ledger = checkpoint.ledger;
                self.cursor = checkpoint.cursor;
                info!(session_id = %self.session_id, "Undid last turn");
                true
            }
            None => false,
        }
    }

    /// Run one turn to completion.
    pub fn handle_turn(&mut self, utterance: &str, intent: TurnIntent) -> TurnPacket {
        let turn_id = TurnId::new();
        let correlation_id = CorrelationId::new();
        let span = info_span!("turn", turn_id = %turn_id, %intent);
        let _enter = span.enter();

        self.last_utterance = Some(utterance.to_string());

        if is_context_edit(utterance) {
            return TurnPacket {
                turn_id,
                correlation_id,
                utterance: utterance.to_string(),
                intent,
                routed_to: RoutedTo::BlockedContextEdit,
                cursor: self.cursor,
                result: TurnResult::Blocked,
                router: None,
            };
        }

        self.turn_cursor = self.cursor;
        self.pending = None;

        let (routed_to, result, router) = match intent {
            TurnIntent::ProvideStatement => {
                let result = self.provide_statement(utterance, &turn_id);
                (RoutedTo::ProvideStatement, result, None)
            }
            TurnIntent::RequestService => {
                let (routed_to, result, trace) = self.request_service(utterance, &turn_id);
                (routed_to, result, Some(trace))
            }
        };

        if let Some(checkpoint) = self.pending.take() {
            self.remember(checkpoint);
        }

        info!(
            routed_to = ?routed_to,
            outcome = result.label(),
            cursor = %self.cursor,
            "Turn complete"
        );

        TurnPacket {
            turn_id,
            correlation_id,
            utterance: utterance.to_string(),
            intent,
            routed_to,
            cursor: self.cursor,
            result,
            router,
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn provide_statement(&mut self, utterance: &str, turn_id: &TurnId) -> TurnResult {
        let segments = segment_or_cursor(utterance, self.cursor);
        let mut reports = Vec::with_capacity(segments.len());
        let mut applied_paths = Vec::new();
        let mut cleared_paths = Vec::new();

        for segment in segments {
            self.cursor = segment.section;
            if segment.is_navigation_only() {
                debug!(section = %segment.section, "Navigation-only segment");
                reports.push(SegmentReport {
                    section: segment.section,
                    payload: segment.payload,
                    status: SegmentStatus::NavigationOnly,
                    applied_paths: Vec::new(),
                    dropped: Vec::new(),
                });
                continue;
            }

            let (outcome, dropped) = self.extract_and_merge(
                &segment,
                turn_id,
                ExtractionMode::Statement,
                self.config.statement_policy,
            );
            applied_paths.extend(outcome.applied_paths.iter().copied());
            cleared_paths.extend(outcome.cleared_paths.iter().copied());
            reports.push(SegmentReport {
                section: segment.section,
                payload: segment.payload,
                status: if outcome.applied() {
                    SegmentStatus::Captured
                } else {
                    SegmentStatus::NoCapture
                },
                applied_paths: outcome.applied_paths,
                dropped,
            });
        }

        let any_extracted = reports
            .iter()
            .any(|r| r.status != SegmentStatus::NavigationOnly);

        if !applied_paths.is_empty() || !cleared_paths.is_empty() {
            TurnResult::Applied {
                segments: reports,
                applied_paths,
                cleared_paths,
            }
        } else if any_extracted {
            TurnResult::NoUsableUpdate { segments: reports }
        } else {
            TurnResult::Navigated {
                section: self.cursor,
            }
        }
    }

    /// Extract, parse, filter and merge one segment as a single transaction.
    fn extract_and_merge(
        &mut self,
        segment: &Segment,
        turn_id: &TurnId,
        mode: ExtractionMode,
        policy: MergePolicy,
    ) -> (MergeOutcome, Vec<DroppedKey>) {
        let request = ExtractionRequest {
            section: segment.section,
            text: &segment.payload,
            mode,
        };
        let extraction = self.extractor.extract(request);

        let component = match mode {
            ExtractionMode::Statement => format!("extractor:{}", segment.section),
            ExtractionMode::Correction => format!("corrections:{}", segment.section),
        };

        let mut meta = MergeMeta::new(turn_id.clone(), segment.section)
            .with_source_text(segment.payload.clone())
            .with_timestamp(Utc::now())
            .with_model(self.config.model_id.clone());

        let mut dropped = Vec::new();
        let envelope = match extraction {
            Some(extraction) => {
                self.tokens.record(component, extraction.usage);
                meta = meta.with_extractor(extraction.extractor_id);
                if let Some(model) = extraction.model_id {
                    meta = meta.with_model(model);
                }
                UpdateEnvelope::from_json_scoped(&extraction.payload, segment.section).map(|env| {
                    let env = self
                        .prefilter
                        .apply(env.restrict_to(segment.section), &self.report);
                    dropped = env.dropped().to_vec();
                    env
                })
            }
            None => {
                debug!(
                    section = %segment.section,
                    mode = mode.as_str(),
                    "Extractor returned nothing"
                );
                None
            }
        };

        let outcome = merge(&self.report, &self.ledger, envelope.as_ref(), policy, &meta);
        if outcome.ledger != self.ledger || outcome.state != self.report {
            let report = std::mem::replace(&mut self.report, outcome.state.clone());
            let ledger = std::mem::replace(&mut self.ledger, outcome.ledger.clone());
            if self.pending.is_none() {
                self.pending = Some(Checkpoint {
                    report,
                    ledger,
                    cursor: self.turn_cursor,
                });
            }
        }
        (outcome, dropped)
    }

    fn remember(&mut self, checkpoint: Checkpoint) {
        while !self.history.is_empty() && self.history.len() >= self.config.undo_depth {
            self.history.pop_front();
        }
        self.history.push_back(checkpoint);
    }

    // ------------------------------------------------------------------------
    // Service requests
    // ------------------------------------------------------------------------

    fn request_service(
        &mut self,
        utterance: &str,
        turn_id: &TurnId,
    ) -> (RoutedTo, TurnResult, RouterTrace) {
        let deterministic = classify(utterance);
        let mut trace = RouterTrace::deterministic(deterministic);

        let route = if deterministic.is_none() {
            let (guess, substituted) = match self.backstop.classify(utterance) {
                Ok(classification) => {
                    self.tokens.record("service_backstop", classification.usage);
                    (classification.guess, false)
                }
                Err(err) => {
                    warn!(error = %err, "Backstop classifier failed; treating as no guess");
                    (BackstopGuess::unavailable(), true)
                }
            };
            let threshold = self.config.backstop_threshold;
            let decision = gate(&guess, threshold);
            trace.backstop_used = true;
            trace.backstop_guess = Some(guess);
            trace.backstop_threshold = Some(threshold);
            trace.backstop_accept = Some(decision.is_accept());
            trace.backstop_substituted = substituted;

            match decision {
                GateDecision::Accept(route) => route,
                GateDecision::Clarify => {
                    return (
                        RoutedTo::Clarify,
                        TurnResult::Clarify(ClarifyReason::AmbiguousRoute),
                        trace,
                    );
                }
            }
        } else {
            deterministic
        };

        let (routed_to, result) = self.dispatch(route, utterance, turn_id);
        (routed_to, result, trace)
    }

    fn dispatch(
        &mut self,
        route: Route,
        utterance: &str,
        turn_id: &TurnId,
    ) -> (RoutedTo, TurnResult) {
        match (route.service, route.section) {
            (ServiceKind::Correction, Some(section)) => {
                self.cursor = section;
                let segment = Segment::new(section, utterance.trim());
                let (outcome, dropped) = self.extract_and_merge(
                    &segment,
                    turn_id,
                    ExtractionMode::Correction,
                    self.config.correction_policy,
                );
                let applied = outcome.applied() || !outcome.cleared_paths.is_empty();
                let report = SegmentReport {
                    section,
                    payload: segment.payload,
                    status: if outcome.applied() {
                        SegmentStatus::Captured
                    } else {
                        SegmentStatus::NoCapture
                    },
                    applied_paths: outcome.applied_paths.clone(),
                    dropped,
                };
                let result = if applied {
                    TurnResult::Applied {
                        segments: vec![report],
                        applied_paths: outcome.applied_paths,
                        cleared_paths: outcome.cleared_paths,
                    }
                } else {
                    TurnResult::NoUsableUpdate {
                        segments: vec![report],
                    }
                };
                (RoutedTo::Correction, result)
            }
            (ServiceKind::Outline, section) => {
                let section = section.unwrap_or(self.cursor);
                self.cursor = section;
                (RoutedTo::Outline, self.service(ServiceKind::Outline, Some(section)))
            }
            (ServiceKind::SectionSummary, Some(section)) => {
                self.cursor = section;
                (
                    RoutedTo::SectionSummary,
                    self.service(ServiceKind::SectionSummary, Some(section)),
                )
            }
            (ServiceKind::ReportDraft, _) => {
                (RoutedTo::ReportDraft, self.service(ServiceKind::ReportDraft, None))
            }
            (service @ (ServiceKind::Correction | ServiceKind::SectionSummary), None) => (
                RoutedTo::Clarify,
                TurnResult::Clarify(ClarifyReason::MissingSection { service }),
            ),
            (ServiceKind::None, _) => (
                RoutedTo::Clarify,
                TurnResult::Clarify(ClarifyReason::AmbiguousRoute),
            ),
        }
    }

    fn service(&self, service: ServiceKind, section: Option<SectionId>) -> TurnResult {
        let provided_paths = match section {
            Some(section) => provided_in(&self.report, section),
            None => SectionId::ALL
                .into_iter()
                .flat_map(|s| provided_in(&self.report, s))
                .collect(),
        };
        TurnResult::Service {
            service,
            section,
            provided_paths,
        }
    }
}

fn provided_in(report: &ReportState, section: SectionId) -> Vec<&'static str> {
    fields_in(section)
        .filter(|spec| report.field(spec.path).is_some_and(|f| f.is_provided()))
        .map(|spec| spec.path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        Classification, CollaboratorError, Extraction, NullExtractor, OfflineClassifier,
    };
    use crate::usage::TokenUsage;
    use serde_json::json;

    struct FixedClassifier(BackstopGuess);

    impl BackstopClassifier for FixedClassifier {
        fn classify(&self, _utterance: &str) -> Result<Classification, CollaboratorError> {
            Ok(Classification {
                guess: self.0,
                usage: TokenUsage::new(12, 3),
            })
        }
    }

    struct DbhExtractor;

    impl Extractor for DbhExtractor {
        fn extract(&self, request: ExtractionRequest<'_>) -> Option<Extraction> {
            (request.section == SectionId::TreeDescription).then(|| {
                Extraction::new("tree_extractor", json!({"dbh_in": "28 inches"}))
                    .with_usage(TokenUsage::new(40, 8))
            })
        }
    }

    #[test]
    fn test_blocked_turn_only_echoes() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier);
        let before = coordinator.snapshot();
        let packet = coordinator.handle_turn("my phone is 555-0100", TurnIntent::ProvideStatement);

        assert_eq!(packet.result, TurnResult::Blocked);
        assert_eq!(packet.routed_to, RoutedTo::BlockedContextEdit);
        let after = coordinator.snapshot();
        assert_eq!(after.report, before.report);
        assert_eq!(after.ledger, before.ledger);
        assert_eq!(after.cursor, before.cursor);
        assert_eq!(after.tokens, before.tokens);
        assert_eq!(after.last_utterance.as_deref(), Some("my phone is 555-0100"));
    }

    #[test]
    fn test_statement_falls_back_to_cursor() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &DbhExtractor, &OfflineClassifier);
        let packet = coordinator.handle_turn("tree description:", TurnIntent::ProvideStatement);
        assert_eq!(
            packet.result,
            TurnResult::Navigated {
                section: SectionId::TreeDescription
            }
        );

        let packet = coordinator.handle_turn("DBH is 28 inches", TurnIntent::ProvideStatement);
        assert!(matches!(packet.result, TurnResult::Applied { .. }));
        assert_eq!(
            coordinator.report().tree_description.dbh_in.as_deref(),
            Some("28 in")
        );
        assert_eq!(coordinator.tokens().by_component["extractor:tree_description"].input, 40);
    }

    #[test]
    fn test_statement_without_capture() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &DbhExtractor, &OfflineClassifier);
        let packet = coordinator.handle_turn("risks: none seen", TurnIntent::ProvideStatement);
        assert!(matches!(packet.result, TurnResult::NoUsableUpdate { .. }));
        assert!(!packet.result.is_nominal());
        assert_eq!(coordinator.ledger().len(), 1);
        assert!(coordinator.ledger().rows()[0].is_not_found());
    }

    #[test]
    fn test_backstop_failure_clarifies() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier);
        let packet = coordinator.handle_turn("hmm what next", TurnIntent::RequestService);
        assert_eq!(packet.result, TurnResult::Clarify(ClarifyReason::AmbiguousRoute));
        let trace = packet.router.unwrap();
        assert!(trace.backstop_used);
        assert!(trace.backstop_substituted);
        assert_eq!(trace.backstop_accept, Some(false));
    }

    #[test]
    fn test_backstop_accept_dispatches() {
        let classifier = FixedClassifier(BackstopGuess::new(
            ServiceKind::SectionSummary,
            Some(SectionId::Targets),
            0.9,
        ));
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &classifier);
        let packet = coordinator.handle_turn("what's at stake here", TurnIntent::RequestService);
        assert_eq!(packet.routed_to, RoutedTo::SectionSummary);
        assert_eq!(coordinator.cursor(), SectionId::Targets);
        assert_eq!(coordinator.tokens().by_component["service_backstop"].input, 12);
    }

    #[test]
    fn test_outline_defaults_to_cursor() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier);
        coordinator.handle_turn("risks:", TurnIntent::ProvideStatement);
        let packet = coordinator.handle_turn("outline", TurnIntent::RequestService);
        assert_eq!(
            packet.result,
            TurnResult::Service {
                service: ServiceKind::Outline,
                section: Some(SectionId::Risks),
                provided_paths: Vec::new(),
            }
        );
    }

    #[test]
    fn test_correction_without_section_clarifies() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier);
        let packet = coordinator.handle_turn("change it to 40", TurnIntent::RequestService);
        assert_eq!(
            packet.result,
            TurnResult::Clarify(ClarifyReason::MissingSection {
                service: ServiceKind::Correction
            })
        );
        assert!(coordinator.ledger().is_empty());
    }

    #[test]
    fn test_undo_restores_previous_turn() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &DbhExtractor, &OfflineClassifier);
        coordinator.handle_turn("tree description: DBH 28", TurnIntent::ProvideStatement);
        assert!(coordinator.report().tree_description.dbh_in.is_provided());
        assert!(coordinator.undo());
        assert_eq!(coordinator.report(), &ReportState::new());
        assert!(coordinator.ledger().is_empty());
        assert!(!coordinator.undo());
    }

    #[test]
    fn test_undo_history_is_bounded() {
        let config = EngineConfig::default().with_undo_depth(2);
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier)
                .with_config(config);
        for section in ["area description: a", "targets: b", "risks: c"] {
            coordinator.handle_turn(section, TurnIntent::ProvideStatement);
        }
        assert_eq!(coordinator.ledger().len(), 3);

        assert!(coordinator.undo());
        assert!(coordinator.undo());
        assert!(!coordinator.undo());
        // The oldest turn fell out of the history and stays applied.
        assert_eq!(coordinator.ledger().len(), 1);
        assert_eq!(coordinator.cursor(), SectionId::AreaDescription);
    }

    #[test]
    fn test_unchanged_turn_adds_no_undo_step() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &DbhExtractor, &OfflineClassifier);
        coordinator.handle_turn("tree description: DBH 28", TurnIntent::ProvideStatement);
        coordinator.handle_turn("risks:", TurnIntent::ProvideStatement);
        coordinator.handle_turn("outline", TurnIntent::RequestService);

        assert!(coordinator.undo());
        assert!(coordinator.ledger().is_empty());
        assert!(!coordinator.undo());
    }

    #[test]
    fn test_intent_parse() {
        assert_eq!(
            " Statement ".parse::<TurnIntent>().unwrap(),
            TurnIntent::ProvideStatement
        );
        assert_eq!(
            "chat".parse::<TurnIntent>(),
            Err(IntentParseError("chat".to_string()))
        );
    }

    #[test]
    fn test_packet_serializes() {
        let mut coordinator =
            Coordinator::new(ReportContext::default(), &DbhExtractor, &OfflineClassifier);
        let packet =
            coordinator.handle_turn("tree description: DBH 28", TurnIntent::ProvideStatement);
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["routed_to"], "provide_statement");
        assert_eq!(json["result"]["outcome"], "applied");
        assert_eq!(json["result"]["segments"][0]["status"], "captured");
        assert!(json.get("router").is_none());
    }
}
