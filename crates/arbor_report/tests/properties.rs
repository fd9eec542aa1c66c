//! Property tests for the merge engine, segmenter, context guard and backstop gate.

use arbor_ids::TurnId;
use arbor_report::{
    gate, is_context_edit, merge, segment, BackstopGuess, Coordinator, FieldKind, MergeMeta,
    MergePolicy, NullExtractor, OfflineClassifier, ProvenanceLedger, ReportContext, ReportState,
    Scalar, SectionId, ServiceKind, TurnIntent, TurnResult, UpdateEnvelope, UpdateValue, FIELDS,
};
use arbor_report::guard::CONTEXT_TOKENS;
use proptest::prelude::*;

fn scalar_paths() -> Vec<&'static str> {
    FIELDS
        .iter()
        .filter(|spec| spec.kind == FieldKind::Scalar)
        .map(|spec| spec.path)
        .collect()
}

fn text_paths() -> Vec<&'static str> {
    FIELDS
        .iter()
        .filter(|spec| spec.kind == FieldKind::Texts)
        .map(|spec| spec.path)
        .collect()
}

fn meta(section: SectionId) -> MergeMeta {
    MergeMeta::new(TurnId::new(), section)
}

/// Build a report with the given scalar writes applied.
fn seeded_state(writes: &[(usize, String)]) -> ReportState {
    let paths = scalar_paths();
    let envelope = writes.iter().fold(UpdateEnvelope::new(), |env, (idx, value)| {
        env.with_scalar(paths[idx % paths.len()], value.as_str())
    });
    merge(
        &ReportState::new(),
        &ProvenanceLedger::new(),
        Some(&envelope),
        MergePolicy::PreferExisting,
        &meta(SectionId::TreeDescription),
    )
    .state
}

/// An envelope that names every field but provides nothing.
fn blank_envelope() -> UpdateEnvelope {
    FIELDS.iter().fold(UpdateEnvelope::new(), |env, spec| {
        let value = match spec.kind {
            FieldKind::Scalar => UpdateValue::Scalar(Scalar::NotProvided),
            FieldKind::Texts => UpdateValue::Texts(Vec::new()),
            FieldKind::Targets => UpdateValue::Targets(Vec::new()),
            FieldKind::Risks => UpdateValue::Risks(Vec::new()),
        };
        env.with(spec.path, value)
    })
}

/// Test that the blank envelope really covers the whole schema.
#[test]
fn test_blank_envelope_covers_schema() {
    assert_eq!(blank_envelope().len(), FIELDS.len());
    assert!(blank_envelope().dropped().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A not-provided envelope under prefer-existing changes nothing and
    /// records exactly one Not Found row.
    #[test]
    fn test_blank_merge_is_noop(
        writes in prop::collection::vec((0usize..64, "[a-z]{1,8}"), 0..12),
    ) {
        let state = seeded_state(&writes);
        let ledger = ProvenanceLedger::new();
        let out = merge(
            &state,
            &ledger,
            Some(&blank_envelope()),
            MergePolicy::PreferExisting,
            &meta(SectionId::Risks),
        );

        prop_assert_eq!(&out.state, &state);
        prop_assert_eq!(out.ledger.len(), 1);
        prop_assert!(out.ledger.rows()[0].is_not_found());
        prop_assert!(out.applied_paths.is_empty());
        prop_assert!(out.cleared_paths.is_empty());
    }

    /// List fields only ever grow, by exactly the incoming length, with the
    /// existing items kept as a prefix.
    #[test]
    fn test_list_append_is_monotonic(
        path_idx in 0usize..64,
        existing in prop::collection::vec("[a-z]{1,8}", 0..6),
        incoming in prop::collection::vec("[a-z]{1,8}", 1..6),
        last_write in any::<bool>(),
    ) {
        let paths = text_paths();
        let path = paths[path_idx % paths.len()];
        let policy = if last_write { MergePolicy::LastWrite } else { MergePolicy::PreferExisting };

        let first = merge(
            &ReportState::new(),
            &ProvenanceLedger::new(),
            Some(&UpdateEnvelope::new().with_texts(path, existing.clone())),
            MergePolicy::PreferExisting,
            &meta(SectionId::AreaDescription),
        );
        let second = merge(
            &first.state,
            &first.ledger,
            Some(&UpdateEnvelope::new().with_texts(path, incoming.clone())),
            policy,
            &meta(SectionId::AreaDescription),
        );

        let before = first.state.field(path).map(|f| f.len()).unwrap_or(0);
        let after = second.state.field(path).map(|f| f.len()).unwrap_or(0);
        prop_assert_eq!(before, existing.len());
        prop_assert_eq!(after, existing.len() + incoming.len());
        prop_assert_eq!(second.applied_paths, vec![path]);
        prop_assert_eq!(second.ledger.len(), first.ledger.len() + 1);
    }

    /// Repeated last-write corrections leave one row per path, holding the
    /// final value.
    #[test]
    fn test_last_write_keeps_single_row(
        values in prop::collection::vec("[0-9]{1,3} in", 1..8),
    ) {
        let mut state = ReportState::new();
        let mut ledger = ProvenanceLedger::new();
        for value in &values {
            let out = merge(
                &state,
                &ledger,
                Some(&UpdateEnvelope::new().with_scalar("tree_description.dbh_in", value.as_str())),
                MergePolicy::LastWrite,
                &meta(SectionId::TreeDescription),
            );
            state = out.state;
            ledger = out.ledger;
        }

        let rows: Vec<_> = ledger
            .rows_for(SectionId::TreeDescription, "tree_description.dbh_in")
            .collect();
        let last = values.last().map(String::as_str);
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(rows[0].applied_value.as_deref(), last);
        prop_assert_eq!(state.tree_description.dbh_in.as_deref(), last);
    }

    /// Segmentation is a pure function of its inputs.
    #[test]
    fn test_segmenter_is_deterministic(text in ".{0,120}", cursor in 0usize..5) {
        let cursor = SectionId::ALL[cursor];
        prop_assert_eq!(segment(&text, cursor), segment(&text, cursor));
    }

    /// Colon-scoped lines come back as one segment each, in utterance order.
    #[test]
    fn test_segmenter_preserves_order(
        parts in prop::collection::vec((0usize..5, "[a-z0-9]{1,12}"), 1..6),
    ) {
        let utterance = parts
            .iter()
            .map(|(idx, payload)| format!("{}: {}", SectionId::ALL[*idx].label(), payload))
            .collect::<Vec<_>>()
            .join("\n");

        let segments = segment(&utterance, SectionId::AreaDescription);
        prop_assert_eq!(segments.len(), parts.len());
        for (seg, (idx, payload)) in segments.iter().zip(parts.iter()) {
            prop_assert_eq!(seg.section, SectionId::ALL[*idx]);
            prop_assert_eq!(&seg.payload, payload);
        }
    }

    /// Any whole-word context token is caught, and the blocked turn leaves the
    /// session untouched whatever the intent.
    #[test]
    fn test_context_guard_is_total(
        prefix in "([a-z]{1,8} ){0,3}",
        token_idx in 0usize..64,
        suffix in "( [a-z]{1,8}){0,3}",
        service in any::<bool>(),
    ) {
        let token = CONTEXT_TOKENS[token_idx % CONTEXT_TOKENS.len()];
        let utterance = format!("{}{}{}", prefix, token, suffix);
        prop_assert!(is_context_edit(&utterance), "missed: {}", utterance);

        let mut coordinator =
            Coordinator::new(ReportContext::default(), &NullExtractor, &OfflineClassifier);
        let intent = if service {
            TurnIntent::RequestService
        } else {
            TurnIntent::ProvideStatement
        };
        let packet = coordinator.handle_turn(&utterance, intent);

        prop_assert_eq!(packet.result, TurnResult::Blocked);
        prop_assert_eq!(coordinator.report(), &ReportState::new());
        prop_assert!(coordinator.ledger().is_empty());
        prop_assert_eq!(coordinator.cursor(), SectionId::AreaDescription);
    }

    /// The gate accepts exactly when the confidence reaches the threshold.
    #[test]
    fn test_backstop_boundary(confidence in 0.0f64..=1.0, threshold in 0.0f64..=1.0) {
        let guess = BackstopGuess::new(ServiceKind::ReportDraft, None, confidence);
        prop_assert_eq!(gate(&guess, threshold).is_accept(), confidence >= threshold);

        let none = BackstopGuess::new(ServiceKind::None, Some(SectionId::Risks), confidence);
        prop_assert!(!gate(&none, threshold).is_accept());
    }
}
