//! Scoped-update merge engine with hybrid service routing for arborist
//! inspection reports.
//!
//! Free-form turns arrive one at a time. A turn either supplies report data
//! (segmented by section, extracted by an external collaborator, filtered and
//! merged into the canonical [`ReportState`] with a [`ProvenanceLedger`] row
//! for every decision) or requests a service (routed deterministically, with a
//! confidence-gated backstop).
//!
//! # Example
//!
//! ```
//! use arbor_report::{merge, MergeMeta, MergePolicy, ProvenanceLedger, ReportState, SectionId, UpdateEnvelope};
//! use arbor_ids::TurnId;
//!
//! let envelope = UpdateEnvelope::new().with_scalar("tree_description.dbh_in", "28 in");
//! let meta = MergeMeta::new(TurnId::new(), SectionId::TreeDescription);
//! let outcome = merge(
//!     &ReportState::new(),
//!     &ProvenanceLedger::new(),
//!     Some(&envelope),
//!     MergePolicy::PreferExisting,
//!     &meta,
//! );
//! assert_eq!(outcome.applied_paths, vec!["tree_description.dbh_in"]);
//! ```

pub mod backstop;
pub mod collab;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod envelope;
pub mod fields;
pub mod guard;
pub mod merge;
pub mod prefilter;
pub mod provenance;
pub mod router;
pub mod section;
pub mod segment;
pub mod sentinel;
pub mod state;
pub mod usage;

pub use backstop::{gate, BackstopGuess, GateDecision, DEFAULT_BACKSTOP_THRESHOLD};
pub use collab::{
    BackstopClassifier, Classification, CollaboratorError, Extraction, ExtractionMode,
    ExtractionRequest, Extractor, NullExtractor, OfflineClassifier,
};
pub use config::{ConfigError, EngineConfig, DEFAULT_UNDO_DEPTH, MAX_UNDO_DEPTH};
pub use context::ReportContext;
pub use coordinator::{
    ClarifyReason, Coordinator, IntentParseError, RoutedTo, RouterTrace, SegmentReport,
    SegmentStatus, SessionSnapshot, TurnIntent, TurnPacket, TurnResult,
};
pub use envelope::{DropReason, DroppedKey, UpdateEnvelope, UpdateValue};
pub use fields::{FieldKind, FieldSpec, FIELDS};
pub use guard::is_context_edit;
pub use merge::{merge, MergeOutcome, MergePolicy, MergeStatus, PolicyParseError};
pub use prefilter::{Prefilter, PrefilterConfig, PrefilterStep};
pub use provenance::{MergeMeta, ProvenanceEvent, ProvenanceLedger, Recorded, NOT_FOUND};
pub use router::{classify, Route, ServiceKind, ServiceParseError};
pub use section::{SectionId, SectionParseError};
pub use segment::{segment, segment_or_cursor, Segment};
pub use sentinel::{Scalar, NOT_PROVIDED};
pub use state::ReportState;
pub use usage::{TokenLedger, TokenUsage};
