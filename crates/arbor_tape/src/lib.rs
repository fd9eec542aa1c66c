//! Session tape for arborist report sessions.
//!
//! A tape is an NDJSON audit log: one [`EnvelopeV1`] per line, with a strictly
//! increasing sequence number. Turn packets and ledger rows are recorded as
//! plain JSON so the tape does not depend on the report crate's types.
//!
//! Spoken text is sensitive. Under the default [`RedactionMode::Hash`] every
//! `utterance`, `payload` and `source_text` string in a recorded value is
//! replaced with a salted blake3 digest before it reaches disk.
//!
//! # Example
//!
//! ```no_run
//! use arbor_tape::{RedactionMode, TapeWriter};
//! use std::path::Path;
//!
//! let path = Path::new("/tmp/session.tape");
//! let tape = TapeWriter::create(path, "session-1", RedactionMode::Hash).unwrap();
//! tape.record_turn(Some("corr-1"), serde_json::json!({"utterance": "DBH 28 in"})).unwrap();
//! tape.finish().unwrap();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Current schema version for event envelopes.
pub const SCHEMA_VERSION: u32 = 1;

/// JSON keys whose string values carry spoken text.
pub const REDACTED_KEYS: &[&str] = &["utterance", "payload", "source_text"];

#[derive(Error, Debug)]
pub enum TapeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed tape line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to acquire lock")]
    LockError,
}

/// One line of a tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeV1 {
    pub schema_version: u32,
    /// Unique identifier for this event (UUID v4)
    pub event_id: String,
    /// Monotonically increasing within the tape, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Groups the events of one turn
    pub correlation_id: Option<String>,
    pub event: TapeEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TapeEvent {
    SessionStarted {
        session_id: String,
        /// Digest of the redaction salt, never the salt itself
        salt_hash: String,
        redaction: RedactionMode,
    },
    TurnRecorded {
        packet: Value,
    },
    LedgerRows {
        rows: Value,
    },
    SessionStopped {
        events: u64,
    },
}

impl TapeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TapeEvent::SessionStarted { .. } => "session_started",
            TapeEvent::TurnRecorded { .. } => "turn_recorded",
            TapeEvent::LedgerRows { .. } => "ledger_rows",
            TapeEvent::SessionStopped { .. } => "session_stopped",
        }
    }
}

/// How spoken text is transformed before recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// Replace with a salted hash (default)
    #[default]
    Hash,
    /// Remove the field entirely
    Omit,
    /// Keep the text as-is (requires explicit opt-in)
    Plaintext,
}

/// Writer for one session tape.
pub struct TapeWriter {
    file: Mutex<BufWriter<File>>,
    seq: AtomicU64,
    redaction: RedactionMode,
    redaction_salt: [u8; 32],
}

impl TapeWriter {
    /// Create (or truncate) the tape at `path` and write `SessionStarted`.
    pub fn create(
        path: &Path,
        session_id: &str,
        redaction: RedactionMode,
    ) -> Result<Self, TapeError> {
        // uuid v4 bytes as the salt source, no extra rng dependency
        let mut salt = [0u8; 32];
        salt[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        salt[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self::create_with_salt(path, session_id, redaction, salt)
    }

    fn create_with_salt(
        path: &Path,
        session_id: &str,
        redaction: RedactionMode,
        redaction_salt: [u8; 32],
    ) -> Result<Self, TapeError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let tape = Self {
            file: Mutex::new(BufWriter::new(file)),
            seq: AtomicU64::new(0),
            redaction,
            redaction_salt,
        };

        let salt_hash = tape.redact_bytes(&tape.redaction_salt);
        tape.emit(
            None,
            TapeEvent::SessionStarted {
                session_id: session_id.to_string(),
                salt_hash,
                redaction,
            },
        )?;
        debug!(path = %path.display(), %session_id, ?redaction, "Tape started");
        Ok(tape)
    }

    pub fn redaction(&self) -> RedactionMode {
        self.redaction
    }

    /// Record a serialized turn packet. Returns the event's sequence number.
    pub fn record_turn(
        &self,
        correlation_id: Option<&str>,
        packet: Value,
    ) -> Result<u64, TapeError> {
        let packet = self.redact_value(packet);
        self.emit(correlation_id, TapeEvent::TurnRecorded { packet })
    }

    /// Record ledger rows appended by a turn.
    pub fn record_ledger_rows(
        &self,
        correlation_id: Option<&str>,
        rows: Value,
    ) -> Result<u64, TapeError> {
        let rows = self.redact_value(rows);
        self.emit(correlation_id, TapeEvent::LedgerRows { rows })
    }

    /// Write `SessionStopped` and flush. Returns the total number of events.
    pub fn finish(self) -> Result<u64, TapeError> {
        let events = self.seq.load(Ordering::SeqCst) + 1;
        self.emit(None, TapeEvent::SessionStopped { events })?;
        Ok(events)
    }

    fn emit(&self, correlation_id: Option<&str>, event: TapeEvent) -> Result<u64, TapeError> {
        let mut file = self.file.lock().map_err(|_| TapeError::LockError)?;
        // seq is taken under the lock so file order matches seq order
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let envelope = EnvelopeV1 {
            schema_version: SCHEMA_VERSION,
            event_id: Uuid::new_v4().to_string(),
            seq,
            timestamp: Utc::now(),
            correlation_id: correlation_id.map(String::from),
            event,
        };

        let json = serde_json::to_string(&envelope)?;
        writeln!(file, "{}", json)?;
        file.flush()?;
        Ok(seq)
    }

    /// Hash a string with the session's salt.
    ///
    /// Returns 16 hex characters (first 8 bytes of the blake3 digest).
    pub fn redact_string(&self, s: &str) -> String {
        self.redact_bytes(s.as_bytes())
    }

    fn redact_bytes(&self, data: &[u8]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.redaction_salt);
        hasher.update(data);
        hasher.finalize().to_hex()[..16].to_string()
    }

    fn redact_value(&self, mut value: Value) -> Value {
        if self.redaction != RedactionMode::Plaintext {
            self.redact_in_place(&mut value);
        }
        value
    }

    fn redact_in_place(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                if self.redaction == RedactionMode::Omit {
                    map.retain(|key, v| {
                        !(REDACTED_KEYS.contains(&key.as_str()) && v.is_string())
                    });
                }
                for (key, v) in map.iter_mut() {
                    match v {
                        Value::String(text) if REDACTED_KEYS.contains(&key.as_str()) => {
                            *text = self.redact_string(text);
                        }
                        other => self.redact_in_place(other),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.redact_in_place(item);
                }
            }
            _ => {}
        }
    }
}

/// Parse every line of a tape. Blank lines are skipped.
pub fn read_tape(path: &Path) -> Result<Vec<EnvelopeV1>, TapeError> {
    let reader = BufReader::new(File::open(path)?);
    let mut envelopes = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = serde_json::from_str(&line).map_err(|source| TapeError::Malformed {
            line: idx + 1,
            source,
        })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}
