//! Types for calibration-constant queries

use std::time::Duration;
use thiserror::Error;

use crate::table::lookup;

/// One calibration constant as reported by the instrument.
///
/// The firmware only ever prints the constant as a decimal string with a
/// handful of significant digits, so `bits` is the single-precision float
/// closest to that text, not necessarily the pattern stored in the
/// instrument. The low mantissa bits may differ.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReading {
    pub id: u32,
    pub decimal_text: String,
    pub value: f64,
    pub bits: u32,
}

impl CalibrationReading {
    /// Parse the instrument's decimal reply and recover the single-precision pattern.
    ///
    /// Returns `None` when the text is not a number.
    pub fn recover(id: u32, decimal_text: &str) -> Option<Self> {
        let value: f64 = decimal_text.trim().parse().ok()?;
        Some(Self {
            id,
            decimal_text: decimal_text.to_string(),
            value,
            bits: (value as f32).to_bits(),
        })
    }

    /// Recovered pattern in big-endian byte order
    pub fn be_bytes(&self) -> [u8; 4] {
        self.bits.to_be_bytes()
    }

    /// Recovered pattern as 8 uppercase hex digits
    pub fn bits_hex(&self) -> String {
        bytes_to_hex(&self.be_bytes())
    }
}

/// Why a calibration id was refused before anything was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidId {
    /// Odd ids are not addressable; constants live on even ids only
    Odd(u32),
    /// Past the last constant in the table
    OutOfRange(u32),
}

impl InvalidId {
    pub fn id(&self) -> u32 {
        match self {
            InvalidId::Odd(id) | InvalidId::OutOfRange(id) => *id,
        }
    }
}

impl std::fmt::Display for InvalidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidId::Odd(_) => write!(f, "const ID must be even"),
            InvalidId::OutOfRange(_) => write!(f, "const ID out of range"),
        }
    }
}

/// Result of a single `CAL_CONST?` query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Reply decoded and accepted
    Reading(CalibrationReading),
    /// Reply decoded, but the `=>` prompt did not follow and the session requires it
    DroppedNoPrompt(CalibrationReading),
    /// Refused locally, nothing was written
    InvalidRequest(InvalidId),
    /// The reply line was not a number, or was cut off by the read timeout
    MalformedReply { id: u32, text: String },
    /// Nothing arrived before the read timeout
    NoReply { id: u32 },
}

impl QueryOutcome {
    /// The reading, if the query produced an accepted one
    pub fn reading(&self) -> Option<&CalibrationReading> {
        match self {
            QueryOutcome::Reading(r) => Some(r),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryOutcome {
    /// One report line, as written by a dump
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryOutcome::Reading(r) => {
                write!(f, "const {}: {}", r.id, r.value)?;
                if let Some(entry) = lookup(r.id) {
                    write!(f, " [{}] {}", entry.function, entry.label)?;
                }
                write!(f, " (raw data possibly {})", r.bits_hex())
            }
            QueryOutcome::DroppedNoPrompt(r) => write!(
                f,
                "const {}: dropped, no prompt after {} (raw data possibly {})",
                r.id,
                r.value,
                r.bits_hex()
            ),
            QueryOutcome::InvalidRequest(invalid) => {
                write!(f, "const {}: skipped, {}", invalid.id(), invalid)
            }
            QueryOutcome::MalformedReply { id, text } => {
                write!(f, "const {}: malformed reply {:?}", id, text)
            }
            QueryOutcome::NoReply { id } => write!(f, "const {}: no reply", id),
        }
    }
}

/// What to do with a decoded reading when the `=>` prompt does not follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptPolicy {
    /// Drop the reading, the instrument may not have finished answering
    #[default]
    Require,
    /// Keep the reading and log a warning
    Tolerate,
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a single line read may block
    pub read_timeout: Duration,
    pub prompt_policy: PromptPolicy,
    /// Abort a dump after this many consecutive queries got no reply at all. 0 disables.
    pub give_up_after: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(3),
            prompt_policy: PromptPolicy::Require,
            give_up_after: 3,
        }
    }
}

/// Per-outcome counts for one dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub recovered: u32,
    pub dropped: u32,
    pub invalid: u32,
    pub malformed: u32,
    pub no_reply: u32,
}

impl DumpSummary {
    pub(crate) fn record(&mut self, outcome: &QueryOutcome) {
        match outcome {
            QueryOutcome::Reading(_) => self.recovered += 1,
            QueryOutcome::DroppedNoPrompt(_) => self.dropped += 1,
            QueryOutcome::InvalidRequest(_) => self.invalid += 1,
            QueryOutcome::MalformedReply { .. } => self.malformed += 1,
            QueryOutcome::NoReply { .. } => self.no_reply += 1,
        }
    }

    /// Number of constants that were queried but not recovered
    pub fn failed(&self) -> u32 {
        self.dropped + self.invalid + self.malformed + self.no_reply
    }
}

/// Errors that abort a session operation
#[derive(Debug, Error)]
pub enum CalError {
    /// Transport layer error (serial port gone, permission lost, etc.)
    #[error("transport error: {0}")]
    Transport(String),
    /// An operation that needs the identification handshake ran before it
    #[error("session not identified, run identify() first")]
    NotIdentified,
    /// Too many queries in a row went unanswered
    #[error("instrument unresponsive: {consecutive} consecutive queries got no reply")]
    Unresponsive { consecutive: u32 },
    /// Writing the dump report failed
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
