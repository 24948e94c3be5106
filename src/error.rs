// src/error.rs
use crate::types::TimeOffset;
use std::fmt;
use std::io;
use thiserror::Error;

/// Protocol phase of a streaming session, attached to session failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Header,
    Stream,
    Sync,
    Trigger,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configure => "configure",
            Phase::Header => "header",
            Phase::Stream => "stream",
            Phase::Sync => "sync",
            Phase::Trigger => "trigger",
            Phase::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PdwError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed binary block: {0}")]
    Framing(String),

    #[error("Truncated binary block: expected {expected} payload bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("Record {record} references waveform index {index}, but the index holds {available} entries")]
    InvalidReference { record: usize, index: u32, available: usize },

    #[error("Record {record} starts at {current}, before the previous record at {previous}")]
    Ordering { record: usize, previous: TimeOffset, current: TimeOffset },

    #[error("Duplicate waveform name: {0}")]
    DuplicateWaveform(String),

    #[error("Waveform index is finalized, cannot append {0}")]
    IndexFrozen(String),

    #[error("Instrument rejected PDW header: expected {expected:?}, received {received:?}")]
    HeaderRejected { expected: String, received: String },

    #[error("Transport error: {0}")]
    Transport(io::Error),

    #[error("Timed out waiting for response to {0:?}")]
    Timeout(String),

    #[error("Synchronization barrier {query:?} answered {response:?}")]
    SyncRejected { query: String, response: String },

    #[error("Instrument error {code}: {message}")]
    InstrumentReported { code: i32, message: String },

    #[error("Malformed PDW file: {0}")]
    MalformedFile(String),

    #[error("Invalid waveform {name}: {reason}")]
    InvalidWaveform { name: String, reason: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Instrument worker closed")]
    Closed,

    #[error("Session failed in {phase} phase: {source}")]
    Session {
        phase: Phase,
        #[source]
        source: Box<PdwError>,
    },
}

impl PdwError {
    /// Classify an I/O error raised while talking to the instrument.
    ///
    /// Read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
    pub(crate) fn from_transport(err: io::Error, awaiting: &str) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                PdwError::Timeout(awaiting.to_string())
            }
            _ => PdwError::Transport(err),
        }
    }

    pub(crate) fn in_phase(self, phase: Phase) -> Self {
        PdwError::Session {
            phase,
            source: Box::new(self),
        }
    }

    /// The protocol phase a session failure occurred in
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PdwError::Session { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The underlying error, looking through session context
    pub fn root(&self) -> &PdwError {
        match self {
            PdwError::Session { source, .. } => source.root(),
            other => other,
        }
    }

    /// Nothing in this crate is retried automatically. Instrument state after
    /// a failed exchange cannot be assumed, so every kind reports `false`.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

pub type Result<T> = std::result::Result<T, PdwError>;
