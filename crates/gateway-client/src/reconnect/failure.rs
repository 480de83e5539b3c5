//! Session failures and their classification

use crate::protocol::{CloseClass, CloseCode};

/// Abnormal closure: the socket went away without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Why a live session ended
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFailure {
    /// Server closed the socket with a close frame
    #[error("closed with code {code}: {reason}")]
    Closed { code: u16, reason: String },

    /// Server sent op 5
    #[error("server requested reconnect")]
    ReconnectRequested,

    /// Server sent op 7
    #[error("invalid session (resumable: {resumable})")]
    InvalidSession { resumable: bool },

    /// A heartbeat went unacknowledged for a full interval
    #[error("heartbeat not acknowledged")]
    HeartbeatTimeout,

    /// Socket error, unexpected end of stream, or handshake timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Another shard in the same group gave up
    #[error("sibling shard disconnected")]
    PartialDisconnect,
}

/// Recovery class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClassification {
    /// Never retried
    Fatal(u16),
    /// Recoverable with RESUME
    ResumableClose(u16),
    /// Needs a full re-identify
    NonResumableClose(u16),
    /// A sibling already failed; this session must not resume on its own
    PartialFailure,
}

impl FailureClassification {
    /// Close code the classification was derived from
    #[must_use]
    pub const fn code(self) -> Option<u16> {
        match self {
            Self::Fatal(code) | Self::ResumableClose(code) | Self::NonResumableClose(code) => {
                Some(code)
            }
            Self::PartialFailure => None,
        }
    }
}

impl SessionFailure {
    /// Map the failure onto the fixed close-code table
    #[must_use]
    pub fn classify(&self) -> FailureClassification {
        match self {
            Self::Closed { code, .. } => match CloseCode::classify(*code) {
                CloseClass::Resumable => FailureClassification::ResumableClose(*code),
                CloseClass::NonResumable => FailureClassification::NonResumableClose(*code),
                CloseClass::Fatal => FailureClassification::Fatal(*code),
            },
            Self::ReconnectRequested | Self::HeartbeatTimeout | Self::Transport(_) => {
                FailureClassification::ResumableClose(ABNORMAL_CLOSURE)
            }
            Self::InvalidSession { resumable: true } => {
                FailureClassification::ResumableClose(ABNORMAL_CLOSURE)
            }
            Self::InvalidSession { resumable: false } => {
                FailureClassification::NonResumableClose(u16::from(CloseCode::SessionTimeout))
            }
            Self::PartialDisconnect => FailureClassification::PartialFailure,
        }
    }
}
