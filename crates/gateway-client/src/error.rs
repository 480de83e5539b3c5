//! Session error types

use crate::protocol::{EncodeError, OpCode};
use crate::reconnect::GiveUp;
use thiserror::Error;

/// Why [`ConnectionSession::run`](crate::ConnectionSession::run) ended
/// without being stopped
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The reconnect policy gave up; wraps the original cause
    #[error("Session gave up: {0}")]
    GiveUp(#[from] GiveUp),
}

/// Rejected [`SessionHandle::send`](crate::SessionHandle::send) calls
#[derive(Debug, Error)]
pub enum SendError {
    /// Heartbeat, identify and resume are produced by the session itself
    #[error("{0} is managed by the session")]
    SessionManaged(OpCode),

    /// The op code is only ever sent by the server
    #[error("{0} cannot be sent by a client")]
    NotClientOp(OpCode),

    /// The payload cannot be serialised
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The session has ended
    #[error("Session closed")]
    Closed,
}

/// Session result type
pub type SessionResult<T> = Result<T, SessionError>;
