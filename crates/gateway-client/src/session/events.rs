//! What a session publishes

use crate::protocol::{DecodeError, EncodeError, OpCode};
use gateway_cache::PreviousState;
use gateway_core::Dispatch;
use std::sync::Arc;

/// A dispatch after it went through the cache
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub shard: u32,
    /// Wire sequence; `None` for state changes
    pub sequence: Option<u64>,
    pub dispatch: Dispatch,
    /// What the cache held before this dispatch was applied
    pub previous: Option<PreviousState>,
}

/// Per-frame problems that never end a session
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// An inbound frame was dropped
    DecodeFailed { shard: u32, error: Arc<DecodeError> },
    /// An outbound frame was dropped
    EncodeFailed {
        shard: u32,
        op: OpCode,
        error: Arc<EncodeError>,
    },
    /// Sequence numbers were skipped
    SequenceGap {
        shard: u32,
        expected: u64,
        received: u64,
    },
    /// A sequence number went backwards
    SequenceRegression { shard: u32, last: u64, received: u64 },
    /// A frame that is valid on the wire but not in the current state
    UnexpectedPayload { shard: u32, op: OpCode },
}

impl Diagnostic {
    #[must_use]
    pub const fn shard(&self) -> u32 {
        match self {
            Self::DecodeFailed { shard, .. }
            | Self::EncodeFailed { shard, .. }
            | Self::SequenceGap { shard, .. }
            | Self::SequenceRegression { shard, .. }
            | Self::UnexpectedPayload { shard, .. } => *shard,
        }
    }
}
