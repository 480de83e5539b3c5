//! Gateway op codes
//!
//! The op code is the `op` field of every frame and decides how `d` is read.
//! Each code also has a fixed direction; the session uses that to reject user
//! payloads the server would never accept.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the socket may send a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client
    Inbound,
    /// Client to server
    Outbound,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    Resume = 4,
    /// Server asks the client to drop the socket and resume
    Reconnect = 5,
    VoiceStateUpdate = 6,
    /// `d` tells whether the session can still be resumed
    InvalidSession = 7,
    RequestGuildMembers = 8,
    /// First frame on every socket; carries the heartbeat interval
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    pub const fn direction(self) -> Direction {
        match self {
            Self::Heartbeat => Direction::Both,
            Self::Identify
            | Self::PresenceUpdate
            | Self::Resume
            | Self::VoiceStateUpdate
            | Self::RequestGuildMembers => Direction::Outbound,
            Self::Dispatch
            | Self::Reconnect
            | Self::InvalidSession
            | Self::Hello
            | Self::HeartbeatAck => Direction::Inbound,
        }
    }

    /// May the client send this code at all
    pub const fn is_client_op(self) -> bool {
        !matches!(self.direction(), Direction::Inbound)
    }

    /// Control frames the session writes itself; never accepted from users
    pub const fn is_session_managed(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Identify | Self::Resume)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "DISPATCH",
            Self::Heartbeat => "HEARTBEAT",
            Self::Identify => "IDENTIFY",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::Resume => "RESUME",
            Self::Reconnect => "RECONNECT",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::InvalidSession => "INVALID_SESSION",
            Self::RequestGuildMembers => "REQUEST_GUILD_MEMBERS",
            Self::Hello => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}

impl TryFrom<u8> for OpCode {
    /// The unrecognised raw value
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        Ok(match raw {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::Resume,
            5 => Self::Reconnect,
            6 => Self::VoiceStateUpdate,
            7 => Self::InvalidSession,
            8 => Self::RequestGuildMembers,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(other),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name(), u8::from(*self))
    }
}
