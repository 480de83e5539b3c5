//! Gateway close codes
//!
//! Application close codes live in `4000..=4999`. Every raw code, known or
//! not, maps to exactly one [`CloseClass`] through [`CloseCode::classify`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    /// A payload arrived before IDENTIFY
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    /// IDENTIFY sent twice on one socket
    AlreadyAuthenticated = 4005,
    SessionInterrupted = 4006,
    /// RESUME carried a sequence the server cannot replay from
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

/// How the client may recover from a close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseClass {
    /// Reconnect and RESUME the existing session
    Resumable,
    /// Reconnect and IDENTIFY from scratch
    NonResumable,
    /// Never retry
    Fatal,
}

impl CloseCode {
    /// First application-defined close code
    pub const APPLICATION_RANGE_START: u16 = 4000;

    const ALL: [Self; 15] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::SessionInterrupted,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimeout,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    pub const fn class(self) -> CloseClass {
        match self {
            Self::InvalidSequence | Self::SessionTimeout => CloseClass::NonResumable,
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseClass::Fatal,
            _ => CloseClass::Resumable,
        }
    }

    /// Recovery class of any raw close code
    ///
    /// Transport codes below 4000 are resumable; unknown application codes
    /// require a fresh session.
    pub fn classify(code: u16) -> CloseClass {
        if code < Self::APPLICATION_RANGE_START {
            return CloseClass::Resumable;
        }
        Self::try_from(code).map_or(CloseClass::NonResumable, Self::class)
    }
}

impl TryFrom<u16> for CloseCode {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, u16> {
        Self::ALL
            .into_iter()
            .find(|code| u16::from(*code) == raw)
            .ok_or(raw)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code as u16
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {self:?}", u16::from(*self))
    }
}
