//! Gateway protocol definitions
//!
//! Op codes, close codes, control payloads, and the frame codec.

mod close_codes;
mod codec;
mod opcodes;
mod payloads;

pub use close_codes::{CloseClass, CloseCode};
pub use codec::{DecodeError, EncodeError, Payload, PayloadCodec, PayloadData};
pub use opcodes::{Direction, OpCode};
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload, VoiceStateUpdatePayload,
};
