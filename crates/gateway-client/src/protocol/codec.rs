//! Gateway payload codec
//!
//! Translates between raw JSON frames `{op, d, s, t}` and typed [`Payload`]
//! values. Both directions are pure: no I/O, no blocking.

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload, VoiceStateUpdatePayload,
};
use gateway_core::{Dispatch, GatewayEventType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A typed gateway frame
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Operation code
    pub op: OpCode,
    /// Sequence number (dispatch frames only)
    pub sequence: Option<u64>,
    /// Event name (dispatch frames only)
    pub event_name: Option<String>,
    /// Decoded `d` body; `None` for ops that carry nothing
    pub data: Option<PayloadData>,
}

/// Body of a frame, selected by op code (and event name for dispatches)
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadData {
    Dispatch(Dispatch),
    /// Last sequence seen by the sender
    Heartbeat(Option<u64>),
    Identify(IdentifyPayload),
    PresenceUpdate(PresenceUpdatePayload),
    Resume(ResumePayload),
    VoiceStateUpdate(VoiceStateUpdatePayload),
    RequestGuildMembers(RequestGuildMembersPayload),
    /// Whether the session may be resumed
    InvalidSession(bool),
    Hello(HelloPayload),
}

impl PayloadData {
    /// Op code this body belongs to
    #[must_use]
    pub const fn op(&self) -> OpCode {
        match self {
            Self::Dispatch(_) => OpCode::Dispatch,
            Self::Heartbeat(_) => OpCode::Heartbeat,
            Self::Identify(_) => OpCode::Identify,
            Self::PresenceUpdate(_) => OpCode::PresenceUpdate,
            Self::Resume(_) => OpCode::Resume,
            Self::VoiceStateUpdate(_) => OpCode::VoiceStateUpdate,
            Self::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
            Self::InvalidSession(_) => OpCode::InvalidSession,
            Self::Hello(_) => OpCode::Hello,
        }
    }
}

impl Payload {
    fn control(data: PayloadData) -> Self {
        Self {
            op: data.op(),
            sequence: None,
            event_name: None,
            data: Some(data),
        }
    }

    fn empty(op: OpCode) -> Self {
        Self {
            op,
            sequence: None,
            event_name: None,
            data: None,
        }
    }

    // === Server Frames ===

    /// Create a Dispatch frame (op=0)
    ///
    /// The event name is taken from the dispatch itself.
    #[must_use]
    pub fn dispatch(sequence: u64, dispatch: Dispatch) -> Self {
        Self {
            op: OpCode::Dispatch,
            sequence: Some(sequence),
            event_name: dispatch.event_type().map(|event| event.as_str().to_string()),
            data: Some(PayloadData::Dispatch(dispatch)),
        }
    }

    /// Create a Hello frame (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::control(PayloadData::Hello(HelloPayload::with_interval(
            heartbeat_interval_ms,
        )))
    }

    /// Create a Heartbeat ACK frame (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::empty(OpCode::HeartbeatAck)
    }

    /// Create a Reconnect frame (op=5)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::empty(OpCode::Reconnect)
    }

    /// Create an Invalid Session frame (op=7)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(PayloadData::InvalidSession(resumable))
    }

    // === Client Frames ===

    /// Create a Heartbeat frame (op=1)
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(PayloadData::Heartbeat(last_sequence))
    }

    /// Create an Identify frame (op=2)
    #[must_use]
    pub fn identify(identify: IdentifyPayload) -> Self {
        Self::control(PayloadData::Identify(identify))
    }

    /// Create a Resume frame (op=4)
    #[must_use]
    pub fn resume(resume: ResumePayload) -> Self {
        Self::control(PayloadData::Resume(resume))
    }

    /// Create a Presence Update frame (op=3)
    #[must_use]
    pub fn presence_update(presence: PresenceUpdatePayload) -> Self {
        Self::control(PayloadData::PresenceUpdate(presence))
    }

    /// Create a Voice State Update frame (op=6)
    #[must_use]
    pub fn voice_state_update(voice: VoiceStateUpdatePayload) -> Self {
        Self::control(PayloadData::VoiceStateUpdate(voice))
    }

    /// Create a Request Guild Members frame (op=8)
    #[must_use]
    pub fn request_guild_members(request: RequestGuildMembersPayload) -> Self {
        Self::control(PayloadData::RequestGuildMembers(request))
    }

    /// The dispatch body, if this is a dispatch frame
    #[must_use]
    pub fn as_dispatch(&self) -> Option<&Dispatch> {
        match &self.data {
            Some(PayloadData::Dispatch(dispatch)) => Some(dispatch),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = &self.event_name {
            write!(f, "Payload(op={}, t={t}", self.op)?;
            if let Some(s) = self.sequence {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "Payload(op={})", self.op)
        }
    }
}

/// The envelope exactly as it appears on the wire
#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Frame decoding errors
///
/// Each one concerns a single frame; the session logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Unknown op code: {0}")]
    UnknownOpcode(u8),

    #[error("Dispatch frame without an event name")]
    MissingEventName,

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Missing data for {0}")]
    MissingData(OpCode),

    #[error("Invalid data for {op}{}: {source}", event_suffix(.event))]
    InvalidData {
        op: OpCode,
        event: Option<GatewayEventType>,
        #[source]
        source: serde_json::Error,
    },
}

fn event_suffix(event: &Option<GatewayEventType>) -> String {
    event.map(|event| format!(" {event}")).unwrap_or_default()
}

/// Frame encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Internal event cannot be sent on the wire")]
    InternalEvent,

    #[error("Event name {declared:?} does not match dispatch data {actual}")]
    EventNameMismatch {
        declared: Option<String>,
        actual: GatewayEventType,
    },

    #[error("Data for {data} does not belong to {op}")]
    DataMismatch { op: OpCode, data: OpCode },

    #[error("Missing data for {0}")]
    MissingData(OpCode),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stateless codec for gateway frames
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec;

impl PayloadCodec {
    /// Decode one frame
    ///
    /// Zero bytes is a benign end of stream and yields `Ok(None)`.
    pub fn decode(bytes: &[u8]) -> Result<Option<Payload>, DecodeError> {
        if bytes.is_empty() {
            return Ok(None);
        }

        let raw: RawFrame = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;
        let op = OpCode::try_from(raw.op).map_err(DecodeError::UnknownOpcode)?;
        let d = raw.d.filter(|d| !d.is_null());

        let invalid = |event: Option<GatewayEventType>| {
            move |source| DecodeError::InvalidData { op, event, source }
        };

        let payload = match op {
            OpCode::Dispatch => {
                let name = raw.t.ok_or(DecodeError::MissingEventName)?;
                let event = GatewayEventType::from_name(&name)
                    .ok_or_else(|| DecodeError::UnknownEventType(name.clone()))?;
                // RESUMED and similar events may arrive without a body
                let body = d.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                let dispatch = Dispatch::from_parts(event, body).map_err(invalid(Some(event)))?;

                Payload {
                    op,
                    sequence: raw.s,
                    event_name: Some(name),
                    data: Some(PayloadData::Dispatch(dispatch)),
                }
            }
            OpCode::Reconnect | OpCode::HeartbeatAck => Payload::empty(op),
            OpCode::Heartbeat => {
                let last = d
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(invalid(None))?;
                Payload::heartbeat(last)
            }
            OpCode::InvalidSession => {
                let resumable = d
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(invalid(None))?
                    .unwrap_or(false);
                Payload::invalid_session(resumable)
            }
            _ => {
                let body = d.ok_or(DecodeError::MissingData(op))?;
                let data = Self::decode_control(op, body).map_err(invalid(None))?;
                Payload::control(data)
            }
        };

        Ok(Some(payload))
    }

    fn decode_control(op: OpCode, body: Value) -> serde_json::Result<PayloadData> {
        use serde_json::from_value;

        Ok(match op {
            OpCode::Identify => PayloadData::Identify(from_value(body)?),
            OpCode::PresenceUpdate => PayloadData::PresenceUpdate(from_value(body)?),
            OpCode::Resume => PayloadData::Resume(from_value(body)?),
            OpCode::VoiceStateUpdate => PayloadData::VoiceStateUpdate(from_value(body)?),
            OpCode::RequestGuildMembers => PayloadData::RequestGuildMembers(from_value(body)?),
            OpCode::Hello => PayloadData::Hello(from_value(body)?),
            // Handled by the caller
            OpCode::Dispatch
            | OpCode::Heartbeat
            | OpCode::Reconnect
            | OpCode::InvalidSession
            | OpCode::HeartbeatAck => {
                return Err(serde::de::Error::custom(format!("{op} has no control body")))
            }
        })
    }

    /// Encode one frame as JSON text
    pub fn encode_text(payload: &Payload) -> Result<String, EncodeError> {
        let frame = Self::to_raw(payload)?;
        Ok(serde_json::to_string(&frame)?)
    }

    /// Encode one frame as JSON bytes
    pub fn encode(payload: &Payload) -> Result<Vec<u8>, EncodeError> {
        Self::encode_text(payload).map(String::into_bytes)
    }

    fn to_raw(payload: &Payload) -> Result<RawFrame, EncodeError> {
        let op = payload.op;

        if let Some(data) = &payload.data {
            if data.op() != op {
                return Err(EncodeError::DataMismatch { op, data: data.op() });
            }
        }

        let (d, s, t) = match (&payload.data, op) {
            (Some(PayloadData::Dispatch(dispatch)), _) => {
                let actual = dispatch.event_type().ok_or(EncodeError::InternalEvent)?;
                if payload.event_name.as_deref() != Some(actual.as_str()) {
                    return Err(EncodeError::EventNameMismatch {
                        declared: payload.event_name.clone(),
                        actual,
                    });
                }
                (
                    Some(dispatch.to_value()?),
                    payload.sequence,
                    Some(actual.as_str().to_string()),
                )
            }
            (None, OpCode::Reconnect | OpCode::HeartbeatAck) => (None, None, None),
            (None, _) => return Err(EncodeError::MissingData(op)),
            (Some(data), _) => (Some(Self::control_value(data)?), None, None),
        };

        Ok(RawFrame {
            op: u8::from(op),
            d,
            s,
            t,
        })
    }

    fn control_value(data: &PayloadData) -> serde_json::Result<Value> {
        use serde_json::to_value;

        match data {
            PayloadData::Heartbeat(last) => to_value(last),
            PayloadData::Identify(identify) => to_value(identify),
            PayloadData::PresenceUpdate(presence) => to_value(presence),
            PayloadData::Resume(resume) => to_value(resume),
            PayloadData::VoiceStateUpdate(voice) => to_value(voice),
            PayloadData::RequestGuildMembers(request) => to_value(request),
            PayloadData::InvalidSession(resumable) => to_value(resumable),
            PayloadData::Hello(hello) => to_value(hello),
            PayloadData::Dispatch(dispatch) => dispatch.to_value(),
        }
    }
}
