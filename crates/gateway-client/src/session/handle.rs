//! Embedder-facing session handle

use super::events::{Diagnostic, GatewayEvent};
use crate::bridge::DispatchBridge;
use crate::error::SendError;
use crate::protocol::{Payload, PayloadCodec};
use gateway_cache::CacheExecutionError;
use gateway_core::ConnectionState;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Cheap, cloneable access to a running [`ConnectionSession`](super::ConnectionSession)
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(super) shard: u32,
    pub(super) outbound: mpsc::Sender<Payload>,
    pub(super) events: broadcast::Sender<GatewayEvent>,
    pub(super) diagnostics: broadcast::Sender<Diagnostic>,
    pub(super) bridge: Arc<DispatchBridge>,
    pub(super) state: watch::Receiver<ConnectionState>,
    pub(super) stop: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    #[must_use]
    pub fn shard(&self) -> u32 {
        self.shard
    }

    /// Queue a payload for the gateway
    ///
    /// Queued payloads are written only while the session is connected, each
    /// one after the rate limiter admits it. Heartbeat, identify and resume
    /// are rejected; the session sends those itself.
    pub async fn send(&self, payload: Payload) -> Result<(), SendError> {
        let op = payload.op;
        if op.is_session_managed() {
            return Err(SendError::SessionManaged(op));
        }
        if !op.is_client_op() {
            return Err(SendError::NotClientOp(op));
        }
        PayloadCodec::encode_text(&payload)?;

        if *self.stop.borrow() || self.state().is_terminal() {
            return Err(SendError::Closed);
        }
        self.outbound
            .send(payload)
            .await
            .map_err(|_| SendError::Closed)
    }

    /// Dispatches after they went through the cache, plus state changes
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Dropped frames and sequence anomalies
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Store failures; never fatal to the session
    pub fn cache_errors(&self) -> broadcast::Receiver<CacheExecutionError> {
        self.bridge.cache_errors()
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the session reaches `target`
    ///
    /// Returns `false` if the session ended first without reaching it.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|current| *current == target || current.is_terminal())
            .await
            .is_ok_and(|current| *current == target);
        reached
    }

    /// Ask the session to close the socket and stop
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}
