//! Connection session orchestrator
//!
//! Owns the socket and the `(session_id, sequence)` pair. Inbound frames go
//! codec → sequence tracking → bridge → subscribers; outbound frames go
//! through a per-connection writer task: limiter → codec → socket. Failures are
//! handed to the reconnect policy, which alone decides whether to resume,
//! re-identify or give up.

use super::config::SessionConfig;
use super::events::{Diagnostic, GatewayEvent};
use super::group::ShardGroup;
use super::handle::SessionHandle;
use super::heartbeat::Heartbeat;
use super::sequence::{SequenceAnomaly, SequenceTracker};
use crate::bridge::DispatchBridge;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{
    HelloPayload, IdentifyPayload, OpCode, Payload, PayloadCodec, PayloadData, ResumePayload,
};
use crate::ratelimit::RateLimiter;
use crate::reconnect::{
    GiveUp, NextState, Outcome, ReconnectAttempt, ReconnectContext, SessionFailure,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gateway_cache::SharedStore;
use gateway_core::{ConnectionState, DisconnectReason, Dispatch, GatewayStateChange};
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, trace, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code for a deliberate logout; the server drops the session
const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code used when the session should stay resumable
const RESUME_CLOSE_CODE: u16 = 4000;

/// How long a closing writer gets to flush the close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Writer queue depth per connection
const WRITER_BUFFER: usize = 32;

/// Identity needed to RESUME
#[derive(Debug, Clone)]
struct ResumeInfo {
    session_id: String,
    resume_url: Option<String>,
}

/// How one connection ended
enum Exit {
    Stopped,
    Failed(SessionFailure),
}

/// What woke the connection loop
enum Step {
    Stop,
    Tripped,
    HelloTimeout,
    Beat,
    User(Option<Payload>),
    Frame(Option<Result<Message, tungstenite::Error>>),
}

/// One gateway session, kept alive across reconnects
pub struct ConnectionSession {
    config: SessionConfig,
    shard: u32,
    bridge: Arc<DispatchBridge>,
    limiter: RateLimiter,
    policy: ReconnectContext,
    group: Option<ShardGroup>,
    resume: Option<ResumeInfo>,
    sequence: SequenceTracker,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<GatewayEvent>,
    diagnostics: broadcast::Sender<Diagnostic>,
    user_payloads: mpsc::Receiver<Payload>,
    stop: watch::Receiver<bool>,
    handle: SessionHandle,
}

impl ConnectionSession {
    /// Create a session that applies every dispatch to `store`
    #[must_use]
    pub fn new(config: SessionConfig, store: SharedStore) -> Self {
        let shard = config.shard.index;
        let bridge = Arc::new(DispatchBridge::new(store));
        let limiter = RateLimiter::new(config.rate_limit_capacity, config.rate_limit_period);
        let policy = ReconnectContext::new(config.reconnect);

        let (state, state_rx) = watch::channel(ConnectionState::Connecting);
        let (stop_tx, stop) = watch::channel(false);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (diagnostics, _) = broadcast::channel(config.event_buffer.max(1));
        let (outbound, user_payloads) = mpsc::channel(config.outbound_buffer.max(1));

        let handle = SessionHandle {
            shard,
            outbound,
            events: events.clone(),
            diagnostics: diagnostics.clone(),
            bridge: bridge.clone(),
            state: state_rx,
            stop: Arc::new(stop_tx),
        };

        Self {
            config,
            shard,
            bridge,
            limiter,
            policy,
            group: None,
            resume: None,
            sequence: SequenceTracker::default(),
            state,
            events,
            diagnostics,
            user_payloads,
            stop,
            handle,
        }
    }

    /// Join a shard group
    #[must_use]
    pub fn with_group(mut self, group: ShardGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Observe every retry decision before its backoff starts
    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ReconnectAttempt) + Send + Sync + 'static,
    {
        self.policy = self.policy.on_retry(observer);
        self
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Drive the session until it is stopped or the policy gives up
    #[instrument(name = "gateway_session", skip_all, fields(shard = self.shard))]
    pub async fn run(mut self) -> SessionResult<()> {
        info!(url = %self.config.url, "Starting gateway session");

        loop {
            let failure = if self.group.as_ref().is_some_and(ShardGroup::is_tripped) {
                SessionFailure::PartialDisconnect
            } else {
                match self.connect_once().await {
                    Exit::Stopped => {
                        self.finish_stopped().await;
                        return Ok(());
                    }
                    Exit::Failed(failure) => failure,
                }
            };
            warn!(cause = %failure, "Connection lost");

            let attempt = match self.policy.decide(failure) {
                Outcome::Retry(attempt) => attempt,
                Outcome::GiveUp(give_up) => return Err(self.finish_gave_up(give_up).await),
            };

            if attempt.next_state == NextState::Reconnect {
                self.invalidate_session().await;
            }
            self.set_state(ConnectionState::Reconnecting);
            self.publish_state(GatewayStateChange::RetryStarted {
                iteration: attempt.iteration,
                resume: attempt.next_state == NextState::Resume,
                backoff: attempt.backoff,
            })
            .await;

            if !self.wait_backoff(attempt.backoff).await {
                self.policy.revert(&attempt);
                self.finish_stopped().await;
                return Ok(());
            }
        }
    }

    /// Sleep out a backoff; `false` if stopped first
    async fn wait_backoff(&self, backoff: Duration) -> bool {
        let mut stop = self.stop.clone();
        tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => false,
            () = time::sleep(backoff) => true,
        }
    }

    /// Open one socket and serve it until it fails or the session stops
    async fn connect_once(&mut self) -> Exit {
        let mut stop = self.stop.clone();
        let group = self.group.clone();
        let url = self.connect_url();

        self.set_state(ConnectionState::Connecting);
        debug!(url = %url, resuming = self.resume_payload().is_some(), "Connecting");

        let connecting = time::timeout(self.config.connect_timeout, connect_async(url.as_str()));
        let socket = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => return Exit::Stopped,
            result = connecting => match result {
                Ok(Ok((socket, _))) => socket,
                Ok(Err(error)) => return Exit::Failed(SessionFailure::Transport(error.to_string())),
                Err(_) => {
                    return Exit::Failed(SessionFailure::Transport("connect timed out".to_string()))
                }
            },
        };

        let mut link = Link::spawn(
            socket,
            self.limiter.clone(),
            self.diagnostics.clone(),
            self.shard,
        );
        let mut heartbeat: Option<Heartbeat> = None;

        let hello_deadline = time::sleep(self.config.connect_timeout);
        tokio::pin!(hello_deadline);
        let tripped = async {
            match &group {
                Some(group) => group.tripped().await,
                None => future::pending().await,
            }
        };
        tokio::pin!(tripped);

        let failure = loop {
            let connected = self.state.borrow().is_connected();
            let step = tokio::select! {
                biased;
                _ = stop.wait_for(|stopped| *stopped) => Step::Stop,
                () = &mut tripped => Step::Tripped,
                () = &mut hello_deadline, if heartbeat.is_none() => Step::HelloTimeout,
                () = beat(&mut heartbeat) => Step::Beat,
                message = link.stream.next() => Step::Frame(message),
                payload = self.user_payloads.recv(), if connected => Step::User(payload),
            };

            let result = match step {
                Step::Stop => {
                    link.close(NORMAL_CLOSE_CODE).await;
                    return Exit::Stopped;
                }
                Step::Tripped => Err(SessionFailure::PartialDisconnect),
                Step::HelloTimeout => Err(SessionFailure::Transport(
                    "timed out waiting for HELLO".to_string(),
                )),
                Step::Beat => self.send_heartbeat(&link, &mut heartbeat).await,
                Step::User(Some(payload)) => link.send(payload).await,
                Step::User(None) => Ok(()),
                Step::Frame(message) => self.handle_message(&link, &mut heartbeat, message).await,
            };

            if let Err(failure) = result {
                break failure;
            }
        };

        link.close(RESUME_CLOSE_CODE).await;
        Exit::Failed(failure)
    }

    async fn send_heartbeat(
        &self,
        link: &Link,
        heartbeat: &mut Option<Heartbeat>,
    ) -> Result<(), SessionFailure> {
        if let Some(heartbeat) = heartbeat.as_mut() {
            heartbeat.beat()?;
        }
        trace!(seq = ?self.sequence.last(), "Sending heartbeat");
        link.send(Payload::heartbeat(self.sequence.last())).await
    }

    async fn handle_message(
        &mut self,
        link: &Link,
        heartbeat: &mut Option<Heartbeat>,
        message: Option<Result<Message, tungstenite::Error>>,
    ) -> Result<(), SessionFailure> {
        let bytes = match message {
            None => return Err(SessionFailure::Transport("stream ended".to_string())),
            Some(Err(error)) => return Err(SessionFailure::Transport(error.to_string())),
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((1005, String::new()), |frame| {
                    (u16::from(frame.code), frame.reason.into_owned())
                });
                return Err(SessionFailure::Closed { code, reason });
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => return Ok(()),
        };

        match PayloadCodec::decode(&bytes) {
            Ok(Some(payload)) => self.handle_payload(link, heartbeat, payload).await,
            Ok(None) => {
                trace!("Empty frame");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Dropping undecodable frame");
                self.diagnose(Diagnostic::DecodeFailed {
                    shard: self.shard,
                    error: Arc::new(error),
                });
                Ok(())
            }
        }
    }

    async fn handle_payload(
        &mut self,
        link: &Link,
        heartbeat: &mut Option<Heartbeat>,
        payload: Payload,
    ) -> Result<(), SessionFailure> {
        trace!(payload = %payload, "Received frame");

        match payload.op {
            OpCode::Hello if heartbeat.is_none() => {
                let interval = match payload.data {
                    Some(PayloadData::Hello(hello)) => hello.heartbeat_interval,
                    _ => HelloPayload::DEFAULT_HEARTBEAT_INTERVAL,
                };
                let started = Heartbeat::new(Duration::from_millis(interval));
                debug!(interval_ms = started.period().as_millis() as u64, "Received HELLO");
                *heartbeat = Some(started);
                self.handshake(link).await
            }
            OpCode::Heartbeat => {
                trace!("Server requested a heartbeat");
                link.send(Payload::heartbeat(self.sequence.last())).await
            }
            OpCode::HeartbeatAck => {
                if let Some(latency) = heartbeat.as_mut().and_then(Heartbeat::ack) {
                    trace!(latency_ms = latency.as_millis() as u64, "Heartbeat acknowledged");
                }
                Ok(())
            }
            OpCode::Reconnect => Err(SessionFailure::ReconnectRequested),
            OpCode::InvalidSession => {
                let resumable = matches!(payload.data, Some(PayloadData::InvalidSession(true)));
                Err(SessionFailure::InvalidSession { resumable })
            }
            OpCode::Dispatch => {
                self.handle_dispatch(payload).await;
                Ok(())
            }
            op => {
                debug!(op = %op, "Unexpected frame");
                self.diagnose(Diagnostic::UnexpectedPayload {
                    shard: self.shard,
                    op,
                });
                Ok(())
            }
        }
    }

    /// Send RESUME if a resumable session exists, IDENTIFY otherwise
    async fn handshake(&mut self, link: &Link) -> Result<(), SessionFailure> {
        if let Some(resume) = self.resume_payload() {
            info!(session_id = %resume.session_id, seq = resume.seq, "Resuming session");
            self.set_state(ConnectionState::Resuming);
            return link.send(Payload::resume(resume)).await;
        }

        self.sequence.reset();
        info!(
            shard = %self.config.shard,
            intents = self.config.intents,
            "Identifying"
        );
        self.set_state(ConnectionState::Identifying);
        link.send(Payload::identify(IdentifyPayload {
            token: self.config.token.clone(),
            properties: self.config.properties.clone(),
            shard: Some(self.config.shard),
            intents: self.config.intents,
            presence: self.config.presence.clone(),
        }))
        .await
    }

    async fn handle_dispatch(&mut self, payload: Payload) {
        let sequence = payload.sequence;
        let Some(PayloadData::Dispatch(dispatch)) = payload.data else {
            return;
        };

        if let Some(anomaly) = sequence.and_then(|seq| self.sequence.observe(seq)) {
            let diagnostic = match anomaly {
                SequenceAnomaly::Gap { expected, received } => Diagnostic::SequenceGap {
                    shard: self.shard,
                    expected,
                    received,
                },
                SequenceAnomaly::Regression { last, received } => Diagnostic::SequenceRegression {
                    shard: self.shard,
                    last,
                    received,
                },
            };
            warn!(?anomaly, "Sequence anomaly");
            self.diagnose(diagnostic);
        }

        let confirmed = match &dispatch {
            Dispatch::Ready(ready) => {
                info!(session_id = %ready.session_id, guilds = ready.guilds.len(), "READY");
                self.resume = Some(ResumeInfo {
                    session_id: ready.session_id.clone(),
                    resume_url: ready.resume_gateway_url.clone(),
                });
                true
            }
            Dispatch::Resumed(_) => {
                info!(seq = ?self.sequence.last(), "RESUMED");
                true
            }
            _ => false,
        };

        self.publish(sequence, dispatch).await;

        if confirmed {
            self.set_state(ConnectionState::Connected);
            let attempts = self.policy.reset();
            self.publish_state(GatewayStateChange::Connected).await;
            if attempts > 0 {
                info!(attempts, "Reconnected");
                self.publish_state(GatewayStateChange::RetrySucceeded { attempts })
                    .await;
            }
        }
    }

    /// Drop the session id and sequence; the next connection identifies afresh
    async fn invalidate_session(&mut self) {
        self.sequence.reset();
        if let Some(resume) = self.resume.take() {
            info!(session_id = %resume.session_id, "Session invalidated");
            self.publish_state(GatewayStateChange::SessionInvalidated)
                .await;
        }
    }

    async fn finish_stopped(&mut self) {
        info!("Gateway session stopped");
        self.set_state(ConnectionState::Disconnected);
        self.publish_state(GatewayStateChange::Disconnected {
            reason: DisconnectReason::Stopped,
        })
        .await;
        self.limiter.close();
    }

    async fn finish_gave_up(&mut self, give_up: GiveUp) -> SessionError {
        error!(cause = %give_up, "Gateway session gave up");
        if !matches!(give_up, GiveUp::PartialDisconnect { .. }) {
            if let Some(group) = &self.group {
                group.trip(self.shard);
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.publish_state(GatewayStateChange::Disconnected {
            reason: DisconnectReason::GaveUp(give_up.to_string()),
        })
        .await;
        self.limiter.close();
        SessionError::GiveUp(give_up)
    }

    async fn publish(&self, sequence: Option<u64>, dispatch: Dispatch) {
        let (dispatch, previous) = self.bridge.apply(self.shard, dispatch).await;
        // No subscribers is fine
        let _ = self.events.send(GatewayEvent {
            shard: self.shard,
            sequence,
            dispatch,
            previous,
        });
    }

    async fn publish_state(&self, change: GatewayStateChange) {
        self.publish(None, Dispatch::from(change)).await;
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        let _ = self.diagnostics.send(diagnostic);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "State changed");
        }
    }

    fn resume_payload(&self) -> Option<ResumePayload> {
        let resume = self.resume.as_ref()?;
        Some(ResumePayload {
            token: self.config.token.clone(),
            session_id: resume.session_id.clone(),
            seq: self.sequence.last()?,
        })
    }

    fn connect_url(&self) -> String {
        self.resume
            .as_ref()
            .filter(|_| self.sequence.last().is_some())
            .and_then(|resume| resume.resume_url.clone())
            .unwrap_or_else(|| self.config.url.clone())
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("shard", &self.config.shard)
            .field("state", &*self.state.borrow())
            .field("sequence", &self.sequence.last())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

async fn beat(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => future::pending().await,
    }
}

/// Frames for the writer task
enum Outbound {
    Frame(Payload),
    Close(u16),
}

/// The live socket: read half plus the writer task owning the write half
struct Link {
    stream: SplitStream<Socket>,
    frames: mpsc::Sender<Outbound>,
    writer: JoinHandle<()>,
}

impl Link {
    fn spawn(
        socket: Socket,
        limiter: RateLimiter,
        diagnostics: broadcast::Sender<Diagnostic>,
        shard: u32,
    ) -> Self {
        let (sink, stream) = socket.split();
        let (frames, queue) = mpsc::channel(WRITER_BUFFER);
        let writer = tokio::spawn(write_loop(sink, queue, limiter, diagnostics, shard));
        Self {
            stream,
            frames,
            writer,
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), SessionFailure> {
        self.frames
            .send(Outbound::Frame(payload))
            .await
            .map_err(|_| SessionFailure::Transport("socket writer stopped".to_string()))
    }

    async fn close(mut self, code: u16) {
        if self.frames.send(Outbound::Close(code)).await.is_ok() {
            let _ = time::timeout(CLOSE_TIMEOUT, &mut self.writer).await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut queue: mpsc::Receiver<Outbound>,
    limiter: RateLimiter,
    diagnostics: broadcast::Sender<Diagnostic>,
    shard: u32,
) {
    while let Some(outbound) = queue.recv().await {
        let message = match outbound {
            Outbound::Frame(payload) => {
                let payload = limiter.admit(payload).await;
                match PayloadCodec::encode_text(&payload) {
                    Ok(text) => {
                        trace!(shard, op = %payload.op, "Sending frame");
                        Message::Text(text)
                    }
                    Err(error) => {
                        warn!(shard, op = %payload.op, error = %error, "Dropping unencodable frame");
                        let _ = diagnostics.send(Diagnostic::EncodeFailed {
                            shard,
                            op: payload.op,
                            error: Arc::new(error),
                        });
                        continue;
                    }
                }
            }
            Outbound::Close(code) => {
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: "".into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        };

        if let Err(error) = sink.send(message).await {
            debug!(shard, error = %error, "Socket write failed");
            break;
        }
    }

    let _ = sink.close().await;
}
