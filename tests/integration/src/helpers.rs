//! Test helpers for integration tests
//!
//! Provides a scripted mock gateway on a random local port and utilities for
//! driving a session against it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use gateway_cache::InMemoryStore;
use gateway_client::protocol::{IdentifyPayload, ResumePayload};
use gateway_client::{
    ConnectionSession, GatewayEvent, OpCode, Payload, PayloadCodec, PayloadData,
    ReconnectConfig, SessionConfig,
};
use gateway_core::{Dispatch, ShardInfo};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::fixtures::{TEST_INTENTS, TEST_TOKEN};

/// Upper bound on every wait in a test
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat interval long enough to stay out of the way
pub const QUIET_HEARTBEAT_MS: u64 = 45_000;

/// Local WebSocket server handing out accepted connections
pub struct MockGateway {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Bind to a random port and start accepting
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, connections) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(socket) = accept_async(stream).await else {
                    continue;
                };
                if tx.send(MockConnection { socket }).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            addr,
            connections,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the client to connect
    pub async fn accept(&mut self) -> Result<MockConnection> {
        self.accept_within(STEP_TIMEOUT)
            .await?
            .ok_or_else(|| anyhow!("no connection within {STEP_TIMEOUT:?}"))
    }

    /// Wait up to `wait` for a connection; `None` if the client never came
    pub async fn accept_within(&mut self, wait: Duration) -> Result<Option<MockConnection>> {
        match tokio::time::timeout(wait, self.connections.recv()).await {
            Ok(Some(connection)) => Ok(Some(connection)),
            Ok(None) => bail!("mock gateway listener stopped"),
            Err(_) => Ok(None),
        }
    }
}

/// What the client sent
#[derive(Debug)]
pub enum ClientFrame {
    Payload(Payload),
    Closed(Option<u16>),
}

/// Server side of one client connection
pub struct MockConnection {
    socket: WebSocketStream<TcpStream>,
}

impl MockConnection {
    pub async fn send(&mut self, payload: &Payload) -> Result<()> {
        let text = PayloadCodec::encode_text(payload)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Send raw text, bypassing the codec
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.socket.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    pub async fn dispatch(&mut self, sequence: u64, dispatch: Dispatch) -> Result<()> {
        self.send(&Payload::dispatch(sequence, dispatch)).await
    }

    pub async fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&Payload::hello(heartbeat_interval_ms)).await
    }

    /// Close from the server side with `code`
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.socket.close(Some(frame)).await?;
        Ok(())
    }

    /// Next frame from the client
    pub async fn recv(&mut self) -> Result<ClientFrame> {
        loop {
            let message = tokio::time::timeout(STEP_TIMEOUT, self.socket.next())
                .await
                .context("timed out waiting for the client")?;

            match message {
                None => return Ok(ClientFrame::Closed(None)),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => {
                    let payload = PayloadCodec::decode(text.as_bytes())?
                        .ok_or_else(|| anyhow!("empty frame from client"))?;
                    return Ok(ClientFrame::Payload(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(ClientFrame::Closed(frame.map(|f| u16::from(f.code))))
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Next payload, failing if the client closed instead
    pub async fn recv_payload(&mut self) -> Result<Payload> {
        match self.recv().await? {
            ClientFrame::Payload(payload) => Ok(payload),
            ClientFrame::Closed(code) => bail!("client closed with {code:?}"),
        }
    }

    /// Next payload that is not a heartbeat
    pub async fn recv_non_heartbeat(&mut self) -> Result<Payload> {
        loop {
            let payload = self.recv_payload().await?;
            if payload.op != OpCode::Heartbeat {
                return Ok(payload);
            }
        }
    }

    pub async fn expect_identify(&mut self) -> Result<IdentifyPayload> {
        let payload = self.recv_non_heartbeat().await?;
        match payload.data {
            Some(PayloadData::Identify(identify)) => Ok(identify),
            _ => bail!("expected IDENTIFY, got {payload}"),
        }
    }

    pub async fn expect_resume(&mut self) -> Result<ResumePayload> {
        let payload = self.recv_non_heartbeat().await?;
        match payload.data {
            Some(PayloadData::Resume(resume)) => Ok(resume),
            _ => bail!("expected RESUME, got {payload}"),
        }
    }

    /// Read until the client closes; returns its close code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let ClientFrame::Closed(code) = self.recv().await? {
                return Ok(code);
            }
        }
    }
}

/// Session config pointing at the mock gateway with fast backoff
pub fn test_config(gateway: &MockGateway) -> SessionConfig {
    SessionConfig::new(gateway.url(), TEST_TOKEN)
        .with_intents(TEST_INTENTS)
        .with_shard(ShardInfo::single())
        .with_connect_timeout(Duration::from_secs(2))
        .with_reconnect(
            ReconnectConfig::default()
                .with_backoff(Duration::from_millis(10), Duration::from_millis(50))
                .with_max_retries(5),
        )
}

/// A session over a fresh in-memory store
pub fn test_session(config: SessionConfig) -> (ConnectionSession, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let session = ConnectionSession::new(config, store.clone());
    (session, store)
}

/// Receive events until one matches
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<GatewayEvent>,
    mut predicate: F,
) -> Result<GatewayEvent>
where
    F: FnMut(&GatewayEvent) -> bool,
{
    tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            let event = events.recv().await?;
            if predicate(&event) {
                return Ok(event);
            }
        }
    })
    .await
    .context("timed out waiting for event")?
}

/// Full handshake on a fresh connection: HELLO, IDENTIFY, READY
pub async fn handshake(
    connection: &mut MockConnection,
    session_id: &str,
    resume_url: Option<String>,
    guilds: &[u64],
) -> Result<IdentifyPayload> {
    connection.hello(QUIET_HEARTBEAT_MS).await?;
    let identify = connection.expect_identify().await?;
    connection
        .dispatch(1, crate::fixtures::ready(session_id, resume_url, guilds))
        .await?;
    Ok(identify)
}
