//! Session Integration Tests
//!
//! Each test drives a real `ConnectionSession` against a scripted mock
//! gateway on a random local port. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test session_tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_cache::PreviousState;
use gateway_client::reconnect::{FailureClassification, NextState};
use gateway_client::{
    Diagnostic, GiveUp, OpCode, Payload, ReconnectAttempt, ReconnectConfig, SendError,
    SessionError,
};
use gateway_client::protocol::PresenceUpdatePayload;
use gateway_core::{
    ConnectionState, DisconnectReason, Dispatch, GatewayStateChange, Snowflake, UserStatus,
};
use integration_tests::*;

fn is_state(event: &gateway_client::GatewayEvent, change: &GatewayStateChange) -> bool {
    matches!(&event.dispatch, Dispatch::GatewayStateChange(c) if c == change)
}

// ============================================================================
// Handshake and cache
// ============================================================================

#[tokio::test]
async fn test_identify_ready_dispatch_reaches_cache() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    let identify = handshake(&mut connection, "session-1", None, &[100])
        .await
        .unwrap();

    assert_eq!(identify.token, TEST_TOKEN);
    assert_eq!(identify.intents, TEST_INTENTS);
    assert_eq!(identify.shard.map(|s| (s.index, s.count)), Some((0, 1)));

    wait_for_event(&mut events, |e| is_state(e, &GatewayStateChange::Connected))
        .await
        .unwrap();
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(store.current_user().map(|u| u.username), Some("testbot".to_string()));
    assert!(store.is_unavailable(Snowflake::new(100)));

    connection.dispatch(2, guild_create(100, "Test Guild")).await.unwrap();
    connection
        .dispatch(3, Dispatch::ChannelUpdate(text_channel(101, 100, "renamed")))
        .await
        .unwrap();

    let update = wait_for_event(&mut events, |e| e.sequence == Some(3)).await.unwrap();
    match update.previous {
        Some(PreviousState::Channel(previous)) => {
            assert_eq!(previous.name.as_deref(), Some("general"));
        }
        other => panic!("expected previous channel, got {other:?}"),
    }

    assert_eq!(store.guild(Snowflake::new(100)).map(|g| g.name), Some("Test Guild".to_string()));
    assert!(!store.is_unavailable(Snowflake::new(100)));
    assert_eq!(
        store.channel(Snowflake::new(101)).and_then(|c| c.name),
        Some("renamed".to_string())
    );

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_closes_normally_and_invalidates_cache() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    handshake(&mut connection, "session-1", None, &[]).await.unwrap();
    connection.dispatch(2, guild_create(200, "Doomed")).await.unwrap();
    wait_for_event(&mut events, |e| e.sequence == Some(2)).await.unwrap();
    assert!(store.guild(Snowflake::new(200)).is_some());

    handle.stop();

    assert_eq!(connection.expect_close().await.unwrap(), Some(1000));
    running.await.unwrap().unwrap();

    let disconnected = wait_for_event(&mut events, |e| {
        matches!(
            e.dispatch,
            Dispatch::GatewayStateChange(GatewayStateChange::Disconnected { .. })
        )
    })
    .await
    .unwrap();
    assert_eq!(disconnected.sequence, None);

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(store.guild(Snowflake::new(200)).is_none());
    assert!(store.channel(Snowflake::new(201)).is_none());
    assert!(store.current_user().is_none());

    assert!(matches!(
        handle.send(Payload::presence_update(PresenceUpdatePayload::new(UserStatus::Idle))).await,
        Err(SendError::Closed)
    ));
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test]
async fn test_resumable_close_resumes_immediately() {
    let mut gateway = MockGateway::start().await.unwrap();
    let attempts: Arc<Mutex<Vec<ReconnectAttempt>>> = Arc::default();
    let seen = Arc::clone(&attempts);

    let (session, _store) = test_session(test_config(&gateway));
    let session = session.on_retry(move |attempt| seen.lock().unwrap().push(attempt.clone()));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let running = tokio::spawn(session.run());

    let mut first = gateway.accept().await.unwrap();
    handshake(&mut first, "session-r", Some(gateway.url()), &[])
        .await
        .unwrap();
    first.dispatch(2, guild_create(300, "Resumed Guild")).await.unwrap();
    wait_for_event(&mut events, |e| e.sequence == Some(2)).await.unwrap();

    first.close(4000, "unknown error").await.unwrap();

    let mut second = gateway.accept().await.unwrap();
    second.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    let resume = second.expect_resume().await.unwrap();
    assert_eq!(resume.session_id, "session-r");
    assert_eq!(resume.seq, 2);
    assert_eq!(resume.token, TEST_TOKEN);

    second
        .dispatch(3, Dispatch::Resumed(gateway_core::ResumedEvent {}))
        .await
        .unwrap();
    wait_for_event(&mut events, |e| {
        is_state(e, &GatewayStateChange::RetrySucceeded { attempts: 1 })
    })
    .await
    .unwrap();

    {
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].iteration, 0);
        assert_eq!(attempts[0].next_state, NextState::Resume);
        assert_eq!(attempts[0].backoff, Duration::ZERO);
        assert_eq!(attempts[0].failure, FailureClassification::ResumableClose(4000));
    }

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fatal_close_gives_up_without_retry() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, _store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    connection.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    connection.expect_identify().await.unwrap();
    connection.close(4004, "authentication failed").await.unwrap();

    let result = tokio::time::timeout(STEP_TIMEOUT, running)
        .await
        .unwrap()
        .unwrap();
    match result {
        Err(SessionError::GiveUp(GiveUp::Fatal { code, .. })) => assert_eq!(code, 4004),
        other => panic!("expected fatal give up, got {other:?}"),
    }

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(gateway
        .accept_within(Duration::from_millis(200))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let running = tokio::spawn(session.run());

    let mut first = gateway.accept().await.unwrap();
    handshake(&mut first, "session-old", None, &[]).await.unwrap();
    first.dispatch(2, guild_create(400, "Stale")).await.unwrap();
    wait_for_event(&mut events, |e| e.sequence == Some(2)).await.unwrap();

    first.send(&Payload::invalid_session(false)).await.unwrap();

    wait_for_event(&mut events, |e| is_state(e, &GatewayStateChange::SessionInvalidated))
        .await
        .unwrap();
    assert!(store.guild(Snowflake::new(400)).is_none());

    let mut second = gateway.accept().await.unwrap();
    handshake(&mut second, "session-new", None, &[]).await.unwrap();
    wait_for_event(&mut events, |e| is_state(e, &GatewayStateChange::Connected))
        .await
        .unwrap();

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unacked_heartbeat_reconnects() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, _store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    let mut first = gateway.accept().await.unwrap();
    first.hello(50).await.unwrap();
    first.expect_identify().await.unwrap();
    first
        .dispatch(1, ready("session-hb", None, &[]))
        .await
        .unwrap();

    // First beat is acknowledged, the second is not
    let beat = first.recv_payload().await.unwrap();
    assert_eq!(beat.op, OpCode::Heartbeat);
    first.send(&Payload::heartbeat_ack()).await.unwrap();
    let beat = first.recv_payload().await.unwrap();
    assert_eq!(beat.op, OpCode::Heartbeat);

    let mut second = gateway.accept().await.unwrap();
    second.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    let resume = second.expect_resume().await.unwrap();
    assert_eq!(resume.session_id, "session-hb");

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_during_backoff_cancels_the_retry() {
    let mut gateway = MockGateway::start().await.unwrap();
    let attempts: Arc<Mutex<Vec<ReconnectAttempt>>> = Arc::default();
    let seen = Arc::clone(&attempts);

    let config = test_config(&gateway).with_reconnect(
        ReconnectConfig::default()
            .with_backoff(Duration::from_secs(2), Duration::from_secs(4))
            .with_max_retries(5),
    );
    let (session, _store) = test_session(config);
    let session = session.on_retry(move |attempt| seen.lock().unwrap().push(attempt.clone()));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    handshake(&mut connection, "session-b", None, &[]).await.unwrap();
    wait_for_event(&mut events, |e| is_state(e, &GatewayStateChange::Connected))
        .await
        .unwrap();

    // Invalid sequence forces a fresh session, which always waits out a backoff
    connection.close(4007, "invalid seq").await.unwrap();
    let retry = wait_for_event(&mut events, |e| {
        matches!(
            e.dispatch,
            Dispatch::GatewayStateChange(GatewayStateChange::RetryStarted { .. })
        )
    })
    .await
    .unwrap();
    let Dispatch::GatewayStateChange(GatewayStateChange::RetryStarted { backoff, resume, .. }) =
        retry.dispatch
    else {
        unreachable!()
    };
    assert!(!resume);
    assert!(backoff >= Duration::from_millis(500));
    assert_eq!(handle.state(), ConnectionState::Reconnecting);

    handle.stop();

    // Returns well before the backoff would have elapsed
    tokio::time::timeout(Duration::from_millis(400), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    wait_for_event(&mut events, |e| {
        is_state(
            e,
            &GatewayStateChange::Disconnected {
                reason: DisconnectReason::Stopped,
            },
        )
    })
    .await
    .unwrap();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(!handle.wait_for_state(ConnectionState::Connected).await);
    assert_eq!(attempts.lock().unwrap().len(), 1);
    assert!(gateway
        .accept_within(Duration::from_millis(200))
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Outbound and diagnostics
// ============================================================================

#[tokio::test]
async fn test_user_payloads_flow_only_when_connected() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, _store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    assert!(matches!(
        handle.send(Payload::heartbeat(None)).await,
        Err(SendError::SessionManaged(OpCode::Heartbeat))
    ));
    assert!(matches!(
        handle.send(Payload::hello(1000)).await,
        Err(SendError::NotClientOp(OpCode::Hello))
    ));

    // Queued before the handshake; must not overtake IDENTIFY
    handle
        .send(Payload::presence_update(PresenceUpdatePayload::new(UserStatus::Dnd)))
        .await
        .unwrap();

    let mut connection = gateway.accept().await.unwrap();
    handshake(&mut connection, "session-out", None, &[]).await.unwrap();
    assert!(handle.wait_for_state(ConnectionState::Connected).await);

    let presence = connection.recv_non_heartbeat().await.unwrap();
    assert_eq!(presence.op, OpCode::PresenceUpdate);

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bad_frames_are_skipped() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let mut diagnostics = handle.diagnostics();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    handshake(&mut connection, "session-bad", None, &[]).await.unwrap();

    connection.send_raw("{not json").await.unwrap();
    connection
        .send_raw(r#"{"op":0,"d":{},"s":2,"t":"SOMETHING_NEW"}"#)
        .await
        .unwrap();
    connection.dispatch(3, guild_create(500, "Still Here")).await.unwrap();

    wait_for_event(&mut events, |e| e.sequence == Some(3)).await.unwrap();
    assert!(store.guild(Snowflake::new(500)).is_some());
    assert_eq!(handle.state(), ConnectionState::Connected);

    let mut decode_failures = 0;
    while let Ok(diagnostic) = diagnostics.try_recv() {
        if matches!(diagnostic, Diagnostic::DecodeFailed { .. }) {
            decode_failures += 1;
        }
    }
    assert_eq!(decode_failures, 2);

    handle.stop();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_empty_frame_keeps_the_connection() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (session, store) = test_session(test_config(&gateway));
    let handle = session.handle();
    let mut events = handle.subscribe();
    let mut diagnostics = handle.diagnostics();
    let running = tokio::spawn(session.run());

    let mut connection = gateway.accept().await.unwrap();
    handshake(&mut connection, "session-empty", None, &[]).await.unwrap();
    assert!(handle.wait_for_state(ConnectionState::Connected).await);

    connection.send_raw("").await.unwrap();
    connection.dispatch(2, guild_create(600, "After Empty")).await.unwrap();

    wait_for_event(&mut events, |e| e.sequence == Some(2)).await.unwrap();
    assert!(store.guild(Snowflake::new(600)).is_some());
    assert_eq!(handle.state(), ConnectionState::Connected);
    while let Ok(diagnostic) = diagnostics.try_recv() {
        assert!(
            !matches!(diagnostic, Diagnostic::DecodeFailed { .. }),
            "unexpected {diagnostic:?}"
        );
    }
    assert!(gateway
        .accept_within(Duration::from_millis(200))
        .await
        .unwrap()
        .is_none());

    handle.stop();
    assert_eq!(connection.expect_close().await.unwrap(), Some(1000));
    running.await.unwrap().unwrap();
}
