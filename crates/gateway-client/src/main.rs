//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables. The process runs the
//! one shard named by `SHARD_INDEX`/`SHARD_COUNT`; Ctrl-C stops it gracefully.

use anyhow::Context;
use gateway_cache::InMemoryStore;
use gateway_client::{ConnectionSession, Diagnostic, SessionConfig};
use gateway_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Gateway client failed: {e:#}");
        error!(error = %format!("{e:#}"), "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.env,
        url = %config.gateway.url,
        shard = config.shard.index,
        shards = config.shard.count,
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let session = ConnectionSession::new(SessionConfig::from(&config), store.clone());
    let handle = session.handle();

    let mut events = handle.subscribe();
    let mut diagnostics = handle.diagnostics();
    let mut cache_errors = handle.cache_errors();

    let mut running = tokio::spawn(session.run());

    loop {
        tokio::select! {
            result = &mut running => {
                let stats = store.stats();
                info!(guilds = stats.guilds, channels = stats.channels, "Final cache state");
                return result
                    .context("Session task panicked")?
                    .context("Gateway session ended");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                handle.stop();
            }
            event = events.recv() => match event {
                Ok(event) => debug!(
                    seq = ?event.sequence,
                    event = event.dispatch.event_type().map_or("STATE_CHANGE", |t| t.as_str()),
                    replaced = event.previous.is_some(),
                    "Event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event consumer lagging"),
                Err(RecvError::Closed) => {}
            },
            diagnostic = diagnostics.recv() => {
                if let Ok(Diagnostic::DecodeFailed { error, .. }) = diagnostic {
                    warn!(error = %error, "Frame dropped");
                }
            }
            failure = cache_errors.recv() => {
                if let Ok(failure) = failure {
                    warn!(error = %failure, "Cache update failed");
                }
            }
        }
    }
}
