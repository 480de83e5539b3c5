//! Subscriber installation
//!
//! `RUST_LOG` wins when set; otherwise the configured level plus directives
//! form the filter.

use crate::config::Environment;
use tracing::Level;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// How log lines are filtered and rendered
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Base level when `RUST_LOG` is not set
    pub level: Level,
    /// Extra filter directives, e.g. `tokio_tungstenite=warn`
    pub directives: Vec<String>,
    /// One JSON object per line instead of the human format
    pub json: bool,
    /// Log span open and close, which shows each connection attempt
    pub span_events: bool,
    pub file_line: bool,
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            directives: vec!["tungstenite=warn".to_string()],
            json: false,
            span_events: false,
            file_line: true,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Debug level with span events
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            thread_names: true,
            ..Self::default()
        }
    }

    /// JSON lines at info
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            file_line: false,
            ..Self::default()
        }
    }

    /// Pick the preset matching the deployment environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::production(),
            Environment::Staging => Self::default(),
            Environment::Development => Self::development(),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        self.directives
            .iter()
            .try_fold(EnvFilter::new(self.level.to_string()), |filter, directive| {
                directive
                    .parse()
                    .map(|directive| filter.add_directive(directive))
                    .map_err(|source| TracingError::InvalidDirective {
                        directive: directive.clone(),
                        source,
                    })
            })
    }
}

/// Install the default subscriber
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install a subscriber built from `config`
///
/// Later calls report `AlreadyInitialized` and leave the first one in place.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = config.env_filter()?;

    let fmt_layer = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_thread_names(config.thread_names)
        .with_span_events(if config.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };

    result.map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("A global subscriber is already installed")]
    AlreadyInitialized,

    #[error("Invalid filter directive {directive:?}: {source}")]
    InvalidDirective {
        directive: String,
        #[source]
        source: ParseError,
    },
}
