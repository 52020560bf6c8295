use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output for terminals.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Name stamped on the startup event so multi-service logs are
    /// attributable.
    pub service: String,
    /// Fallback filter directive when `RUST_LOG` is unset,
    /// e.g. "info" or "fb_ledger=debug,warn".
    pub default_level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            default_level: "info".to_string(),
            format: LogFormat::Text,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured default level. Safe to call more than
/// once; only the first call installs a subscriber, the rest are no-ops,
/// which keeps per-test initialization harmless.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    let installed = match config.format {
        LogFormat::Text => builder
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            service = %config.service,
            format = ?config.format,
            "logging initialised"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
