//! # Telemetry Module
//!
//! Installs the `tracing` subscriber shared by the `chatmem` and
//! `chatmem_viewer` binaries.
//!
//! ## Usage
//!
//! ```no_run
//! use chatmem_server::telemetry;
//!
//! telemetry::init_logging(telemetry::LoggingInit {
//!     log_level: "info".into(),
//!     log_format: "json".into(), // "text" for human-readable output
//! }).unwrap();
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Parameters for logging initialization.
#[derive(Debug, Clone)]
pub struct LoggingInit {
    /// Log level filter string (e.g. "info", "chatmem_extraction=debug,info").
    /// `RUST_LOG` takes precedence when set.
    pub log_level: String,
    /// Log format: "json" for structured JSON, "text" for human-readable.
    pub log_format: String,
}

impl LoggingInit {
    /// Level and format from the `[logging]` config section, with `verbose`
    /// raising the level to `debug`.
    pub fn from_config(config: &chatmem_config::LoggingConfig, verbose: bool) -> Self {
        Self {
            log_level: if verbose {
                "debug".to_string()
            } else {
                config.level.clone()
            },
            log_format: config.format.clone(),
        }
    }

    fn use_json(&self) -> bool {
        self.log_format == "json"
    }
}

/// Initialize the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(init: LoggingInit) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&init.log_level));

    // Exactly one of json or text is Some.
    let (json_layer, text_layer) = if init.use_json() {
        let json = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false);
        (Some(json), None)
    } else {
        let text = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false);
        (None, Some(text))
    };

    // `Option<Layer>` is itself a Layer (no-op when None).
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!(
        log_level = init.log_level.as_str(),
        log_format = init.log_format.as_str(),
        "Logging initialized"
    );
    Ok(())
}
