//! Logging - tracing subscriber setup for the binary and embedding apps

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_JSON_ENV: &str = "WALLET_SESSION_LOG_JSON";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_JSON_ENV).as_deref() {
            Ok("1") | Ok("true") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `default_level`.
/// A second call is a no-op.
pub fn init_logging_with(format: LogFormat, default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

pub fn init_logging() {
    init_logging_with(LogFormat::from_env(), "info");
}
