//! Session Configuration - supplied once at startup
//!
//! The project id is the only required value. Everything else has the
//! defaults the pairing UI expects.

use crate::chain::ChainId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const PROJECT_ID_ENV: &str = "WALLETCONNECT_PROJECT_ID";
pub const PROJECT_ID_ENV_PUBLIC: &str = "NEXT_PUBLIC_WALLETCONNECT_PROJECT_ID";
pub const CONNECT_TIMEOUT_ENV: &str = "WALLET_SESSION_CONNECT_TIMEOUT_SECS";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing project id: set WALLETCONNECT_PROJECT_ID")]
    MissingProjectId,
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Env file: {0}")]
    EnvFile(String),
}

/// What to do with the provider handle when the consumer tears down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Unsubscribe and stop projecting, keep the handle for the next mount.
    #[default]
    Detach,
    /// Same as `close()`: disconnect, drop the handle.
    Destroy,
}

impl TeardownPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownPolicy::Detach => "detach",
            TeardownPolicy::Destroy => "destroy",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "detach" | "keep" => Some(TeardownPolicy::Detach),
            "destroy" | "close" => Some(TeardownPolicy::Destroy),
            _ => None,
        }
    }
}

/// Application metadata shown to the wallet during pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "Wallet Session".into(),
            description: "Wallet session manager".into(),
            url: "http://localhost:3000".into(),
            icons: vec!["https://walletconnect.com/walletconnect-logo.png".into()],
        }
    }
}

/// Provider init options, forwarded verbatim to `ProviderFactory::init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub project_id: String,
    pub optional_chains: Vec<ChainId>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
    pub show_qr_modal: bool,
    pub metadata: AppMetadata,
}

impl ProviderConfig {
    pub fn new(project_id: impl Into<String>) -> Result<Self, ConfigError> {
        let project_id = project_id.into().trim().to_string();
        if project_id.is_empty() {
            return Err(ConfigError::MissingProjectId);
        }
        Ok(Self {
            project_id,
            optional_chains: vec![ChainId::BASE, ChainId::ARBITRUM_ONE, ChainId::OPTIMISM, ChainId::ETHEREUM],
            methods: vec!["eth_sendTransaction".into(), crate::provider::PERSONAL_SIGN.into()],
            events: vec!["chainChanged".into(), "accountsChanged".into()],
            show_qr_modal: true,
            metadata: AppMetadata::default(),
        })
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Session configuration. The binary or embedding app constructs this.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub provider: ProviderConfig,
    /// `None` waits on the remote connect indefinitely.
    pub connect_timeout: Option<Duration>,
    pub teardown: TeardownPolicy,
}

impl SessionConfig {
    pub fn new(project_id: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            provider: ProviderConfig::new(project_id)?,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            teardown: TeardownPolicy::default(),
        })
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = [PROJECT_ID_ENV, PROJECT_ID_ENV_PUBLIC]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingProjectId)?;
        let mut config = Self::new(project_id)?;

        if let Ok(raw) = std::env::var(CONNECT_TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: CONNECT_TIMEOUT_ENV.into(),
                value: raw.clone(),
            })?;
            config.connect_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_chains(mut self, chains: Vec<ChainId>) -> Self { self.provider.optional_chains = chains; self }
    pub fn with_methods(mut self, methods: Vec<String>) -> Self { self.provider.methods = methods; self }
    pub fn with_metadata(mut self, metadata: AppMetadata) -> Self { self.provider.metadata = metadata; self }
    pub fn with_qr_modal(mut self, show: bool) -> Self { self.provider.show_qr_modal = show; self }
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self { self.connect_timeout = Some(timeout); self }
    pub fn without_connect_timeout(mut self) -> Self { self.connect_timeout = None; self }
    pub fn with_teardown(mut self, policy: TeardownPolicy) -> Self { self.teardown = policy; self }
}

/// Load `KEY=VALUE` pairs from an env file. Variables already set win.
/// Returns the number of variables applied.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<usize, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ConfigError::EnvFile(format!("{}: {}", path.as_ref().display(), e)))?;
    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() && !value.is_empty() && std::env::var(key).is_err() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
    }
    Ok(applied)
}
