//! Provider - the remote wallet connection the session drives
//!
//! The pairing transport itself lives behind these traits. A provider pushes
//! lifecycle events onto every subscribed channel in delivery order; the
//! session's projector is the single consumer of its own subscription.
//!
//! # Boundary
//!
//! | Call | Kind | Description |
//! |------|------|-------------|
//! | `ProviderFactory::init` | async | Build a handle from `ProviderConfig` |
//! | `connect` | async | Start pairing; settles when the wallet answers |
//! | `disconnect` | async | End the remote session |
//! | `request` | async | JSON-RPC style `{method, params}` |
//! | `subscribe` / `unsubscribe` | sync | Attach/detach an event channel |
//! | `has_session` / `accounts` / `chain_id` | sync | Snapshot accessors |

mod event;
#[cfg(feature = "simulated")]
mod simulated;

pub use event::{EventKind, ProviderEvent};
#[cfg(feature = "simulated")]
pub use simulated::{ConnectBehavior, SimulatedFactory, SimulatedProvider};

use crate::chain::ChainId;
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const PERSONAL_SIGN: &str = "personal_sign";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";

/// Sending half of an event subscription.
pub type EventSink = mpsc::UnboundedSender<ProviderEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider init failed: {0}")]
    Init(String),
    #[error("Rejected by wallet: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Timed out after {0}ms")]
    Timeout(u64),
    #[error("Cancelled")]
    Cancelled,
    #[error("Unsupported method: {0}")]
    Unsupported(String),
}

/// JSON-RPC request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RequestArguments {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self { method: method.into(), params }
    }

    /// `personal_sign` takes `[message, address]`.
    pub fn personal_sign(message: &str, account: &str) -> Self {
        Self::new(PERSONAL_SIGN, vec![Value::from(message), Value::from(account)])
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connect(&self) -> Result<(), ProviderError>;
    async fn disconnect(&self) -> Result<(), ProviderError>;
    async fn request(&self, args: RequestArguments) -> Result<Value, ProviderError>;

    fn subscribe(&self, sink: EventSink) -> SubscriptionId;
    /// Returns false if the id was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// True when a remote session is live (possibly restored from storage).
    fn has_session(&self) -> bool;
    fn accounts(&self) -> Vec<String>;
    fn chain_id(&self) -> Option<ChainId>;

    fn primary_account(&self) -> Option<String> {
        self.accounts().into_iter().next()
    }
}

#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn init(&self, config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn personal_sign_params_order() {
        let args = RequestArguments::personal_sign("hello", "0xabc");
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({"method": "personal_sign", "params": ["hello", "0xabc"]})
        );
    }

    #[test]
    fn request_params_default_empty() {
        let args: RequestArguments = serde_json::from_value(json!({"method": "eth_chainId"})).unwrap();
        assert!(args.params.is_empty());
    }
}
