//! Wallet Session: one remote wallet session, projected into UI-safe state.
//!
//! # Architecture
//!
//! ```text
//! SessionManager (context object, clone to share)
//!   │
//!   ├── Lifecycle controller
//!   │     ├── initialize() → ProviderFactory::init(ProviderConfig) → handle (once)
//!   │     ├── connect() / cancel_connect() / disconnect()
//!   │     ├── sign_message() / request()
//!   │     └── detach() / close()
//!   │
//!   └── Projector (one task per subscription)
//!         provider ──ProviderEvent──▶ mpsc ──apply_event──▶ watch<SessionState>
//!                                                             │
//!                                                             ▼
//!                                         UI: snapshot() / subscribe() / wait_for()
//! ```
//!
//! # Events
//!
//! | Event | Payload | Effect |
//! |-------|---------|--------|
//! | `connect` | `{chainId: "0x1"}` | connected with the handle's primary account |
//! | `disconnect` | none | baseline |
//! | `chainChanged` | `"0x2105"` | chain only |
//! | `accountsChanged` | `["0x…"]` | first account active; empty is a disconnect |
//!
//! # Features
//!
//! - `simulated` (default) - in-memory wallet provider for tests and the CLI
//!
//! # Usage
//!
//! ```ignore
//! use wallet_session::{SessionConfig, SessionManager, SimulatedFactory, SimulatedProvider};
//! use std::sync::Arc;
//!
//! let config = SessionConfig::from_env()?;
//! let factory = Arc::new(SimulatedFactory::new(Arc::new(SimulatedProvider::new())));
//! let session = SessionManager::new(config, factory);
//!
//! session.initialize().await?;
//! session.connect().await;
//! let state = session.wait_for(|s| s.connected()).await;
//! let signature = session.sign_message("hello").await?;
//! ```

pub mod chain;
pub mod config;
pub mod logging;
pub mod provider;
pub mod session;

pub use chain::{ChainId, ChainIdError};
pub use config::{load_env_file, AppMetadata, ConfigError, ProviderConfig, SessionConfig, TeardownPolicy};
pub use provider::{
    EventKind, ProviderError, ProviderEvent, ProviderFactory, RequestArguments, SubscriptionId, WalletProvider,
};
#[cfg(feature = "simulated")]
pub use provider::{ConnectBehavior, SimulatedFactory, SimulatedProvider};
pub use session::{ConnectOutcome, Link, SessionError, SessionManager, SessionSnapshot, SessionState, SessionStatus};
