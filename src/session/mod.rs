//! Session - owns one provider handle and projects its events into state
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──ok──▶ Disconnected ◀──────────┐
//!                                      │   └──ok, resumed──▶ Connected         │
//!                                      └──err──▶ Uninitialized (retryable)      │
//! Disconnected ──connect()──▶ Connecting ──connect event──▶ Connected ──────────┤
//!                                  └──reject / timeout / cancel──▶ Disconnected │
//! Connected ──disconnect() / disconnect event / empty accounts──────────────────┘
//! ```
//!
//! # Operations
//!
//! | Method | Preconditions | Effect |
//! |--------|---------------|--------|
//! | `initialize` | none (idempotent) | create handle, subscribe, seed resumed session |
//! | `connect` | ready, not loading, not connected | remote connect; state filled by events |
//! | `cancel_connect` | connect in flight | abort the wait, back to baseline |
//! | `disconnect` | connected | remote disconnect; local reset regardless |
//! | `sign_message` | connected | `personal_sign [message, account]` |
//! | `request` | connected, method configured | raw provider request |
//! | `detach` | none | drop subscription (or close, per `TeardownPolicy`) |
//! | `close` | none | disconnect if connected, drop handle |

mod projector;
mod state;

pub use state::{apply_event, HandleView, Link, SessionSnapshot, SessionState, SessionStatus};

use crate::config::{ConfigError, SessionConfig, TeardownPolicy};
use crate::provider::{ProviderError, ProviderFactory, RequestArguments, WalletProvider};
use projector::Projection;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Cannot sign an empty message")]
    EmptyMessage,
    #[error("Method not enabled for this session: {0}")]
    MethodNotAllowed(String),
    #[error("No connected session")]
    NotConnected,
}

/// Result of a `connect()` call. State fields are still filled by events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The remote connect settled; the connect event carries the account.
    Settled,
    AlreadyConnected,
    /// No handle, or initialization still running.
    NotReady,
    /// Another connect is in flight.
    Busy,
    /// Rejected, transport error, timeout or cancel. State is back at baseline.
    Failed(ProviderError),
}

struct Attached {
    provider: Arc<dyn WalletProvider>,
    projection: Option<Projection>,
}

struct Inner {
    config: SessionConfig,
    factory: Arc<dyn ProviderFactory>,
    handle: Mutex<Option<Attached>>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: Notify,
}

/// Clears `loading` when a connect attempt ends, including when its future is dropped.
struct LoadingGuard<'a>(&'a watch::Sender<SessionState>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.loading = false);
    }
}

/// Session context. Clone it to share; all clones drive the same handle.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, factory: Arc<dyn ProviderFactory>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                handle: Mutex::new(None),
                state: Arc::new(state),
                cancel: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig { &self.inner.config }

    pub fn state(&self) -> SessionState { self.inner.state.borrow().clone() }
    pub fn snapshot(&self) -> SessionSnapshot { self.inner.state.borrow().snapshot() }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> { self.inner.state.subscribe() }

    /// Wait until the state satisfies `pred`, returning that state.
    pub async fn wait_for(&self, mut pred: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        rx.wait_for(|s| pred(s)).await.map(|state| state.clone()).unwrap_or_else(|_| self.state())
    }

    /// Create the provider handle once. Later calls return immediately, or
    /// re-subscribe on the existing handle after `detach()`.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let mut slot = self.inner.handle.lock().await;
        if let Some(attached) = slot.as_mut() {
            if attached.projection.is_none() {
                info!("re-attaching to existing wallet provider");
                attached.projection = Some(Projection::spawn(&attached.provider, &self.inner.state));
                self.sync_from_handle(attached.provider.as_ref());
            } else {
                debug!("wallet provider already initialized");
            }
            return Ok(());
        }

        self.inner.state.send_modify(|s| s.loading = true);
        let _loading = LoadingGuard(&self.inner.state);
        info!(project_id = %self.inner.config.provider.project_id, "initializing wallet provider");

        match self.inner.factory.init(&self.inner.config.provider).await {
            Ok(provider) => {
                // Subscribe before the handle becomes visible to other callers.
                let projection = Projection::spawn(&provider, &self.inner.state);
                self.inner.state.send_modify(|s| {
                    s.ready = true;
                    s.last_error = None;
                });
                self.sync_from_handle(provider.as_ref());
                *slot = Some(Attached { provider, projection: Some(projection) });
                info!("wallet provider initialized");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to initialize wallet provider");
                self.inner.state.send_modify(|s| s.record_error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Seed from the handle's snapshot: a live session with accounts is connected.
    fn sync_from_handle(&self, provider: &dyn WalletProvider) {
        let accounts = provider.accounts();
        match accounts.first() {
            Some(account) if provider.has_session() => {
                let chain_id = provider.chain_id();
                info!(account = %account, chain_id = ?chain_id.map(|c| c.value()), "found existing session");
                self.inner.state.send_modify(|s| s.seed_connected(account.clone(), chain_id));
            }
            _ => self.inner.state.send_modify(|s| s.reset_link()),
        }
    }

    async fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.inner.handle.lock().await.as_ref().map(|a| a.provider.clone())
    }

    async fn attached_provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.inner
            .handle
            .lock()
            .await
            .as_ref()
            .filter(|a| a.projection.is_some())
            .map(|a| a.provider.clone())
    }

    /// Start pairing. Returns once the remote connect settles; account and
    /// chain arrive through the connect event, not through this call.
    pub async fn connect(&self) -> ConnectOutcome {
        // Registered before the gate: a cancel issued while Connecting is never missed.
        let cancelled = self.inner.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        let mut gate = ConnectOutcome::Settled;
        self.inner.state.send_if_modified(|s| {
            if !s.ready {
                gate = ConnectOutcome::NotReady;
            } else if s.loading {
                gate = ConnectOutcome::Busy;
            } else if s.connected() {
                gate = ConnectOutcome::AlreadyConnected;
            } else {
                s.loading = true;
                return true;
            }
            false
        });
        match gate {
            ConnectOutcome::Settled => {}
            ConnectOutcome::AlreadyConnected => {
                info!("already connected");
                return gate;
            }
            _ => {
                warn!(outcome = ?gate, "provider not ready or still loading");
                return gate;
            }
        }
        let _loading = LoadingGuard(&self.inner.state);

        // A detached handle has no projector to receive the connect event.
        let Some(provider) = self.attached_provider().await else {
            warn!("wallet provider detached or gone; initialize() before connecting");
            return ConnectOutcome::NotReady;
        };

        info!("connecting wallet");
        let attempt = async {
            match self.inner.config.connect_timeout {
                Some(limit) => tokio::time::timeout(limit, provider.connect())
                    .await
                    .unwrap_or_else(|_| Err(ProviderError::Timeout(limit.as_millis() as u64))),
                None => provider.connect().await,
            }
        };
        let result = tokio::select! {
            r = attempt => r,
            _ = &mut cancelled => Err(ProviderError::Cancelled),
        };

        match result {
            Ok(()) => {
                info!("connect settled");
                ConnectOutcome::Settled
            }
            Err(e) => {
                warn!(error = %e, "failed to connect wallet");
                self.inner.state.send_modify(|s| {
                    s.reset_link();
                    s.record_error(e.to_string());
                });
                ConnectOutcome::Failed(e)
            }
        }
    }

    /// Abort an in-flight `connect()`. No effect if none is running.
    pub fn cancel_connect(&self) {
        self.inner.cancel.notify_waiters();
    }

    /// End the session. Local state is reset even if the remote call fails.
    /// Returns `Ok(false)` when there was nothing to disconnect.
    pub async fn disconnect(&self) -> Result<bool, SessionError> {
        if !self.inner.state.borrow().connected() {
            debug!("disconnect with no connected session");
            return Ok(false);
        }
        let Some(provider) = self.provider().await else {
            return Ok(false);
        };

        info!("disconnecting wallet");
        let result = provider.disconnect().await;
        self.inner.state.send_modify(|s| s.reset_link());
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(error = %e, "failed to disconnect wallet");
                self.inner.state.send_modify(|s| s.record_error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Sign with the active account. `Ok(None)` when there is no handle or
    /// no connected account; provider failures come back as errors.
    pub async fn sign_message(&self, message: &str) -> Result<Option<String>, SessionError> {
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let account = self.inner.state.borrow().account().map(String::from);
        let (Some(account), Some(provider)) = (account, self.provider().await) else {
            warn!("cannot sign message: provider or account not available");
            return Ok(None);
        };

        match provider.request(RequestArguments::personal_sign(message, &account)).await {
            Ok(Value::String(signature)) => {
                info!(account = %account, "message signed");
                Ok(Some(signature))
            }
            Ok(other) => {
                error!(result = %other, "unexpected signature payload");
                Err(ProviderError::Transport(format!("unexpected signature payload: {}", other)).into())
            }
            Err(e) => {
                error!(error = %e, "failed to sign message");
                Err(e.into())
            }
        }
    }

    /// Forward a request for one of the configured methods.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, SessionError> {
        if !self.inner.config.provider.allows_method(method) {
            return Err(SessionError::MethodNotAllowed(method.to_string()));
        }
        if !self.inner.state.borrow().connected() {
            return Err(SessionError::NotConnected);
        }
        let provider = self.provider().await.ok_or(SessionError::NotConnected)?;
        debug!(method, "provider request");
        Ok(provider.request(RequestArguments::new(method, params)).await?)
    }

    /// Consumer teardown. Under `Detach` the handle survives for the next
    /// `initialize()`; under `Destroy` this is `close()`.
    pub async fn detach(&self) {
        if self.inner.config.teardown == TeardownPolicy::Destroy {
            self.close().await;
            return;
        }
        let mut slot = self.inner.handle.lock().await;
        if let Some(projection) = slot.as_mut().and_then(|a| a.projection.take()) {
            drop(projection);
            info!("cleaned up wallet provider listeners");
        }
    }

    /// Tear the handle down completely. The next `initialize()` creates a new one.
    pub async fn close(&self) {
        let attached = self.inner.handle.lock().await.take();
        let Some(Attached { provider, projection }) = attached else {
            return;
        };
        drop(projection);
        if self.inner.state.borrow().connected() {
            if let Err(e) = provider.disconnect().await {
                warn!(error = %e, "remote disconnect failed during close");
            }
        }
        self.inner.state.send_modify(|s| *s = SessionState::default());
        info!("wallet provider closed");
    }

    pub async fn is_attached(&self) -> bool {
        self.inner.handle.lock().await.as_ref().is_some_and(|a| a.projection.is_some())
    }
}
