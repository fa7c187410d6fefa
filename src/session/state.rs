//! Session state record and the event projector
//!
//! `apply_event` is the only place provider events touch the state. It runs
//! inside a single `watch::Sender::send_modify`, so readers see either the
//! state before an event or after it, never in between.

use crate::chain::ChainId;
use crate::provider::{ProviderEvent, WalletProvider};
use serde::Serialize;
use tracing::{error, info, warn};

/// Link to the wallet. Connected always carries an account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Link {
    #[default]
    Disconnected,
    Connected { account: String, chain_id: Option<ChainId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Disconnected,
    Connecting,
    Connected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Initializing => "initializing",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    /// A provider handle exists.
    pub ready: bool,
    /// Initialization or a connect attempt is in flight.
    pub loading: bool,
    pub link: Link,
    /// Last failure reported on the session (init, connect, malformed payload).
    pub last_error: Option<String>,
    /// Provider events applied so far.
    pub events_applied: u64,
    /// Chain reported while no account was known yet.
    pending_chain: Option<ChainId>,
}

impl SessionState {
    pub fn connected(&self) -> bool { matches!(self.link, Link::Connected { .. }) }

    pub fn account(&self) -> Option<&str> {
        match &self.link {
            Link::Connected { account, .. } => Some(account),
            Link::Disconnected => None,
        }
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        match &self.link {
            Link::Connected { chain_id, .. } => *chain_id,
            Link::Disconnected => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match (self.ready, self.loading, &self.link) {
            (false, true, _) => SessionStatus::Initializing,
            (false, false, _) => SessionStatus::Uninitialized,
            (true, _, Link::Connected { .. }) => SessionStatus::Connected,
            (true, true, Link::Disconnected) => SessionStatus::Connecting,
            (true, false, Link::Disconnected) => SessionStatus::Disconnected,
        }
    }

    /// Back to the disconnected baseline: account, chain and connected cleared together.
    pub fn reset_link(&mut self) {
        self.link = Link::Disconnected;
        self.pending_chain = None;
    }

    pub(crate) fn seed_connected(&mut self, account: String, chain_id: Option<ChainId>) {
        self.link = Link::Connected { account, chain_id };
        self.pending_chain = None;
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let chain_id = self.chain_id();
        SessionSnapshot {
            account: self.account().map(String::from),
            chain_id,
            chain_name: chain_id.and_then(|c| c.name()),
            connected: self.connected(),
            loading: self.loading,
            status: self.status(),
            last_error: self.last_error.clone(),
        }
    }

    fn set_chain(&mut self, chain: ChainId) {
        match &mut self.link {
            Link::Connected { chain_id, .. } => *chain_id = Some(chain),
            Link::Disconnected => self.pending_chain = Some(chain),
        }
    }

    fn known_chain(&self) -> Option<ChainId> {
        self.chain_id().or(self.pending_chain)
    }

    /// Parse a provider chain id. Malformed ids are logged and recorded, never fatal.
    fn parse_chain(&mut self, raw: &str) -> Option<ChainId> {
        match ChainId::from_hex(raw) {
            Ok(chain) => Some(chain),
            Err(e) => {
                error!(chain_id = raw, error = %e, "malformed chain id from provider");
                self.record_error(format!("malformed chain id {:?}: {}", raw, e));
                None
            }
        }
    }
}

/// What the UI renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub account: Option<String>,
    pub chain_id: Option<ChainId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<&'static str>,
    pub connected: bool,
    pub loading: bool,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Synchronous facts read off the handle when an event is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleView {
    pub primary_account: Option<String>,
    pub chain_id: Option<ChainId>,
}

impl HandleView {
    pub fn of(provider: &dyn WalletProvider) -> Self {
        Self { primary_account: provider.primary_account(), chain_id: provider.chain_id() }
    }
}

/// Apply one provider event.
///
/// | Event | Effect |
/// |-------|--------|
/// | connect | chain parsed; connected with the handle's primary account |
/// | disconnect | baseline |
/// | chainChanged | chain only |
/// | accountsChanged | first account becomes active; empty list is a disconnect |
pub fn apply_event(state: &mut SessionState, event: &ProviderEvent, handle: &HandleView) {
    state.events_applied += 1;
    match event {
        ProviderEvent::Connect { chain_id } => {
            let chain = state.parse_chain(chain_id).or_else(|| state.known_chain());
            match &handle.primary_account {
                Some(account) => {
                    info!(account = %account, chain_id = ?chain.map(|c| c.value()), "connect event");
                    state.seed_connected(account.clone(), chain);
                }
                None => {
                    warn!(chain_id = %chain_id, "connect event without an account, waiting for accountsChanged");
                    state.pending_chain = chain;
                }
            }
        }
        ProviderEvent::Disconnect => {
            info!("disconnect event");
            state.reset_link();
        }
        ProviderEvent::ChainChanged(raw) => {
            if let Some(chain) = state.parse_chain(raw) {
                info!(chain_id = chain.value(), "chainChanged event");
                state.set_chain(chain);
            }
        }
        ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
            Some(first) => {
                info!(account = %first, count = accounts.len(), "accountsChanged event");
                match &mut state.link {
                    Link::Connected { account, .. } => *account = first.clone(),
                    Link::Disconnected => {
                        let chain = state.pending_chain.or(handle.chain_id);
                        state.seed_connected(first.clone(), chain);
                    }
                }
            }
            None => {
                info!("accountsChanged with no accounts, treating as disconnect");
                state.reset_link();
            }
        },
    }
}
