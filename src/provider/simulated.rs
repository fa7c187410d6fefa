//! SimulatedProvider - in-memory wallet for tests and the CLI demo
//!
//! Behaves like a paired mobile wallet: connect approves (or rejects, or
//! never answers), events fan out to every subscriber in order, and
//! `personal_sign` returns a deterministic signature.

use super::{EventSink, ProviderError, ProviderEvent, ProviderFactory, RequestArguments, SubscriptionId, WalletProvider, PERSONAL_SIGN, ETH_SEND_TRANSACTION};
use crate::chain::ChainId;
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How the wallet answers `connect()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Approve { accounts: Vec<String>, chain_id: ChainId },
    Reject(String),
    Fail(String),
    /// Never settles; the session's timeout or cancel must end it.
    Hang,
}

impl ConnectBehavior {
    pub fn approve(account: impl Into<String>, chain_id: ChainId) -> Self {
        ConnectBehavior::Approve { accounts: vec![account.into()], chain_id }
    }
}

struct SimState {
    subscribers: BTreeMap<SubscriptionId, EventSink>,
    next_id: u64,
    session: bool,
    accounts: Vec<String>,
    chain_id: Option<ChainId>,
    connect: ConnectBehavior,
    fail_disconnect: bool,
    reject_sign: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    requests: Vec<RequestArguments>,
}

pub struct SimulatedProvider {
    state: Mutex<SimState>,
}

impl Default for SimulatedProvider {
    fn default() -> Self { Self::new() }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                subscribers: BTreeMap::new(),
                next_id: 1,
                session: false,
                accounts: Vec::new(),
                chain_id: None,
                connect: ConnectBehavior::approve("0xABCDEF0123456789ABCDEF0123456789ABCDEF01", ChainId::ETHEREUM),
                fail_disconnect: false,
                reject_sign: false,
                connect_calls: 0,
                disconnect_calls: 0,
                requests: Vec::new(),
            }),
        }
    }

    /// Pretend a session was restored from persisted storage.
    pub fn with_session(self, accounts: Vec<String>, chain_id: ChainId) -> Self {
        {
            let mut s = self.lock();
            s.session = true;
            s.accounts = accounts;
            s.chain_id = Some(chain_id);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) { self.lock().connect = behavior; }
    pub fn set_fail_disconnect(&self, fail: bool) { self.lock().fail_disconnect = fail; }
    pub fn set_reject_sign(&self, reject: bool) { self.lock().reject_sign = reject; }

    pub fn connect_calls(&self) -> usize { self.lock().connect_calls }
    pub fn disconnect_calls(&self) -> usize { self.lock().disconnect_calls }
    pub fn subscriber_count(&self) -> usize { self.lock().subscribers.len() }
    pub fn requests(&self) -> Vec<RequestArguments> { self.lock().requests.clone() }

    /// Deliver an event to every live subscriber. Returns how many received it.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        let mut s = self.lock();
        s.subscribers.retain(|_, sink| sink.send(event.clone()).is_ok());
        s.subscribers.len()
    }

    /// Deliver an event from its wire form. `None` if the payload doesn't decode.
    pub fn emit_wire(&self, name: &str, payload: &Value) -> Option<usize> {
        let event = ProviderEvent::from_wire(name, payload)?;
        Some(self.emit(event))
    }

    /// Wallet-side account switch.
    pub fn set_accounts(&self, accounts: Vec<String>) -> usize {
        {
            let mut s = self.lock();
            s.session = !accounts.is_empty();
            s.accounts = accounts.clone();
        }
        self.emit(ProviderEvent::AccountsChanged(accounts))
    }

    /// Wallet-side network switch.
    pub fn switch_chain(&self, chain_id: ChainId) -> usize {
        self.lock().chain_id = Some(chain_id);
        self.emit(ProviderEvent::ChainChanged(chain_id.to_hex()))
    }

    /// Wallet ends the session from its side.
    pub fn end_session(&self) -> usize {
        {
            let mut s = self.lock();
            s.session = false;
            s.accounts.clear();
        }
        self.emit(ProviderEvent::Disconnect)
    }

    fn signature(account: &str, message: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(account.as_bytes());
        hasher.update(message.as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    /// What the simulated wallet returns for `personal_sign(message)` by `account`.
    pub fn expected_signature(account: &str, message: &str) -> String {
        Self::signature(account, message)
    }
}

#[async_trait]
impl WalletProvider for SimulatedProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        let behavior = {
            let mut s = self.lock();
            s.connect_calls += 1;
            s.connect.clone()
        };
        match behavior {
            ConnectBehavior::Approve { accounts, chain_id } => {
                {
                    let mut s = self.lock();
                    s.session = true;
                    s.accounts = accounts;
                    s.chain_id = Some(chain_id);
                }
                self.emit(ProviderEvent::Connect { chain_id: chain_id.to_hex() });
                Ok(())
            }
            ConnectBehavior::Reject(reason) => Err(ProviderError::Rejected(reason)),
            ConnectBehavior::Fail(reason) => Err(ProviderError::Transport(reason)),
            ConnectBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        {
            let mut s = self.lock();
            s.disconnect_calls += 1;
            if s.fail_disconnect {
                return Err(ProviderError::Transport("relay unreachable".into()));
            }
            s.session = false;
            s.accounts.clear();
        }
        self.emit(ProviderEvent::Disconnect);
        Ok(())
    }

    async fn request(&self, args: RequestArguments) -> Result<Value, ProviderError> {
        let mut s = self.lock();
        s.requests.push(args.clone());
        if !s.session {
            return Err(ProviderError::Transport("no active session".into()));
        }
        match args.method.as_str() {
            PERSONAL_SIGN => {
                if s.reject_sign {
                    return Err(ProviderError::Rejected("user rejected signature".into()));
                }
                let message = args.params.first().and_then(Value::as_str).unwrap_or_default();
                let account = args.params.get(1).and_then(Value::as_str).unwrap_or_default();
                if !s.accounts.iter().any(|a| a.eq_ignore_ascii_case(account)) {
                    return Err(ProviderError::Transport(format!("unknown account {}", account)));
                }
                Ok(json!(Self::signature(account, message)))
            }
            ETH_SEND_TRANSACTION => {
                let body = serde_json::to_string(&args.params).unwrap_or_default();
                Ok(json!(Self::signature("tx", &body)))
            }
            "eth_chainId" => Ok(json!(s.chain_id.map(|c| c.to_hex()))),
            "eth_accounts" => Ok(json!(s.accounts)),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }

    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        let mut s = self.lock();
        let id = SubscriptionId(s.next_id);
        s.next_id += 1;
        s.subscribers.insert(id, sink);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    fn has_session(&self) -> bool { self.lock().session }
    fn accounts(&self) -> Vec<String> { self.lock().accounts.clone() }
    fn chain_id(&self) -> Option<ChainId> { self.lock().chain_id }
}

/// Factory handing out one shared `SimulatedProvider`.
pub struct SimulatedFactory {
    provider: Arc<SimulatedProvider>,
    init_calls: AtomicUsize,
    fail_next: Mutex<Option<String>>,
    last_config: Mutex<Option<ProviderConfig>>,
    init_delay: Option<Duration>,
}

impl SimulatedFactory {
    pub fn new(provider: Arc<SimulatedProvider>) -> Self {
        Self {
            provider,
            init_calls: AtomicUsize::new(0),
            fail_next: Mutex::new(None),
            last_config: Mutex::new(None),
            init_delay: None,
        }
    }

    /// Slow init down so callers can race it.
    pub fn with_init_delay(mut self, delay: Duration) -> Self { self.init_delay = Some(delay); self }

    /// Make the next `init` fail with a transport-style error.
    pub fn fail_next_init(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.into());
    }

    pub fn provider(&self) -> Arc<SimulatedProvider> { self.provider.clone() }
    pub fn init_calls(&self) -> usize { self.init_calls.load(Ordering::SeqCst) }
    pub fn last_config(&self) -> Option<ProviderConfig> {
        self.last_config.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ProviderFactory for SimulatedFactory {
    async fn init(&self, config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, ProviderError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_next.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(ProviderError::Init(reason));
        }
        *self.last_config.lock().unwrap_or_else(|p| p.into_inner()) = Some(config.clone());
        Ok(self.provider.clone() as Arc<dyn WalletProvider>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn approve_emits_connect_to_subscribers() {
        let provider = SimulatedProvider::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        provider.subscribe(tx);
        provider.set_connect_behavior(ConnectBehavior::approve("0xabc", ChainId::BASE));

        provider.connect().await.unwrap();
        assert_eq!(rx.recv().await, Some(ProviderEvent::Connect { chain_id: "0x2105".into() }));
        assert!(provider.has_session());
        assert_eq!(provider.primary_account().as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn unsubscribed_sinks_stop_receiving() {
        let provider = SimulatedProvider::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = provider.subscribe(tx);
        assert!(provider.unsubscribe(id));
        assert!(!provider.unsubscribe(id));
        assert_eq!(provider.switch_chain(ChainId::OPTIMISM), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_sinks_are_pruned() {
        let provider = SimulatedProvider::new();
        let (tx, rx) = mpsc::unbounded_channel();
        provider.subscribe(tx);
        drop(rx);
        assert_eq!(provider.emit(ProviderEvent::Disconnect), 0);
        assert_eq!(provider.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn sign_requires_known_account() {
        let provider = SimulatedProvider::new().with_session(vec!["0xAbC".into()], ChainId::ETHEREUM);
        let sig = provider.request(RequestArguments::personal_sign("hi", "0xabc")).await.unwrap();
        assert_eq!(sig, json!(SimulatedProvider::expected_signature("0xabc", "hi")));

        let err = provider.request(RequestArguments::personal_sign("hi", "0xdead")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));

        provider.set_reject_sign(true);
        let err = provider.request(RequestArguments::personal_sign("hi", "0xabc")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn factory_counts_and_fails_on_demand() {
        let factory = SimulatedFactory::new(Arc::new(SimulatedProvider::new()));
        let config = ProviderConfig::new("pid").unwrap();
        factory.fail_next_init("relay down");
        assert!(matches!(factory.init(&config).await, Err(ProviderError::Init(_))));
        assert!(factory.init(&config).await.is_ok());
        assert_eq!(factory.init_calls(), 2);
        assert_eq!(factory.last_config().unwrap().project_id, "pid");
    }
}
