//! Projector task: the single consumer of a provider subscription

use super::state::{apply_event, HandleView, SessionState};
use crate::provider::{SubscriptionId, WalletProvider};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// A live subscription plus the task applying its events.
/// Dropping it unsubscribes and stops the task.
pub(crate) struct Projection {
    subscription: SubscriptionId,
    provider: Weak<dyn WalletProvider>,
    task: JoinHandle<()>,
}

impl Projection {
    /// Subscribe before returning, so no event emitted after this call is missed.
    pub(crate) fn spawn(provider: &Arc<dyn WalletProvider>, state: &Arc<watch::Sender<SessionState>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = provider.subscribe(tx);
        let weak_provider = Arc::downgrade(provider);
        let weak_state = Arc::downgrade(state);

        let task_provider = weak_provider.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let (Some(provider), Some(state)) = (task_provider.upgrade(), weak_state.upgrade()) else {
                    break;
                };
                let view = HandleView::of(provider.as_ref());
                state.send_modify(|s| apply_event(s, &event, &view));
            }
            debug!(subscription = subscription.0, "projector stopped");
        });

        debug!(subscription = subscription.0, "projector started");
        Self { subscription, provider: weak_provider, task }
    }
}

impl Drop for Projection {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.upgrade() {
            provider.unsubscribe(self.subscription);
        }
        self.task.abort();
    }
}
