//! In-process change notifier for tests and single-instance deployments.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::notifier::{ChangeNotifier, NotifyError, Subscription};
use crate::PolicyChanged;

/// In-memory fan-out.
///
/// - No IO
/// - Dead subscribers are dropped on the next publish
#[derive(Debug, Default)]
pub struct InMemoryChangeNotifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PolicyChanged>>>,
}

impl InMemoryChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Close every open subscription, as a dropped broker connection would.
    pub fn disconnect_all(&self) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.clear();
        }
    }
}

#[async_trait]
impl ChangeNotifier for InMemoryChangeNotifier {
    async fn publish(&self, event: PolicyChanged) -> Result<(), NotifyError> {
        let mut subs = self.subscribers.lock().map_err(|_| NotifyError::Poisoned)?;
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription<PolicyChanged>, NotifyError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(|_| NotifyError::Poisoned)?
            .push(tx);
        Ok(Subscription::new(rx))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
