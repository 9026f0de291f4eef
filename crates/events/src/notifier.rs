//! Change notification abstraction (mechanics only).
//!
//! A [`ChangeNotifier`] is the cross-instance signal that policy data in the
//! store changed and every cache must be rebuilt.
//!
//! ## Delivery
//!
//! - **Best-effort broadcast**: every live subscription receives each event.
//! - **Lossy across disconnects**: events published while a subscriber is
//!   disconnected are gone. Subscribers reload in full after resubscribing.
//! - **At-least-once tolerant**: reloads are idempotent, duplicates are cheap.
//! - **Asynchronous**: publishers never wait for subscribers to reload.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

use crate::PolicyChanged;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier connection error: {0}")]
    Connection(String),

    #[error("notifier publish error: {0}")]
    Publish(String),

    #[error("notification payload error: {0}")]
    Payload(String),

    /// Internal lock poisoned (in-process transports only).
    #[error("notifier state poisoned")]
    Poisoned,
}

/// A live subscription to a notification stream.
///
/// `recv` returns `None` once the transport behind the subscription is gone
/// (connection dropped, notifier shut down); callers resubscribe.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. Cancel-safe.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Cross-instance "policy changed" channel.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Announce a change. Returns once the transport accepted the event.
    async fn publish(&self, event: PolicyChanged) -> Result<(), NotifyError>;

    /// Open a new subscription receiving every event published from now on.
    async fn subscribe(&self) -> Result<Subscription<PolicyChanged>, NotifyError>;

    /// Short name used in logs.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<N> ChangeNotifier for std::sync::Arc<N>
where
    N: ChangeNotifier + ?Sized,
{
    async fn publish(&self, event: PolicyChanged) -> Result<(), NotifyError> {
        (**self).publish(event).await
    }

    async fn subscribe(&self) -> Result<Subscription<PolicyChanged>, NotifyError> {
        (**self).subscribe().await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
