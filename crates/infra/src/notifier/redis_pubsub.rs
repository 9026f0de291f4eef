//! Redis pub/sub change notifier (optional, `redis` feature).
//!
//! Redis pub/sub is not durable: messages published while a subscriber is
//! disconnected are dropped. That is acceptable here because every
//! resubscription is followed by a full reload.
//!
//! The redis client is blocking, so publishing runs on the blocking pool and
//! each subscription is drained by a dedicated forwarding thread.

use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use redis::Commands;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use clinicos_events::{ChangeNotifier, NotifyError, PolicyChanged, Subscription};

/// How often a forwarding thread wakes up to notice a dropped subscription.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RedisChangeNotifier {
    client: redis::Client,
    channel: String,
}

impl RedisChangeNotifier {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, NotifyError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| NotifyError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl ChangeNotifier for RedisChangeNotifier {
    async fn publish(&self, event: PolicyChanged) -> Result<(), NotifyError> {
        let payload = event
            .to_json()
            .map_err(|e| NotifyError::Payload(e.to_string()))?;
        let client = self.client.clone();
        let channel = self.channel.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = client
                .get_connection()
                .map_err(|e| NotifyError::Connection(e.to_string()))?;
            let _: i64 = conn
                .publish(&channel, payload)
                .map_err(|e| NotifyError::Publish(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| NotifyError::Publish(format!("publish task failed: {e}")))?
    }

    async fn subscribe(&self) -> Result<Subscription<PolicyChanged>, NotifyError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), NotifyError>>();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Background thread that receives pub/sub messages and forwards them.
        thread::Builder::new()
            .name("redis-policy-sub".to_string())
            .spawn(move || {
                let mut conn = match client.get_connection() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(NotifyError::Connection(e.to_string())));
                        return;
                    }
                };

                let mut pubsub = conn.as_pubsub();
                if let Err(e) = pubsub.subscribe(&channel) {
                    let _ = ready_tx.send(Err(NotifyError::Connection(e.to_string())));
                    return;
                }
                if let Err(e) = pubsub.set_read_timeout(Some(POLL_INTERVAL)) {
                    let _ = ready_tx.send(Err(NotifyError::Connection(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                loop {
                    if tx.is_closed() {
                        return;
                    }

                    let msg = match pubsub.get_message() {
                        Ok(m) => m,
                        Err(e) if e.is_timeout() => continue,
                        Err(e) => {
                            warn!(%channel, error = %e, "redis subscription dropped");
                            return;
                        }
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(_) => continue,
                    };

                    match PolicyChanged::from_json(&payload) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            debug!(%channel, error = %e, "ignoring malformed policy notification");
                        }
                    }
                }
            })
            .map_err(|e| NotifyError::Connection(format!("failed to spawn subscriber thread: {e}")))?;

        ready_rx
            .await
            .map_err(|_| NotifyError::Connection("subscriber thread exited".to_string()))??;
        Ok(Subscription::new(rx))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
