//! Postgres LISTEN/NOTIFY change notifier.
//!
//! Publishing is `SELECT pg_notify(channel, payload)` on the shared pool, so
//! the notification is delivered only if the surrounding statement commits.
//! Each subscription owns a dedicated [`PgListener`] connection drained by a
//! tokio task.
//!
//! A dropped listener connection ends the subscription instead of silently
//! reconnecting: notifications sent while disconnected are lost, and the sync
//! worker must know to reload in full.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use clinicos_events::{ChangeNotifier, NotifyError, PolicyChanged, Subscription};

/// Postgres caps NOTIFY payloads at 8000 bytes by default.
const MAX_PAYLOAD: usize = 8000;

#[derive(Debug, Clone)]
pub struct PgChangeNotifier {
    pool: PgPool,
    channel: String,
}

impl PgChangeNotifier {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ChangeNotifier for PgChangeNotifier {
    async fn publish(&self, event: PolicyChanged) -> Result<(), NotifyError> {
        let payload = event
            .to_json()
            .map_err(|e| NotifyError::Payload(e.to_string()))?;
        if payload.len() > MAX_PAYLOAD {
            return Err(NotifyError::Payload(format!(
                "payload of {} bytes exceeds the NOTIFY limit",
                payload.len()
            )));
        }

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription<PolicyChanged>, NotifyError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| NotifyError::Connection(e.to_string()))?;
        listener
            .listen(&self.channel)
            .await
            .map_err(|e| NotifyError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = self.channel.clone();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => return,
                    next = listener.try_recv() => next,
                };

                let notification = match next {
                    Ok(Some(n)) => n,
                    Ok(None) => {
                        warn!(%channel, "postgres listener connection lost");
                        return;
                    }
                    Err(err) => {
                        warn!(%channel, error = %err, "postgres listener failed");
                        return;
                    }
                };

                match PolicyChanged::from_json(notification.payload()) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        debug!(%channel, error = %err, "ignoring malformed policy notification");
                    }
                }
            }
        });

        Ok(Subscription::new(rx))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
