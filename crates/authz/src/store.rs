//! Policy store abstraction: the durable source of truth for policy rows.
//!
//! Rows reaching a store are already validated. Writes are idempotent and
//! report whether a row actually changed.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::policy::{GroupingPolicy, PermissionPolicy, PolicySnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy store unavailable: {0}")]
    Unavailable(String),

    #[error("policy store query failed: {0}")]
    Query(String),

    /// A persisted row no longer parses against the vocabulary.
    #[error("corrupt policy row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Read every grouping and permission row.
    async fn load(&self) -> Result<PolicySnapshot, StoreError>;

    async fn add_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError>;

    async fn remove_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError>;

    /// Remove every grouping row for `subject`. Returns the number removed.
    async fn remove_subject(&self, subject: &str) -> Result<u64, StoreError>;

    async fn add_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError>;

    async fn remove_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError>;

    /// Short name used in logs.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<S> PolicyStore for std::sync::Arc<S>
where
    S: PolicyStore + ?Sized,
{
    async fn load(&self) -> Result<PolicySnapshot, StoreError> {
        (**self).load().await
    }

    async fn add_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        (**self).add_grouping(rule).await
    }

    async fn remove_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        (**self).remove_grouping(rule).await
    }

    async fn remove_subject(&self, subject: &str) -> Result<u64, StoreError> {
        (**self).remove_subject(subject).await
    }

    async fn add_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        (**self).add_permission(rule).await
    }

    async fn remove_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        (**self).remove_permission(rule).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// In-memory policy store for tests/dev.
///
/// Can be switched "unavailable" to exercise outage handling.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    inner: RwLock<PolicySnapshot>,
    unavailable: AtomicBool,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: PolicySnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
            unavailable: AtomicBool::new(false),
        }
    }

    /// When set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }

    fn write<R>(&self, f: impl FnOnce(&mut PolicySnapshot) -> R) -> Result<R, StoreError> {
        self.check()?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn load(&self) -> Result<PolicySnapshot, StoreError> {
        self.check()?;
        self.inner
            .read()
            .map(|s| s.clone())
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    async fn add_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        self.write(|s| s.groupings.insert(rule.clone()))
    }

    async fn remove_grouping(&self, rule: &GroupingPolicy) -> Result<bool, StoreError> {
        self.write(|s| s.groupings.remove(rule))
    }

    async fn remove_subject(&self, subject: &str) -> Result<u64, StoreError> {
        self.write(|s| {
            let before = s.groupings.len();
            s.groupings.retain(|g| g.subject != subject);
            (before - s.groupings.len()) as u64
        })
    }

    async fn add_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        self.write(|s| s.permissions.insert(rule.clone()))
    }

    async fn remove_permission(&self, rule: &PermissionPolicy) -> Result<bool, StoreError> {
        self.write(|s| s.permissions.remove(rule))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
