//! Domain-scoped authorization for clinicos.
//!
//! Subjects hold roles inside domains (`sys`, `clinic:<uuid>`,
//! `project:<uuid>`, `user:<uuid>`). Permission rows grant or deny a role an
//! action on a resource in a domain, or in every domain of a kind. A request
//! is allowed when at least one allow row matches and no deny row does.
//!
//! - [`vocabulary`]: closed sets of roles, resources, actions, and domains
//! - [`engine::Enforcer`]: cached evaluation plus [`PolicyAdmin`] writes
//! - [`audit::Audited`]: logging decorator over either surface
//! - [`seeder`]: baseline rows installed at boot
//! - [`health::HealthTracker`]: whether the cache reflects the store

pub mod admin;
pub mod audit;
pub mod authorize;
pub mod engine;
pub mod error;
pub mod health;
pub mod matcher;
pub mod model;
pub mod policy;
pub mod seeder;
pub mod store;
pub mod vocabulary;

pub use audit::Audited;
pub use authorize::{Authorizer, Decision, DecisionReason, PolicyAdmin, PolicyEnforcer};
pub use engine::{DEFAULT_RELOAD_TIMEOUT, Enforcer, EnforcerBuilder};
pub use error::{AuthzError, AuthzResult, BatchError};
pub use health::{HealthStatus, HealthTracker, SyncState};
pub use model::{ModelDefinition, ModelError};
pub use policy::{Effect, GroupingPolicy, PermissionPolicy, PolicySet, PolicySnapshot};
pub use seeder::{SeedReport, baseline_policies, seed};
pub use store::{InMemoryPolicyStore, PolicyStore, StoreError};
