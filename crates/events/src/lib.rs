//! `clinicos-events`: "policy changed" notifications and the transport
//! abstraction that fans them out across service instances.

pub mod change;
pub mod in_memory;
pub mod notifier;

pub use change::{ChangeKind, InstanceId, PolicyChanged};
pub use in_memory::InMemoryChangeNotifier;
pub use notifier::{ChangeNotifier, NotifyError, Subscription};
