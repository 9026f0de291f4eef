//! Infrastructure-backed [`ChangeNotifier`](clinicos_events::ChangeNotifier)
//! implementations.
//!
//! The abstraction and the in-memory notifier live in `clinicos-events`.

pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_pubsub;

pub use postgres::PgChangeNotifier;
#[cfg(feature = "redis")]
pub use redis_pubsub::RedisChangeNotifier;
