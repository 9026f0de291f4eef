//! Tracing/logging setup shared by every clinicos binary.

/// Subscriber configuration (format, filters).
pub mod logging;

pub use logging::{LogFormat, UnknownLogFormat};

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(format: LogFormat) {
    logging::init(format);
}
