//! Process-wide tracing setup shared by the binaries.

/// Initialize structured logging with the default `info` filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber construction.
pub mod tracing;
