//! Tracing and logging setup shared by binaries, tests and benches.

/// Initialize process-wide tracing (JSON lines, `RUST_LOG` filter).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing for tests: human-readable output captured by the test harness.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, formatters).
pub mod tracing;
