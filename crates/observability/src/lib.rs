//! Process-wide tracing setup for binaries embedding the engine.

/// Initialize tracing with `RUST_LOG`, falling back to `info`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with_default("info");
}

/// Tracing configuration (filters, layers).
pub mod tracing;
