//! Row-locked in-memory tables backing the engine.

mod locked;

pub use locked::LockedStore;
