//! Stock ledger and its movement log.

mod movement_recorder;
mod stock_ledger;

pub use movement_recorder::{InMemoryMovementRecorder, MovementRecorder};
pub use stock_ledger::StockLedger;
