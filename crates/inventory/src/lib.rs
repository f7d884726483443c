//! Inventory domain module: per-(warehouse, product) stock records and the
//! movement audit trail.
//!
//! Business rules only (no IO, no locking, no storage). Atomicity across
//! records is the infrastructure ledger's job.

pub mod movement;
pub mod record;

pub use movement::{
    MovementDirection, MovementEntry, MovementKind, NewMovement, derive_on_hand,
};
pub use record::{
    AdjustStock, CommitShipment, ReceiveStock, ReleaseStock, ReservationReleased, ReserveStock,
    ShipmentCommitted, StockAdjusted, StockCommand, StockEvent, StockKey, StockRecord,
    StockReceived, StockReserved,
};
