//! Infrastructure layer: stores, the stock ledger, the fulfillment engine and
//! its background workers.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod services;
pub mod store;
pub mod workers;

pub use config::{ConfigError, Settings};
pub use engine::{FulfillmentEngine, InMemoryEngineBus};
pub use ledger::{InMemoryMovementRecorder, MovementRecorder, StockLedger};
pub use services::ShipmentPlanner;
pub use services::shipping::generate_tracking_number;
pub use store::LockedStore;
pub use workers::{
    ExpiryWarning, PeriodicWorker, ReservationExpiry, ReservationExpiryScheduler, SweepReport,
    WorkerHandle,
};
