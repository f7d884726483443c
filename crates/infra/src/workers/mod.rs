//! Background workers.

pub mod periodic;
pub mod reservation_expiry;

pub use periodic::{PeriodicWorker, WorkerHandle};
pub use reservation_expiry::{
    ExpiryWarning, ReservationExpiry, ReservationExpiryScheduler, SweepReport,
};
