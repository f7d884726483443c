//! `stockyard-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, the aggregate traits and the clock seam.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{
    CarrierId, ClientId, MovementId, ProductId, PurchaseOrderId, SalesOrderId, ShipmentId,
    SupplierId, WarehouseId,
};
