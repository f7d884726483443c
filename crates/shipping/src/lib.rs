//! Shipping domain module (shipments and carriers).
//!
//! Pure decision logic for the shipment lifecycle and for carrier daily
//! capacity. Locking across shipments and carriers lives in the infrastructure.

pub mod carrier;
pub mod shipment;

pub use carrier::{Carrier, CarrierCommand, CarrierEvent, CarrierStatus};
pub use shipment::{
    AssignCarrier, CarrierAssigned, MarkDelivered, PlanShipment, Shipment, ShipmentCommand,
    ShipmentDelivered, ShipmentEvent, ShipmentPlanned, ShipmentStatus, ShipmentTransition,
};
