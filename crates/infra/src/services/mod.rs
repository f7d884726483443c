//! Engine operations, grouped by the state machine they drive.

pub mod planning;
pub mod purchasing;
pub mod sales;
pub mod shipping;

pub use planning::ShipmentPlanner;

pub(crate) const SALES_ORDER: &str = "sales_order";
pub(crate) const PURCHASE_ORDER: &str = "purchase_order";
pub(crate) const SHIPMENT: &str = "shipment";
pub(crate) const CARRIER: &str = "carrier";
