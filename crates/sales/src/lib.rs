//! Sales orders domain module.
//!
//! Business rules for the sales-order state machine, implemented purely as
//! deterministic domain logic (no IO, no stock access, no storage). The
//! infrastructure pairs each transition with the matching ledger operation.

pub mod order;

pub use order::{
    CancelOrder, CancelReason, CreateSalesOrder, DeliverOrder, NewOrderLine, OrderCanceled,
    OrderDelivered, OrderReserved, OrderShipped, ReserveOrder, SalesOrder, SalesOrderCommand,
    SalesOrderCreated, SalesOrderEvent, SalesOrderLine, SalesOrderStatus, SalesOrderTransition,
    ShipOrder,
};
