//! Purchasing domain module (purchase orders).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no stock access, no storage).

pub mod order;

pub use order::{
    Approve, Cancel, CreatePurchaseOrder, GoodsReceived, LineItem, NewPurchaseLine,
    PurchaseOrder, PurchaseOrderApproved, PurchaseOrderCanceled, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderLinesReplaced, PurchaseOrderStatus,
    PurchaseOrderTransition, ReceiveGoods, ReplaceLines,
};
