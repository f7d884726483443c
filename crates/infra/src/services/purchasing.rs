use serde_json::Value as JsonValue;
use tracing::info;

use stockyard_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, ExpectedVersion, PurchaseOrderId,
    SupplierId, WarehouseId,
};
use stockyard_events::{EventBus, EventEnvelope, execute};
use stockyard_inventory::{ReceiveStock, StockCommand, StockKey};
use stockyard_purchasing::{
    Approve, Cancel, CreatePurchaseOrder, NewPurchaseLine, PurchaseOrder, PurchaseOrderCommand,
    ReceiveGoods, ReplaceLines,
};

use crate::engine::FulfillmentEngine;

use super::PURCHASE_ORDER;

/// Purchase receiving: the purchase-order state machine wired to the ledger.
impl<B> FulfillmentEngine<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_purchase_order(
        &self,
        supplier_id: SupplierId,
        lines: Vec<NewPurchaseLine>,
    ) -> DomainResult<PurchaseOrder> {
        let order_id = PurchaseOrderId::new();
        let mut po = PurchaseOrder::empty(order_id);
        let events = execute(
            &mut po,
            &PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                order_id,
                supplier_id,
                lines,
                occurred_at: self.now(),
            }),
        )?;
        self.purchase_orders.insert(order_id, po.clone())?;

        info!(purchase_order = %order_id, supplier = %supplier_id, "purchase order created");
        self.publish(PURCHASE_ORDER, order_id, po.version(), &events);
        Ok(po)
    }

    /// Replace every line of a CREATED purchase order.
    pub fn update_purchase_order_lines(
        &self,
        order_id: PurchaseOrderId,
        lines: Vec<NewPurchaseLine>,
        expected: ExpectedVersion,
    ) -> DomainResult<PurchaseOrder> {
        let (po, events) = self.purchase_orders.update(&order_id, |po| {
            expected.check(po.version())?;
            let events = execute(
                po,
                &PurchaseOrderCommand::ReplaceLines(ReplaceLines {
                    order_id,
                    lines,
                    occurred_at: self.now(),
                }),
            )?;
            Ok((po.clone(), events))
        })?;

        self.publish(PURCHASE_ORDER, order_id, po.version(), &events);
        Ok(po)
    }

    pub fn approve_purchase_order(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        let (po, events) = self.purchase_orders.update(&order_id, |po| {
            let events = execute(
                po,
                &PurchaseOrderCommand::Approve(Approve {
                    order_id,
                    occurred_at: self.now(),
                }),
            )?;
            Ok((po.clone(), events))
        })?;

        info!(purchase_order = %order_id, "purchase order approved");
        self.publish(PURCHASE_ORDER, order_id, po.version(), &events);
        Ok(po)
    }

    /// APPROVED → RECEIVED. Every line lands in `warehouse_id` as one unit of
    /// work, tagged `PO-<id>` in the movement log.
    pub fn receive_purchase_order(
        &self,
        order_id: PurchaseOrderId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<PurchaseOrder> {
        let (po, events) = self.purchase_orders.update(&order_id, |po| {
            let now = self.now();
            let events = po.handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                warehouse_id,
                occurred_at: now,
            }))?;

            let reference = po.reference();
            let receipts: Vec<StockCommand> = po
                .lines()
                .iter()
                .map(|line| {
                    StockCommand::Receive(ReceiveStock {
                        key: StockKey::new(warehouse_id, line.product_id),
                        quantity: line.quantity,
                        reference: reference.clone(),
                        occurred_at: now,
                    })
                })
                .collect();
            self.ledger.apply_all(&receipts)?;

            for event in &events {
                po.apply(event);
            }
            Ok((po.clone(), events))
        })?;

        info!(
            purchase_order = %order_id,
            warehouse = %warehouse_id,
            lines = po.lines().len(),
            "purchase order received"
        );
        self.publish(PURCHASE_ORDER, order_id, po.version(), &events);
        Ok(po)
    }

    pub fn cancel_purchase_order(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        let (po, events) = self.purchase_orders.update(&order_id, |po| {
            let events = execute(
                po,
                &PurchaseOrderCommand::Cancel(Cancel {
                    order_id,
                    occurred_at: self.now(),
                }),
            )?;
            Ok((po.clone(), events))
        })?;

        info!(purchase_order = %order_id, "purchase order canceled");
        self.publish(PURCHASE_ORDER, order_id, po.version(), &events);
        Ok(po)
    }

    /// Delete a purchase order that is CREATED or CANCELED.
    pub fn delete_purchase_order(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        let po = self.purchase_orders.remove_if(&order_id, |po| {
            if po.status().is_deletable() {
                Ok(())
            } else {
                Err(DomainError::invalid_operation(format!(
                    "cannot delete purchase order {order_id} in status {}",
                    po.status()
                )))
            }
        })?;

        info!(purchase_order = %order_id, "purchase order deleted");
        Ok(po)
    }

    pub fn purchase_order(&self, order_id: PurchaseOrderId) -> Option<PurchaseOrder> {
        self.purchase_orders.get(&order_id)
    }

    pub fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        self.purchase_orders.list()
    }
}
