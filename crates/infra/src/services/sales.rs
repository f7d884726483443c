use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use stockyard_core::{
    Aggregate, AggregateRoot, CarrierId, ClientId, DomainError, DomainResult, ProductId, SalesOrderId,
    ShipmentId, WarehouseId,
};
use stockyard_events::{EventBus, EventEnvelope, execute};
use stockyard_inventory::{CommitShipment, ReleaseStock, ReserveStock, StockCommand};
use stockyard_sales::{
    CancelOrder, CancelReason, CreateSalesOrder, DeliverOrder, NewOrderLine, ReserveOrder,
    SalesOrder, SalesOrderCommand, SalesOrderEvent, SalesOrderStatus, ShipOrder,
};
use stockyard_shipping::{
    CarrierCommand, CarrierEvent, MarkDelivered, PlanShipment, Shipment, ShipmentCommand, ShipmentEvent,
};

use crate::engine::FulfillmentEngine;

use super::{CARRIER, SALES_ORDER, SHIPMENT};

/// Order fulfillment: the sales-order state machine wired to the ledger.
impl<B> FulfillmentEngine<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create an order in CREATED. No stock is touched.
    ///
    /// Availability is only a plausibility check here: per product it takes the
    /// better of the order's warehouse and the all-warehouse total, so an order
    /// can be created that later fails to reserve. Back-order lines are not
    /// checked.
    pub fn create_order(
        &self,
        client_id: ClientId,
        warehouse_id: WarehouseId,
        lines: Vec<NewOrderLine>,
    ) -> DomainResult<SalesOrder> {
        let mut wanted: BTreeMap<ProductId, u64> = BTreeMap::new();
        for line in lines.iter().filter(|l| !l.back_order) {
            let total = wanted.entry(line.product_id).or_default();
            *total = total.checked_add(line.quantity).ok_or_else(|| {
                DomainError::invalid_quantity(format!(
                    "order quantity for product {} overflows",
                    line.product_id
                ))
            })?;
        }
        for (product_id, quantity) in wanted {
            let plausible = self
                .ledger
                .available_in(warehouse_id, product_id)
                .max(self.ledger.available_across_warehouses(product_id));
            if plausible < quantity {
                return Err(DomainError::insufficient_stock(
                    product_id, quantity, plausible,
                ));
            }
        }

        let order_id = SalesOrderId::new();
        let mut order = SalesOrder::empty(order_id);
        let events = execute(
            &mut order,
            &SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                order_id,
                client_id,
                warehouse_id,
                lines,
                occurred_at: self.now(),
            }),
        )?;
        self.orders.insert(order_id, order.clone())?;

        info!(order_id = %order_id, warehouse = %warehouse_id, lines = order.lines().len(), "sales order created");
        self.publish(SALES_ORDER, order_id, order.version(), &events);
        Ok(order)
    }

    /// CREATED → RESERVED. Every line is reserved or none is.
    pub fn reserve_order(&self, order_id: SalesOrderId) -> DomainResult<SalesOrder> {
        let (order, events) = self.orders.update(&order_id, |order| {
            let now = self.now();
            let events = order.handle(&SalesOrderCommand::ReserveOrder(ReserveOrder {
                order_id,
                occurred_at: now,
            }))?;

            let reservations: Vec<StockCommand> = order
                .lines()
                .iter()
                .map(|line| {
                    StockCommand::Reserve(ReserveStock {
                        key: line.stock_key(),
                        quantity: line.quantity,
                        occurred_at: now,
                    })
                })
                .collect();
            self.ledger.apply_all(&reservations)?;

            apply_events(order, &events);
            Ok((order.clone(), events))
        })?;

        info!(order_id = %order_id, units = order.total_quantity(), "sales order reserved");
        self.publish(SALES_ORDER, order_id, order.version(), &events);
        Ok(order)
    }

    /// RESERVED → SHIPPED. Commits every line's reservation and plans the
    /// order's shipment if it has none yet.
    pub fn ship_order(&self, order_id: SalesOrderId) -> DomainResult<SalesOrder> {
        let (order, events, planned) = self.orders.update(&order_id, |order| {
            let now = self.now();
            let events = order.handle(&SalesOrderCommand::ShipOrder(ShipOrder {
                order_id,
                occurred_at: now,
            }))?;

            let planned = match self.shipment_id_for(order_id) {
                Some(_) => None,
                None => Some(self.build_shipment(order_id, now)?),
            };

            let reference = order.reference();
            let commits: Vec<StockCommand> = order
                .lines()
                .iter()
                .map(|line| {
                    StockCommand::CommitShipment(CommitShipment {
                        key: line.stock_key(),
                        quantity: line.quantity,
                        reference: reference.clone(),
                        occurred_at: now,
                    })
                })
                .collect();
            self.ledger.apply_all(&commits)?;

            // Stock is committed: the order ships even if the shipment
            // cannot be stored.
            let planned = planned.and_then(|(shipment, shipment_events)| {
                match self.store_shipment(order_id, &shipment) {
                    Ok(()) => Some((shipment, shipment_events)),
                    Err(err) => {
                        warn!(order_id = %order_id, error = %err, "shipped order has no stored shipment");
                        None
                    }
                }
            });

            apply_events(order, &events);
            Ok((order.clone(), events, planned))
        })?;

        info!(order_id = %order_id, "sales order shipped");
        self.publish(SALES_ORDER, order_id, order.version(), &events);
        if let Some((shipment, shipment_events)) = planned {
            self.publish(SHIPMENT, shipment.id_typed(), shipment.version(), &shipment_events);
        }
        Ok(order)
    }

    /// SHIPPED → DELIVERED. Marks the shipment delivered and hands the
    /// carrier's slot back.
    pub fn deliver_order(&self, order_id: SalesOrderId) -> DomainResult<SalesOrder> {
        let (order, events, delivered) = self.orders.update(&order_id, |order| {
            let now = self.now();
            let events = order.handle(&SalesOrderCommand::DeliverOrder(DeliverOrder {
                order_id,
                occurred_at: now,
            }))?;

            let delivered = match self.shipment_id_for(order_id) {
                Some(shipment_id) => Some(self.deliver_shipment(shipment_id, now)?),
                None => {
                    warn!(order_id = %order_id, "delivered order has no shipment");
                    None
                }
            };

            apply_events(order, &events);
            Ok((order.clone(), events, delivered))
        })?;

        info!(order_id = %order_id, "sales order delivered");
        self.publish(SALES_ORDER, order_id, order.version(), &events);
        if let Some(delivered) = delivered {
            self.publish(
                SHIPMENT,
                delivered.shipment.id_typed(),
                delivered.shipment.version(),
                &delivered.events,
            );
            if let Some((carrier_id, version, carrier_events)) = delivered.carrier {
                self.publish(CARRIER, carrier_id, version, &carrier_events);
            }
        }
        Ok(order)
    }

    /// CREATED | RESERVED → CANCELED. A reserved order hands back exactly what
    /// it reserved.
    pub fn cancel_order(
        &self,
        order_id: SalesOrderId,
        reason: CancelReason,
    ) -> DomainResult<SalesOrder> {
        let (order, events) = self.orders.update(&order_id, |order| {
            let now = self.now();
            let events = order.handle(&SalesOrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason,
                occurred_at: now,
            }))?;

            let releases_stock = events.iter().any(|e| {
                matches!(e, SalesOrderEvent::OrderCanceled(c) if c.released_reservation)
            });
            if releases_stock {
                let releases: Vec<StockCommand> = order
                    .lines()
                    .iter()
                    .map(|line| {
                        StockCommand::Release(ReleaseStock {
                            key: line.stock_key(),
                            quantity: line.quantity,
                            occurred_at: now,
                        })
                    })
                    .collect();
                self.ledger.apply_all(&releases)?;
            }

            apply_events(order, &events);
            Ok((order.clone(), events))
        })?;

        info!(order_id = %order_id, reason = ?reason, "sales order canceled");
        self.publish(SALES_ORDER, order_id, order.version(), &events);
        Ok(order)
    }

    pub fn order(&self, order_id: SalesOrderId) -> Option<SalesOrder> {
        self.orders.get(&order_id)
    }

    pub fn orders(&self) -> Vec<SalesOrder> {
        self.orders.list()
    }

    /// RESERVED orders whose reservation was taken strictly before `cutoff`,
    /// oldest first.
    pub fn orders_reserved_before(&self, cutoff: DateTime<Utc>) -> Vec<SalesOrder> {
        let mut orders = self.orders.filter(|o| {
            o.status() == SalesOrderStatus::Reserved
                && o.reserved_at().is_some_and(|at| at < cutoff)
        });
        orders.sort_by_key(|o| o.reserved_at());
        orders
    }

    pub fn shipment_for_order(&self, order_id: SalesOrderId) -> Option<Shipment> {
        self.shipment_id_for(order_id)
            .and_then(|shipment_id| self.shipments.get(&shipment_id))
    }

    fn build_shipment(
        &self,
        order_id: SalesOrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Shipment, Vec<ShipmentEvent>)> {
        let shipment_id = ShipmentId::new();
        let mut shipment = Shipment::empty(shipment_id);
        let events = execute(
            &mut shipment,
            &ShipmentCommand::PlanShipment(PlanShipment {
                shipment_id,
                order_id,
                planned_date: self.planner.planned_date(now),
                occurred_at: now,
            }),
        )?;
        Ok((shipment, events))
    }

    fn store_shipment(&self, order_id: SalesOrderId, shipment: &Shipment) -> DomainResult<()> {
        let shipment_id = shipment.id_typed();
        self.shipments.insert(shipment_id, shipment.clone())?;
        if let Err(err) = self.index_shipment(order_id, shipment_id) {
            let _ = self.shipments.remove_if(&shipment_id, |_| Ok(()));
            return Err(err);
        }
        Ok(())
    }

    fn deliver_shipment(
        &self,
        shipment_id: ShipmentId,
        now: DateTime<Utc>,
    ) -> DomainResult<DeliveredShipment> {
        self.shipments.update(&shipment_id, |shipment| {
            let events = execute(
                shipment,
                &ShipmentCommand::MarkDelivered(MarkDelivered {
                    shipment_id,
                    occurred_at: now,
                }),
            )?;

            let carrier = match shipment.carrier_id() {
                Some(carrier_id) => Some(self.carriers.update(&carrier_id, |carrier| {
                    let events = execute(
                        carrier,
                        &CarrierCommand::Release {
                            carrier_id,
                            occurred_at: now,
                        },
                    )?;
                    Ok((carrier_id, carrier.version(), events))
                })?),
                None => None,
            };

            Ok(DeliveredShipment {
                shipment: shipment.clone(),
                events,
                carrier,
            })
        })
    }
}

struct DeliveredShipment {
    shipment: Shipment,
    events: Vec<ShipmentEvent>,
    carrier: Option<(CarrierId, u64, Vec<CarrierEvent>)>,
}

fn apply_events(order: &mut SalesOrder, events: &[SalesOrderEvent]) {
    for event in events {
        order.apply(event);
    }
}
