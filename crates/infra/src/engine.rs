use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use stockyard_core::{
    CarrierId, Clock, DomainError, DomainResult, PurchaseOrderId, SalesOrderId, ShipmentId,
};
use stockyard_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use stockyard_purchasing::PurchaseOrder;
use stockyard_sales::SalesOrder;
use stockyard_shipping::{Carrier, Shipment};

use crate::config::Settings;
use crate::ledger::StockLedger;
use crate::services::planning::ShipmentPlanner;
use crate::store::LockedStore;

/// Bus type used by [`FulfillmentEngine::in_memory`].
pub type InMemoryEngineBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

/// Stock-consistency and order-fulfillment engine.
///
/// Owns the ledger plus every order, purchase order, shipment and carrier row.
/// Operations live in `services::{sales, purchasing, shipping}`. Rows are always
/// locked in the same order: order/PO → shipment → carrier → stock records.
///
/// Committed events are published after the fact; a failed publish is logged
/// and never undoes the commit.
pub struct FulfillmentEngine<B = InMemoryEngineBus> {
    pub(crate) ledger: StockLedger,
    pub(crate) orders: LockedStore<SalesOrderId, SalesOrder>,
    pub(crate) purchase_orders: LockedStore<PurchaseOrderId, PurchaseOrder>,
    pub(crate) shipments: LockedStore<ShipmentId, Shipment>,
    pub(crate) shipment_index: RwLock<HashMap<SalesOrderId, ShipmentId>>,
    pub(crate) carriers: LockedStore<CarrierId, Carrier>,
    pub(crate) planner: ShipmentPlanner,
    settings: Settings,
    clock: Arc<dyn Clock>,
    bus: B,
}

impl FulfillmentEngine<InMemoryEngineBus> {
    /// Engine with an in-memory movement log and event bus.
    pub fn in_memory(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let ledger = StockLedger::in_memory(Arc::clone(&clock));
        Self::new(ledger, InMemoryEventBus::new(), settings, clock)
    }
}

impl<B> FulfillmentEngine<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(ledger: StockLedger, bus: B, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            orders: LockedStore::new("sales order"),
            purchase_orders: LockedStore::new("purchase order"),
            shipments: LockedStore::new("shipment"),
            shipment_index: RwLock::new(HashMap::new()),
            carriers: LockedStore::new("carrier"),
            planner: ShipmentPlanner::from_settings(&settings),
            settings,
            clock,
            bus,
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn shipment_id_for(&self, order_id: SalesOrderId) -> Option<ShipmentId> {
        self.shipment_index.read().ok()?.get(&order_id).copied()
    }

    pub(crate) fn index_shipment(
        &self,
        order_id: SalesOrderId,
        shipment_id: ShipmentId,
    ) -> DomainResult<()> {
        let mut index = self
            .shipment_index
            .write()
            .map_err(|_| DomainError::conflict("shipment index lock poisoned"))?;
        index.insert(order_id, shipment_id);
        Ok(())
    }

    /// Publish events that were just committed.
    ///
    /// `version` is the aggregate's version after the last of `events` was
    /// applied.
    pub(crate) fn publish<E>(
        &self,
        aggregate_type: &'static str,
        aggregate_id: impl Display,
        version: u64,
        events: &[E],
    ) where
        E: Event + Serialize,
    {
        let aggregate_id = aggregate_id.to_string();
        let first = version.saturating_sub(events.len() as u64) + 1;

        for (offset, event) in events.iter().enumerate() {
            let envelope = match EventEnvelope::<JsonValue>::from_typed(
                aggregate_id.as_str(),
                aggregate_type,
                first + offset as u64,
                event,
            ) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(
                        aggregate_type,
                        aggregate_id = %aggregate_id,
                        event_type = event.event_type(),
                        error = %err,
                        "failed to serialize committed event"
                    );
                    continue;
                }
            };

            if let Err(err) = self.bus.publish(envelope) {
                warn!(
                    aggregate_type,
                    aggregate_id = %aggregate_id,
                    event_type = event.event_type(),
                    error = ?err,
                    "failed to publish committed event"
                );
            }
        }
    }
}
