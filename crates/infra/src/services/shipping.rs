use std::collections::BTreeSet;

use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use stockyard_core::{
    Aggregate, AggregateRoot, CarrierId, DomainError, DomainResult, ShipmentId,
};
use stockyard_events::{EventBus, EventEnvelope, execute};
use stockyard_shipping::{
    AssignCarrier, Carrier, CarrierCommand, CarrierStatus, Shipment, ShipmentCommand,
};

use crate::engine::FulfillmentEngine;

use super::{CARRIER, SHIPMENT};

/// `TRK-` followed by 12 uppercase hex characters.
pub fn generate_tracking_number() -> String {
    let hex = Uuid::now_v7().simple().to_string().to_uppercase();
    format!("TRK-{}", &hex[hex.len() - 12..])
}

/// Carrier capacity allocation.
impl<B> FulfillmentEngine<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a carrier; it starts ACTIVE with no shipments booked today.
    pub fn register_carrier(
        &self,
        name: impl Into<String>,
        max_daily_capacity: u32,
    ) -> DomainResult<Carrier> {
        let carrier_id = CarrierId::new();
        let mut carrier = Carrier::empty(carrier_id);
        let events = execute(
            &mut carrier,
            &CarrierCommand::Register {
                carrier_id,
                name: name.into(),
                max_daily_capacity,
                occurred_at: self.now(),
            },
        )?;
        self.carriers.insert(carrier_id, carrier.clone())?;

        info!(carrier = %carrier_id, max_daily_capacity, "carrier registered");
        self.publish(CARRIER, carrier_id, carrier.version(), &events);
        Ok(carrier)
    }

    pub fn set_carrier_status(
        &self,
        carrier_id: CarrierId,
        status: CarrierStatus,
    ) -> DomainResult<Carrier> {
        let (carrier, events) = self.carriers.update(&carrier_id, |carrier| {
            let events = execute(
                carrier,
                &CarrierCommand::ChangeStatus {
                    carrier_id,
                    status,
                    occurred_at: self.now(),
                },
            )?;
            Ok((carrier.clone(), events))
        })?;

        self.publish(CARRIER, carrier_id, carrier.version(), &events);
        Ok(carrier)
    }

    /// Hand a PLANNED shipment to a carrier with a free slot today.
    pub fn assign_carrier(
        &self,
        shipment_id: ShipmentId,
        carrier_id: CarrierId,
    ) -> DomainResult<Shipment> {
        let (shipment, events, carrier) = self.shipments.update(&shipment_id, |shipment| {
            let now = self.now();
            let events = shipment.handle(&ShipmentCommand::AssignCarrier(AssignCarrier {
                shipment_id,
                carrier_id,
                tracking_number: generate_tracking_number(),
                occurred_at: now,
            }))?;

            let carrier = self.carriers.update(&carrier_id, |carrier| {
                let events = execute(
                    carrier,
                    &CarrierCommand::Book {
                        carrier_id,
                        count: 1,
                        occurred_at: now,
                    },
                )?;
                Ok((carrier.clone(), events))
            })?;

            for event in &events {
                shipment.apply(event);
            }
            Ok((shipment.clone(), events, carrier))
        })?;

        info!(
            shipment = %shipment_id,
            carrier = %carrier_id,
            booked = carrier.0.current_daily_shipments(),
            "carrier assigned"
        );
        self.publish(SHIPMENT, shipment_id, shipment.version(), &events);
        self.publish(CARRIER, carrier_id, carrier.0.version(), &carrier.1);
        Ok(shipment)
    }

    /// Hand several PLANNED shipments to one carrier, all or nothing.
    ///
    /// Fails as a whole if any shipment is not PLANNED or the batch exceeds the
    /// carrier's remaining capacity for today.
    pub fn assign_carrier_batch(
        &self,
        carrier_id: CarrierId,
        shipment_ids: &[ShipmentId],
    ) -> DomainResult<Vec<Shipment>> {
        if shipment_ids.is_empty() {
            return Err(DomainError::validation("batch has no shipments"));
        }
        let unique: BTreeSet<ShipmentId> = shipment_ids.iter().copied().collect();
        if unique.len() != shipment_ids.len() {
            return Err(DomainError::validation("batch lists a shipment more than once"));
        }
        let count = u32::try_from(shipment_ids.len())
            .map_err(|_| DomainError::validation("batch too large"))?;

        let (shipments, carrier) = self.shipments.update_many(shipment_ids, |rows| {
            let now = self.now();

            let mut decided = Vec::with_capacity(shipment_ids.len());
            for shipment_id in shipment_ids {
                let shipment = rows
                    .get(shipment_id)
                    .ok_or_else(|| DomainError::not_found("shipment", shipment_id))?;
                let events = shipment.handle(&ShipmentCommand::AssignCarrier(AssignCarrier {
                    shipment_id: *shipment_id,
                    carrier_id,
                    tracking_number: generate_tracking_number(),
                    occurred_at: now,
                }))?;
                decided.push((*shipment_id, events));
            }

            let carrier = self.carriers.update(&carrier_id, |carrier| {
                let events = execute(
                    carrier,
                    &CarrierCommand::Book {
                        carrier_id,
                        count,
                        occurred_at: now,
                    },
                )?;
                Ok((carrier.clone(), events))
            })?;

            let mut assigned = Vec::with_capacity(decided.len());
            for (shipment_id, events) in decided {
                let shipment = rows
                    .get_mut(&shipment_id)
                    .ok_or_else(|| DomainError::not_found("shipment", shipment_id))?;
                for event in &events {
                    shipment.apply(event);
                }
                assigned.push((shipment.clone(), events));
            }
            Ok((assigned, carrier))
        })?;

        info!(
            carrier = %carrier_id,
            shipments = shipments.len(),
            booked = carrier.0.current_daily_shipments(),
            "carrier batch assigned"
        );
        for (shipment, events) in &shipments {
            self.publish(SHIPMENT, shipment.id_typed(), shipment.version(), events);
        }
        self.publish(CARRIER, carrier_id, carrier.0.version(), &carrier.1);
        Ok(shipments.into_iter().map(|(shipment, _)| shipment).collect())
    }

    /// Give one of today's slots back (floored at zero).
    pub fn release_carrier(&self, carrier_id: CarrierId) -> DomainResult<Carrier> {
        let (carrier, events) = self.carriers.update(&carrier_id, |carrier| {
            let events = execute(
                carrier,
                &CarrierCommand::Release {
                    carrier_id,
                    occurred_at: self.now(),
                },
            )?;
            Ok((carrier.clone(), events))
        })?;

        self.publish(CARRIER, carrier_id, carrier.version(), &events);
        Ok(carrier)
    }

    /// Zero every carrier's daily counter. Returns how many carriers changed.
    pub fn reset_daily_capacity(&self) -> DomainResult<usize> {
        let mut changed = 0;
        for carrier_id in self.carriers.list().iter().map(Carrier::id_typed) {
            let (version, events) = self.carriers.update(&carrier_id, |carrier| {
                let events = execute(
                    carrier,
                    &CarrierCommand::ResetDaily {
                        carrier_id,
                        occurred_at: self.now(),
                    },
                )?;
                Ok((carrier.version(), events))
            })?;
            if !events.is_empty() {
                changed += 1;
            }
            self.publish(CARRIER, carrier_id, version, &events);
        }

        info!(carriers_reset = changed, "daily carrier capacity reset");
        Ok(changed)
    }

    pub fn carrier(&self, carrier_id: CarrierId) -> Option<Carrier> {
        self.carriers.get(&carrier_id)
    }

    pub fn carriers(&self) -> Vec<Carrier> {
        self.carriers.list()
    }

    pub fn shipment(&self, shipment_id: ShipmentId) -> Option<Shipment> {
        self.shipments.get(&shipment_id)
    }

    pub fn shipments(&self) -> Vec<Shipment> {
        self.shipments.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_numbers_are_prefixed_uppercase_hex() {
        let tracking = generate_tracking_number();
        assert!(tracking.starts_with("TRK-"));
        let hex = &tracking[4..];
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
