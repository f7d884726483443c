use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{Aggregate, AggregateRoot, CarrierId, DomainError, SalesOrderId, ShipmentId};
use stockyard_events::Event;

/// Shipment status lifecycle.
///
/// `PLANNED → IN_TRANSIT → DELIVERED`; a shipment that never got a carrier can
/// go straight from `PLANNED` to `DELIVERED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Planned,
    InTransit,
    Delivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentTransition {
    AssignCarrier,
    Deliver,
}

impl ShipmentStatus {
    pub fn transition(self, transition: ShipmentTransition) -> Option<ShipmentStatus> {
        use ShipmentStatus::*;
        use ShipmentTransition::*;

        match (self, transition) {
            (Planned, AssignCarrier) => Some(InTransit),
            (Planned | InTransit, Deliver) => Some(Delivered),
            _ => None,
        }
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ShipmentStatus::Planned => "PLANNED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
        };
        f.write_str(s)
    }
}

/// Aggregate root: Shipment (one per sales order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shipment {
    id: ShipmentId,
    order_id: Option<SalesOrderId>,
    status: ShipmentStatus,
    carrier_id: Option<CarrierId>,
    planned_date: Option<DateTime<Utc>>,
    shipped_date: Option<DateTime<Utc>>,
    delivered_date: Option<DateTime<Utc>>,
    tracking_number: Option<String>,
    version: u64,
    created: bool,
}

impl Shipment {
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            order_id: None,
            status: ShipmentStatus::Planned,
            carrier_id: None,
            planned_date: None,
            shipped_date: None,
            delivered_date: None,
            tracking_number: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn order_id(&self) -> Option<SalesOrderId> {
        self.order_id
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn carrier_id(&self) -> Option<CarrierId> {
        self.carrier_id
    }

    pub fn planned_date(&self) -> Option<DateTime<Utc>> {
        self.planned_date
    }

    pub fn shipped_date(&self) -> Option<DateTime<Utc>> {
        self.shipped_date
    }

    pub fn delivered_date(&self) -> Option<DateTime<Utc>> {
        self.delivered_date
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn is_planned(&self) -> bool {
        self.created && self.status == ShipmentStatus::Planned
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlanShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanShipment {
    pub shipment_id: ShipmentId,
    pub order_id: SalesOrderId,
    pub planned_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignCarrier.
///
/// The tracking number is generated by the caller so the aggregate stays
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCarrier {
    pub shipment_id: ShipmentId,
    pub carrier_id: CarrierId,
    pub tracking_number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    PlanShipment(PlanShipment),
    AssignCarrier(AssignCarrier),
    MarkDelivered(MarkDelivered),
}

/// Event: ShipmentPlanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentPlanned {
    pub shipment_id: ShipmentId,
    pub order_id: SalesOrderId,
    pub planned_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CarrierAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierAssigned {
    pub shipment_id: ShipmentId,
    pub carrier_id: CarrierId,
    pub tracking_number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentDelivered.
///
/// `carrier_id` is the carrier whose daily slot should be handed back, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDelivered {
    pub shipment_id: ShipmentId,
    pub carrier_id: Option<CarrierId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentPlanned(ShipmentPlanned),
    CarrierAssigned(CarrierAssigned),
    ShipmentDelivered(ShipmentDelivered),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentPlanned(_) => "shipping.shipment.planned",
            ShipmentEvent::CarrierAssigned(_) => "shipping.shipment.carrier_assigned",
            ShipmentEvent::ShipmentDelivered(_) => "shipping.shipment.delivered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentPlanned(e) => e.occurred_at,
            ShipmentEvent::CarrierAssigned(e) => e.occurred_at,
            ShipmentEvent::ShipmentDelivered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentPlanned(e) => {
                self.id = e.shipment_id;
                self.order_id = Some(e.order_id);
                self.status = ShipmentStatus::Planned;
                self.planned_date = Some(e.planned_date);
                self.created = true;
            }
            ShipmentEvent::CarrierAssigned(e) => {
                self.status = ShipmentStatus::InTransit;
                self.carrier_id = Some(e.carrier_id);
                self.tracking_number = Some(e.tracking_number.clone());
                self.shipped_date = Some(e.occurred_at);
            }
            ShipmentEvent::ShipmentDelivered(e) => {
                self.status = ShipmentStatus::Delivered;
                self.delivered_date = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::PlanShipment(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("shipment already exists"));
                }
                self.ensure_shipment_id(cmd.shipment_id)?;
                Ok(vec![ShipmentEvent::ShipmentPlanned(ShipmentPlanned {
                    shipment_id: cmd.shipment_id,
                    order_id: cmd.order_id,
                    planned_date: cmd.planned_date,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ShipmentCommand::AssignCarrier(cmd) => {
                self.ensure_exists()?;
                self.ensure_shipment_id(cmd.shipment_id)?;
                self.ensure_transition(ShipmentTransition::AssignCarrier)?;
                if cmd.tracking_number.trim().is_empty() {
                    return Err(DomainError::validation("tracking number cannot be empty"));
                }
                Ok(vec![ShipmentEvent::CarrierAssigned(CarrierAssigned {
                    shipment_id: cmd.shipment_id,
                    carrier_id: cmd.carrier_id,
                    tracking_number: cmd.tracking_number.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ShipmentCommand::MarkDelivered(cmd) => {
                self.ensure_exists()?;
                self.ensure_shipment_id(cmd.shipment_id)?;
                self.ensure_transition(ShipmentTransition::Deliver)?;
                Ok(vec![ShipmentEvent::ShipmentDelivered(ShipmentDelivered {
                    shipment_id: cmd.shipment_id,
                    carrier_id: self.carrier_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Shipment {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("shipment", self.id));
        }
        Ok(())
    }

    fn ensure_shipment_id(&self, shipment_id: ShipmentId) -> Result<(), DomainError> {
        if self.id != shipment_id {
            return Err(DomainError::validation("shipment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, transition: ShipmentTransition) -> Result<(), DomainError> {
        if self.status.transition(transition).is_none() {
            return Err(DomainError::invalid_operation(format!(
                "shipment {} is {}, expected PLANNED{}",
                self.id,
                self.status,
                match transition {
                    ShipmentTransition::AssignCarrier => "",
                    ShipmentTransition::Deliver => " or IN_TRANSIT",
                }
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockyard_events::execute;

    fn planned() -> Shipment {
        let shipment_id = ShipmentId::new();
        let mut shipment = Shipment::empty(shipment_id);
        let now = Utc::now();
        execute(
            &mut shipment,
            &ShipmentCommand::PlanShipment(PlanShipment {
                shipment_id,
                order_id: SalesOrderId::new(),
                planned_date: now,
                occurred_at: now,
            }),
        )
        .unwrap();
        shipment
    }

    fn assign(shipment: &mut Shipment, carrier_id: CarrierId) -> Result<Vec<ShipmentEvent>, DomainError> {
        let cmd = ShipmentCommand::AssignCarrier(AssignCarrier {
            shipment_id: shipment.id_typed(),
            carrier_id,
            tracking_number: "TRK-0123456789AB".to_string(),
            occurred_at: Utc::now(),
        });
        execute(shipment, &cmd)
    }

    fn deliver(shipment: &mut Shipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        let cmd = ShipmentCommand::MarkDelivered(MarkDelivered {
            shipment_id: shipment.id_typed(),
            occurred_at: Utc::now(),
        });
        execute(shipment, &cmd)
    }

    #[test]
    fn assign_moves_planned_shipment_in_transit() {
        let mut shipment = planned();
        assert!(shipment.is_planned());

        let carrier = CarrierId::new();
        assign(&mut shipment, carrier).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);
        assert_eq!(shipment.carrier_id(), Some(carrier));
        assert!(shipment.shipped_date().is_some());
        assert_eq!(shipment.tracking_number(), Some("TRK-0123456789AB"));
    }

    #[test]
    fn assign_twice_is_invalid() {
        let mut shipment = planned();
        assign(&mut shipment, CarrierId::new()).unwrap();
        let err = assign(&mut shipment, CarrierId::new()).unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn delivery_reports_linked_carrier() {
        let mut shipment = planned();
        let carrier = CarrierId::new();
        assign(&mut shipment, carrier).unwrap();

        match &deliver(&mut shipment).unwrap()[0] {
            ShipmentEvent::ShipmentDelivered(e) => assert_eq!(e.carrier_id, Some(carrier)),
            other => panic!("expected ShipmentDelivered, got {other:?}"),
        }
        assert_eq!(shipment.status(), ShipmentStatus::Delivered);
        assert!(deliver(&mut shipment).unwrap_err().is_invalid_operation());
    }

    #[test]
    fn planned_shipment_can_be_delivered_without_carrier() {
        let mut shipment = planned();
        match &deliver(&mut shipment).unwrap()[0] {
            ShipmentEvent::ShipmentDelivered(e) => assert_eq!(e.carrier_id, None),
            other => panic!("expected ShipmentDelivered, got {other:?}"),
        }
        assert!(shipment.delivered_date().is_some());
    }

    #[test]
    fn unknown_shipment_is_not_found() {
        let mut shipment = Shipment::empty(ShipmentId::new());
        let err = deliver(&mut shipment).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
