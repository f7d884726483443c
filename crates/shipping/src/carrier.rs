use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{Aggregate, AggregateRoot, CarrierId, DomainError};
use stockyard_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierStatus {
    Active,
    Inactive,
    Suspended,
}

impl core::fmt::Display for CarrierStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            CarrierStatus::Active => "ACTIVE",
            CarrierStatus::Inactive => "INACTIVE",
            CarrierStatus::Suspended => "SUSPENDED",
        };
        f.write_str(s)
    }
}

/// Aggregate root: Carrier.
///
/// Invariant: `current_daily_shipments <= max_daily_capacity` for every booking
/// accepted while the carrier is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Carrier {
    id: CarrierId,
    name: String,
    status: CarrierStatus,
    max_daily_capacity: u32,
    current_daily_shipments: u32,
    version: u64,
    created: bool,
}

impl Carrier {
    pub fn empty(id: CarrierId) -> Self {
        Self {
            id,
            name: String::new(),
            status: CarrierStatus::Active,
            max_daily_capacity: 0,
            current_daily_shipments: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CarrierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> CarrierStatus {
        self.status
    }

    pub fn max_daily_capacity(&self) -> u32 {
        self.max_daily_capacity
    }

    pub fn current_daily_shipments(&self) -> u32 {
        self.current_daily_shipments
    }

    /// Remaining slots for today (never negative).
    pub fn available_capacity(&self) -> u32 {
        self.max_daily_capacity
            .saturating_sub(self.current_daily_shipments)
    }
}

impl AggregateRoot for Carrier {
    type Id = CarrierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarrierCommand {
    Register {
        carrier_id: CarrierId,
        name: String,
        max_daily_capacity: u32,
        occurred_at: DateTime<Utc>,
    },
    /// Claim `count` daily slots (1 for a single assignment).
    Book {
        carrier_id: CarrierId,
        count: u32,
        occurred_at: DateTime<Utc>,
    },
    /// Hand one slot back (on delivery), floored at zero.
    Release {
        carrier_id: CarrierId,
        occurred_at: DateTime<Utc>,
    },
    ResetDaily {
        carrier_id: CarrierId,
        occurred_at: DateTime<Utc>,
    },
    ChangeStatus {
        carrier_id: CarrierId,
        status: CarrierStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl CarrierCommand {
    fn carrier_id(&self) -> CarrierId {
        match self {
            CarrierCommand::Register { carrier_id, .. }
            | CarrierCommand::Book { carrier_id, .. }
            | CarrierCommand::Release { carrier_id, .. }
            | CarrierCommand::ResetDaily { carrier_id, .. }
            | CarrierCommand::ChangeStatus { carrier_id, .. } => *carrier_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarrierEvent {
    Registered {
        carrier_id: CarrierId,
        name: String,
        max_daily_capacity: u32,
        occurred_at: DateTime<Utc>,
    },
    ShipmentsBooked {
        carrier_id: CarrierId,
        count: u32,
        current_daily_shipments: u32,
        occurred_at: DateTime<Utc>,
    },
    ShipmentReleased {
        carrier_id: CarrierId,
        current_daily_shipments: u32,
        occurred_at: DateTime<Utc>,
    },
    DailyCountReset {
        carrier_id: CarrierId,
        previous: u32,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        carrier_id: CarrierId,
        from: CarrierStatus,
        to: CarrierStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for CarrierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CarrierEvent::Registered { .. } => "shipping.carrier.registered",
            CarrierEvent::ShipmentsBooked { .. } => "shipping.carrier.shipments_booked",
            CarrierEvent::ShipmentReleased { .. } => "shipping.carrier.shipment_released",
            CarrierEvent::DailyCountReset { .. } => "shipping.carrier.daily_count_reset",
            CarrierEvent::StatusChanged { .. } => "shipping.carrier.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CarrierEvent::Registered { occurred_at, .. }
            | CarrierEvent::ShipmentsBooked { occurred_at, .. }
            | CarrierEvent::ShipmentReleased { occurred_at, .. }
            | CarrierEvent::DailyCountReset { occurred_at, .. }
            | CarrierEvent::StatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Carrier {
    type Command = CarrierCommand;
    type Event = CarrierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CarrierEvent::Registered {
                carrier_id,
                name,
                max_daily_capacity,
                ..
            } => {
                self.id = *carrier_id;
                self.name = name.clone();
                self.max_daily_capacity = *max_daily_capacity;
                self.current_daily_shipments = 0;
                self.status = CarrierStatus::Active;
                self.created = true;
            }
            CarrierEvent::ShipmentsBooked {
                current_daily_shipments,
                ..
            }
            | CarrierEvent::ShipmentReleased {
                current_daily_shipments,
                ..
            } => {
                self.current_daily_shipments = *current_daily_shipments;
            }
            CarrierEvent::DailyCountReset { .. } => {
                self.current_daily_shipments = 0;
            }
            CarrierEvent::StatusChanged { to, .. } => {
                self.status = *to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.id != command.carrier_id() {
            return Err(DomainError::validation("carrier_id mismatch"));
        }

        match command {
            CarrierCommand::Register {
                carrier_id,
                name,
                max_daily_capacity,
                occurred_at,
            } => {
                if self.created {
                    return Err(DomainError::conflict("carrier already exists"));
                }
                if name.trim().is_empty() {
                    return Err(DomainError::validation("carrier name cannot be empty"));
                }
                if *max_daily_capacity == 0 {
                    return Err(DomainError::invalid_quantity(
                        "max daily capacity must be positive",
                    ));
                }
                Ok(vec![CarrierEvent::Registered {
                    carrier_id: *carrier_id,
                    name: name.trim().to_string(),
                    max_daily_capacity: *max_daily_capacity,
                    occurred_at: *occurred_at,
                }])
            }
            CarrierCommand::Book {
                carrier_id,
                count,
                occurred_at,
            } => {
                self.ensure_exists()?;
                if *count == 0 {
                    return Err(DomainError::validation("nothing to book"));
                }
                if self.status != CarrierStatus::Active {
                    return Err(DomainError::invalid_operation(format!(
                        "carrier {} is {}, not ACTIVE",
                        self.id, self.status
                    )));
                }
                let available = self.available_capacity();
                if *count > available {
                    return Err(DomainError::invalid_operation(format!(
                        "carrier {} has {available} of {} daily slots left, {count} requested",
                        self.id, self.max_daily_capacity
                    )));
                }
                Ok(vec![CarrierEvent::ShipmentsBooked {
                    carrier_id: *carrier_id,
                    count: *count,
                    current_daily_shipments: self.current_daily_shipments + count,
                    occurred_at: *occurred_at,
                }])
            }
            CarrierCommand::Release {
                carrier_id,
                occurred_at,
            } => {
                self.ensure_exists()?;
                if self.current_daily_shipments == 0 {
                    return Ok(vec![]);
                }
                Ok(vec![CarrierEvent::ShipmentReleased {
                    carrier_id: *carrier_id,
                    current_daily_shipments: self.current_daily_shipments - 1,
                    occurred_at: *occurred_at,
                }])
            }
            CarrierCommand::ResetDaily {
                carrier_id,
                occurred_at,
            } => {
                self.ensure_exists()?;
                if self.current_daily_shipments == 0 {
                    return Ok(vec![]);
                }
                Ok(vec![CarrierEvent::DailyCountReset {
                    carrier_id: *carrier_id,
                    previous: self.current_daily_shipments,
                    occurred_at: *occurred_at,
                }])
            }
            CarrierCommand::ChangeStatus {
                carrier_id,
                status,
                occurred_at,
            } => {
                self.ensure_exists()?;
                if self.status == *status {
                    return Ok(vec![]);
                }
                Ok(vec![CarrierEvent::StatusChanged {
                    carrier_id: *carrier_id,
                    from: self.status,
                    to: *status,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl Carrier {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("carrier", self.id));
        }
        Ok(())
    }
}
