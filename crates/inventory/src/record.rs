use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{Aggregate, AggregateRoot, DomainError, ProductId, WarehouseId};
use stockyard_events::Event;

/// Unique key of a stock record: one per warehouse × product pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        Self {
            warehouse_id,
            product_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.warehouse_id, self.product_id)
    }
}

/// Aggregate root: StockRecord.
///
/// Invariant: `reserved <= on_hand` at all times, so `available()` never
/// underflows. Quantities are only changed through [`StockCommand`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    key: StockKey,
    on_hand: u64,
    reserved: u64,
    version: u64,
}

impl StockRecord {
    /// A record that has never seen a movement (0 on hand, 0 reserved).
    pub fn empty(key: StockKey) -> Self {
        Self {
            key,
            on_hand: 0,
            reserved: 0,
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn on_hand(&self) -> u64 {
        self.on_hand
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn available(&self) -> u64 {
        self.on_hand - self.reserved
    }

    /// True once any event has been applied.
    pub fn exists(&self) -> bool {
        self.version > 0
    }
}

impl AggregateRoot for StockRecord {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: earmark available units for an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub key: StockKey,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: give back a reservation (clamped at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub key: StockKey,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: reserved units physically leave the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitShipment {
    pub key: StockKey,
    pub quantity: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: units arrive into the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub key: StockKey,
    pub quantity: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: administrative correction to absolute quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub key: StockKey,
    pub on_hand: u64,
    pub reserved: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Reserve(ReserveStock),
    Release(ReleaseStock),
    CommitShipment(CommitShipment),
    Receive(ReceiveStock),
    Adjust(AdjustStock),
}

impl StockCommand {
    pub fn key(&self) -> StockKey {
        match self {
            StockCommand::Reserve(c) => c.key,
            StockCommand::Release(c) => c.key,
            StockCommand::CommitShipment(c) => c.key,
            StockCommand::Receive(c) => c.key,
            StockCommand::Adjust(c) => c.key,
        }
    }
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub key: StockKey,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
///
/// `released` may be smaller than `requested` when the reservation had already
/// shrunk below the requested amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub key: StockKey,
    pub requested: u64,
    pub released: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCommitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCommitted {
    pub key: StockKey,
    pub quantity: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub key: StockKey,
    pub quantity: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub key: StockKey,
    pub previous_on_hand: u64,
    pub on_hand: u64,
    pub previous_reserved: u64,
    pub reserved: u64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    ShipmentCommitted(ShipmentCommitted),
    StockReceived(StockReceived),
    StockAdjusted(StockAdjusted),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockReserved(_) => "inventory.stock.reserved",
            StockEvent::ReservationReleased(_) => "inventory.stock.released",
            StockEvent::ShipmentCommitted(_) => "inventory.stock.shipped",
            StockEvent::StockReceived(_) => "inventory.stock.received",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockReserved(e) => e.occurred_at,
            StockEvent::ReservationReleased(e) => e.occurred_at,
            StockEvent::ShipmentCommitted(e) => e.occurred_at,
            StockEvent::StockReceived(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockReserved(e) => {
                self.reserved += e.quantity;
            }
            StockEvent::ReservationReleased(e) => {
                self.reserved -= e.released;
            }
            StockEvent::ShipmentCommitted(e) => {
                self.on_hand -= e.quantity;
                self.reserved -= e.quantity;
            }
            StockEvent::StockReceived(e) => {
                self.on_hand += e.quantity;
            }
            StockEvent::StockAdjusted(e) => {
                self.on_hand = e.on_hand;
                self.reserved = e.reserved;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.key() != self.key {
            return Err(DomainError::validation(format!(
                "command targets {} but record is {}",
                command.key(),
                self.key
            )));
        }

        match command {
            StockCommand::Reserve(cmd) => self.handle_reserve(cmd),
            StockCommand::Release(cmd) => self.handle_release(cmd),
            StockCommand::CommitShipment(cmd) => self.handle_commit(cmd),
            StockCommand::Receive(cmd) => self.handle_receive(cmd),
            StockCommand::Adjust(cmd) => self.handle_adjust(cmd),
        }
    }
}

fn ensure_positive(quantity: u64, what: &str) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::invalid_quantity(format!(
            "{what} quantity must be positive"
        )));
    }
    Ok(())
}

impl StockRecord {
    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<StockEvent>, DomainError> {
        ensure_positive(cmd.quantity, "reserve")?;

        let available = self.available();
        if available < cmd.quantity {
            return Err(DomainError::insufficient_stock(
                self.key.product_id,
                cmd.quantity,
                available,
            ));
        }

        Ok(vec![StockEvent::StockReserved(StockReserved {
            key: self.key,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<StockEvent>, DomainError> {
        ensure_positive(cmd.quantity, "release")?;

        Ok(vec![StockEvent::ReservationReleased(ReservationReleased {
            key: self.key,
            requested: cmd.quantity,
            released: cmd.quantity.min(self.reserved),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_commit(&self, cmd: &CommitShipment) -> Result<Vec<StockEvent>, DomainError> {
        ensure_positive(cmd.quantity, "shipment")?;

        if self.reserved < cmd.quantity {
            return Err(DomainError::invalid_quantity(format!(
                "cannot ship {} of product {}: only {} reserved",
                cmd.quantity, self.key.product_id, self.reserved
            )));
        }

        Ok(vec![StockEvent::ShipmentCommitted(ShipmentCommitted {
            key: self.key,
            quantity: cmd.quantity,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<StockEvent>, DomainError> {
        ensure_positive(cmd.quantity, "receipt")?;

        if self.on_hand.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::invalid_quantity("on-hand quantity overflow"));
        }

        Ok(vec![StockEvent::StockReceived(StockReceived {
            key: self.key,
            quantity: cmd.quantity,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        if cmd.reserved > cmd.on_hand {
            return Err(DomainError::invalid_quantity(format!(
                "reserved ({}) cannot exceed on-hand ({})",
                cmd.reserved, cmd.on_hand
            )));
        }

        if cmd.on_hand == self.on_hand && cmd.reserved == self.reserved {
            return Ok(vec![]);
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            key: self.key,
            previous_on_hand: self.on_hand,
            on_hand: cmd.on_hand,
            previous_reserved: self.reserved,
            reserved: cmd.reserved,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
