use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{
    Aggregate, AggregateRoot, ClientId, DomainError, ProductId, SalesOrderId, WarehouseId,
};
use stockyard_events::Event;
use stockyard_inventory::StockKey;

/// Sales order status lifecycle.
///
/// ```text
/// CREATED ──reserve──▶ RESERVED ──ship──▶ SHIPPED ──deliver──▶ DELIVERED
///    │                    │
///    └──────cancel────────┴──────▶ CANCELED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Created,
    Reserved,
    Shipped,
    Delivered,
    Canceled,
}

/// Transitions a sales order can be asked to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderTransition {
    Reserve,
    Ship,
    Deliver,
    Cancel,
}

impl SalesOrderStatus {
    /// Transition table. `None` means the transition is not allowed.
    pub fn transition(self, transition: SalesOrderTransition) -> Option<SalesOrderStatus> {
        use SalesOrderStatus::*;
        use SalesOrderTransition::*;

        match (self, transition) {
            (Created, Reserve) => Some(Reserved),
            (Reserved, Ship) => Some(Shipped),
            (Shipped, Deliver) => Some(Delivered),
            (Created | Reserved, Cancel) => Some(Canceled),
            _ => None,
        }
    }
}

impl core::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SalesOrderStatus::Created => "CREATED",
            SalesOrderStatus::Reserved => "RESERVED",
            SalesOrderStatus::Shipped => "SHIPPED",
            SalesOrderStatus::Delivered => "DELIVERED",
            SalesOrderStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

impl core::fmt::Display for SalesOrderTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SalesOrderTransition::Reserve => "reserve",
            SalesOrderTransition::Ship => "ship",
            SalesOrderTransition::Deliver => "deliver",
            SalesOrderTransition::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Why an order was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Requested,
    ReservationExpired,
}

/// Requested line on a new order (warehouse comes from the order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub back_order: bool,
}

/// Order line: product, fulfillment warehouse, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub back_order: bool,
}

impl SalesOrderLine {
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    client_id: Option<ClientId>,
    warehouse_id: Option<WarehouseId>,
    status: SalesOrderStatus,
    lines: Vec<SalesOrderLine>,
    created_at: Option<DateTime<Utc>>,
    reserved_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancel_reason: Option<CancelReason>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            client_id: None,
            warehouse_id: None,
            status: SalesOrderStatus::Created,
            lines: Vec::new(),
            created_at: None,
            reserved_at: None,
            shipped_at: None,
            delivered_at: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[SalesOrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason
    }

    /// Whether this order currently has stock earmarked in the ledger.
    pub fn holds_reservation(&self) -> bool {
        self.status == SalesOrderStatus::Reserved
    }

    /// Reference document stamped on this order's stock movements.
    pub fn reference(&self) -> String {
        format!("SO-{}", self.id)
    }

    /// Total ordered quantity across lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .fold(0u64, |total, l| total.saturating_add(l.quantity))
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("sales order", self.id));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: SalesOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, transition: SalesOrderTransition) -> Result<(), DomainError> {
        match self.status.transition(transition) {
            Some(_) => Ok(()),
            None => Err(DomainError::invalid_operation(format!(
                "cannot {transition} sales order {} in status {}",
                self.id, self.status
            ))),
        }
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub order_id: SalesOrderId,
    pub client_id: ClientId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<NewOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveOrder {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverOrder {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: SalesOrderId,
    pub reason: CancelReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    ReserveOrder(ReserveOrder),
    ShipOrder(ShipOrder),
    DeliverOrder(DeliverOrder),
    CancelOrder(CancelOrder),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub order_id: SalesOrderId,
    pub client_id: ClientId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<SalesOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReserved {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCanceled.
///
/// `released_reservation` is true when the order was RESERVED, i.e. the
/// cancellation handed its line quantities back to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub order_id: SalesOrderId,
    pub reason: CancelReason,
    pub released_reservation: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    OrderReserved(OrderReserved),
    OrderShipped(OrderShipped),
    OrderDelivered(OrderDelivered),
    OrderCanceled(OrderCanceled),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::OrderReserved(_) => "sales.order.reserved",
            SalesOrderEvent::OrderShipped(_) => "sales.order.shipped",
            SalesOrderEvent::OrderDelivered(_) => "sales.order.delivered",
            SalesOrderEvent::OrderCanceled(_) => "sales.order.canceled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::OrderReserved(e) => e.occurred_at,
            SalesOrderEvent::OrderShipped(e) => e.occurred_at,
            SalesOrderEvent::OrderDelivered(e) => e.occurred_at,
            SalesOrderEvent::OrderCanceled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.client_id = Some(e.client_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.status = SalesOrderStatus::Created;
                self.lines = e.lines.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SalesOrderEvent::OrderReserved(e) => {
                self.status = SalesOrderStatus::Reserved;
                self.reserved_at = Some(e.occurred_at);
            }
            SalesOrderEvent::OrderShipped(e) => {
                self.status = SalesOrderStatus::Shipped;
                self.shipped_at = Some(e.occurred_at);
            }
            SalesOrderEvent::OrderDelivered(e) => {
                self.status = SalesOrderStatus::Delivered;
                self.delivered_at = Some(e.occurred_at);
            }
            SalesOrderEvent::OrderCanceled(e) => {
                self.status = SalesOrderStatus::Canceled;
                self.cancel_reason = Some(e.reason);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::ReserveOrder(cmd) => self.handle_reserve(cmd),
            SalesOrderCommand::ShipOrder(cmd) => self.handle_ship(cmd),
            SalesOrderCommand::DeliverOrder(cmd) => self.handle_deliver(cmd),
            SalesOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl SalesOrder {
    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("sales order needs at least one line"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: quantity must be positive",
                    idx + 1
                )));
            }
            if line.unit_price == 0 {
                return Err(DomainError::validation(format!(
                    "line {}: unit_price must be positive",
                    idx + 1
                )));
            }
            lines.push(SalesOrderLine {
                line_no: idx as u32 + 1,
                product_id: line.product_id,
                warehouse_id: cmd.warehouse_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                back_order: line.back_order,
            });
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            order_id: cmd.order_id,
            client_id: cmd.client_id,
            warehouse_id: cmd.warehouse_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(SalesOrderTransition::Reserve)?;

        Ok(vec![SalesOrderEvent::OrderReserved(OrderReserved {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(SalesOrderTransition::Ship)?;

        Ok(vec![SalesOrderEvent::OrderShipped(OrderShipped {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deliver(&self, cmd: &DeliverOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(SalesOrderTransition::Deliver)?;

        Ok(vec![SalesOrderEvent::OrderDelivered(OrderDelivered {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(SalesOrderTransition::Cancel)?;

        Ok(vec![SalesOrderEvent::OrderCanceled(OrderCanceled {
            order_id: cmd.order_id,
            reason: cmd.reason,
            released_reservation: self.holds_reservation(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockyard_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: u64) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new(),
            quantity,
            unit_price: 250,
            back_order: false,
        }
    }

    fn created_order(lines: Vec<NewOrderLine>) -> SalesOrder {
        let order_id = SalesOrderId::new();
        let mut order = SalesOrder::empty(order_id);
        execute(
            &mut order,
            &SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                order_id,
                client_id: ClientId::new(),
                warehouse_id: WarehouseId::new(),
                lines,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        order
    }

    fn reserve(order: &mut SalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        let cmd = SalesOrderCommand::ReserveOrder(ReserveOrder {
            order_id: order.id_typed(),
            occurred_at: test_time(),
        });
        execute(order, &cmd)
    }

    fn ship(order: &mut SalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        let cmd = SalesOrderCommand::ShipOrder(ShipOrder {
            order_id: order.id_typed(),
            occurred_at: test_time(),
        });
        execute(order, &cmd)
    }

    fn deliver(order: &mut SalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        let cmd = SalesOrderCommand::DeliverOrder(DeliverOrder {
            order_id: order.id_typed(),
            occurred_at: test_time(),
        });
        execute(order, &cmd)
    }

    fn cancel(order: &mut SalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        let cmd = SalesOrderCommand::CancelOrder(CancelOrder {
            order_id: order.id_typed(),
            reason: CancelReason::Requested,
            occurred_at: test_time(),
        });
        execute(order, &cmd)
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use SalesOrderStatus::*;
        use SalesOrderTransition::*;

        let all_status = [Created, Reserved, Shipped, Delivered, Canceled];
        let all_transitions = [Reserve, Ship, Deliver, Cancel];
        let allowed = [
            (Created, Reserve, Reserved),
            (Reserved, Ship, Shipped),
            (Shipped, Deliver, Delivered),
            (Created, Cancel, Canceled),
            (Reserved, Cancel, Canceled),
        ];

        for status in all_status {
            for t in all_transitions {
                let expected = allowed
                    .iter()
                    .find(|(s, tr, _)| *s == status && *tr == t)
                    .map(|(_, _, to)| *to);
                assert_eq!(status.transition(t), expected, "{status} --{t}-->");
            }
        }
    }

    #[test]
    fn create_assigns_line_numbers_and_order_warehouse() {
        let order = created_order(vec![line(2), line(3)]);
        assert_eq!(order.status(), SalesOrderStatus::Created);
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[1].line_no, 2);
        assert!(
            order
                .lines()
                .iter()
                .all(|l| Some(l.warehouse_id) == order.warehouse_id())
        );
        assert_eq!(order.total_quantity(), 5);
    }

    #[test]
    fn total_quantity_saturates_instead_of_overflowing() {
        let half = u64::MAX / 2 + 1;
        let order = created_order(vec![line(half), line(half)]);
        assert_eq!(order.total_quantity(), u64::MAX);
    }

    #[test]
    fn create_rejects_empty_and_zero_quantity_orders() {
        let order_id = SalesOrderId::new();
        let order = SalesOrder::empty(order_id);
        let mut cmd = CreateSalesOrder {
            order_id,
            client_id: ClientId::new(),
            warehouse_id: WarehouseId::new(),
            lines: vec![],
            occurred_at: test_time(),
        };
        let err = order
            .handle(&SalesOrderCommand::CreateSalesOrder(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        cmd.lines = vec![line(0)];
        let err = order
            .handle(&SalesOrderCommand::CreateSalesOrder(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn full_lifecycle_stamps_timestamps() {
        let mut order = created_order(vec![line(1)]);
        reserve(&mut order).unwrap();
        assert!(order.reserved_at().is_some());
        assert!(order.holds_reservation());

        ship(&mut order).unwrap();
        assert!(order.shipped_at().is_some());
        assert!(!order.holds_reservation());

        deliver(&mut order).unwrap();
        assert_eq!(order.status(), SalesOrderStatus::Delivered);
        assert!(order.delivered_at().is_some());
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn shipping_a_created_order_is_invalid() {
        let mut order = created_order(vec![line(1)]);
        let err = ship(&mut order).unwrap_err();
        assert!(err.is_invalid_operation());
        assert_eq!(order.status(), SalesOrderStatus::Created);
    }

    #[test]
    fn cancel_is_rejected_once_shipped() {
        let mut order = created_order(vec![line(1)]);
        reserve(&mut order).unwrap();
        ship(&mut order).unwrap();

        let err = cancel(&mut order).unwrap_err();
        assert!(err.is_invalid_operation());

        deliver(&mut order).unwrap();
        assert!(cancel(&mut order).unwrap_err().is_invalid_operation());
    }

    #[test]
    fn cancel_reports_whether_reservation_is_released() {
        let mut created = created_order(vec![line(1)]);
        match &cancel(&mut created).unwrap()[0] {
            SalesOrderEvent::OrderCanceled(e) => assert!(!e.released_reservation),
            other => panic!("expected OrderCanceled, got {other:?}"),
        }

        let mut reserved = created_order(vec![line(1)]);
        reserve(&mut reserved).unwrap();
        match &cancel(&mut reserved).unwrap()[0] {
            SalesOrderEvent::OrderCanceled(e) => assert!(e.released_reservation),
            other => panic!("expected OrderCanceled, got {other:?}"),
        }
        assert_eq!(reserved.cancel_reason(), Some(CancelReason::Requested));
    }

    #[test]
    fn commands_on_missing_order_are_not_found() {
        let mut order = SalesOrder::empty(SalesOrderId::new());
        let err = reserve(&mut order).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = created_order(vec![line(4)]);
        let snapshot = order.clone();
        let cmd = SalesOrderCommand::ReserveOrder(ReserveOrder {
            order_id: order.id_typed(),
            occurred_at: test_time(),
        });
        let a = order.handle(&cmd).unwrap();
        let b = order.handle(&cmd).unwrap();
        assert_eq!(a, b);
        assert_eq!(order, snapshot);
    }
}
