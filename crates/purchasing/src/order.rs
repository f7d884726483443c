use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{
    Aggregate, AggregateRoot, DomainError, ProductId, PurchaseOrderId, SupplierId, WarehouseId,
};
use stockyard_events::Event;

/// Purchase order status lifecycle.
///
/// `CREATED → APPROVED → RECEIVED`, with `CREATED | APPROVED → CANCELED`.
/// `RECEIVED` and `CANCELED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Created,
    Approved,
    Received,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderTransition {
    Approve,
    Receive,
    Cancel,
    ReplaceLines,
}

impl PurchaseOrderStatus {
    pub fn transition(self, transition: PurchaseOrderTransition) -> Option<PurchaseOrderStatus> {
        use PurchaseOrderStatus::*;
        use PurchaseOrderTransition::*;

        match (self, transition) {
            (Created, Approve) => Some(Approved),
            (Approved, Receive) => Some(Received),
            (Created | Approved, Cancel) => Some(Canceled),
            (Created, ReplaceLines) => Some(Created),
            _ => None,
        }
    }

    /// Deletion is only allowed before approval or after cancellation.
    pub fn is_deletable(self) -> bool {
        matches!(self, PurchaseOrderStatus::Created | PurchaseOrderStatus::Canceled)
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PurchaseOrderStatus::Created => "CREATED",
            PurchaseOrderStatus::Approved => "APPROVED",
            PurchaseOrderStatus::Received => "RECEIVED",
            PurchaseOrderStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

impl core::fmt::Display for PurchaseOrderTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PurchaseOrderTransition::Approve => "approve",
            PurchaseOrderTransition::Receive => "receive",
            PurchaseOrderTransition::Cancel => "cancel",
            PurchaseOrderTransition::ReplaceLines => "replace lines of",
        };
        f.write_str(s)
    }
}

/// Requested purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseLine {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_price: u64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier_id: Option<SupplierId>,
    status: PurchaseOrderStatus,
    lines: Vec<LineItem>,
    created_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    received_into: Option<WarehouseId>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            supplier_id: None,
            status: PurchaseOrderStatus::Created,
            lines: Vec::new(),
            created_at: None,
            approved_at: None,
            received_at: None,
            canceled_at: None,
            received_into: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    /// Warehouse the goods were received into (set on receipt).
    pub fn received_into(&self) -> Option<WarehouseId> {
        self.received_into
    }

    /// Reference document stamped on inbound movements for this order.
    pub fn reference(&self) -> String {
        format!("PO-{}", self.id)
    }

    pub fn total_cost(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| l.quantity.saturating_mul(l.unit_price))
            .fold(0u64, u64::saturating_add)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<NewPurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReplaceLines (only allowed in Created).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceLines {
    pub order_id: PurchaseOrderId,
    pub lines: Vec<NewPurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods.
///
/// The destination warehouse is chosen at receipt time, not at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub order_id: PurchaseOrderId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    ReplaceLines(ReplaceLines),
    Approve(Approve),
    ReceiveGoods(ReceiveGoods),
    Cancel(Cancel),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderLinesReplaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLinesReplaced {
    pub order_id: PurchaseOrderId,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderApproved {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// Carries the lines and destination warehouse; the infrastructure turns each
/// line into a ledger receipt in the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCanceled {
    pub order_id: PurchaseOrderId,
    pub previous_status: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderLinesReplaced(PurchaseOrderLinesReplaced),
    PurchaseOrderApproved(PurchaseOrderApproved),
    GoodsReceived(GoodsReceived),
    PurchaseOrderCanceled(PurchaseOrderCanceled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderLinesReplaced(_) => "purchasing.order.lines_replaced",
            PurchaseOrderEvent::PurchaseOrderApproved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderCanceled(_) => "purchasing.order.canceled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLinesReplaced(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCanceled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.supplier_id = Some(e.supplier_id);
                self.status = PurchaseOrderStatus::Created;
                self.lines = e.lines.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderLinesReplaced(e) => {
                self.lines = e.lines.clone();
            }
            PurchaseOrderEvent::PurchaseOrderApproved(e) => {
                self.status = PurchaseOrderStatus::Approved;
                self.approved_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                self.status = PurchaseOrderStatus::Received;
                self.received_at = Some(e.occurred_at);
                self.received_into = Some(e.warehouse_id);
            }
            PurchaseOrderEvent::PurchaseOrderCanceled(e) => {
                self.status = PurchaseOrderStatus::Canceled;
                self.canceled_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::ReplaceLines(cmd) => self.handle_replace_lines(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("purchase order", self.id));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, transition: PurchaseOrderTransition) -> Result<(), DomainError> {
        if self.status.transition(transition).is_none() {
            return Err(DomainError::invalid_operation(format!(
                "cannot {transition} purchase order {} in status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn build_lines(lines: &[NewPurchaseLine]) -> Result<Vec<LineItem>, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order needs at least one line",
            ));
        }

        lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
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
                Ok(LineItem {
                    line_no: idx as u32 + 1,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
            })
            .collect()
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;
        let lines = Self::build_lines(&cmd.lines)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                supplier_id: cmd.supplier_id,
                lines,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_replace_lines(
        &self,
        cmd: &ReplaceLines,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderTransition::ReplaceLines)?;
        let lines = Self::build_lines(&cmd.lines)?;

        if lines == self.lines {
            return Ok(vec![]);
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderLinesReplaced(
            PurchaseOrderLinesReplaced {
                order_id: cmd.order_id,
                lines,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderTransition::Approve)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderApproved(
            PurchaseOrderApproved {
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderTransition::Receive)?;

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::validation("supplier_id missing"))?;

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            supplier_id,
            warehouse_id: cmd.warehouse_id,
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderTransition::Cancel)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCanceled(
            PurchaseOrderCanceled {
                order_id: cmd.order_id,
                previous_status: self.status,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
