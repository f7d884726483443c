use std::sync::Arc;

use tracing::{debug, warn};

use stockyard_core::{Clock, DomainError, DomainResult, ProductId, WarehouseId};
use stockyard_events::execute;
use stockyard_inventory::{
    AdjustStock, CommitShipment, NewMovement, ReceiveStock, ReleaseStock, ReserveStock,
    StockCommand, StockEvent, StockKey, StockRecord, derive_on_hand,
};

use crate::store::LockedStore;

use super::movement_recorder::{InMemoryMovementRecorder, MovementRecorder};

/// Transactional stock ledger.
///
/// Owns every stock record. Each operation is an atomic read-modify-write
/// under the affected rows' locks; [`apply_all`](Self::apply_all) extends that
/// to several records at once. Every physical change is appended to the
/// movement log inside the same unit of work, so a failed append leaves the
/// records untouched.
pub struct StockLedger {
    records: LockedStore<StockKey, StockRecord>,
    movements: Arc<dyn MovementRecorder>,
    clock: Arc<dyn Clock>,
}

impl StockLedger {
    pub fn new(movements: Arc<dyn MovementRecorder>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: LockedStore::new("stock record"),
            movements,
            clock,
        }
    }

    /// Ledger backed by an in-memory movement log.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryMovementRecorder::new()), clock)
    }

    pub fn movements(&self) -> &dyn MovementRecorder {
        self.movements.as_ref()
    }

    pub fn reserve(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u64,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(warehouse_id, product_id);
        self.apply_one(StockCommand::Reserve(ReserveStock {
            key,
            quantity,
            occurred_at: self.clock.now(),
        }))
    }

    /// Give back a reservation. Releasing more than is reserved clamps at zero.
    pub fn release(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u64,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(warehouse_id, product_id);
        self.apply_one(StockCommand::Release(ReleaseStock {
            key,
            quantity,
            occurred_at: self.clock.now(),
        }))
    }

    pub fn commit_shipment(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u64,
        reference: &str,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(warehouse_id, product_id);
        self.apply_one(StockCommand::CommitShipment(CommitShipment {
            key,
            quantity,
            reference: reference.to_string(),
            occurred_at: self.clock.now(),
        }))
    }

    pub fn receive(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u64,
        reference: &str,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(warehouse_id, product_id);
        self.apply_one(StockCommand::Receive(ReceiveStock {
            key,
            quantity,
            reference: reference.to_string(),
            occurred_at: self.clock.now(),
        }))
    }

    /// Administrative correction to absolute quantities.
    pub fn adjust(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        on_hand: u64,
        reserved: u64,
        reference: &str,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(warehouse_id, product_id);
        self.apply_one(StockCommand::Adjust(AdjustStock {
            key,
            on_hand,
            reserved,
            reference: reference.to_string(),
            occurred_at: self.clock.now(),
        }))
    }

    /// Apply several commands as one unit of work.
    ///
    /// Commands run in order against working copies of every affected record;
    /// commands on the same record see each other's effects. Any failure leaves
    /// every record and the movement log unchanged.
    pub fn apply_all(&self, commands: &[StockCommand]) -> DomainResult<Vec<StockEvent>> {
        if commands.is_empty() {
            return Ok(vec![]);
        }

        let keys: Vec<StockKey> = commands.iter().map(StockCommand::key).collect();
        self.records.transact(&keys, |k| StockRecord::empty(*k), |rows| {
            let mut events = Vec::new();
            for command in commands {
                let key = command.key();
                let record = rows
                    .get_mut(&key)
                    .ok_or_else(|| DomainError::conflict(format!("stock record {key} not locked")))?;

                if matches!(command, StockCommand::Release(_)) && !record.exists() {
                    return Err(DomainError::not_found("stock record", key));
                }

                for event in execute(record, command)? {
                    if let StockEvent::ReservationReleased(e) = &event {
                        if e.released < e.requested {
                            warn!(
                                warehouse = %key.warehouse_id,
                                product = %key.product_id,
                                requested = e.requested,
                                released = e.released,
                                "release exceeded reserved quantity; clamped at zero"
                            );
                        }
                    }
                    events.push(event);
                }
            }

            let movements: Vec<NewMovement> =
                events.iter().filter_map(NewMovement::from_event).collect();
            let recorded = self.movements.record(movements)?;
            debug!(
                commands = commands.len(),
                movements = recorded.len(),
                "stock unit of work committed"
            );

            Ok(events)
        })
    }

    /// Current quantities of one record, if it ever saw a movement.
    pub fn record(&self, warehouse_id: WarehouseId, product_id: ProductId) -> Option<StockRecord> {
        self.records
            .get(&StockKey::new(warehouse_id, product_id))
            .filter(StockRecord::exists)
    }

    pub fn records_for_product(&self, product_id: ProductId) -> Vec<StockRecord> {
        let mut records = self
            .records
            .filter(|r| r.exists() && r.key().product_id == product_id);
        records.sort_by_key(StockRecord::key);
        records
    }

    pub fn available_in(&self, warehouse_id: WarehouseId, product_id: ProductId) -> u64 {
        self.record(warehouse_id, product_id)
            .map(|r| r.available())
            .unwrap_or(0)
    }

    pub fn available_across_warehouses(&self, product_id: ProductId) -> u64 {
        self.records_for_product(product_id)
            .iter()
            .fold(0u64, |total, r| total.saturating_add(r.available()))
    }

    /// Check that the record's on-hand matches what its movements add up to.
    pub fn reconcile(&self, warehouse_id: WarehouseId, product_id: ProductId) -> DomainResult<()> {
        let key = StockKey::new(warehouse_id, product_id);
        self.records.update(&key, |record| {
            let derived = derive_on_hand(&self.movements.for_record(key));
            if derived != record.on_hand() as i128 {
                return Err(DomainError::conflict(format!(
                    "stock record {key}: on-hand {} but movements add up to {derived}",
                    record.on_hand()
                )));
            }
            Ok(())
        })
    }

    fn apply_one(&self, command: StockCommand) -> DomainResult<StockRecord> {
        let key = command.key();
        self.apply_all(std::slice::from_ref(&command))?;
        self.records
            .get(&key)
            .ok_or_else(|| DomainError::not_found("stock record", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockyard_core::ManualClock;
    use stockyard_inventory::MovementKind;

    fn ledger() -> StockLedger {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap());
        StockLedger::in_memory(Arc::new(clock))
    }

    #[test]
    fn receive_creates_record_and_inbound_movement() {
        let ledger = ledger();
        let (w, p) = (WarehouseId::new(), ProductId::new());

        let record = ledger.receive(w, p, 20, "PO-1").unwrap();
        assert_eq!(record.on_hand(), 20);

        let movements = ledger.movements().all();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Inbound);
        assert_eq!(movements[0].reference_document, "PO-1");
    }

    #[test]
    fn reserve_against_missing_record_is_insufficient_stock() {
        let ledger = ledger();
        let err = ledger.reserve(WarehouseId::new(), ProductId::new(), 1).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock { available: 0, .. }
        ));
    }

    #[test]
    fn failed_reserve_leaves_no_visible_record() {
        let ledger = ledger();
        let (w, p) = (WarehouseId::new(), ProductId::new());
        let _ = ledger.reserve(w, p, 1);
        assert!(ledger.record(w, p).is_none());
        assert!(ledger.records_for_product(p).is_empty());
        assert!(ledger.records.is_empty());
    }

    #[test]
    fn availability_across_warehouses_saturates() {
        let ledger = ledger();
        let p = ProductId::new();
        ledger.receive(WarehouseId::new(), p, u64::MAX, "PO-1").unwrap();
        ledger.receive(WarehouseId::new(), p, u64::MAX, "PO-2").unwrap();
        assert_eq!(ledger.available_across_warehouses(p), u64::MAX);
    }

    #[test]
    fn release_of_unknown_record_is_not_found() {
        let ledger = ledger();
        let err = ledger.release(WarehouseId::new(), ProductId::new(), 1).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn double_release_clamps_at_zero() {
        let ledger = ledger();
        let (w, p) = (WarehouseId::new(), ProductId::new());
        ledger.receive(w, p, 10, "PO-1").unwrap();
        ledger.reserve(w, p, 4).unwrap();

        ledger.release(w, p, 4).unwrap();
        let record = ledger.release(w, p, 4).unwrap();
        assert_eq!(record.reserved(), 0);
        assert_eq!(record.on_hand(), 10);
    }

    #[test]
    fn commit_shipment_records_outbound_movement() {
        let ledger = ledger();
        let (w, p) = (WarehouseId::new(), ProductId::new());
        ledger.receive(w, p, 10, "PO-1").unwrap();
        ledger.reserve(w, p, 6).unwrap();

        let record = ledger.commit_shipment(w, p, 6, "SO-9").unwrap();
        assert_eq!((record.on_hand(), record.reserved()), (4, 0));

        let out = ledger.movements().by_reference("SO-9");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MovementKind::Outbound);
        ledger.reconcile(w, p).unwrap();
    }

    #[test]
    fn reserved_only_adjustment_records_no_movement() {
        let ledger = ledger();
        let (w, p) = (WarehouseId::new(), ProductId::new());
        ledger.receive(w, p, 10, "PO-1").unwrap();

        ledger.adjust(w, p, 10, 3, "ADJ-1").unwrap();
        assert_eq!(ledger.movements().len(), 1);

        ledger.adjust(w, p, 7, 3, "ADJ-2").unwrap();
        let adj = ledger.movements().by_reference("ADJ-2");
        assert_eq!(adj[0].kind, MovementKind::Adjustment);
        assert_eq!(adj[0].quantity, 3);
        ledger.reconcile(w, p).unwrap();
    }

    #[test]
    fn adjust_rejects_reserved_above_on_hand() {
        let ledger = ledger();
        let err = ledger
            .adjust(WarehouseId::new(), ProductId::new(), 2, 3, "ADJ-1")
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn apply_all_rolls_back_every_record_on_failure() {
        let ledger = ledger();
        let w = WarehouseId::new();
        let (x, y) = (ProductId::new(), ProductId::new());
        ledger.receive(w, x, 5, "PO-1").unwrap();

        let now = Utc::now();
        let err = ledger
            .apply_all(&[
                StockCommand::Reserve(ReserveStock {
                    key: StockKey::new(w, x),
                    quantity: 5,
                    occurred_at: now,
                }),
                StockCommand::Reserve(ReserveStock {
                    key: StockKey::new(w, y),
                    quantity: 1,
                    occurred_at: now,
                }),
            ])
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(ledger.record(w, x).unwrap().reserved(), 0);
    }

    #[test]
    fn availability_sums_across_warehouses() {
        let ledger = ledger();
        let p = ProductId::new();
        let (w1, w2) = (WarehouseId::new(), WarehouseId::new());
        ledger.receive(w1, p, 5, "PO-1").unwrap();
        ledger.receive(w2, p, 7, "PO-2").unwrap();
        ledger.reserve(w2, p, 2).unwrap();

        assert_eq!(ledger.available_in(w1, p), 5);
        assert_eq!(ledger.available_in(w2, p), 5);
        assert_eq!(ledger.available_across_warehouses(p), 10);
    }
}
