use std::sync::{Arc, RwLock};

use stockyard_core::{DomainError, DomainResult, MovementId};
use stockyard_inventory::{MovementEntry, NewMovement, StockKey};

/// Append-only audit log of stock movements.
///
/// Entries are never updated or deleted. `record` appends a whole batch or
/// nothing, assigning consecutive sequence numbers.
pub trait MovementRecorder: Send + Sync {
    fn record(&self, movements: Vec<NewMovement>) -> DomainResult<Vec<MovementEntry>>;

    /// Every movement of one stock record, in log order.
    fn for_record(&self, key: StockKey) -> Vec<MovementEntry>;

    /// Every movement tagged with `reference` (e.g. `PO-<id>`), in log order.
    fn by_reference(&self, reference: &str) -> Vec<MovementEntry>;

    fn all(&self) -> Vec<MovementEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> MovementRecorder for Arc<R>
where
    R: MovementRecorder + ?Sized,
{
    fn record(&self, movements: Vec<NewMovement>) -> DomainResult<Vec<MovementEntry>> {
        (**self).record(movements)
    }

    fn for_record(&self, key: StockKey) -> Vec<MovementEntry> {
        (**self).for_record(key)
    }

    fn by_reference(&self, reference: &str) -> Vec<MovementEntry> {
        (**self).by_reference(reference)
    }

    fn all(&self) -> Vec<MovementEntry> {
        (**self).all()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// In-memory movement log.
#[derive(Debug, Default)]
pub struct InMemoryMovementRecorder {
    entries: RwLock<Vec<MovementEntry>>,
}

impl InMemoryMovementRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn select<P>(&self, pred: P) -> Vec<MovementEntry>
    where
        P: Fn(&MovementEntry) -> bool,
    {
        match self.entries.read() {
            Ok(entries) => entries.iter().filter(|e| pred(e)).cloned().collect(),
            Err(_) => vec![],
        }
    }
}

impl MovementRecorder for InMemoryMovementRecorder {
    fn record(&self, movements: Vec<NewMovement>) -> DomainResult<Vec<MovementEntry>> {
        if movements.is_empty() {
            return Ok(vec![]);
        }

        if let Some(bad) = movements.iter().find(|m| m.quantity == 0) {
            return Err(DomainError::invalid_quantity(format!(
                "movement for {} must move a positive quantity",
                bad.key
            )));
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| DomainError::conflict("movement log lock poisoned"))?;

        let mut next = entries.last().map(|e| e.sequence).unwrap_or(0) + 1;
        let mut committed = Vec::with_capacity(movements.len());
        for movement in movements {
            let entry = MovementEntry::new(MovementId::new(), next, movement);
            next += 1;
            entries.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    fn for_record(&self, key: StockKey) -> Vec<MovementEntry> {
        self.select(|e| e.key == key)
    }

    fn by_reference(&self, reference: &str) -> Vec<MovementEntry> {
        self.select(|e| e.reference_document == reference)
    }

    fn all(&self) -> Vec<MovementEntry> {
        self.select(|_| true)
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}
