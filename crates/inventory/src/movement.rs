//! Stock movements: the immutable audit trail behind every stock record.
//!
//! Only physical changes produce movements: receipts (inbound), committed
//! shipments (outbound) and on-hand corrections (adjustment). Reservations and
//! releases move no goods and are not recorded here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::MovementId;

use crate::record::{StockEvent, StockKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Inbound,
    Outbound,
    Adjustment,
}

/// Which way a movement moved on-hand quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Increase,
    Decrease,
}

/// A movement decided by the ledger but not yet appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub key: StockKey,
    pub kind: MovementKind,
    pub direction: MovementDirection,
    pub quantity: u64,
    pub reference_document: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl NewMovement {
    /// Translate a committed stock event into the movement it implies, if any.
    pub fn from_event(event: &StockEvent) -> Option<Self> {
        match event {
            StockEvent::StockReceived(e) => Some(Self {
                key: e.key,
                kind: MovementKind::Inbound,
                direction: MovementDirection::Increase,
                quantity: e.quantity,
                reference_document: e.reference.clone(),
                description: format!("received {} units", e.quantity),
                occurred_at: e.occurred_at,
            }),
            StockEvent::ShipmentCommitted(e) => Some(Self {
                key: e.key,
                kind: MovementKind::Outbound,
                direction: MovementDirection::Decrease,
                quantity: e.quantity,
                reference_document: e.reference.clone(),
                description: format!("shipped {} units", e.quantity),
                occurred_at: e.occurred_at,
            }),
            StockEvent::StockAdjusted(e) if e.on_hand != e.previous_on_hand => {
                let (direction, quantity, word) = if e.on_hand > e.previous_on_hand {
                    (MovementDirection::Increase, e.on_hand - e.previous_on_hand, "up")
                } else {
                    (MovementDirection::Decrease, e.previous_on_hand - e.on_hand, "down")
                };
                Some(Self {
                    key: e.key,
                    kind: MovementKind::Adjustment,
                    direction,
                    quantity,
                    reference_document: e.reference.clone(),
                    description: format!(
                        "on-hand adjusted {word} by {quantity} ({} -> {})",
                        e.previous_on_hand, e.on_hand
                    ),
                    occurred_at: e.occurred_at,
                })
            }
            StockEvent::StockAdjusted(_)
            | StockEvent::StockReserved(_)
            | StockEvent::ReservationReleased(_) => None,
        }
    }
}

/// Immutable, append-only movement log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: MovementId,
    /// Position in the log (1-based, strictly increasing).
    pub sequence: u64,
    pub key: StockKey,
    pub kind: MovementKind,
    pub direction: MovementDirection,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
    pub reference_document: String,
    pub description: String,
}

impl MovementEntry {
    pub fn new(id: MovementId, sequence: u64, movement: NewMovement) -> Self {
        Self {
            id,
            sequence,
            key: movement.key,
            kind: movement.kind,
            direction: movement.direction,
            quantity: movement.quantity,
            occurred_at: movement.occurred_at,
            reference_document: movement.reference_document,
            description: movement.description,
        }
    }

    pub fn signed_quantity(&self) -> i128 {
        match self.direction {
            MovementDirection::Increase => self.quantity as i128,
            MovementDirection::Decrease => -(self.quantity as i128),
        }
    }
}

/// Re-derive on-hand quantity from a record's movements.
pub fn derive_on_hand<'a>(entries: impl IntoIterator<Item = &'a MovementEntry>) -> i128 {
    entries.into_iter().map(MovementEntry::signed_quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ReservationReleased, StockAdjusted, StockReceived};
    use stockyard_core::{ProductId, WarehouseId};

    fn test_key() -> StockKey {
        StockKey::new(WarehouseId::new(), ProductId::new())
    }

    fn adjusted(key: StockKey, from: u64, to: u64) -> StockEvent {
        StockEvent::StockAdjusted(StockAdjusted {
            key,
            previous_on_hand: from,
            on_hand: to,
            previous_reserved: 0,
            reserved: 0,
            reference: "ADJ-7".to_string(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn receipt_becomes_inbound_movement() {
        let key = test_key();
        let movement = NewMovement::from_event(&StockEvent::StockReceived(StockReceived {
            key,
            quantity: 20,
            reference: "PO-1".to_string(),
            occurred_at: Utc::now(),
        }))
        .unwrap();

        assert_eq!(movement.kind, MovementKind::Inbound);
        assert_eq!(movement.quantity, 20);
        assert_eq!(movement.reference_document, "PO-1");
    }

    #[test]
    fn downward_adjustment_notes_direction() {
        let movement = NewMovement::from_event(&adjusted(test_key(), 10, 4)).unwrap();
        assert_eq!(movement.kind, MovementKind::Adjustment);
        assert_eq!(movement.direction, MovementDirection::Decrease);
        assert_eq!(movement.quantity, 6);
        assert!(movement.description.contains("down by 6"));
    }

    #[test]
    fn reserved_only_adjustment_and_releases_record_nothing() {
        let key = test_key();
        assert!(NewMovement::from_event(&adjusted(key, 5, 5)).is_none());
        assert!(
            NewMovement::from_event(&StockEvent::ReservationReleased(ReservationReleased {
                key,
                requested: 1,
                released: 1,
                occurred_at: Utc::now(),
            }))
            .is_none()
        );
    }

    #[test]
    fn on_hand_is_derivable_from_movements() {
        let key = test_key();
        let entries: Vec<MovementEntry> = [
            NewMovement::from_event(&StockEvent::StockReceived(StockReceived {
                key,
                quantity: 12,
                reference: "PO-1".to_string(),
                occurred_at: Utc::now(),
            })),
            NewMovement::from_event(&adjusted(key, 12, 9)),
        ]
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, m)| MovementEntry::new(MovementId::new(), i as u64 + 1, m))
        .collect();

        assert_eq!(derive_on_hand(&entries), 9);
    }
}
