use std::io;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use stockyard_core::{DomainError, SalesOrderId};
use stockyard_events::{EventBus, EventEnvelope};
use stockyard_sales::{CancelReason, SalesOrderStatus};

use crate::config::Settings;
use crate::engine::FulfillmentEngine;

use super::periodic::{PeriodicWorker, WorkerHandle};

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired orders found at the start of the sweep.
    pub examined: usize,
    pub canceled: usize,
    /// Orders that left RESERVED before the sweep reached them.
    pub skipped: usize,
    pub failed: usize,
}

/// An order whose reservation is about to expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryWarning {
    pub order_id: SalesOrderId,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Reservation TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationExpiry {
    pub ttl: Duration,
    pub warning_lead: Duration,
}

impl ReservationExpiry {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ttl: settings.reservation_ttl(),
            warning_lead: settings.expiry_warning_lead(),
        }
    }

    /// Cancel every RESERVED order whose reservation is older than the TTL.
    ///
    /// Goes through the same cancel path as a user would. Each order stands on
    /// its own: a failure is logged and the sweep moves on. An order that a
    /// concurrent ship/cancel got to first is skipped.
    pub fn sweep<B>(&self, engine: &FulfillmentEngine<B>) -> SweepReport
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        let now = engine.now();
        let expired = engine.orders_reserved_before(now - self.ttl);
        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for order in expired {
            let order_id = order.id_typed();
            match engine.cancel_order(order_id, CancelReason::ReservationExpired) {
                Ok(_) => {
                    report.canceled += 1;
                    info!(order_id = %order_id, reserved_at = ?order.reserved_at(), "reservation expired; order canceled");
                }
                Err(DomainError::InvalidOperation(reason)) => {
                    report.skipped += 1;
                    debug!(order_id = %order_id, reason = %reason, "order left RESERVED before sweep reached it");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(order_id = %order_id, error = %err, "failed to expire reservation");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                canceled = report.canceled,
                skipped = report.skipped,
                failed = report.failed,
                "reservation expiry sweep finished"
            );
        }
        report
    }

    /// RESERVED orders inside the warning window `[ttl - lead, ttl)`. Read-only.
    pub fn nearing_expiry<B>(&self, engine: &FulfillmentEngine<B>) -> Vec<ExpiryWarning>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        let now = engine.now();
        let expired_before = now - self.ttl;

        let warnings: Vec<ExpiryWarning> = engine
            .orders_reserved_before(now - (self.ttl - self.warning_lead))
            .into_iter()
            .filter(|o| o.status() == SalesOrderStatus::Reserved)
            .filter_map(|o| {
                let reserved_at = o.reserved_at()?;
                (reserved_at >= expired_before).then(|| ExpiryWarning {
                    order_id: o.id_typed(),
                    reserved_at,
                    expires_at: reserved_at + self.ttl,
                })
            })
            .collect();

        for w in &warnings {
            warn!(order_id = %w.order_id, expires_at = %w.expires_at, "reservation nearing expiry");
        }
        warnings
    }
}

/// Background expiry: one worker sweeping, one reporting orders close to expiry.
#[derive(Debug)]
pub struct ReservationExpiryScheduler {
    sweep: WorkerHandle,
    warning: WorkerHandle,
}

impl ReservationExpiryScheduler {
    pub fn spawn<B>(engine: Arc<FulfillmentEngine<B>>) -> io::Result<Self>
    where
        B: EventBus<EventEnvelope<JsonValue>> + 'static,
    {
        engine
            .settings()
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let policy = ReservationExpiry::from_settings(engine.settings());
        let sweep_interval = engine.settings().sweep_interval();
        let warning_interval = engine.settings().warning_interval();

        let sweep_engine = Arc::clone(&engine);
        let sweep = PeriodicWorker::spawn("reservation-expiry-sweep", sweep_interval, move || {
            policy.sweep(&sweep_engine);
        })?;

        let warning = match PeriodicWorker::spawn(
            "reservation-expiry-warning",
            warning_interval,
            move || {
                policy.nearing_expiry(&engine);
            },
        ) {
            Ok(handle) => handle,
            Err(err) => {
                sweep.shutdown();
                return Err(err);
            }
        };

        Ok(Self { sweep, warning })
    }

    /// Run a sweep now instead of waiting for the next tick.
    pub fn trigger_sweep(&self) {
        self.sweep.trigger();
    }

    pub fn trigger_warning(&self) {
        self.warning.trigger();
    }

    pub fn shutdown(self) {
        self.sweep.shutdown();
        self.warning.shutdown();
    }
}
