use chrono::{DateTime, Duration, Timelike, Utc};

use crate::config::Settings;

/// Picks a shipment's planned date from the time its order shipped.
///
/// Orders shipped before the cutoff hour (UTC) go out right away; at or after
/// the cutoff they wait `wait` before being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipmentPlanner {
    cutoff_hour: u32,
    wait: Duration,
}

impl ShipmentPlanner {
    pub fn new(cutoff_hour: u32, wait_hours: u32) -> Self {
        Self {
            cutoff_hour,
            wait: Duration::hours(i64::from(wait_hours)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.shipment_cutoff_hour, settings.shipment_wait_hours)
    }

    pub fn planned_date(&self, shipped_at: DateTime<Utc>) -> DateTime<Utc> {
        if shipped_at.hour() < self.cutoff_hour {
            shipped_at
        } else {
            shipped_at + self.wait
        }
    }
}
