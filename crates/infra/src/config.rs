//! Engine settings.
//!
//! Plain named numbers, read from `STOCKYARD_*` environment variables with
//! defaults for anything unset.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?} as a number")]
    Invalid { var: &'static str, value: String },

    #[error("invalid settings: {0}")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How long a reservation may sit unshipped before the sweep cancels it.
    pub reservation_ttl_hours: u32,
    /// Orders shipped at or after this hour (UTC) are planned for later.
    pub shipment_cutoff_hour: u32,
    pub shipment_wait_hours: u32,
    /// Orders this close to expiry are reported by the warning worker.
    pub expiry_warning_lead_hours: u32,
    pub sweep_interval_secs: u64,
    pub warning_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reservation_ttl_hours: 24,
            shipment_cutoff_hour: 15,
            shipment_wait_hours: 12,
            expiry_warning_lead_hours: 2,
            sweep_interval_secs: 3600,
            warning_interval_secs: 3600,
        }
    }
}

impl Settings {
    /// Read settings from the process environment, then validate them.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read settings through `lookup` (unset → default).
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            reservation_ttl_hours: parse_var(
                &lookup,
                "STOCKYARD_RESERVATION_TTL_HOURS",
                defaults.reservation_ttl_hours,
            )?,
            shipment_cutoff_hour: parse_var(
                &lookup,
                "STOCKYARD_SHIPMENT_CUTOFF_HOUR",
                defaults.shipment_cutoff_hour,
            )?,
            shipment_wait_hours: parse_var(
                &lookup,
                "STOCKYARD_SHIPMENT_WAIT_HOURS",
                defaults.shipment_wait_hours,
            )?,
            expiry_warning_lead_hours: parse_var(
                &lookup,
                "STOCKYARD_EXPIRY_WARNING_LEAD_HOURS",
                defaults.expiry_warning_lead_hours,
            )?,
            sweep_interval_secs: parse_var(
                &lookup,
                "STOCKYARD_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            warning_interval_secs: parse_var(
                &lookup,
                "STOCKYARD_WARNING_INTERVAL_SECS",
                defaults.warning_interval_secs,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reservation_ttl_hours == 0 {
            return Err(ConfigError::OutOfRange(
                "reservation_ttl_hours must be positive".to_string(),
            ));
        }
        if self.shipment_cutoff_hour > 23 {
            return Err(ConfigError::OutOfRange(format!(
                "shipment_cutoff_hour must be within 0..=23, got {}",
                self.shipment_cutoff_hour
            )));
        }
        if self.expiry_warning_lead_hours >= self.reservation_ttl_hours {
            return Err(ConfigError::OutOfRange(format!(
                "expiry_warning_lead_hours ({}) must be smaller than reservation_ttl_hours ({})",
                self.expiry_warning_lead_hours, self.reservation_ttl_hours
            )));
        }
        if self.sweep_interval_secs == 0 || self.warning_interval_secs == 0 {
            return Err(ConfigError::OutOfRange(
                "worker intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.reservation_ttl_hours))
    }

    pub fn expiry_warning_lead(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.expiry_warning_lead_hours))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn warning_interval(&self) -> Duration {
        Duration::from_secs(self.warning_interval_secs)
    }
}

fn parse_var<L, T>(lookup: &L, var: &'static str, default: T) -> Result<T, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value: raw.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reservation_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn variables_override_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("STOCKYARD_RESERVATION_TTL_HOURS", "48"),
            ("STOCKYARD_SHIPMENT_CUTOFF_HOUR", " 17 "),
        ]))
        .unwrap();
        assert_eq!(settings.reservation_ttl_hours, 48);
        assert_eq!(settings.shipment_cutoff_hour, 17);
        assert_eq!(settings.shipment_wait_hours, 12);
    }

    #[test]
    fn garbage_is_reported_with_variable_name() {
        let err = Settings::from_lookup(lookup(&[("STOCKYARD_SWEEP_INTERVAL_SECS", "hourly")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "STOCKYARD_SWEEP_INTERVAL_SECS",
                value: "hourly".to_string(),
            }
        );
    }

    #[test]
    fn warning_lead_must_be_shorter_than_ttl() {
        let settings = Settings {
            reservation_ttl_hours: 2,
            expiry_warning_lead_hours: 2,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::OutOfRange(_))));
    }

    #[test]
    fn cutoff_hour_must_be_a_clock_hour() {
        let settings = Settings {
            shipment_cutoff_hour: 24,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
