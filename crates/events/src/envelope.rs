use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::Event;

/// Envelope for a committed event, carrying stream metadata.
///
/// - `aggregate_version` is the aggregate's version right after this event was
///   applied, so consumers can order and de-duplicate per aggregate.
/// - `schema_version` is the payload's schema version ([`Event::version`]).
/// - `payload` is the serialized domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_id: String,
    aggregate_type: String,
    aggregate_version: u64,

    event_type: String,
    schema_version: u32,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_version: u64,
        event_type: impl Into<String>,
        schema_version: u32,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_version,
            event_type: event_type.into(),
            schema_version,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_version(&self) -> u64 {
        self.aggregate_version
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed domain event, serializing its payload to JSON.
    pub fn from_typed<E>(
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_version: u64,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self::new(
            Uuid::now_v7(),
            aggregate_id,
            aggregate_type,
            aggregate_version,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            serde_json::to_value(event)?,
        ))
    }
}
