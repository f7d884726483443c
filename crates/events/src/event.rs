use chrono::{DateTime, Utc};

/// Fact emitted by an aggregate after a transition it accepted.
///
/// The infrastructure publishes these wrapped in an
/// [`EventEnvelope`](crate::EventEnvelope) once the state change has committed.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, `<context>.<aggregate>.<fact>` (e.g. `"sales.order.reserved"`).
    fn event_type(&self) -> &'static str;

    /// Payload schema version, copied onto the envelope.
    fn version(&self) -> u32;

    /// Business time of the transition, taken from the command.
    fn occurred_at(&self) -> DateTime<Utc>;
}
