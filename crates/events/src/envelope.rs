use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::Event;

/// Envelope for a committed event, carrying stream metadata.
///
/// Notes:
/// - `sequence_number` is the commit sequence assigned by the store; it is
///   monotonically increasing across the whole ledger.
/// - `payload` is the serialized domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_id: Uuid,
    aggregate_type: String,
    event_type: String,

    sequence_number: u64,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
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
    /// Serialize a typed domain event into a JSON envelope.
    pub fn from_typed<E>(
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self::new(
            Uuid::now_v7(),
            aggregate_id,
            aggregate_type,
            event.event_type(),
            sequence_number,
            event.occurred_at(),
            serde_json::to_value(event)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        at: DateTime<Utc>,
    }

    impl Event for Pinged {
        fn event_type(&self) -> &'static str {
            "test.pinged"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_typed_copies_event_metadata() {
        let at = Utc::now();
        let aggregate_id = Uuid::now_v7();
        let env = EventEnvelope::from_typed(aggregate_id, "test.aggregate", 42, &Pinged { at })
            .unwrap();

        assert_eq!(env.aggregate_id(), aggregate_id);
        assert_eq!(env.aggregate_type(), "test.aggregate");
        assert_eq!(env.event_type(), "test.pinged");
        assert_eq!(env.sequence_number(), 42);
        assert_eq!(env.occurred_at(), at);
        assert!(env.payload().get("at").is_some());
    }
}
