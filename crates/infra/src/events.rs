//! Domain events collected during a unit of work and published after commit.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockledger_accounting::JournalEvent;
use stockledger_events::EventEnvelope;
use stockledger_inventory::{MovementEvent, TransferEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Movement(MovementEvent),
    Journal(JournalEvent),
    Transfer(TransferEvent),
}

impl LedgerEvent {
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            LedgerEvent::Movement(_) => "inventory.movement",
            LedgerEvent::Journal(_) => "accounting.journal",
            LedgerEvent::Transfer(_) => "inventory.transfer",
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            LedgerEvent::Movement(e) => e.movement_id().into(),
            LedgerEvent::Journal(JournalEvent::JournalPosted(e)) => e.entry_id.into(),
            LedgerEvent::Transfer(e) => transfer_id(e),
        }
    }

    /// Serialize into the envelope published on the bus.
    pub fn to_envelope(&self, sequence_number: u64) -> Result<EventEnvelope<JsonValue>, serde_json::Error> {
        let aggregate_id = self.aggregate_id();
        let aggregate_type = self.aggregate_type();
        match self {
            LedgerEvent::Movement(e) => EventEnvelope::from_typed(aggregate_id, aggregate_type, sequence_number, e),
            LedgerEvent::Journal(e) => EventEnvelope::from_typed(aggregate_id, aggregate_type, sequence_number, e),
            LedgerEvent::Transfer(e) => EventEnvelope::from_typed(aggregate_id, aggregate_type, sequence_number, e),
        }
    }
}

fn transfer_id(event: &TransferEvent) -> Uuid {
    let id = match event {
        TransferEvent::TransferRequested(e) => e.transfer_id,
        TransferEvent::TransferApproved(e) => e.transfer_id,
        TransferEvent::TransferShipped(e) => e.transfer_id,
        TransferEvent::TransferReceived(e) => e.transfer_id,
        TransferEvent::TransferCancelled(e) => e.transfer_id,
    };
    id.into()
}
