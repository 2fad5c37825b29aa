//! Domain events and their post-commit distribution.
//!
//! Events are emitted only after the unit of work that produced them has been
//! committed; the event bus is for distribution, never the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
