use chrono::{DateTime, Utc};

/// A fact recorded by the ledger (movement applied, journal posted, transfer
/// shipped...).
///
/// Events are published only once the change that produced them is committed,
/// and their payload shape is versioned per `event_type`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, `<context>.<aggregate>.<fact>` (e.g. "accounting.journal.posted").
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the operation that produced the event.
    fn occurred_at(&self) -> DateTime<Utc>;
}
