//! Caller-supplied context for a unit of work.

use chrono::{DateTime, Utc};

use crate::id::UserId;

/// Who is acting, and when.
///
/// The engine has no session or clock of its own: every mutating operation
/// receives this from the surrounding application.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperationContext {
    actor: UserId,
    occurred_at: DateTime<Utc>,
}

impl OperationContext {
    pub fn new(actor: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self { actor, occurred_at }
    }

    /// Context stamped with the current wall-clock time.
    pub fn now(actor: UserId) -> Self {
        Self::new(actor, Utc::now())
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
