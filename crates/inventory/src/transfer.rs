use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, ItemId, LocationId, TransferId, UserId,
};
use stockledger_events::Event;

/// Transfer lifecycle.
///
/// ```text
/// Requested ─approve─▶ Approved ─ship─▶ Shipped ─receive─▶ Received
///     │                   │
///     └──────cancel───────┴──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Requested,
    Approved,
    Shipped,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Requested => "requested",
            TransferStatus::Approved => "approved",
            TransferStatus::Shipped => "shipped",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Cancelled)
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow actions, used for state pre-checks and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Approve,
    Ship,
    Receive,
    Cancel,
}

impl TransferAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferAction::Approve => "approve",
            TransferAction::Ship => "ship",
            TransferAction::Receive => "receive",
            TransferAction::Cancel => "cancel",
        }
    }

    fn allowed_from(self, status: TransferStatus) -> bool {
        matches!(
            (self, status),
            (TransferAction::Approve, TransferStatus::Requested)
                | (TransferAction::Ship, TransferStatus::Approved)
                | (TransferAction::Receive, TransferStatus::Shipped)
                | (TransferAction::Cancel, TransferStatus::Requested | TransferStatus::Approved)
        )
    }
}

/// Requested line (input to [`RequestTransfer`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLineRequest {
    pub item_id: ItemId,
    pub quantity: Decimal,
}

/// Transfer line; costs are filled in when the transfer ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: Decimal,
    /// Unit cost realized by the outbound allocation.
    pub unit_cost: Option<Decimal>,
    /// Total cost realized by the outbound allocation (money scale).
    pub shipped_cost: Option<Decimal>,
}

/// Cost captured for one line at shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippedLine {
    pub line_no: u32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

/// Aggregate root: StockTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    id: TransferId,
    from_location: Option<LocationId>,
    to_location: Option<LocationId>,
    status: TransferStatus,
    lines: Vec<TransferLine>,
    requested_by: Option<UserId>,
    requested_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    shipped_by: Option<UserId>,
    shipped_at: Option<DateTime<Utc>>,
    received_by: Option<UserId>,
    received_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl StockTransfer {
    /// Create an empty, not-yet-requested aggregate instance.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            from_location: None,
            to_location: None,
            status: TransferStatus::Requested,
            lines: Vec::new(),
            requested_by: None,
            requested_at: None,
            approved_by: None,
            approved_at: None,
            shipped_by: None,
            shipped_at: None,
            received_by: None,
            received_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn from_location(&self) -> Option<LocationId> {
        self.from_location
    }

    pub fn to_location(&self) -> Option<LocationId> {
        self.to_location
    }

    pub fn lines(&self) -> &[TransferLine] {
        &self.lines
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Fail with `InvalidTransferState` unless `action` is legal right now.
    ///
    /// Callers run this before performing the side effects of an action
    /// (stock movements), so an out-of-order call touches nothing.
    pub fn ensure_can(&self, action: TransferAction) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("transfer", self.id));
        }
        if !action.allowed_from(self.status) {
            return Err(DomainError::InvalidTransferState {
                transfer_id: self.id,
                status: self.status.as_str().to_string(),
                action: action.as_str(),
            });
        }
        Ok(())
    }
}

impl AggregateRoot for StockTransfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTransfer {
    pub transfer_id: TransferId,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub lines: Vec<TransferLineRequest>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command payload shared by approve and receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTransfer {
    pub transfer_id: TransferId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipTransfer (carries the realized outbound costs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub transfer_id: TransferId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub lines: Vec<ShippedLine>,
}

/// Command: CancelTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub transfer_id: TransferId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Request(RequestTransfer),
    Approve(TransitionTransfer),
    Ship(ShipTransfer),
    Receive(TransitionTransfer),
    Cancel(CancelTransfer),
}

/// Event: TransferRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequested {
    pub transfer_id: TransferId,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub lines: Vec<TransferLine>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferApproved {
    pub transfer_id: TransferId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub transfer_id: TransferId,
    pub shipped_by: UserId,
    pub lines: Vec<ShippedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceived {
    pub transfer_id: TransferId,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub transfer_id: TransferId,
    pub cancelled_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    TransferRequested(TransferRequested),
    TransferApproved(TransferApproved),
    TransferShipped(TransferShipped),
    TransferReceived(TransferReceived),
    TransferCancelled(TransferCancelled),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::TransferRequested(_) => "inventory.transfer.requested",
            TransferEvent::TransferApproved(_) => "inventory.transfer.approved",
            TransferEvent::TransferShipped(_) => "inventory.transfer.shipped",
            TransferEvent::TransferReceived(_) => "inventory.transfer.received",
            TransferEvent::TransferCancelled(_) => "inventory.transfer.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::TransferRequested(e) => e.occurred_at,
            TransferEvent::TransferApproved(e) => e.occurred_at,
            TransferEvent::TransferShipped(e) => e.occurred_at,
            TransferEvent::TransferReceived(e) => e.occurred_at,
            TransferEvent::TransferCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockTransfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::TransferRequested(e) => {
                self.id = e.transfer_id;
                self.from_location = Some(e.from_location);
                self.to_location = Some(e.to_location);
                self.lines = e.lines.clone();
                self.status = TransferStatus::Requested;
                self.requested_by = Some(e.requested_by);
                self.requested_at = Some(e.occurred_at);
                self.created = true;
            }
            TransferEvent::TransferApproved(e) => {
                self.status = TransferStatus::Approved;
                self.approved_by = Some(e.approved_by);
                self.approved_at = Some(e.occurred_at);
            }
            TransferEvent::TransferShipped(e) => {
                for shipped in &e.lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == shipped.line_no) {
                        line.unit_cost = Some(shipped.unit_cost);
                        line.shipped_cost = Some(shipped.total_cost);
                    }
                }
                self.status = TransferStatus::Shipped;
                self.shipped_by = Some(e.shipped_by);
                self.shipped_at = Some(e.occurred_at);
            }
            TransferEvent::TransferReceived(e) => {
                self.status = TransferStatus::Received;
                self.received_by = Some(e.received_by);
                self.received_at = Some(e.occurred_at);
            }
            TransferEvent::TransferCancelled(e) => {
                self.status = TransferStatus::Cancelled;
                self.cancelled_by = Some(e.cancelled_by);
                self.cancelled_at = Some(e.occurred_at);
                self.cancel_reason = e.reason.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Request(cmd) => self.handle_request(cmd),
            TransferCommand::Approve(cmd) => self.handle_approve(cmd),
            TransferCommand::Ship(cmd) => self.handle_ship(cmd),
            TransferCommand::Receive(cmd) => self.handle_receive(cmd),
            TransferCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl StockTransfer {
    fn ensure_transfer_id(&self, transfer_id: TransferId) -> Result<(), DomainError> {
        if self.id != transfer_id {
            return Err(DomainError::invariant("transfer_id mismatch"));
        }
        Ok(())
    }

    fn handle_request(&self, cmd: &RequestTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer already exists"));
        }
        if cmd.from_location == cmd.to_location {
            return Err(DomainError::validation(
                "source and destination locations must differ",
            ));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("transfer must have at least one line"));
        }
        if cmd.lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
            return Err(DomainError::validation("transfer quantities must be positive"));
        }

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(idx, l)| TransferLine {
                line_no: idx as u32 + 1,
                item_id: l.item_id,
                quantity: l.quantity,
                unit_cost: None,
                shipped_cost: None,
            })
            .collect();

        Ok(vec![TransferEvent::TransferRequested(TransferRequested {
            transfer_id: cmd.transfer_id,
            from_location: cmd.from_location,
            to_location: cmd.to_location,
            lines,
            requested_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &TransitionTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_can(TransferAction::Approve)?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        Ok(vec![TransferEvent::TransferApproved(TransferApproved {
            transfer_id: cmd.transfer_id,
            approved_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_can(TransferAction::Ship)?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        // Every line must be costed exactly once.
        let mut costed: Vec<u32> = cmd.lines.iter().map(|l| l.line_no).collect();
        costed.sort_unstable();
        let expected: Vec<u32> = self.lines.iter().map(|l| l.line_no).collect();
        if costed != expected {
            return Err(DomainError::invariant(
                "shipment must carry exactly one cost per transfer line",
            ));
        }

        Ok(vec![TransferEvent::TransferShipped(TransferShipped {
            transfer_id: cmd.transfer_id,
            shipped_by: cmd.actor,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &TransitionTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_can(TransferAction::Receive)?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if self.lines.iter().any(|l| l.unit_cost.is_none()) {
            return Err(DomainError::invariant("shipped transfer is missing line costs"));
        }

        Ok(vec![TransferEvent::TransferReceived(TransferReceived {
            transfer_id: cmd.transfer_id,
            received_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_can(TransferAction::Cancel)?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        Ok(vec![TransferEvent::TransferCancelled(TransferCancelled {
            transfer_id: cmd.transfer_id,
            cancelled_by: cmd.actor,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn requested(transfer_id: TransferId) -> StockTransfer {
        let mut transfer = StockTransfer::empty(transfer_id);
        let cmd = RequestTransfer {
            transfer_id,
            from_location: LocationId::new(),
            to_location: LocationId::new(),
            lines: vec![
                TransferLineRequest { item_id: ItemId::new(), quantity: dec!(50) },
                TransferLineRequest { item_id: ItemId::new(), quantity: dec!(5) },
            ],
            actor: UserId::new(),
            occurred_at: test_time(),
        };
        let events = transfer.handle(&TransferCommand::Request(cmd)).unwrap();
        transfer.apply(&events[0]);
        transfer
    }

    fn step(transfer: &mut StockTransfer, cmd: TransferCommand) -> Result<(), DomainError> {
        let events = transfer.handle(&cmd)?;
        for e in &events {
            transfer.apply(e);
        }
        Ok(())
    }

    fn transition(transfer_id: TransferId) -> TransitionTransfer {
        TransitionTransfer {
            transfer_id,
            actor: UserId::new(),
            occurred_at: test_time(),
        }
    }

    fn ship(transfer_id: TransferId) -> TransferCommand {
        TransferCommand::Ship(ShipTransfer {
            transfer_id,
            actor: UserId::new(),
            occurred_at: test_time(),
            lines: vec![
                ShippedLine { line_no: 2, unit_cost: dec!(3), total_cost: dec!(15.00) },
                ShippedLine { line_no: 1, unit_cost: dec!(25), total_cost: dec!(1250.00) },
            ],
        })
    }

    fn cancel(transfer_id: TransferId) -> TransferCommand {
        TransferCommand::Cancel(CancelTransfer {
            transfer_id,
            actor: UserId::new(),
            occurred_at: test_time(),
            reason: Some("no longer needed".to_string()),
        })
    }

    #[test]
    fn request_numbers_lines_in_order() {
        let transfer = requested(TransferId::new());
        assert_eq!(transfer.status(), TransferStatus::Requested);
        assert_eq!(transfer.lines()[0].line_no, 1);
        assert_eq!(transfer.lines()[1].line_no, 2);
        assert_eq!(transfer.version(), 1);
    }

    #[test]
    fn request_rejects_same_location_and_empty_lines() {
        let id = TransferId::new();
        let loc = LocationId::new();
        let transfer = StockTransfer::empty(id);
        let same = RequestTransfer {
            transfer_id: id,
            from_location: loc,
            to_location: loc,
            lines: vec![TransferLineRequest { item_id: ItemId::new(), quantity: dec!(1) }],
            actor: UserId::new(),
            occurred_at: test_time(),
        };
        assert!(matches!(
            transfer.handle(&TransferCommand::Request(same.clone())),
            Err(DomainError::Validation(_))
        ));

        let empty = RequestTransfer { to_location: LocationId::new(), lines: vec![], ..same };
        assert!(matches!(
            transfer.handle(&TransferCommand::Request(empty)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn full_lifecycle_records_actors_and_costs() {
        let id = TransferId::new();
        let mut transfer = requested(id);
        let approver = transition(id);

        step(&mut transfer, TransferCommand::Approve(approver.clone())).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Approved);
        assert_eq!(transfer.approved_by(), Some(approver.actor));
        assert_eq!(transfer.approved_at(), Some(approver.occurred_at));

        step(&mut transfer, ship(id)).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Shipped);
        assert_eq!(transfer.lines()[0].unit_cost, Some(dec!(25)));
        assert_eq!(transfer.lines()[1].shipped_cost, Some(dec!(15.00)));

        step(&mut transfer, TransferCommand::Receive(transition(id))).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Received);
        assert!(transfer.status().is_terminal());
        assert_eq!(transfer.version(), 4);
    }

    #[test]
    fn receive_before_ship_is_invalid_state() {
        let id = TransferId::new();
        let mut transfer = requested(id);
        step(&mut transfer, TransferCommand::Approve(transition(id))).unwrap();
        let before = transfer.clone();

        let err = step(&mut transfer, TransferCommand::Receive(transition(id))).unwrap_err();

        match err {
            DomainError::InvalidTransferState { status, action, .. } => {
                assert_eq!(status, "approved");
                assert_eq!(action, "receive");
            }
            other => panic!("expected InvalidTransferState, got {other:?}"),
        }
        assert_eq!(transfer, before);
    }

    #[test]
    fn cancel_allowed_before_shipment_only() {
        let id = TransferId::new();
        let mut transfer = requested(id);
        step(&mut transfer, cancel(id)).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Cancelled);
        assert_eq!(transfer.cancel_reason(), Some("no longer needed"));

        let id = TransferId::new();
        let mut transfer = requested(id);
        step(&mut transfer, TransferCommand::Approve(transition(id))).unwrap();
        step(&mut transfer, ship(id)).unwrap();
        let before = transfer.clone();

        let err = step(&mut transfer, cancel(id)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransferState { .. }));
        assert_eq!(transfer, before);
    }

    #[test]
    fn ship_requires_a_cost_per_line() {
        let id = TransferId::new();
        let mut transfer = requested(id);
        step(&mut transfer, TransferCommand::Approve(transition(id))).unwrap();

        let partial = TransferCommand::Ship(ShipTransfer {
            transfer_id: id,
            actor: UserId::new(),
            occurred_at: test_time(),
            lines: vec![ShippedLine { line_no: 1, unit_cost: dec!(25), total_cost: dec!(1250) }],
        });
        assert!(matches!(
            step(&mut transfer, partial),
            Err(DomainError::InvariantViolation(_))
        ));
        assert_eq!(transfer.status(), TransferStatus::Approved);
    }

    #[test]
    fn terminal_states_reject_every_action() {
        let id = TransferId::new();
        let mut transfer = requested(id);
        step(&mut transfer, cancel(id)).unwrap();

        for action in [
            TransferAction::Approve,
            TransferAction::Ship,
            TransferAction::Receive,
            TransferAction::Cancel,
        ] {
            assert!(transfer.ensure_can(action).is_err());
        }
    }
}
