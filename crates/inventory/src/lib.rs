//! Inventory domain module.
//!
//! Business rules for stock valuation, implemented purely as deterministic
//! domain logic (no IO, no locking, no storage): cost lots and FIFO
//! allocation, weighted-average balances, movement records and the transfer
//! workflow state machine.

pub mod balance;
pub mod item;
pub mod lot;
pub mod movement;
pub mod transfer;

pub use balance::InventoryBalance;
pub use item::{Item, Location, NegativeStockPolicy};
pub use lot::{AllocationSlice, ConsumptionOrder, FifoAllocation, NewLot, StockLot, allocate};
pub use movement::{
    DocumentRef, LotConsumption, MovementEvent, MovementKind, MovementRequest, MovementType,
    StockMovement,
};
pub use transfer::{
    CancelTransfer, RequestTransfer, ShipTransfer, ShippedLine, StockTransfer, TransferAction,
    TransferCommand, TransferEvent, TransferLine, TransferLineRequest, TransferStatus,
    TransitionTransfer,
};
