//! Purchasing domain module (event-sourced).
//!
//! Purchase orders with a closed status machine and receipt decisions,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    ChangeStatus, CreateOrder, DeleteOrder, GoodsReceived, LineQuantity, LineReceipt, NewLine,
    OrderCreated, OrderDeleted, OrderLine, OrderRevised, OrderStatus, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId, ReceiveFull, ReceivePartial,
    ReviseOrder, SkippedLine, StatusChanged,
};
