//! Purchasing domain module (purchase orders and purchases).
//!
//! This crate contains business rules for the buy side: purchase orders with
//! their transition and sale-assignment rules, and purchases with their
//! payment-state derivation, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod order;
pub mod purchase;

pub use ledgerflow_core::{PurchaseId, PurchaseOrderId};
pub use order::{
    consolidate_sale_lines, validate_sale_assignment, PurchaseOrder, PurchaseOrderLine,
    PurchaseOrderState,
};
pub use purchase::{
    validate_purchase_lines, validate_purchase_order_link, PaymentState, Purchase, PurchaseLine,
    PurchaseState,
};
