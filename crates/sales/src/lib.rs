//! Sales domain module (sales orders and sales).
//!
//! This crate contains business rules for the sell side: sales orders with
//! their line-modification and transition rules, and sales with their three
//! state axes, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod order;
pub mod sale;

pub use ledgerflow_core::{SaleId, SalesOrderId};
pub use order::{OrderCancellation, OrderLine, SalesOrder, SalesOrderState};
pub use sale::{
    validate_order_link, validate_sale_lines, Cancellation, CollectionState, CommercialState,
    DeliveryState, Sale, SaleLine,
};
