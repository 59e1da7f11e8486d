//! Balance propagation.
//!
//! The single writer of balances and derived statuses: one entry point per
//! committing event, each taking the affected entities as explicit `&mut`
//! parameters. Nothing here validates (callers run the validation rules
//! first) and nothing here does IO.

pub mod propagation;

pub use propagation::{
    apply_collection_line, apply_credit_note_to_purchase, apply_credit_note_to_sale,
    apply_payment_line, on_collection_created, on_payment_created, on_purchase_cancelled,
    on_purchase_created, on_purchase_order_cancelled, on_purchase_received, on_sale_cancelled,
    on_sale_created, on_sale_delivered,
};
