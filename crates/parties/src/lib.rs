//! Counterparty domain module (customer and supplier accounts).
//!
//! This crate contains business rules for counterparties, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod counterparty;

pub use counterparty::{
    validate_payment_terms, ContactInfo, Counterparty, CounterpartyCategory, CounterpartyKind,
    PaymentTerm,
};
pub use ledgerflow_core::CounterpartyId;
