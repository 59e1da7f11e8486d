//! Settlements domain module (collections, payments, credit notes).
//!
//! The application ledger: many-to-many linkage between a funding document
//! (collection, payment, credit note) and the sales/purchases it partially or
//! fully settles. Implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod collection;
pub mod credit_note;
pub mod method;
pub mod payment;

pub use collection::{
    validate_collection_amendment, validate_new_collection, Collection, CollectionAllocation,
    CollectionLine,
};
pub use credit_note::{
    validate_credit_note_targets, ApplicationTarget, CreditNote, CreditNoteApplication,
    CreditNoteKind, CreditNoteLine,
};
pub use ledgerflow_core::{CollectionId, CreditNoteId, PaymentId};
pub use method::SettlementMethod;
pub use payment::{
    validate_new_payment, validate_payment_amendment, Payment, PaymentAllocation, PaymentLine,
};
