//! The atomic unit-of-work layer.
//!
//! Hosts the document store and one entry point per boundary operation. Each
//! operation validates fully against stored state before any write; on failure
//! the store is untouched, on success the header, its lines and every
//! cascading balance update land together.

pub mod engine;
pub mod store;

pub use engine::{
    CreatePurchase, CreatePurchaseOrder, CreateSale, CreateSalesOrder, Engine, IssueCreditNote,
    NewLine, RecordCollection, RecordPayment, RegisterCounterparty,
};
pub use store::{Store, TypedStore};
