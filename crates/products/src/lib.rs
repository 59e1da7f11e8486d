//! Products domain module.
//!
//! This crate contains business rules for products and their derived sale
//! prices, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod product;

pub use ledgerflow_core::ProductId;
pub use product::{Product, UnitOfMeasure};
