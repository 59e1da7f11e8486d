//! Monetary derivation library.
//!
//! Pure computation only: rounding, line/document totals, applied-amount
//! sums, sale-price derivation and credit-term dates. No state, no IO.

pub mod amounts;
pub mod pricing;
pub mod terms;

pub use amounts::{document_total, line_total, round_money, sum_applied, LineAmount};
pub use pricing::{derive_prices, PriceSet, PricingPolicy};
pub use terms::{days_overdue, due_date};
