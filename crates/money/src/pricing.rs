use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use ledgerflow_core::ValueObject;

use crate::amounts::round_money;

const RETAIL_MULTIPLIER: Decimal = dec!(1.15);
const WHOLESALE_MULTIPLIER: Decimal = dec!(1.10);
const PROMOTIONAL_MULTIPLIER: Decimal = dec!(1.12);
const WHOLESALE_EXCLUSIVE_MULTIPLIER: Decimal = dec!(1.08);

const STEP: Decimal = dec!(500);

/// How derived sale prices are rounded.
///
/// Both behaviors exist in the field; a product carries exactly one and they
/// are never combined within a price set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// Plain 2-decimal half-up rounding.
    #[default]
    HalfUpCents,
    /// Round up to the next multiple of 500 currency units.
    RoundUpToNearest500,
}

impl PricingPolicy {
    fn apply(self, value: Decimal) -> Decimal {
        match self {
            PricingPolicy::HalfUpCents => round_money(value),
            PricingPolicy::RoundUpToNearest500 => (value / STEP).ceil() * STEP,
        }
    }
}

/// The full set of sale prices derived from one purchase price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSet {
    pub retail: Decimal,
    pub wholesale: Decimal,
    pub promotional: Decimal,
    pub wholesale_exclusive: Decimal,
}

impl ValueObject for PriceSet {}

impl PriceSet {
    pub fn zero() -> Self {
        Self {
            retail: Decimal::ZERO,
            wholesale: Decimal::ZERO,
            promotional: Decimal::ZERO,
            wholesale_exclusive: Decimal::ZERO,
        }
    }
}

/// Derive the sale prices for a purchase price under the given policy.
///
/// Margins: retail 15%, promotional 12%, wholesale 10%, wholesale-exclusive 8%.
/// Total function: negative inputs derive negative prices; whether a negative
/// purchase price makes sense is the caller's concern.
#[must_use]
pub fn derive_prices(purchase_price: Decimal, policy: PricingPolicy) -> PriceSet {
    PriceSet {
        retail: policy.apply(purchase_price * RETAIL_MULTIPLIER),
        wholesale: policy.apply(purchase_price * WHOLESALE_MULTIPLIER),
        promotional: policy.apply(purchase_price * PROMOTIONAL_MULTIPLIER),
        wholesale_exclusive: policy.apply(purchase_price * WHOLESALE_EXCLUSIVE_MULTIPLIER),
    }
}
