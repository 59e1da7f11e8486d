use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{DomainError, DomainResult, Entity, ProductId};
use ledgerflow_money::{derive_prices, PriceSet, PricingPolicy};

/// Unit the product is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "un")]
    Unit,
}

/// A catalogue product.
///
/// The four sale prices are derived from the purchase price under the
/// product's pricing policy. They are recomputed whenever the purchase price
/// changes and are never written directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    unit: UnitOfMeasure,
    purchase_price: Decimal,
    prices: PriceSet,
    policy: PricingPolicy,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(
        id: ProductId,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: UnitOfMeasure,
        purchase_price: Decimal,
        policy: PricingPolicy,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if purchase_price < Decimal::ZERO {
            return Err(DomainError::validation(
                "purchase price cannot be negative",
            ));
        }

        Ok(Self {
            id,
            name,
            description: description.into(),
            unit,
            purchase_price,
            prices: derive_prices(purchase_price, policy),
            policy,
            active: true,
            created_at,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }

    pub fn purchase_price(&self) -> Decimal {
        self.purchase_price
    }

    pub fn prices(&self) -> &PriceSet {
        &self.prices
    }

    pub fn policy(&self) -> PricingPolicy {
        self.policy
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn can_be_sold(&self) -> bool {
        self.active
    }

    /// Change the purchase price and re-derive every sale price.
    pub fn set_purchase_price(&mut self, purchase_price: Decimal) -> DomainResult<()> {
        if purchase_price < Decimal::ZERO {
            return Err(DomainError::validation(
                "purchase price cannot be negative",
            ));
        }
        self.purchase_price = purchase_price;
        self.prices = derive_prices(purchase_price, self.policy);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
