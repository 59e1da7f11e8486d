use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{CollectionId, CounterpartyId, DomainError, DomainResult, Entity, SaleId};
use ledgerflow_money::sum_applied;
use ledgerflow_sales::Sale;

use crate::method::SettlementMethod;

/// A committed application of collection funds to one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLine {
    pub line_no: u32,
    pub sale_id: SaleId,
    pub applied_amount: Decimal,
}

/// A requested application of collection funds to one sale, before commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAllocation {
    pub sale_id: SaleId,
    pub applied_amount: Decimal,
}

/// A customer receipt.
///
/// `available_balance` starts at the amount and is consumed as lines apply it
/// against open sales. Lines are append-only: amendments add new lines, they
/// never rewrite or remove committed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    id: CollectionId,
    customer_id: CounterpartyId,
    collection_date: NaiveDate,
    method: SettlementMethod,
    amount: Decimal,
    available_balance: Decimal,
    lines: Vec<CollectionLine>,
    observations: String,
    created_at: DateTime<Utc>,
}

impl Collection {
    pub fn create(
        id: CollectionId,
        customer_id: CounterpartyId,
        collection_date: NaiveDate,
        method: SettlementMethod,
        amount: Decimal,
        observations: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        // Zero is allowed: an amended collection may start empty and only
        // carry applications added later against its available balance.
        if amount < Decimal::ZERO {
            return Err(DomainError::validation(
                "collection amount cannot be negative",
            ));
        }

        Ok(Self {
            id,
            customer_id,
            collection_date,
            method,
            amount,
            available_balance: Decimal::ZERO,
            lines: Vec::new(),
            observations: observations.into(),
            created_at,
        })
    }

    pub fn id_typed(&self) -> CollectionId {
        self.id
    }

    pub fn customer_id(&self) -> CounterpartyId {
        self.customer_id
    }

    pub fn collection_date(&self) -> NaiveDate {
        self.collection_date
    }

    pub fn method(&self) -> SettlementMethod {
        self.method
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn available_balance(&self) -> Decimal {
        self.available_balance
    }

    pub fn lines(&self) -> &[CollectionLine] {
        &self.lines
    }

    pub fn observations(&self) -> &str {
        &self.observations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Set the available balance to the amount. Driven by the automation layer
    /// right after the collection is committed.
    pub fn initialize_available_balance(&mut self) {
        self.available_balance = self.amount;
    }

    /// Consume available balance for an applied line. Driven by the automation
    /// layer; the amount was validated against the balance upstream.
    pub fn consume(&mut self, amount: Decimal) {
        self.available_balance -= amount;
    }

    /// Append a committed application line and return its line number.
    pub fn append_line(&mut self, sale_id: SaleId, applied_amount: Decimal) -> u32 {
        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(CollectionLine {
            line_no,
            sale_id,
            applied_amount,
        });
        line_no
    }
}

impl Entity for Collection {
    type Id = CollectionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn validate_allocations<'a, F>(allocations: &[CollectionAllocation], lookup_sale: F) -> DomainResult<()>
where
    F: Fn(SaleId) -> Option<&'a Sale>,
{
    // Allocations against the same sale are applied sequentially, so the cap
    // is checked on their running sum, not per row.
    let mut applied_so_far: std::collections::HashMap<SaleId, Decimal> =
        std::collections::HashMap::new();
    for allocation in allocations {
        let sale = lookup_sale(allocation.sale_id).ok_or(DomainError::NotFound)?;
        if !sale.can_receive_applications() {
            return Err(DomainError::validation(format!(
                "sale {} is cancelled and cannot receive collections",
                sale.id_typed()
            )));
        }
        if allocation.applied_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "the amount applied to sale {} must be positive",
                sale.id_typed()
            )));
        }
        let applied = applied_so_far.entry(allocation.sale_id).or_default();
        *applied += allocation.applied_amount;
        if *applied > sale.pending_balance() {
            return Err(DomainError::validation(format!(
                "the amount applied to sale {} exceeds its pending balance",
                sale.id_typed()
            )));
        }
    }
    Ok(())
}

/// Validate the allocations of a collection being created: the applied sum is
/// capped by the collection amount and every target sale must be open.
pub fn validate_new_collection<'a, F>(
    amount: Decimal,
    allocations: &[CollectionAllocation],
    lookup_sale: F,
) -> DomainResult<()>
where
    F: Fn(SaleId) -> Option<&'a Sale>,
{
    if amount < Decimal::ZERO {
        return Err(DomainError::validation(
            "collection amount cannot be negative",
        ));
    }
    if sum_applied(allocations.iter().map(|a| a.applied_amount)) > amount {
        return Err(DomainError::validation(
            "the applied amounts exceed the collection amount",
        ));
    }
    validate_allocations(allocations, lookup_sale)
}

/// Validate allocations being *added* to an existing collection.
///
/// The cap is the collection's stored available balance, never a figure the
/// caller supplies. This closes the double-spend a trusting boundary would
/// otherwise allow.
pub fn validate_collection_amendment<'a, F>(
    collection: &Collection,
    allocations: &[CollectionAllocation],
    lookup_sale: F,
) -> DomainResult<()>
where
    F: Fn(SaleId) -> Option<&'a Sale>,
{
    if sum_applied(allocations.iter().map(|a| a.applied_amount)) > collection.available_balance() {
        return Err(DomainError::validation(
            "the applied amounts exceed the collection's available balance",
        ));
    }
    validate_allocations(allocations, lookup_sale)
}
