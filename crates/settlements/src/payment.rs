use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{CounterpartyId, DomainError, DomainResult, Entity, PaymentId, PurchaseId};
use ledgerflow_money::sum_applied;
use ledgerflow_purchasing::Purchase;

use crate::method::SettlementMethod;

/// A committed application of payment funds to one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub line_no: u32,
    pub purchase_id: PurchaseId,
    pub applied_amount: Decimal,
}

/// A requested application of payment funds to one purchase, before commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub purchase_id: PurchaseId,
    pub applied_amount: Decimal,
}

/// A payment out to a supplier; the buy-side mirror of a collection.
///
/// `available_balance` starts at the amount and is consumed as lines apply it
/// against open purchases. Lines are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    supplier_id: CounterpartyId,
    payment_date: NaiveDate,
    method: SettlementMethod,
    amount: Decimal,
    available_balance: Decimal,
    lines: Vec<PaymentLine>,
    observations: String,
    created_at: DateTime<Utc>,
}

impl Payment {
    pub fn create(
        id: PaymentId,
        supplier_id: CounterpartyId,
        payment_date: NaiveDate,
        method: SettlementMethod,
        amount: Decimal,
        observations: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        // Zero is allowed: an amended payment may start empty and only carry
        // applications added later against its available balance.
        if amount < Decimal::ZERO {
            return Err(DomainError::validation("payment amount cannot be negative"));
        }

        Ok(Self {
            id,
            supplier_id,
            payment_date,
            method,
            amount,
            available_balance: Decimal::ZERO,
            lines: Vec::new(),
            observations: observations.into(),
            created_at,
        })
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn supplier_id(&self) -> CounterpartyId {
        self.supplier_id
    }

    pub fn payment_date(&self) -> NaiveDate {
        self.payment_date
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

    pub fn lines(&self) -> &[PaymentLine] {
        &self.lines
    }

    pub fn observations(&self) -> &str {
        &self.observations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Set the available balance to the amount. Driven by the automation layer
    /// right after the payment is committed.
    pub fn initialize_available_balance(&mut self) {
        self.available_balance = self.amount;
    }

    /// Consume available balance for an applied line. Driven by the automation
    /// layer; the amount was validated against the balance upstream.
    pub fn consume(&mut self, amount: Decimal) {
        self.available_balance -= amount;
    }

    /// Append a committed application line and return its line number.
    pub fn append_line(&mut self, purchase_id: PurchaseId, applied_amount: Decimal) -> u32 {
        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(PaymentLine {
            line_no,
            purchase_id,
            applied_amount,
        });
        line_no
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn validate_allocations<'a, F>(allocations: &[PaymentAllocation], lookup_purchase: F) -> DomainResult<()>
where
    F: Fn(PurchaseId) -> Option<&'a Purchase>,
{
    // Allocations against the same purchase are applied sequentially, so the
    // cap is checked on their running sum, not per row.
    let mut applied_so_far: std::collections::HashMap<PurchaseId, Decimal> =
        std::collections::HashMap::new();
    for allocation in allocations {
        let purchase = lookup_purchase(allocation.purchase_id).ok_or(DomainError::NotFound)?;
        if !purchase.can_receive_applications() {
            return Err(DomainError::validation(format!(
                "purchase {} is cancelled and cannot receive payments",
                purchase.id_typed()
            )));
        }
        if allocation.applied_amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "the amount applied to purchase {} must be positive",
                purchase.id_typed()
            )));
        }
        let applied = applied_so_far.entry(allocation.purchase_id).or_default();
        *applied += allocation.applied_amount;
        if *applied > purchase.pending_balance() {
            return Err(DomainError::validation(format!(
                "the amount applied to purchase {} exceeds its pending balance",
                purchase.id_typed()
            )));
        }
    }
    Ok(())
}

/// Validate the allocations of a payment being created: the applied sum is
/// capped by the payment amount and every target purchase must be open.
pub fn validate_new_payment<'a, F>(
    amount: Decimal,
    allocations: &[PaymentAllocation],
    lookup_purchase: F,
) -> DomainResult<()>
where
    F: Fn(PurchaseId) -> Option<&'a Purchase>,
{
    if amount < Decimal::ZERO {
        return Err(DomainError::validation("payment amount cannot be negative"));
    }
    if sum_applied(allocations.iter().map(|a| a.applied_amount)) > amount {
        return Err(DomainError::validation(
            "the applied amounts exceed the payment amount",
        ));
    }
    validate_allocations(allocations, lookup_purchase)
}

/// Validate allocations being *added* to an existing payment.
///
/// The cap is the payment's stored available balance, never a figure the
/// caller supplies.
pub fn validate_payment_amendment<'a, F>(
    payment: &Payment,
    allocations: &[PaymentAllocation],
    lookup_purchase: F,
) -> DomainResult<()>
where
    F: Fn(PurchaseId) -> Option<&'a Purchase>,
{
    if sum_applied(allocations.iter().map(|a| a.applied_amount)) > payment.available_balance() {
        return Err(DomainError::validation(
            "the applied amounts exceed the payment's available balance",
        ));
    }
    validate_allocations(allocations, lookup_purchase)
}
