use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{
    CounterpartyId, DomainError, DomainResult, Entity, ProductId, PurchaseId, PurchaseOrderId,
};
use ledgerflow_money::{document_total, line_total, LineAmount};

use crate::order::{PurchaseOrder, PurchaseOrderState};

/// Purchase status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    Pending,
    Received,
    Cancelled,
}

impl PurchaseState {
    /// Transition table: every edge not listed here is rejected.
    pub fn allowed_transitions(self) -> &'static [PurchaseState] {
        match self {
            PurchaseState::Pending => &[PurchaseState::Received, PurchaseState::Cancelled],
            PurchaseState::Received | PurchaseState::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: PurchaseState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl core::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PurchaseState::Pending => "pending",
            PurchaseState::Received => "received",
            PurchaseState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl core::str::FromStr for PurchaseState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PurchaseState::Pending),
            "received" => Ok(PurchaseState::Received),
            "cancelled" => Ok(PurchaseState::Cancelled),
            other => Err(DomainError::validation(format!(
                "'{other}' is not a valid purchase state"
            ))),
        }
    }
}

/// Payment status of a purchase. Derived; no public setter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl core::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PaymentState::Pending => "pending",
            PaymentState::Partial => "partial",
            PaymentState::Paid => "paid",
            PaymentState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Purchase line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount for PurchaseLine {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

/// Why and when a purchase was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub date: NaiveDate,
}

/// A purchase needs at least one line, each with positive quantity and price.
pub fn validate_purchase_lines(lines: &[PurchaseLine]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "a purchase requires at least one line",
        ));
    }
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "purchase line {} quantity must be positive",
                line.line_no
            )));
        }
        if line.unit_price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "purchase line {} unit_price must be positive",
                line.line_no
            )));
        }
    }
    Ok(())
}

/// A purchase may only be taken from a validated purchase order.
pub fn validate_purchase_order_link(order: Option<&PurchaseOrder>) -> DomainResult<()> {
    let Some(order) = order else {
        return Ok(());
    };
    if order.state() != PurchaseOrderState::Validated {
        return Err(DomainError::validation(
            "a purchase requires its purchase order to be validated",
        ));
    }
    Ok(())
}

/// A purchase from a supplier.
///
/// Mirrors the sale on the buy side: `extra` replaces the delivery cost, the
/// pending balance is walked down by payment lines and credit-note
/// applications, and the payment state is derived. Only the automation layer
/// moves balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    id: PurchaseId,
    supplier_id: CounterpartyId,
    purchase_order: Option<PurchaseOrderId>,
    purchase_date: NaiveDate,
    due_date: NaiveDate,
    lines: Vec<PurchaseLine>,
    subtotal: Decimal,
    extra: Decimal,
    discount: Decimal,
    total: Decimal,
    pending_balance: Decimal,
    purchase_state: PurchaseState,
    payment_state: PaymentState,
    cancellation: Option<Cancellation>,
    observations: String,
    created_at: DateTime<Utc>,
}

impl Purchase {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: PurchaseId,
        supplier_id: CounterpartyId,
        purchase_order: Option<&PurchaseOrder>,
        purchase_date: NaiveDate,
        due_date: NaiveDate,
        lines: Vec<PurchaseLine>,
        extra: Decimal,
        discount: Decimal,
        observations: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_purchase_lines(&lines)?;
        validate_purchase_order_link(purchase_order)?;
        if extra < Decimal::ZERO {
            return Err(DomainError::validation("extra cannot be negative"));
        }
        if discount < Decimal::ZERO {
            return Err(DomainError::validation("discount cannot be negative"));
        }

        let subtotal = line_total(&lines);
        let total = document_total(subtotal, extra, discount);

        Ok(Self {
            id,
            supplier_id,
            purchase_order: purchase_order.map(PurchaseOrder::id_typed),
            purchase_date,
            due_date,
            lines,
            subtotal,
            extra,
            discount,
            total,
            pending_balance: Decimal::ZERO,
            purchase_state: PurchaseState::Pending,
            payment_state: PaymentState::Pending,
            cancellation: None,
            observations: observations.into(),
            created_at,
        })
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn supplier_id(&self) -> CounterpartyId {
        self.supplier_id
    }

    pub fn purchase_order(&self) -> Option<PurchaseOrderId> {
        self.purchase_order
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn extra(&self) -> Decimal {
        self.extra
    }

    pub fn discount(&self) -> Decimal {
        self.discount
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn pending_balance(&self) -> Decimal {
        self.pending_balance
    }

    pub fn purchase_state(&self) -> PurchaseState {
        self.purchase_state
    }

    pub fn payment_state(&self) -> PaymentState {
        self.payment_state
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn observations(&self) -> &str {
        &self.observations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.purchase_state == PurchaseState::Cancelled
    }

    /// Whether this purchase can still receive payment applications.
    pub fn can_receive_applications(&self) -> bool {
        !self.is_cancelled()
    }

    /// Request a state change, checked against the transition table.
    pub fn transition(&mut self, next: PurchaseState) -> DomainResult<()> {
        if !self.purchase_state.can_transition_to(next) {
            return Err(DomainError::invalid_transition(
                self.purchase_state,
                next,
                self.purchase_state.allowed_transitions(),
            ));
        }
        self.purchase_state = next;
        self.rederive_payment_state();
        Ok(())
    }

    /// Set the pending balance to the total. Driven by the automation layer
    /// right after the purchase is committed.
    pub fn initialize_pending_balance(&mut self) {
        self.pending_balance = self.total;
        self.rederive_payment_state();
    }

    /// Walk the pending balance down by an applied amount. Driven by the
    /// automation layer; the amount was validated against the balance upstream.
    pub fn apply_settlement(&mut self, amount: Decimal) {
        self.pending_balance -= amount;
        self.rederive_payment_state();
    }

    /// Cancel the purchase: the pending balance is cleared and the payment
    /// state follows.
    pub fn cancel(&mut self, reason: impl Into<String>, date: NaiveDate) -> DomainResult<()> {
        if self.is_cancelled() {
            return Err(DomainError::conflict("purchase is already cancelled"));
        }
        self.transition(PurchaseState::Cancelled)?;
        self.pending_balance = Decimal::ZERO;
        self.cancellation = Some(Cancellation {
            reason: reason.into(),
            date,
        });
        self.rederive_payment_state();
        Ok(())
    }

    /// Recompute the derived payment state from stored facts.
    ///
    /// Pure function of (purchase_state, pending_balance, total); safe to call
    /// any number of times.
    pub fn rederive_payment_state(&mut self) {
        self.payment_state = if self.purchase_state == PurchaseState::Cancelled {
            PaymentState::Cancelled
        } else if self.pending_balance == Decimal::ZERO {
            PaymentState::Paid
        } else if self.pending_balance > Decimal::ZERO && self.pending_balance < self.total {
            PaymentState::Partial
        } else {
            PaymentState::Pending
        };
    }
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
