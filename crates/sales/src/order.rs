use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{CounterpartyId, DomainError, DomainResult, Entity, ProductId, SalesOrderId};
use ledgerflow_money::{line_total, LineAmount};

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderState {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl SalesOrderState {
    /// Transition table: every edge not listed here is rejected.
    pub fn allowed_transitions(self) -> &'static [SalesOrderState] {
        match self {
            SalesOrderState::Pending => &[SalesOrderState::Accepted, SalesOrderState::Cancelled],
            SalesOrderState::Accepted => {
                &[SalesOrderState::Completed, SalesOrderState::Cancelled]
            }
            SalesOrderState::Completed | SalesOrderState::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: SalesOrderState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl core::fmt::Display for SalesOrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SalesOrderState::Pending => "pending",
            SalesOrderState::Accepted => "accepted",
            SalesOrderState::Completed => "completed",
            SalesOrderState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl core::str::FromStr for SalesOrderState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SalesOrderState::Pending),
            "accepted" => Ok(SalesOrderState::Accepted),
            "completed" => Ok(SalesOrderState::Completed),
            "cancelled" => Ok(SalesOrderState::Cancelled),
            other => Err(DomainError::validation(format!(
                "'{other}' is not a valid sales order state"
            ))),
        }
    }
}

/// Order line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount for OrderLine {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

/// Why and when an order was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancellation {
    pub reason: String,
    pub date: NaiveDate,
}

/// A customer's order, taken before the sale is made.
///
/// Lines are exclusively owned and disappear with the header; the subtotal is
/// recomputed on every line mutation and is never written from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    customer_id: CounterpartyId,
    order_date: NaiveDate,
    state: SalesOrderState,
    lines: Vec<OrderLine>,
    subtotal: Decimal,
    delivery_address: Option<String>,
    notes: String,
    cancellation: Option<OrderCancellation>,
    created_at: DateTime<Utc>,
}

impl SalesOrder {
    pub fn create(
        id: SalesOrderId,
        customer_id: CounterpartyId,
        order_date: NaiveDate,
        delivery_address: Option<String>,
        notes: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            order_date,
            state: SalesOrderState::Pending,
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            delivery_address,
            notes: notes.into(),
            cancellation: None,
            created_at,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn customer_id(&self) -> CounterpartyId {
        self.customer_id
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn state(&self) -> SalesOrderState {
        self.state
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn delivery_address(&self) -> Option<&str> {
        self.delivery_address.as_deref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn cancellation(&self) -> Option<&OrderCancellation> {
        self.cancellation.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lines may only change while the order is pending.
    pub fn is_modifiable(&self) -> bool {
        self.state == SalesOrderState::Pending
    }

    fn ensure_modifiable(&self) -> DomainResult<()> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "lines of a sales order in state '{}' cannot be modified",
                self.state
            )));
        }
        Ok(())
    }

    fn next_line_no(&self) -> u32 {
        self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1
    }

    fn recompute_subtotal(&mut self) {
        self.subtotal = line_total(&self.lines);
    }

    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> DomainResult<u32> {
        self.ensure_modifiable()?;
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price <= Decimal::ZERO {
            return Err(DomainError::validation("unit_price must be positive"));
        }

        let line_no = self.next_line_no();
        self.lines.push(OrderLine {
            line_no,
            product_id,
            quantity,
            unit_price,
        });
        self.recompute_subtotal();
        Ok(line_no)
    }

    pub fn update_line(
        &mut self,
        line_no: u32,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> DomainResult<()> {
        self.ensure_modifiable()?;
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price <= Decimal::ZERO {
            return Err(DomainError::validation("unit_price must be positive"));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or(DomainError::NotFound)?;
        line.quantity = quantity;
        line.unit_price = unit_price;
        self.recompute_subtotal();
        Ok(())
    }

    pub fn remove_line(&mut self, line_no: u32) -> DomainResult<()> {
        self.ensure_modifiable()?;
        let before = self.lines.len();
        self.lines.retain(|l| l.line_no != line_no);
        if self.lines.len() == before {
            return Err(DomainError::NotFound);
        }
        self.recompute_subtotal();
        Ok(())
    }

    /// Request a state change, checked against the transition table.
    pub fn transition(&mut self, next: SalesOrderState) -> DomainResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::invalid_transition(
                self.state,
                next,
                self.state.allowed_transitions(),
            ));
        }
        self.state = next;
        Ok(())
    }

    /// Cancel the order, recording why and when.
    pub fn cancel(&mut self, reason: impl Into<String>, date: NaiveDate) -> DomainResult<()> {
        self.transition(SalesOrderState::Cancelled)?;
        self.cancellation = Some(OrderCancellation {
            reason: reason.into(),
            date,
        });
        Ok(())
    }

    /// Force completion as a delivery side effect.
    ///
    /// Invoked when a sale taken from this order is delivered; skips the
    /// transition table on purpose and leaves terminal states alone.
    pub fn force_complete(&mut self) {
        if !matches!(
            self.state,
            SalesOrderState::Completed | SalesOrderState::Cancelled
        ) {
            self.state = SalesOrderState::Completed;
        }
    }
}

impl Entity for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
