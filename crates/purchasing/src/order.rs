use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{
    CounterpartyId, DomainError, DomainResult, Entity, ProductId, PurchaseOrderId, SaleId,
};
use ledgerflow_money::{line_total, LineAmount};
use ledgerflow_sales::Sale;

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderState {
    Pending,
    Validated,
    Received,
    Cancelled,
}

impl PurchaseOrderState {
    /// Transition table: every edge not listed here is rejected.
    pub fn allowed_transitions(self) -> &'static [PurchaseOrderState] {
        match self {
            PurchaseOrderState::Pending => {
                &[PurchaseOrderState::Validated, PurchaseOrderState::Cancelled]
            }
            PurchaseOrderState::Validated => {
                &[PurchaseOrderState::Received, PurchaseOrderState::Cancelled]
            }
            PurchaseOrderState::Received | PurchaseOrderState::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: PurchaseOrderState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Whether sales may still be linked to an order in this state.
    pub fn accepts_sale_links(self) -> bool {
        matches!(
            self,
            PurchaseOrderState::Pending | PurchaseOrderState::Validated
        )
    }
}

impl core::fmt::Display for PurchaseOrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PurchaseOrderState::Pending => "pending",
            PurchaseOrderState::Validated => "validated",
            PurchaseOrderState::Received => "received",
            PurchaseOrderState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl core::str::FromStr for PurchaseOrderState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PurchaseOrderState::Pending),
            "validated" => Ok(PurchaseOrderState::Validated),
            "received" => Ok(PurchaseOrderState::Received),
            "cancelled" => Ok(PurchaseOrderState::Cancelled),
            other => Err(DomainError::validation(format!(
                "'{other}' is not a valid purchase order state"
            ))),
        }
    }
}

/// Purchase order line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount for PurchaseOrderLine {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

/// An order placed with a supplier.
///
/// Owns its lines and the forward collection of linked sales; each linked sale
/// keeps a weak id-based back-reference. Cancellation clears both directions,
/// nothing cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier_id: CounterpartyId,
    order_date: NaiveDate,
    state: PurchaseOrderState,
    lines: Vec<PurchaseOrderLine>,
    subtotal: Decimal,
    linked_sales: Vec<SaleId>,
    notes: String,
    created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn create(
        id: PurchaseOrderId,
        supplier_id: CounterpartyId,
        order_date: NaiveDate,
        notes: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            supplier_id,
            order_date,
            state: PurchaseOrderState::Pending,
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            linked_sales: Vec::new(),
            notes: notes.into(),
            created_at,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn supplier_id(&self) -> CounterpartyId {
        self.supplier_id
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn state(&self) -> PurchaseOrderState {
        self.state
    }

    pub fn lines(&self) -> &[PurchaseOrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn linked_sales(&self) -> &[SaleId] {
        &self.linked_sales
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lines may only change while the order is pending.
    pub fn is_modifiable(&self) -> bool {
        self.state == PurchaseOrderState::Pending
    }

    fn ensure_modifiable(&self) -> DomainResult<()> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "lines of a purchase order in state '{}' cannot be modified",
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
        self.lines.push(PurchaseOrderLine {
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
    pub fn transition(&mut self, next: PurchaseOrderState) -> DomainResult<()> {
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

    /// Force reception as a side effect of the linked purchase being received.
    ///
    /// Skips the transition table on purpose and leaves terminal states alone.
    pub fn force_received(&mut self) {
        if !self.state.is_terminal() {
            self.state = PurchaseOrderState::Received;
        }
    }

    /// Record the forward link to a sale (idempotent).
    pub fn link_sale(&mut self, sale_id: SaleId) {
        if !self.linked_sales.contains(&sale_id) {
            self.linked_sales.push(sale_id);
        }
    }

    pub fn unlink_sale(&mut self, sale_id: SaleId) {
        self.linked_sales.retain(|id| *id != sale_id);
    }

    pub fn unlink_all_sales(&mut self) -> Vec<SaleId> {
        core::mem::take(&mut self.linked_sales)
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Sales may only be assigned to a pending or validated purchase order, must
/// not be cancelled, and must not already belong to a *different* order
/// (re-assigning to the same order is a no-op and passes).
pub fn validate_sale_assignment<'a>(
    order: &PurchaseOrder,
    sales: impl IntoIterator<Item = &'a Sale>,
) -> DomainResult<()> {
    if !order.state().accepts_sale_links() {
        return Err(DomainError::invariant(format!(
            "a purchase order in state '{}' cannot take linked sales",
            order.state()
        )));
    }

    for sale in sales {
        if sale.is_cancelled() {
            return Err(DomainError::validation(format!(
                "sale {} is cancelled and cannot be linked to a purchase order",
                sale.id_typed()
            )));
        }
        if let Some(existing) = sale.purchase_order() {
            if existing != order.id_typed() {
                return Err(DomainError::validation(format!(
                    "sale {} already belongs to another purchase order",
                    sale.id_typed()
                )));
            }
        }
    }
    Ok(())
}

/// Consolidate the lines of several sales into purchase-order demand:
/// one entry per distinct product, quantities summed, first-seen order kept.
pub fn consolidate_sale_lines<'a>(
    sales: impl IntoIterator<Item = &'a Sale>,
) -> Vec<(ProductId, Decimal)> {
    let mut demand: Vec<(ProductId, Decimal)> = Vec::new();
    for sale in sales {
        for line in sale.lines() {
            match demand.iter_mut().find(|(p, _)| *p == line.product_id) {
                Some((_, quantity)) => *quantity += line.quantity,
                None => demand.push((line.product_id, line.quantity)),
            }
        }
    }
    demand
}
