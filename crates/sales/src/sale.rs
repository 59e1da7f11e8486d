use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{
    CounterpartyId, DomainError, DomainResult, Entity, ProductId, PurchaseOrderId, SaleId,
    SalesOrderId,
};
use ledgerflow_money::{document_total, line_total, LineAmount};

use crate::order::{SalesOrder, SalesOrderState};

/// Delivery status of a sale.
///
/// `Cancelled` exists in the table but is never a valid *requested* target:
/// it is set only as a side effect of cancelling the sale itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Rescheduled,
    Delivered,
    Cancelled,
}

impl DeliveryState {
    /// Transitions a caller may request. Cancellation is excluded: cancel the
    /// sale instead.
    pub fn requestable_transitions(self) -> &'static [DeliveryState] {
        match self {
            DeliveryState::Pending => &[DeliveryState::Delivered, DeliveryState::Rescheduled],
            DeliveryState::Rescheduled => &[DeliveryState::Delivered],
            DeliveryState::Delivered | DeliveryState::Cancelled => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Cancelled)
    }
}

impl core::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Rescheduled => "rescheduled",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl core::str::FromStr for DeliveryState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(DeliveryState::Pending),
            "rescheduled" => Ok(DeliveryState::Rescheduled),
            "delivered" => Ok(DeliveryState::Delivered),
            "cancelled" => Ok(DeliveryState::Cancelled),
            other => Err(DomainError::validation(format!(
                "'{other}' is not a valid delivery state"
            ))),
        }
    }
}

/// Commercial status of a sale. Derived; no public setter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommercialState {
    InProgress,
    Completed,
    Cancelled,
}

impl core::fmt::Display for CommercialState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            CommercialState::InProgress => "in_progress",
            CommercialState::Completed => "completed",
            CommercialState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Collection status of a sale. Derived; no public setter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionState {
    Pending,
    Partial,
    Collected,
    Cancelled,
}

impl core::fmt::Display for CollectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            CollectionState::Pending => "pending",
            CollectionState::Partial => "partial",
            CollectionState::Collected => "collected",
            CollectionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Sale line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount for SaleLine {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

/// Why and when a sale was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub date: NaiveDate,
}

/// A sale may only be taken from an accepted order with a nonzero subtotal.
pub fn validate_order_link(order: Option<&SalesOrder>) -> DomainResult<()> {
    let Some(order) = order else {
        return Ok(());
    };
    if order.state() != SalesOrderState::Accepted {
        return Err(DomainError::validation(
            "a sale requires its sales order to be accepted",
        ));
    }
    if order.subtotal() == Decimal::ZERO {
        return Err(DomainError::validation(
            "a sale cannot be taken from a sales order with a zero subtotal",
        ));
    }
    Ok(())
}

/// Every sale line must carry a positive quantity and unit price.
pub fn validate_sale_lines(lines: &[SaleLine]) -> DomainResult<()> {
    for line in lines {
        if line.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "sale line {} quantity must be positive",
                line.line_no
            )));
        }
        if line.unit_price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "sale line {} unit_price must be positive",
                line.line_no
            )));
        }
    }
    Ok(())
}

/// A sale to a customer.
///
/// Three independent state axes: commercial (derived), delivery (requested),
/// collection (derived). The pending balance starts at the total and is walked
/// down by collection lines and credit-note applications; only the automation
/// layer moves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    customer_id: CounterpartyId,
    sales_order: Option<SalesOrderId>,
    purchase_order: Option<PurchaseOrderId>,
    sale_date: NaiveDate,
    due_date: NaiveDate,
    delivery_address: Option<String>,
    delivery_date: Option<NaiveDate>,
    rescheduled_date: Option<NaiveDate>,
    lines: Vec<SaleLine>,
    subtotal: Decimal,
    delivery_cost: Decimal,
    discount: Decimal,
    total: Decimal,
    pending_balance: Decimal,
    commercial_state: CommercialState,
    delivery_state: DeliveryState,
    collection_state: CollectionState,
    cancellation: Option<Cancellation>,
    created_at: DateTime<Utc>,
}

impl Sale {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: SaleId,
        customer_id: CounterpartyId,
        sales_order: Option<&SalesOrder>,
        sale_date: NaiveDate,
        due_date: NaiveDate,
        delivery_address: Option<String>,
        lines: Vec<SaleLine>,
        delivery_cost: Decimal,
        discount: Decimal,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_order_link(sales_order)?;
        validate_sale_lines(&lines)?;
        if delivery_cost < Decimal::ZERO {
            return Err(DomainError::validation("delivery_cost cannot be negative"));
        }
        if discount < Decimal::ZERO {
            return Err(DomainError::validation("discount cannot be negative"));
        }

        let subtotal = line_total(&lines);
        let total = document_total(subtotal, delivery_cost, discount);

        Ok(Self {
            id,
            customer_id,
            sales_order: sales_order.map(SalesOrder::id_typed),
            purchase_order: None,
            sale_date,
            due_date,
            delivery_address,
            delivery_date: None,
            rescheduled_date: None,
            lines,
            subtotal,
            delivery_cost,
            discount,
            total,
            pending_balance: Decimal::ZERO,
            commercial_state: CommercialState::InProgress,
            delivery_state: DeliveryState::Pending,
            collection_state: CollectionState::Pending,
            cancellation: None,
            created_at,
        })
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn customer_id(&self) -> CounterpartyId {
        self.customer_id
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn purchase_order(&self) -> Option<PurchaseOrderId> {
        self.purchase_order
    }

    pub fn sale_date(&self) -> NaiveDate {
        self.sale_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn delivery_address(&self) -> Option<&str> {
        self.delivery_address.as_deref()
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn rescheduled_date(&self) -> Option<NaiveDate> {
        self.rescheduled_date
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn delivery_cost(&self) -> Decimal {
        self.delivery_cost
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

    pub fn commercial_state(&self) -> CommercialState {
        self.commercial_state
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.delivery_state
    }

    pub fn collection_state(&self) -> CollectionState {
        self.collection_state
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.commercial_state == CommercialState::Cancelled
    }

    /// Whether this sale can still receive collection applications.
    pub fn can_receive_applications(&self) -> bool {
        !self.is_cancelled()
    }

    /// Request a delivery-state change, checked against the transition table.
    ///
    /// `cancelled` is rejected here no matter the current state; cancelling
    /// delivery happens only through [`Sale::cancel`].
    pub fn set_delivery_state(&mut self, next: DeliveryState) -> DomainResult<()> {
        let allowed = self.delivery_state.requestable_transitions();
        if !allowed.contains(&next) {
            return Err(DomainError::invalid_transition(
                self.delivery_state,
                next,
                allowed,
            ));
        }
        self.delivery_state = next;
        Ok(())
    }

    /// Mark the sale delivered and re-derive the dependent states.
    pub fn mark_delivered(&mut self, date: NaiveDate) -> DomainResult<()> {
        self.set_delivery_state(DeliveryState::Delivered)?;
        self.delivery_date = Some(date);
        self.rederive_states();
        Ok(())
    }

    /// Reschedule a pending delivery to a new date.
    pub fn reschedule(&mut self, new_date: NaiveDate) -> DomainResult<()> {
        self.set_delivery_state(DeliveryState::Rescheduled)?;
        self.rescheduled_date = Some(new_date);
        Ok(())
    }

    /// Set the pending balance to the total. Driven by the automation layer
    /// right after the sale is committed.
    pub fn initialize_pending_balance(&mut self) {
        self.pending_balance = self.total;
        self.rederive_states();
    }

    /// Walk the pending balance down by an applied amount. Driven by the
    /// automation layer; the amount was validated against the balance upstream.
    pub fn apply_settlement(&mut self, amount: Decimal) {
        self.pending_balance -= amount;
        self.rederive_states();
    }

    /// Cancel the sale: delivery is force-cancelled, the pending balance is
    /// cleared and both derived states follow.
    pub fn cancel(&mut self, reason: impl Into<String>, date: NaiveDate) -> DomainResult<()> {
        if self.is_cancelled() {
            return Err(DomainError::conflict("sale is already cancelled"));
        }
        self.delivery_state = DeliveryState::Cancelled;
        self.pending_balance = Decimal::ZERO;
        self.cancellation = Some(Cancellation {
            reason: reason.into(),
            date,
        });
        self.rederive_states();
        Ok(())
    }

    pub fn attach_purchase_order(&mut self, order_id: PurchaseOrderId) {
        self.purchase_order = Some(order_id);
    }

    pub fn detach_purchase_order(&mut self) {
        self.purchase_order = None;
    }

    /// Recompute both derived states from stored facts.
    ///
    /// Pure function of (delivery_state, pending_balance, total); safe to call
    /// any number of times, in any order relative to other automations.
    pub fn rederive_states(&mut self) {
        self.commercial_state = if self.delivery_state == DeliveryState::Cancelled {
            CommercialState::Cancelled
        } else if self.delivery_state == DeliveryState::Delivered
            && self.pending_balance == Decimal::ZERO
        {
            CommercialState::Completed
        } else {
            CommercialState::InProgress
        };

        self.collection_state = if self.commercial_state == CommercialState::Cancelled {
            CollectionState::Cancelled
        } else if self.pending_balance == Decimal::ZERO {
            CollectionState::Collected
        } else if self.pending_balance > Decimal::ZERO && self.pending_balance < self.total {
            CollectionState::Partial
        } else {
            CollectionState::Pending
        };
    }
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_lines() -> Vec<SaleLine> {
        vec![
            SaleLine {
                line_no: 1,
                product_id: ProductId::new(),
                quantity: dec!(2),
                unit_price: dec!(75),
            },
            SaleLine {
                line_no: 2,
                product_id: ProductId::new(),
                quantity: dec!(1),
                unit_price: dec!(50),
            },
        ]
    }

    fn test_sale() -> Sale {
        let mut sale = Sale::create(
            SaleId::new(),
            CounterpartyId::new(),
            None,
            date(2025, 3, 10),
            date(2025, 4, 9),
            None,
            test_lines(),
            Decimal::ZERO,
            Decimal::ZERO,
            Utc::now(),
        )
        .unwrap();
        sale.initialize_pending_balance();
        sale
    }

    fn accepted_order(unit_price: Decimal) -> SalesOrder {
        let mut order = SalesOrder::create(
            SalesOrderId::new(),
            CounterpartyId::new(),
            date(2025, 3, 9),
            None,
            "",
            Utc::now(),
        );
        order.add_line(ProductId::new(), dec!(1), unit_price).unwrap();
        order.transition(SalesOrderState::Accepted).unwrap();
        order
    }

    #[test]
    fn create_computes_subtotal_and_total() {
        let sale = Sale::create(
            SaleId::new(),
            CounterpartyId::new(),
            None,
            date(2025, 3, 10),
            date(2025, 3, 10),
            None,
            test_lines(),
            dec!(20),
            dec!(10),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sale.subtotal(), dec!(200.00));
        assert_eq!(sale.total(), dec!(210.00));
        assert_eq!(sale.pending_balance(), Decimal::ZERO);
        assert_eq!(sale.commercial_state(), CommercialState::InProgress);
        assert_eq!(sale.delivery_state(), DeliveryState::Pending);
    }

    #[test]
    fn create_accepts_an_accepted_order() {
        let order = accepted_order(dec!(100));
        let sale = Sale::create(
            SaleId::new(),
            order.customer_id(),
            Some(&order),
            date(2025, 3, 10),
            date(2025, 3, 10),
            None,
            test_lines(),
            Decimal::ZERO,
            Decimal::ZERO,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(sale.sales_order(), Some(order.id_typed()));
    }

    #[test]
    fn create_rejects_a_pending_order() {
        let order = SalesOrder::create(
            SalesOrderId::new(),
            CounterpartyId::new(),
            date(2025, 3, 9),
            None,
            "",
            Utc::now(),
        );
        let err = validate_order_link(Some(&order)).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("accepted") => {}
            _ => panic!("Expected Validation error for unaccepted order"),
        }
    }

    #[test]
    fn create_rejects_an_accepted_order_with_zero_subtotal() {
        let mut order = SalesOrder::create(
            SalesOrderId::new(),
            CounterpartyId::new(),
            date(2025, 3, 9),
            None,
            "",
            Utc::now(),
        );
        // Accept without lines: subtotal stays zero.
        order.transition(SalesOrderState::Accepted).unwrap();
        let err = validate_order_link(Some(&order)).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("zero subtotal") => {}
            _ => panic!("Expected Validation error for zero-subtotal order"),
        }
    }

    #[test]
    fn create_rejects_bad_lines() {
        let lines = vec![SaleLine {
            line_no: 1,
            product_id: ProductId::new(),
            quantity: dec!(0),
            unit_price: dec!(10),
        }];
        let err = validate_sale_lines(&lines).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("quantity") => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }
    }

    #[test]
    fn initialize_pending_balance_sets_it_to_total() {
        let sale = test_sale();
        assert_eq!(sale.pending_balance(), dec!(200.00));
        assert_eq!(sale.collection_state(), CollectionState::Pending);
    }

    #[test]
    fn settlement_walks_collection_state_through_partial_to_collected() {
        let mut sale = test_sale();

        sale.apply_settlement(dec!(150));
        assert_eq!(sale.pending_balance(), dec!(50.00));
        assert_eq!(sale.collection_state(), CollectionState::Partial);

        sale.apply_settlement(dec!(50));
        assert_eq!(sale.pending_balance(), Decimal::ZERO);
        assert_eq!(sale.collection_state(), CollectionState::Collected);
    }

    #[test]
    fn commercial_state_completes_only_when_delivered_and_collected() {
        let mut sale = test_sale();

        sale.mark_delivered(date(2025, 3, 11)).unwrap();
        assert_eq!(sale.commercial_state(), CommercialState::InProgress);

        sale.apply_settlement(dec!(200));
        assert_eq!(sale.commercial_state(), CommercialState::Completed);
    }

    #[test]
    fn delivery_can_be_rescheduled_then_delivered() {
        let mut sale = test_sale();
        sale.reschedule(date(2025, 3, 15)).unwrap();
        assert_eq!(sale.delivery_state(), DeliveryState::Rescheduled);
        assert_eq!(sale.rescheduled_date(), Some(date(2025, 3, 15)));

        sale.mark_delivered(date(2025, 3, 15)).unwrap();
        assert_eq!(sale.delivery_state(), DeliveryState::Delivered);
        assert_eq!(sale.delivery_date(), Some(date(2025, 3, 15)));
    }

    #[test]
    fn rescheduled_delivery_cannot_be_rescheduled_again() {
        let mut sale = test_sale();
        sale.reschedule(date(2025, 3, 15)).unwrap();
        let err = sale.reschedule(date(2025, 3, 20)).unwrap_err();
        match err {
            DomainError::InvalidTransition { ref from, ref to, .. }
                if from == "rescheduled" && to == "rescheduled" => {}
            _ => panic!("Expected InvalidTransition"),
        }
    }

    #[test]
    fn delivery_cancellation_cannot_be_requested_directly() {
        let mut sale = test_sale();
        let err = sale.set_delivery_state(DeliveryState::Cancelled).unwrap_err();
        match err {
            DomainError::InvalidTransition { ref to, ref allowed, .. } => {
                assert_eq!(to, "cancelled");
                assert!(!allowed.contains("cancelled"));
            }
            _ => panic!("Expected InvalidTransition for direct cancellation"),
        }
    }

    #[test]
    fn delivered_is_terminal() {
        let mut sale = test_sale();
        sale.mark_delivered(date(2025, 3, 11)).unwrap();
        let err = sale.set_delivery_state(DeliveryState::Pending).unwrap_err();
        match err {
            DomainError::InvalidTransition { .. } => {}
            _ => panic!("Expected InvalidTransition from delivered"),
        }
    }

    #[test]
    fn cancel_clears_balance_and_derives_all_states() {
        let mut sale = test_sale();
        sale.apply_settlement(dec!(50));

        sale.cancel("out of stock", date(2025, 3, 12)).unwrap();
        assert_eq!(sale.pending_balance(), Decimal::ZERO);
        assert_eq!(sale.delivery_state(), DeliveryState::Cancelled);
        assert_eq!(sale.commercial_state(), CommercialState::Cancelled);
        assert_eq!(sale.collection_state(), CollectionState::Cancelled);
        assert!(!sale.can_receive_applications());

        let err = sale.cancel("again", date(2025, 3, 13)).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for double cancellation"),
        }
    }

    #[test]
    fn rederive_states_is_idempotent() {
        let mut sale = test_sale();
        sale.apply_settlement(dec!(75));
        let commercial = sale.commercial_state();
        let collection = sale.collection_state();

        sale.rederive_states();
        sale.rederive_states();
        assert_eq!(sale.commercial_state(), commercial);
        assert_eq!(sale.collection_state(), collection);
    }

    #[test]
    fn purchase_order_back_reference_attaches_and_detaches() {
        let mut sale = test_sale();
        let po = PurchaseOrderId::new();
        sale.attach_purchase_order(po);
        assert_eq!(sale.purchase_order(), Some(po));
        sale.detach_purchase_order();
        assert_eq!(sale.purchase_order(), None);
    }
}
