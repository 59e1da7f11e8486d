use chrono::NaiveDate;
use rust_decimal::Decimal;

use ledgerflow_core::DomainResult;
use ledgerflow_parties::Counterparty;
use ledgerflow_purchasing::{Purchase, PurchaseOrder};
use ledgerflow_sales::{Sale, SalesOrder};
use ledgerflow_settlements::{Collection, Payment};

/// A sale was committed: the customer owes its total and the whole total is
/// pending.
pub fn on_sale_created(sale: &mut Sale, customer: &mut Counterparty) {
    customer.debit(sale.total());
    sale.initialize_pending_balance();
}

/// A purchase was committed: the supplier account grows by its total and the
/// whole total is pending. Mirror of [`on_sale_created`].
pub fn on_purchase_created(purchase: &mut Purchase, supplier: &mut Counterparty) {
    supplier.debit(purchase.total());
    purchase.initialize_pending_balance();
}

/// A collection was committed: the customer owes less and the full amount is
/// available to apply.
pub fn on_collection_created(collection: &mut Collection, customer: &mut Counterparty) {
    customer.credit(collection.amount());
    collection.initialize_available_balance();
}

/// A payment was committed: the supplier account shrinks and the full amount
/// is available to apply.
pub fn on_payment_created(payment: &mut Payment, supplier: &mut Counterparty) {
    supplier.credit(payment.amount());
    payment.initialize_available_balance();
}

/// Apply collection funds to one sale: records the line, consumes the
/// collection's available balance, walks the sale's pending balance down and
/// re-derives its states. The counterparty is untouched; the collection
/// header already moved it.
pub fn apply_collection_line(
    collection: &mut Collection,
    sale: &mut Sale,
    applied_amount: Decimal,
) -> u32 {
    let line_no = collection.append_line(sale.id_typed(), applied_amount);
    collection.consume(applied_amount);
    sale.apply_settlement(applied_amount);
    line_no
}

/// Apply payment funds to one purchase. Mirror of [`apply_collection_line`].
pub fn apply_payment_line(
    payment: &mut Payment,
    purchase: &mut Purchase,
    applied_amount: Decimal,
) -> u32 {
    let line_no = payment.append_line(purchase.id_typed(), applied_amount);
    payment.consume(applied_amount);
    purchase.apply_settlement(applied_amount);
    line_no
}

/// A sale was cancelled: the customer is relieved of the *full* total (not the
/// remaining balance), the purchase-order link is cleared in both directions
/// and every derived state follows.
pub fn on_sale_cancelled(
    sale: &mut Sale,
    customer: &mut Counterparty,
    linked_order: Option<&mut PurchaseOrder>,
    reason: impl Into<String>,
    date: NaiveDate,
) -> DomainResult<()> {
    sale.cancel(reason, date)?;
    customer.credit(sale.total());
    if let Some(order) = linked_order {
        order.unlink_sale(sale.id_typed());
    }
    sale.detach_purchase_order();
    Ok(())
}

/// A sale was delivered: its sales order, unless already closed, completes.
pub fn on_sale_delivered(sales_order: Option<&mut SalesOrder>) {
    if let Some(order) = sales_order {
        order.force_complete();
    }
}

/// A purchase was cancelled: the supplier account is relieved of the full
/// total and the payment state follows.
pub fn on_purchase_cancelled(
    purchase: &mut Purchase,
    supplier: &mut Counterparty,
    reason: impl Into<String>,
    date: NaiveDate,
) -> DomainResult<()> {
    purchase.cancel(reason, date)?;
    supplier.credit(purchase.total());
    Ok(())
}

/// A purchase was received: its purchase order, unless already closed, is
/// received too.
pub fn on_purchase_received(purchase_order: Option<&mut PurchaseOrder>) {
    if let Some(order) = purchase_order {
        order.force_received();
    }
}

/// A purchase order was cancelled: every linked sale loses its back-reference.
/// One-way clear, never a cascade.
pub fn on_purchase_order_cancelled<'a>(
    order: &mut PurchaseOrder,
    linked_sales: impl IntoIterator<Item = &'a mut Sale>,
) {
    order.unlink_all_sales();
    for sale in linked_sales {
        sale.detach_purchase_order();
    }
}

/// Credit-note funds applied to a sale: the sale owes less and so does the
/// customer.
pub fn apply_credit_note_to_sale(
    sale: &mut Sale,
    customer: &mut Counterparty,
    applied_amount: Decimal,
) {
    sale.apply_settlement(applied_amount);
    customer.credit(applied_amount);
}

/// Credit-note funds applied to a purchase. Mirror of
/// [`apply_credit_note_to_sale`].
pub fn apply_credit_note_to_purchase(
    purchase: &mut Purchase,
    supplier: &mut Counterparty,
    applied_amount: Decimal,
) {
    purchase.apply_settlement(applied_amount);
    supplier.credit(applied_amount);
}
