use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ledgerflow_automations::{
    apply_collection_line, apply_credit_note_to_purchase, apply_credit_note_to_sale,
    apply_payment_line, on_collection_created, on_payment_created, on_purchase_cancelled,
    on_purchase_created, on_purchase_order_cancelled, on_purchase_received, on_sale_cancelled,
    on_sale_created, on_sale_delivered,
};
use ledgerflow_core::{
    CollectionId, CounterpartyId, CreditNoteId, DomainError, DomainResult, PaymentId, ProductId,
    PurchaseId, PurchaseOrderId, SaleId, SalesOrderId,
};
use ledgerflow_money::{due_date, PricingPolicy};
use ledgerflow_parties::{
    ContactInfo, Counterparty, CounterpartyCategory, CounterpartyKind, PaymentTerm,
};
use ledgerflow_products::{Product, UnitOfMeasure};
use ledgerflow_purchasing::{
    validate_sale_assignment, Purchase, PurchaseLine, PurchaseOrder, PurchaseOrderState,
    PurchaseState,
};
use ledgerflow_sales::{Sale, SaleLine, SalesOrder, SalesOrderState};
use ledgerflow_settlements::{
    validate_collection_amendment, validate_credit_note_targets, validate_new_collection,
    validate_new_payment, validate_payment_amendment, ApplicationTarget, Collection,
    CollectionAllocation, CreditNote, CreditNoteApplication, CreditNoteKind, CreditNoteLine,
    Payment, PaymentAllocation, SettlementMethod,
};

use crate::store::Store;

/// One requested document line, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Request: register a counterparty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCounterparty {
    pub kind: CounterpartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub payment_term: PaymentTerm,
    pub credit_days: u32,
    pub category: Option<CounterpartyCategory>,
}

/// Request: create a sales order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub customer_id: CounterpartyId,
    pub order_date: NaiveDate,
    pub delivery_address: Option<String>,
    pub notes: String,
    pub lines: Vec<NewLine>,
}

/// Request: create a purchase order, optionally linking sales it will supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub supplier_id: CounterpartyId,
    pub order_date: NaiveDate,
    pub notes: String,
    pub lines: Vec<NewLine>,
    pub sales: Vec<SaleId>,
}

/// Request: create a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSale {
    pub customer_id: CounterpartyId,
    pub sales_order: Option<SalesOrderId>,
    pub sale_date: NaiveDate,
    pub delivery_address: Option<String>,
    pub lines: Vec<NewLine>,
    pub delivery_cost: Decimal,
    pub discount: Decimal,
}

/// Request: create a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub supplier_id: CounterpartyId,
    pub purchase_order: Option<PurchaseOrderId>,
    pub purchase_date: NaiveDate,
    pub lines: Vec<NewLine>,
    pub extra: Decimal,
    pub discount: Decimal,
    pub observations: String,
}

/// Request: record a customer collection with its applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCollection {
    pub customer_id: CounterpartyId,
    pub collection_date: NaiveDate,
    pub method: SettlementMethod,
    pub amount: Decimal,
    pub observations: String,
    pub allocations: Vec<CollectionAllocation>,
}

/// Request: record a supplier payment with its applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayment {
    pub supplier_id: CounterpartyId,
    pub payment_date: NaiveDate,
    pub method: SettlementMethod,
    pub amount: Decimal,
    pub observations: String,
    pub allocations: Vec<PaymentAllocation>,
}

/// Request: issue a credit note with its applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCreditNote {
    pub kind: CreditNoteKind,
    pub note_date: NaiveDate,
    pub amount: Decimal,
    pub lines: Vec<NewLine>,
    pub applications: Vec<CreditNoteApplication>,
    pub observations: String,
}

/// The atomic unit-of-work layer over the document store.
///
/// Every method validates fully against stored state, then commits the
/// header, its lines and all cascading balance updates together. A returned
/// error means the store is exactly as it was.
#[derive(Debug, Default)]
pub struct Engine {
    store: Store,
}

fn sale_lines(lines: Vec<NewLine>) -> Vec<SaleLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| SaleLine {
            line_no: i as u32 + 1,
            product_id: l.product_id,
            quantity: l.quantity,
            unit_price: l.unit_price,
        })
        .collect()
}

fn purchase_lines(lines: Vec<NewLine>) -> Vec<PurchaseLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| PurchaseLine {
            line_no: i as u32 + 1,
            product_id: l.product_id,
            quantity: l.quantity,
            unit_price: l.unit_price,
        })
        .collect()
}

fn note_lines(lines: Vec<NewLine>) -> Vec<CreditNoteLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| CreditNoteLine {
            line_no: i as u32 + 1,
            product_id: l.product_id,
            quantity: l.quantity,
            unit_price: l.unit_price,
        })
        .collect()
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn transacting_counterparty(
        &self,
        id: CounterpartyId,
        kind: CounterpartyKind,
    ) -> DomainResult<&Counterparty> {
        let counterparty = self.store.counterparties.get(id)?;
        if counterparty.kind() != kind {
            return Err(DomainError::validation(match kind {
                CounterpartyKind::Customer => "counterparty is not a customer",
                CounterpartyKind::Supplier => "counterparty is not a supplier",
            }));
        }
        if !counterparty.can_transact() {
            return Err(DomainError::validation("counterparty is not active"));
        }
        Ok(counterparty)
    }

    fn customer(&self, id: CounterpartyId) -> DomainResult<&Counterparty> {
        self.transacting_counterparty(id, CounterpartyKind::Customer)
    }

    fn supplier(&self, id: CounterpartyId) -> DomainResult<&Counterparty> {
        self.transacting_counterparty(id, CounterpartyKind::Supplier)
    }

    // ---- counterparties & products ----

    pub fn register_counterparty(&mut self, cmd: RegisterCounterparty) -> DomainResult<CounterpartyId> {
        let counterparty = Counterparty::register(
            CounterpartyId::new(),
            cmd.kind,
            cmd.name,
            cmd.contact,
            cmd.payment_term,
            cmd.credit_days,
            cmd.category,
            Utc::now(),
        )?;
        let id = counterparty.id_typed();
        self.store.counterparties.insert(counterparty)?;
        debug!(counterparty = %id, "counterparty registered");
        Ok(id)
    }

    pub fn update_counterparty_terms(
        &mut self,
        id: CounterpartyId,
        term: PaymentTerm,
        credit_days: u32,
    ) -> DomainResult<()> {
        self.store
            .counterparties
            .get_mut(id)?
            .update_terms(term, credit_days)
    }

    pub fn create_product(
        &mut self,
        name: String,
        description: String,
        unit: UnitOfMeasure,
        purchase_price: Decimal,
        policy: PricingPolicy,
    ) -> DomainResult<ProductId> {
        let product = Product::create(
            ProductId::new(),
            name,
            description,
            unit,
            purchase_price,
            policy,
            Utc::now(),
        )?;
        let id = product.id_typed();
        self.store.products.insert(product)?;
        debug!(product = %id, "product created");
        Ok(id)
    }

    pub fn reprice_product(&mut self, id: ProductId, purchase_price: Decimal) -> DomainResult<()> {
        self.store.products.get_mut(id)?.set_purchase_price(purchase_price)
    }

    // ---- sales orders ----

    pub fn create_sales_order(&mut self, cmd: CreateSalesOrder) -> DomainResult<SalesOrderId> {
        self.customer(cmd.customer_id)?;
        let mut order = SalesOrder::create(
            SalesOrderId::new(),
            cmd.customer_id,
            cmd.order_date,
            cmd.delivery_address,
            cmd.notes,
            Utc::now(),
        );
        for line in cmd.lines {
            order.add_line(line.product_id, line.quantity, line.unit_price)?;
        }
        let id = order.id_typed();
        self.store.sales_orders.insert(order)?;
        debug!(sales_order = %id, "sales order created");
        Ok(id)
    }

    pub fn add_sales_order_line(
        &mut self,
        order_id: SalesOrderId,
        line: NewLine,
    ) -> DomainResult<u32> {
        self.store
            .sales_orders
            .get_mut(order_id)?
            .add_line(line.product_id, line.quantity, line.unit_price)
    }

    pub fn update_sales_order_line(
        &mut self,
        order_id: SalesOrderId,
        line_no: u32,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> DomainResult<()> {
        self.store
            .sales_orders
            .get_mut(order_id)?
            .update_line(line_no, quantity, unit_price)
    }

    pub fn remove_sales_order_line(
        &mut self,
        order_id: SalesOrderId,
        line_no: u32,
    ) -> DomainResult<()> {
        self.store.sales_orders.get_mut(order_id)?.remove_line(line_no)
    }

    pub fn transition_sales_order(
        &mut self,
        order_id: SalesOrderId,
        next: SalesOrderState,
    ) -> DomainResult<()> {
        self.store.sales_orders.get_mut(order_id)?.transition(next)?;
        debug!(sales_order = %order_id, state = %next, "sales order transitioned");
        Ok(())
    }

    pub fn cancel_sales_order(
        &mut self,
        order_id: SalesOrderId,
        reason: String,
        date: NaiveDate,
    ) -> DomainResult<()> {
        self.store.sales_orders.get_mut(order_id)?.cancel(reason, date)?;
        debug!(sales_order = %order_id, "sales order cancelled");
        Ok(())
    }

    // ---- purchase orders ----

    pub fn create_purchase_order(&mut self, cmd: CreatePurchaseOrder) -> DomainResult<PurchaseOrderId> {
        self.supplier(cmd.supplier_id)?;
        let mut order = PurchaseOrder::create(
            PurchaseOrderId::new(),
            cmd.supplier_id,
            cmd.order_date,
            cmd.notes,
            Utc::now(),
        );
        for line in cmd.lines {
            order.add_line(line.product_id, line.quantity, line.unit_price)?;
        }

        if !cmd.sales.is_empty() {
            let sales = cmd
                .sales
                .iter()
                .map(|id| self.store.sales.get(*id))
                .collect::<DomainResult<Vec<_>>>()?;
            validate_sale_assignment(&order, sales.iter().copied())?;
            for sale_id in &cmd.sales {
                order.link_sale(*sale_id);
            }
        }

        let id = order.id_typed();
        for sale_id in &cmd.sales {
            self.store.sales.get_mut(*sale_id)?.attach_purchase_order(id);
        }
        self.store.purchase_orders.insert(order)?;
        debug!(purchase_order = %id, "purchase order created");
        Ok(id)
    }

    pub fn add_purchase_order_line(
        &mut self,
        order_id: PurchaseOrderId,
        line: NewLine,
    ) -> DomainResult<u32> {
        self.store
            .purchase_orders
            .get_mut(order_id)?
            .add_line(line.product_id, line.quantity, line.unit_price)
    }

    pub fn update_purchase_order_line(
        &mut self,
        order_id: PurchaseOrderId,
        line_no: u32,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> DomainResult<()> {
        self.store
            .purchase_orders
            .get_mut(order_id)?
            .update_line(line_no, quantity, unit_price)
    }

    pub fn remove_purchase_order_line(
        &mut self,
        order_id: PurchaseOrderId,
        line_no: u32,
    ) -> DomainResult<()> {
        self.store
            .purchase_orders
            .get_mut(order_id)?
            .remove_line(line_no)
    }

    pub fn assign_sales_to_purchase_order(
        &mut self,
        order_id: PurchaseOrderId,
        sale_ids: Vec<SaleId>,
    ) -> DomainResult<()> {
        {
            let order = self.store.purchase_orders.get(order_id)?;
            let sales = sale_ids
                .iter()
                .map(|id| self.store.sales.get(*id))
                .collect::<DomainResult<Vec<_>>>()?;
            validate_sale_assignment(order, sales.iter().copied())?;
        }

        for sale_id in &sale_ids {
            self.store.sales.get_mut(*sale_id)?.attach_purchase_order(order_id);
        }
        let order = self.store.purchase_orders.get_mut(order_id)?;
        for sale_id in sale_ids {
            order.link_sale(sale_id);
        }
        Ok(())
    }

    pub fn transition_purchase_order(
        &mut self,
        order_id: PurchaseOrderId,
        next: PurchaseOrderState,
    ) -> DomainResult<()> {
        let Store {
            purchase_orders,
            sales,
            ..
        } = &mut self.store;
        let order = purchase_orders.get_mut(order_id)?;
        order.transition(next)?;

        if next == PurchaseOrderState::Cancelled {
            let linked = order.linked_sales().to_vec();
            on_purchase_order_cancelled(
                order,
                sales.iter_mut().filter(|s| linked.contains(&s.id_typed())),
            );
        }
        debug!(purchase_order = %order_id, state = %next, "purchase order transitioned");
        Ok(())
    }

    // ---- sales ----

    pub fn create_sale(&mut self, cmd: CreateSale) -> DomainResult<SaleId> {
        let credit_days = self.customer(cmd.customer_id)?.credit_days();
        let order = match cmd.sales_order {
            Some(order_id) => Some(self.store.sales_orders.get(order_id)?),
            None => None,
        };

        let mut sale = Sale::create(
            SaleId::new(),
            cmd.customer_id,
            order,
            cmd.sale_date,
            due_date(cmd.sale_date, credit_days),
            cmd.delivery_address,
            sale_lines(cmd.lines),
            cmd.delivery_cost,
            cmd.discount,
            Utc::now(),
        )?;

        let mut customer = self.store.counterparties.get(cmd.customer_id)?.clone();
        on_sale_created(&mut sale, &mut customer);

        let id = sale.id_typed();
        let total = sale.total();
        self.store.counterparties.put(customer);
        self.store.sales.insert(sale)?;
        debug!(sale = %id, total = %total, "sale committed");
        Ok(id)
    }

    pub fn deliver_sale(&mut self, sale_id: SaleId, date: NaiveDate) -> DomainResult<()> {
        let mut sale = self.store.sales.get(sale_id)?.clone();
        sale.mark_delivered(date)?;

        if let Some(order_id) = sale.sales_order() {
            let order = self.store.sales_orders.get_mut(order_id)?;
            on_sale_delivered(Some(order));
        }
        self.store.sales.put(sale);
        debug!(sale = %sale_id, "sale delivered");
        Ok(())
    }

    pub fn reschedule_sale(&mut self, sale_id: SaleId, new_date: NaiveDate) -> DomainResult<()> {
        self.store.sales.get_mut(sale_id)?.reschedule(new_date)
    }

    pub fn cancel_sale(
        &mut self,
        sale_id: SaleId,
        reason: String,
        date: NaiveDate,
    ) -> DomainResult<()> {
        let mut sale = self.store.sales.get(sale_id)?.clone();
        let mut customer = self.store.counterparties.get(sale.customer_id())?.clone();
        let mut order = match sale.purchase_order() {
            Some(order_id) => Some(self.store.purchase_orders.get(order_id)?.clone()),
            None => None,
        };

        on_sale_cancelled(&mut sale, &mut customer, order.as_mut(), reason, date)?;

        self.store.sales.put(sale);
        self.store.counterparties.put(customer);
        if let Some(order) = order {
            self.store.purchase_orders.put(order);
        }
        debug!(sale = %sale_id, "sale cancelled");
        Ok(())
    }

    // ---- purchases ----

    pub fn create_purchase(&mut self, cmd: CreatePurchase) -> DomainResult<PurchaseId> {
        let credit_days = self.supplier(cmd.supplier_id)?.credit_days();
        let order = match cmd.purchase_order {
            Some(order_id) => Some(self.store.purchase_orders.get(order_id)?),
            None => None,
        };

        let mut purchase = Purchase::create(
            PurchaseId::new(),
            cmd.supplier_id,
            order,
            cmd.purchase_date,
            due_date(cmd.purchase_date, credit_days),
            purchase_lines(cmd.lines),
            cmd.extra,
            cmd.discount,
            cmd.observations,
            Utc::now(),
        )?;

        let mut supplier = self.store.counterparties.get(cmd.supplier_id)?.clone();
        on_purchase_created(&mut purchase, &mut supplier);

        let id = purchase.id_typed();
        let total = purchase.total();
        self.store.counterparties.put(supplier);
        self.store.purchases.insert(purchase)?;
        debug!(purchase = %id, total = %total, "purchase committed");
        Ok(id)
    }

    pub fn receive_purchase(&mut self, purchase_id: PurchaseId) -> DomainResult<()> {
        let mut purchase = self.store.purchases.get(purchase_id)?.clone();
        purchase.transition(PurchaseState::Received)?;

        if let Some(order_id) = purchase.purchase_order() {
            let order = self.store.purchase_orders.get_mut(order_id)?;
            on_purchase_received(Some(order));
        }
        self.store.purchases.put(purchase);
        debug!(purchase = %purchase_id, "purchase received");
        Ok(())
    }

    pub fn cancel_purchase(
        &mut self,
        purchase_id: PurchaseId,
        reason: String,
        date: NaiveDate,
    ) -> DomainResult<()> {
        let mut purchase = self.store.purchases.get(purchase_id)?.clone();
        let mut supplier = self.store.counterparties.get(purchase.supplier_id())?.clone();

        on_purchase_cancelled(&mut purchase, &mut supplier, reason, date)?;

        self.store.purchases.put(purchase);
        self.store.counterparties.put(supplier);
        debug!(purchase = %purchase_id, "purchase cancelled");
        Ok(())
    }

    // ---- collections & payments ----

    pub fn record_collection(&mut self, cmd: RecordCollection) -> DomainResult<CollectionId> {
        self.customer(cmd.customer_id)?;
        validate_new_collection(cmd.amount, &cmd.allocations, |id| self.store.sales.find(id))?;

        let mut collection = Collection::create(
            CollectionId::new(),
            cmd.customer_id,
            cmd.collection_date,
            cmd.method,
            cmd.amount,
            cmd.observations,
            Utc::now(),
        )?;
        let mut customer = self.store.counterparties.get(cmd.customer_id)?.clone();
        on_collection_created(&mut collection, &mut customer);

        for allocation in &cmd.allocations {
            let sale = self.store.sales.get_mut(allocation.sale_id)?;
            apply_collection_line(&mut collection, sale, allocation.applied_amount);
        }

        let id = collection.id_typed();
        self.store.counterparties.put(customer);
        self.store.collections.insert(collection)?;
        debug!(collection = %id, amount = %cmd.amount, "collection committed");
        Ok(id)
    }

    /// Add applications to an existing collection. Strictly additive: lines
    /// already committed are never rewritten, and the new ones draw on the
    /// *stored* available balance.
    pub fn amend_collection(
        &mut self,
        collection_id: CollectionId,
        allocations: Vec<CollectionAllocation>,
    ) -> DomainResult<()> {
        let mut collection = {
            let collection = self.store.collections.get(collection_id)?;
            validate_collection_amendment(collection, &allocations, |id| self.store.sales.find(id))?;
            collection.clone()
        };

        for allocation in &allocations {
            let sale = self.store.sales.get_mut(allocation.sale_id)?;
            apply_collection_line(&mut collection, sale, allocation.applied_amount);
        }
        self.store.collections.put(collection);
        debug!(collection = %collection_id, "collection amended");
        Ok(())
    }

    pub fn record_payment(&mut self, cmd: RecordPayment) -> DomainResult<PaymentId> {
        self.supplier(cmd.supplier_id)?;
        validate_new_payment(cmd.amount, &cmd.allocations, |id| self.store.purchases.find(id))?;

        let mut payment = Payment::create(
            PaymentId::new(),
            cmd.supplier_id,
            cmd.payment_date,
            cmd.method,
            cmd.amount,
            cmd.observations,
            Utc::now(),
        )?;
        let mut supplier = self.store.counterparties.get(cmd.supplier_id)?.clone();
        on_payment_created(&mut payment, &mut supplier);

        for allocation in &cmd.allocations {
            let purchase = self.store.purchases.get_mut(allocation.purchase_id)?;
            apply_payment_line(&mut payment, purchase, allocation.applied_amount);
        }

        let id = payment.id_typed();
        self.store.counterparties.put(supplier);
        self.store.payments.insert(payment)?;
        debug!(payment = %id, amount = %cmd.amount, "payment committed");
        Ok(id)
    }

    /// Add applications to an existing payment. Strictly additive, capped by
    /// the stored available balance.
    pub fn amend_payment(
        &mut self,
        payment_id: PaymentId,
        allocations: Vec<PaymentAllocation>,
    ) -> DomainResult<()> {
        let mut payment = {
            let payment = self.store.payments.get(payment_id)?;
            validate_payment_amendment(payment, &allocations, |id| self.store.purchases.find(id))?;
            payment.clone()
        };

        for allocation in &allocations {
            let purchase = self.store.purchases.get_mut(allocation.purchase_id)?;
            apply_payment_line(&mut payment, purchase, allocation.applied_amount);
        }
        self.store.payments.put(payment);
        debug!(payment = %payment_id, "payment amended");
        Ok(())
    }

    // ---- credit notes ----

    pub fn issue_credit_note(&mut self, cmd: IssueCreditNote) -> DomainResult<CreditNoteId> {
        let note = CreditNote::create(
            CreditNoteId::new(),
            cmd.kind,
            cmd.note_date,
            cmd.amount,
            note_lines(cmd.lines),
            cmd.applications,
            cmd.observations,
            Utc::now(),
        )?;
        validate_credit_note_targets(
            &note,
            |id| self.store.sales.find(id),
            |id| self.store.purchases.find(id),
        )?;
        // The counterparty of every target must be present before any write.
        for application in note.applications() {
            match application.target {
                ApplicationTarget::Sale(sale_id) => {
                    let sale = self.store.sales.get(sale_id)?;
                    self.store.counterparties.get(sale.customer_id())?;
                }
                ApplicationTarget::Purchase(purchase_id) => {
                    let purchase = self.store.purchases.get(purchase_id)?;
                    self.store.counterparties.get(purchase.supplier_id())?;
                }
            }
        }

        {
            let Store {
                sales,
                purchases,
                counterparties,
                ..
            } = &mut self.store;
            for application in note.applications() {
                match application.target {
                    ApplicationTarget::Sale(sale_id) => {
                        let sale = sales.get_mut(sale_id)?;
                        let customer = counterparties.get_mut(sale.customer_id())?;
                        apply_credit_note_to_sale(sale, customer, application.applied_amount);
                    }
                    ApplicationTarget::Purchase(purchase_id) => {
                        let purchase = purchases.get_mut(purchase_id)?;
                        let supplier = counterparties.get_mut(purchase.supplier_id())?;
                        apply_credit_note_to_purchase(
                            purchase,
                            supplier,
                            application.applied_amount,
                        );
                    }
                }
            }
        }

        let id = note.id_typed();
        self.store.credit_notes.insert(note)?;
        debug!(credit_note = %id, amount = %cmd.amount, "credit note committed");
        Ok(id)
    }
}
