//! Procure-to-pay scenarios: purchase order → purchase → payments and the
//! purchase-order/sale linkage, with balances checked at every step.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledgerflow_core::{CounterpartyId, DomainError, ProductId, PurchaseId};
use ledgerflow_engine::{
    CreatePurchase, CreatePurchaseOrder, CreateSale, Engine, IssueCreditNote, NewLine,
    RecordPayment, RegisterCounterparty,
};
use ledgerflow_money::PricingPolicy;
use ledgerflow_parties::{ContactInfo, CounterpartyKind, PaymentTerm};
use ledgerflow_products::UnitOfMeasure;
use ledgerflow_purchasing::{PaymentState, PurchaseOrderState};
use ledgerflow_settlements::{
    ApplicationTarget, CreditNoteApplication, CreditNoteKind, PaymentAllocation, SettlementMethod,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (Engine, CounterpartyId, ProductId) {
    ledgerflow_observability::init();
    let mut engine = Engine::new();
    let supplier_id = engine
        .register_counterparty(RegisterCounterparty {
            kind: CounterpartyKind::Supplier,
            name: "Poultry Farm Co".to_string(),
            contact: ContactInfo::default(),
            payment_term: PaymentTerm::RunningAccount,
            credit_days: 15,
            category: None,
        })
        .unwrap();
    let product_id = engine
        .create_product(
            "Eggs, dozen".to_string(),
            String::new(),
            UnitOfMeasure::Unit,
            dec!(300),
            PricingPolicy::HalfUpCents,
        )
        .unwrap();
    (engine, supplier_id, product_id)
}

fn purchase_of_500(
    engine: &mut Engine,
    supplier_id: CounterpartyId,
    product_id: ProductId,
) -> PurchaseId {
    engine
        .create_purchase(CreatePurchase {
            supplier_id,
            purchase_order: None,
            purchase_date: date(2025, 3, 10),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(10),
                unit_price: dec!(50),
            }],
            extra: Decimal::ZERO,
            discount: Decimal::ZERO,
            observations: String::new(),
        })
        .unwrap()
}

#[test]
fn full_procure_to_pay_flow_pays_off_the_purchase() {
    let (mut engine, supplier_id, product_id) = setup();

    let order_id = engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 8),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(10),
                unit_price: dec!(50),
            }],
            sales: Vec::new(),
        })
        .unwrap();
    engine
        .transition_purchase_order(order_id, PurchaseOrderState::Validated)
        .unwrap();

    let purchase_id = engine
        .create_purchase(CreatePurchase {
            supplier_id,
            purchase_order: Some(order_id),
            purchase_date: date(2025, 3, 10),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(10),
                unit_price: dec!(50),
            }],
            extra: dec!(25),
            discount: Decimal::ZERO,
            observations: "freight".to_string(),
        })
        .unwrap();

    let purchase = engine.store().purchases.get(purchase_id).unwrap();
    assert_eq!(purchase.total(), dec!(525.00));
    assert_eq!(purchase.pending_balance(), dec!(525.00));
    assert_eq!(purchase.due_date(), date(2025, 3, 25));
    let supplier = engine.store().counterparties.get(supplier_id).unwrap();
    assert_eq!(supplier.running_balance(), dec!(525.00));

    // Receiving the purchase receives its order too.
    engine.receive_purchase(purchase_id).unwrap();
    let order = engine.store().purchase_orders.get(order_id).unwrap();
    assert_eq!(order.state(), PurchaseOrderState::Received);

    // Pay in two installments.
    engine
        .record_payment(RecordPayment {
            supplier_id,
            payment_date: date(2025, 3, 20),
            method: SettlementMethod::Transfer,
            amount: dec!(300),
            observations: String::new(),
            allocations: vec![PaymentAllocation {
                purchase_id,
                applied_amount: dec!(300),
            }],
        })
        .unwrap();
    let purchase = engine.store().purchases.get(purchase_id).unwrap();
    assert_eq!(purchase.payment_state(), PaymentState::Partial);

    engine
        .record_payment(RecordPayment {
            supplier_id,
            payment_date: date(2025, 3, 25),
            method: SettlementMethod::Transfer,
            amount: dec!(225),
            observations: String::new(),
            allocations: vec![PaymentAllocation {
                purchase_id,
                applied_amount: dec!(225),
            }],
        })
        .unwrap();

    let purchase = engine.store().purchases.get(purchase_id).unwrap();
    assert_eq!(purchase.payment_state(), PaymentState::Paid);
    assert_eq!(purchase.pending_balance(), Decimal::ZERO);
    let supplier = engine.store().counterparties.get(supplier_id).unwrap();
    assert_eq!(supplier.running_balance(), Decimal::ZERO);
}

#[test]
fn a_purchase_requires_lines_and_a_validated_order() {
    let (mut engine, supplier_id, product_id) = setup();

    let err = engine
        .create_purchase(CreatePurchase {
            supplier_id,
            purchase_order: None,
            purchase_date: date(2025, 3, 10),
            lines: Vec::new(),
            extra: Decimal::ZERO,
            discount: Decimal::ZERO,
            observations: String::new(),
        })
        .unwrap_err();
    match err {
        DomainError::Validation(msg) if msg.contains("at least one line") => {}
        _ => panic!("Expected Validation error for empty purchase"),
    }

    let order_id = engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 8),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(50),
            }],
            sales: Vec::new(),
        })
        .unwrap();

    let err = engine
        .create_purchase(CreatePurchase {
            supplier_id,
            purchase_order: Some(order_id),
            purchase_date: date(2025, 3, 10),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(50),
            }],
            extra: Decimal::ZERO,
            discount: Decimal::ZERO,
            observations: String::new(),
        })
        .unwrap_err();
    match err {
        DomainError::Validation(msg) if msg.contains("validated") => {}
        _ => panic!("Expected Validation error for pending purchase order"),
    }
    assert!(engine.store().purchases.is_empty());
}

#[test]
fn a_received_order_rejects_every_transition() {
    let (mut engine, supplier_id, product_id) = setup();
    let order_id = engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 8),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(50),
            }],
            sales: Vec::new(),
        })
        .unwrap();
    engine
        .transition_purchase_order(order_id, PurchaseOrderState::Validated)
        .unwrap();
    engine
        .transition_purchase_order(order_id, PurchaseOrderState::Received)
        .unwrap();

    for next in [
        PurchaseOrderState::Pending,
        PurchaseOrderState::Validated,
        PurchaseOrderState::Cancelled,
    ] {
        let err = engine.transition_purchase_order(order_id, next).unwrap_err();
        match err {
            DomainError::InvalidTransition { ref from, .. } if from == "received" => {}
            _ => panic!("Expected InvalidTransition from received"),
        }
    }
}

#[test]
fn cancelling_a_purchase_relieves_the_supplier_and_blocks_payments() {
    let (mut engine, supplier_id, product_id) = setup();
    let purchase_id = purchase_of_500(&mut engine, supplier_id, product_id);

    engine
        .cancel_purchase(purchase_id, "spoiled batch".to_string(), date(2025, 3, 12))
        .unwrap();

    let purchase = engine.store().purchases.get(purchase_id).unwrap();
    assert_eq!(purchase.payment_state(), PaymentState::Cancelled);
    assert_eq!(purchase.pending_balance(), Decimal::ZERO);
    let supplier = engine.store().counterparties.get(supplier_id).unwrap();
    assert_eq!(supplier.running_balance(), Decimal::ZERO);

    let err = engine
        .record_payment(RecordPayment {
            supplier_id,
            payment_date: date(2025, 3, 13),
            method: SettlementMethod::Cash,
            amount: dec!(100),
            observations: String::new(),
            allocations: vec![PaymentAllocation {
                purchase_id,
                applied_amount: dec!(100),
            }],
        })
        .unwrap_err();
    match err {
        DomainError::Validation(msg) if msg.contains("cancelled") => {}
        _ => panic!("Expected Validation error for paying a cancelled purchase"),
    }
    assert!(engine.store().payments.is_empty());
}

#[test]
fn purchase_order_cancellation_detaches_linked_sales() {
    let (mut engine, supplier_id, product_id) = setup();
    let customer_id = engine
        .register_counterparty(RegisterCounterparty {
            kind: CounterpartyKind::Customer,
            name: "Riverside Grocers".to_string(),
            contact: ContactInfo::default(),
            payment_term: PaymentTerm::Cash,
            credit_days: 0,
            category: None,
        })
        .unwrap();
    let sale_id = engine
        .create_sale(CreateSale {
            customer_id,
            sales_order: None,
            sale_date: date(2025, 3, 9),
            delivery_address: None,
            lines: vec![NewLine {
                product_id,
                quantity: dec!(2),
                unit_price: dec!(100),
            }],
            delivery_cost: Decimal::ZERO,
            discount: Decimal::ZERO,
        })
        .unwrap();

    let order_id = engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 10),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(2),
                unit_price: dec!(50),
            }],
            sales: vec![sale_id],
        })
        .unwrap();

    let sale = engine.store().sales.get(sale_id).unwrap();
    assert_eq!(sale.purchase_order(), Some(order_id));

    engine
        .transition_purchase_order(order_id, PurchaseOrderState::Cancelled)
        .unwrap();

    // Back-reference cleared; the sale itself survives untouched.
    let sale = engine.store().sales.get(sale_id).unwrap();
    assert_eq!(sale.purchase_order(), None);
    assert_eq!(sale.pending_balance(), dec!(200.00));
    let order = engine.store().purchase_orders.get(order_id).unwrap();
    assert!(order.linked_sales().is_empty());
}

#[test]
fn a_sale_cannot_serve_two_purchase_orders() {
    let (mut engine, supplier_id, product_id) = setup();
    let customer_id = engine
        .register_counterparty(RegisterCounterparty {
            kind: CounterpartyKind::Customer,
            name: "Hilltop Kitchen".to_string(),
            contact: ContactInfo::default(),
            payment_term: PaymentTerm::Cash,
            credit_days: 0,
            category: None,
        })
        .unwrap();
    let sale_id = engine
        .create_sale(CreateSale {
            customer_id,
            sales_order: None,
            sale_date: date(2025, 3, 9),
            delivery_address: None,
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(100),
            }],
            delivery_cost: Decimal::ZERO,
            discount: Decimal::ZERO,
        })
        .unwrap();

    engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 10),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(50),
            }],
            sales: vec![sale_id],
        })
        .unwrap();

    let err = engine
        .create_purchase_order(CreatePurchaseOrder {
            supplier_id,
            order_date: date(2025, 3, 11),
            notes: String::new(),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(50),
            }],
            sales: vec![sale_id],
        })
        .unwrap_err();
    match err {
        DomainError::Validation(msg) if msg.contains("another purchase order") => {}
        _ => panic!("Expected Validation error for double assignment"),
    }
    assert_eq!(engine.store().purchase_orders.len(), 1);
}

#[test]
fn purchase_side_credit_notes_settle_purchases() {
    let (mut engine, supplier_id, product_id) = setup();
    let purchase_id = purchase_of_500(&mut engine, supplier_id, product_id);

    engine
        .issue_credit_note(IssueCreditNote {
            kind: CreditNoteKind::Purchase,
            note_date: date(2025, 3, 18),
            amount: dec!(500),
            lines: vec![NewLine {
                product_id,
                quantity: dec!(10),
                unit_price: dec!(50),
            }],
            applications: vec![CreditNoteApplication {
                target: ApplicationTarget::Purchase(purchase_id),
                applied_amount: dec!(500),
            }],
            observations: "returned batch".to_string(),
        })
        .unwrap();

    let purchase = engine.store().purchases.get(purchase_id).unwrap();
    assert_eq!(purchase.pending_balance(), Decimal::ZERO);
    assert_eq!(purchase.payment_state(), PaymentState::Paid);
    let supplier = engine.store().counterparties.get(supplier_id).unwrap();
    assert_eq!(supplier.running_balance(), Decimal::ZERO);
}
