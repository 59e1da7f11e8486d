use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{CounterpartyId, DomainError, DomainResult, Entity};

/// Counterparty kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    Customer,
    Supplier,
}

/// How the counterparty settles: cash up front or on a running account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerm {
    Cash,
    RunningAccount,
}

/// Commercial category, used when choosing which derived price applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyCategory {
    Retail,
    Wholesale,
}

/// Contact information for a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Payment-term coherence: cash accounts carry no credit days, running
/// accounts must carry some.
pub fn validate_payment_terms(term: PaymentTerm, credit_days: u32) -> DomainResult<()> {
    match term {
        PaymentTerm::Cash if credit_days != 0 => Err(DomainError::validation(
            "cash payment term requires zero credit days",
        )),
        PaymentTerm::RunningAccount if credit_days == 0 => Err(DomainError::validation(
            "running-account payment term requires credit days greater than zero",
        )),
        _ => Ok(()),
    }
}

/// A customer or supplier account with a running balance.
///
/// The running balance grows as open documents accumulate against the account
/// (sales for customers, purchases for suppliers) and shrinks as collections,
/// payments and credit notes settle them. Only the automation layer moves it;
/// there is no public setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    id: CounterpartyId,
    kind: CounterpartyKind,
    name: String,
    contact: ContactInfo,
    payment_term: PaymentTerm,
    credit_days: u32,
    running_balance: Decimal,
    category: Option<CounterpartyCategory>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Counterparty {
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        id: CounterpartyId,
        kind: CounterpartyKind,
        name: impl Into<String>,
        contact: ContactInfo,
        payment_term: PaymentTerm,
        credit_days: u32,
        category: Option<CounterpartyCategory>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_payment_terms(payment_term, credit_days)?;

        Ok(Self {
            id,
            kind,
            name,
            contact,
            payment_term,
            credit_days,
            running_balance: Decimal::ZERO,
            category,
            active: true,
            created_at,
        })
    }

    pub fn id_typed(&self) -> CounterpartyId {
        self.id
    }

    pub fn kind(&self) -> CounterpartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn payment_term(&self) -> PaymentTerm {
        self.payment_term
    }

    pub fn credit_days(&self) -> u32 {
        self.credit_days
    }

    pub fn running_balance(&self) -> Decimal {
        self.running_balance
    }

    pub fn category(&self) -> Option<CounterpartyCategory> {
        self.category
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Invariant helper: whether this counterparty is allowed to transact.
    pub fn can_transact(&self) -> bool {
        self.active
    }

    /// Change payment terms, keeping the coherence invariant.
    pub fn update_terms(&mut self, term: PaymentTerm, credit_days: u32) -> DomainResult<()> {
        validate_payment_terms(term, credit_days)?;
        self.payment_term = term;
        self.credit_days = credit_days;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Increase the running balance (an open document was charged against the
    /// account). Driven by the automation layer.
    pub fn debit(&mut self, amount: Decimal) {
        self.running_balance += amount;
    }

    /// Decrease the running balance (funds were received or a document was
    /// settled or withdrawn). Driven by the automation layer.
    pub fn credit(&mut self, amount: Decimal) {
        self.running_balance -= amount;
    }
}

impl Entity for Counterparty {
    type Id = CounterpartyId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_customer() -> Counterparty {
        Counterparty::register(
            CounterpartyId::new(),
            CounterpartyKind::Customer,
            "Test Customer",
            ContactInfo::default(),
            PaymentTerm::RunningAccount,
            30,
            Some(CounterpartyCategory::Wholesale),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn register_rejects_empty_name() {
        let err = Counterparty::register(
            CounterpartyId::new(),
            CounterpartyKind::Customer,
            "   ",
            ContactInfo::default(),
            PaymentTerm::Cash,
            0,
            None,
            Utc::now(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn cash_terms_require_zero_credit_days() {
        let err = validate_payment_terms(PaymentTerm::Cash, 15).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("cash") => {}
            _ => panic!("Expected Validation error for cash with credit days"),
        }
        assert!(validate_payment_terms(PaymentTerm::Cash, 0).is_ok());
    }

    #[test]
    fn running_account_requires_positive_credit_days() {
        let err = validate_payment_terms(PaymentTerm::RunningAccount, 0).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("running-account") => {}
            _ => panic!("Expected Validation error for running account without credit days"),
        }
        assert!(validate_payment_terms(PaymentTerm::RunningAccount, 30).is_ok());
    }

    #[test]
    fn register_starts_with_zero_balance_and_active() {
        let customer = test_customer();
        assert_eq!(customer.running_balance(), Decimal::ZERO);
        assert!(customer.can_transact());
    }

    #[test]
    fn debit_and_credit_move_the_running_balance() {
        let mut customer = test_customer();
        customer.debit(dec!(300.00));
        assert_eq!(customer.running_balance(), dec!(300.00));
        customer.credit(dec!(120.50));
        assert_eq!(customer.running_balance(), dec!(179.50));
        customer.credit(dec!(200.00));
        assert_eq!(customer.running_balance(), dec!(-20.50));
    }

    #[test]
    fn update_terms_keeps_coherence() {
        let mut customer = test_customer();
        let err = customer.update_terms(PaymentTerm::Cash, 5).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
        // Failed update leaves terms untouched.
        assert_eq!(customer.payment_term(), PaymentTerm::RunningAccount);
        assert_eq!(customer.credit_days(), 30);

        customer.update_terms(PaymentTerm::Cash, 0).unwrap();
        assert_eq!(customer.payment_term(), PaymentTerm::Cash);
        assert_eq!(customer.credit_days(), 0);
    }

    #[test]
    fn deactivated_counterparty_cannot_transact() {
        let mut customer = test_customer();
        customer.deactivate();
        assert!(!customer.can_transact());
    }
}
