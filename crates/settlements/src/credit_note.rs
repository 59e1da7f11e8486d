use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerflow_core::{
    CreditNoteId, DomainError, DomainResult, Entity, ProductId, PurchaseId, SaleId,
};
use ledgerflow_money::{line_total, sum_applied, LineAmount};
use ledgerflow_purchasing::Purchase;
use ledgerflow_sales::Sale;

/// Which side of the ledger a credit note corrects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditNoteKind {
    Sale,
    Purchase,
}

impl core::fmt::Display for CreditNoteKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            CreditNoteKind::Sale => "sale",
            CreditNoteKind::Purchase => "purchase",
        };
        f.write_str(name)
    }
}

/// The one document an application settles: a sale or a purchase, never both,
/// never neither. The exclusivity lives in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationTarget {
    Sale(SaleId),
    Purchase(PurchaseId),
}

impl ApplicationTarget {
    pub fn matches(self, kind: CreditNoteKind) -> bool {
        matches!(
            (self, kind),
            (ApplicationTarget::Sale(_), CreditNoteKind::Sale)
                | (ApplicationTarget::Purchase(_), CreditNoteKind::Purchase)
        )
    }
}

impl ledgerflow_core::ValueObject for ApplicationTarget {}

/// One application of note credit against a target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteApplication {
    pub target: ApplicationTarget,
    pub applied_amount: Decimal,
}

/// Credit note detail line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount for CreditNoteLine {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

/// A credit note issued against sales or purchases.
///
/// Fully formed at creation: detail lines and applications are validated and
/// committed together with the header. Credit notes are retained indefinitely;
/// no removal path exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    id: CreditNoteId,
    kind: CreditNoteKind,
    note_date: NaiveDate,
    amount: Decimal,
    lines: Vec<CreditNoteLine>,
    subtotal: Decimal,
    total: Decimal,
    applications: Vec<CreditNoteApplication>,
    observations: String,
    created_at: DateTime<Utc>,
}

impl CreditNote {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: CreditNoteId,
        kind: CreditNoteKind,
        note_date: NaiveDate,
        amount: Decimal,
        lines: Vec<CreditNoteLine>,
        applications: Vec<CreditNoteApplication>,
        observations: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "credit note amount must be positive",
            ));
        }

        for line in &lines {
            if line.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "credit note line {} quantity must be positive",
                    line.line_no
                )));
            }
            if line.unit_price <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "credit note line {} unit_price must be positive",
                    line.line_no
                )));
            }
        }

        if applications.is_empty() {
            return Err(DomainError::validation(
                "a credit note requires at least one application",
            ));
        }
        for application in &applications {
            if application.applied_amount <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "credit note applied amounts must be positive",
                ));
            }
            if !application.target.matches(kind) {
                return Err(DomainError::validation(format!(
                    "a {kind}-side credit note cannot apply to the other side",
                )));
            }
        }
        if sum_applied(applications.iter().map(|a| a.applied_amount)) > amount {
            return Err(DomainError::validation(
                "the applied amounts exceed the credit note amount",
            ));
        }

        let subtotal = line_total(&lines);

        Ok(Self {
            id,
            kind,
            note_date,
            amount,
            subtotal,
            // No extra charges or discounts exist on a note.
            total: subtotal,
            lines,
            applications,
            observations: observations.into(),
            created_at,
        })
    }

    pub fn id_typed(&self) -> CreditNoteId {
        self.id
    }

    pub fn kind(&self) -> CreditNoteKind {
        self.kind
    }

    pub fn note_date(&self) -> NaiveDate {
        self.note_date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn lines(&self) -> &[CreditNoteLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn applications(&self) -> &[CreditNoteApplication] {
        &self.applications
    }

    pub fn observations(&self) -> &str {
        &self.observations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for CreditNote {
    type Id = CreditNoteId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Cross-document check before applying a note: every target must exist, be
/// open, and have enough pending balance to absorb its application.
pub fn validate_credit_note_targets<'a, FS, FP>(
    note: &CreditNote,
    lookup_sale: FS,
    lookup_purchase: FP,
) -> DomainResult<()>
where
    FS: Fn(SaleId) -> Option<&'a Sale>,
    FP: Fn(PurchaseId) -> Option<&'a Purchase>,
{
    // Applications against the same target are applied sequentially, so the
    // cap is checked on their running sum, not per row.
    let mut applied_so_far: std::collections::HashMap<ApplicationTarget, Decimal> =
        std::collections::HashMap::new();
    for application in note.applications() {
        let pending = match application.target {
            ApplicationTarget::Sale(sale_id) => {
                let sale = lookup_sale(sale_id).ok_or(DomainError::NotFound)?;
                if !sale.can_receive_applications() {
                    return Err(DomainError::validation(format!(
                        "sale {} is cancelled and cannot receive credit",
                        sale.id_typed()
                    )));
                }
                sale.pending_balance()
            }
            ApplicationTarget::Purchase(purchase_id) => {
                let purchase = lookup_purchase(purchase_id).ok_or(DomainError::NotFound)?;
                if !purchase.can_receive_applications() {
                    return Err(DomainError::validation(format!(
                        "purchase {} is cancelled and cannot receive credit",
                        purchase.id_typed()
                    )));
                }
                purchase.pending_balance()
            }
        };
        let applied = applied_so_far.entry(application.target).or_default();
        *applied += application.applied_amount;
        if *applied > pending {
            return Err(DomainError::validation(
                "a credit note application exceeds its target's pending balance",
            ));
        }
    }
    Ok(())
}
