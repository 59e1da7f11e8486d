use chrono::{Days, NaiveDate};

/// Due date of a document: document date plus the counterparty's credit days.
///
/// Cash-term counterparties have zero credit days, so their documents fall due
/// on the document date itself.
#[must_use]
pub fn due_date(doc_date: NaiveDate, credit_days: u32) -> NaiveDate {
    doc_date
        .checked_add_days(Days::new(u64::from(credit_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Days past due as of `today`. Negative while the document is not yet due.
#[must_use]
pub fn days_overdue(due: NaiveDate, today: NaiveDate) -> i64 {
    (today - due).num_days()
}
