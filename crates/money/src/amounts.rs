use rust_decimal::{Decimal, RoundingStrategy};

/// Quantize a monetary value to 2 decimal places, rounding half-up.
///
/// Every derivation in this library rounds through here so that totals,
/// subtotals and applied sums all agree on the same cent.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Anything that prices out as quantity × unit price.
///
/// Implemented by every detail-line type (order lines, sale lines, purchase
/// lines, credit-note lines) so subtotal derivation is shared.
pub trait LineAmount {
    fn quantity(&self) -> Decimal;
    fn unit_price(&self) -> Decimal;

    fn amount(&self) -> Decimal {
        self.quantity() * self.unit_price()
    }
}

/// Subtotal of a sequence of lines: Σ quantity × unit_price, rounded.
///
/// An empty sequence prices to `0.00`.
#[must_use]
pub fn line_total<'a, L, I>(lines: I) -> Decimal
where
    L: LineAmount + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let sum = lines.into_iter().map(LineAmount::amount).sum();
    round_money(sum)
}

/// Document total: `subtotal + extra_cost − discount`, rounded.
///
/// `extra_cost` is the delivery cost on the sell side and the extra charge on
/// the buy side; a document never carries both.
#[must_use]
pub fn document_total(subtotal: Decimal, extra_cost: Decimal, discount: Decimal) -> Decimal {
    round_money(subtotal + extra_cost - discount)
}

/// Total applied amount over a set of application rows, rounded.
#[must_use]
pub fn sum_applied<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_money(amounts.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct TestLine {
        quantity: Decimal,
        unit_price: Decimal,
    }

    impl LineAmount for TestLine {
        fn quantity(&self) -> Decimal {
            self.quantity
        }

        fn unit_price(&self) -> Decimal {
            self.unit_price
        }
    }

    fn line(quantity: Decimal, unit_price: Decimal) -> TestLine {
        TestLine {
            quantity,
            unit_price,
        }
    }

    #[test]
    fn line_total_of_empty_sequence_is_zero() {
        let lines: Vec<TestLine> = Vec::new();
        assert_eq!(line_total(&lines), dec!(0.00));
    }

    #[test]
    fn line_total_sums_quantity_times_price() {
        let lines = vec![line(dec!(2), dec!(100)), line(dec!(1), dec!(50))];
        assert_eq!(line_total(&lines), dec!(250.00));
    }

    #[test]
    fn line_total_rounds_half_up() {
        // 1.5 × 1.27 = 1.905 → 1.91 under half-up (1.90 under banker's).
        let lines = vec![line(dec!(1.5), dec!(1.27))];
        assert_eq!(line_total(&lines), dec!(1.91));
    }

    #[test]
    fn line_total_accepts_fractional_quantities() {
        // Kilogram-priced goods sell in fractional quantities.
        let lines = vec![line(dec!(2.5), dec!(1200.50))];
        assert_eq!(line_total(&lines), dec!(3001.25));
    }

    #[test]
    fn document_total_adds_extra_and_subtracts_discount() {
        assert_eq!(
            document_total(dec!(200), dec!(15.50), dec!(5.50)),
            dec!(210.00)
        );
    }

    #[test]
    fn document_total_with_zero_extras_is_subtotal() {
        assert_eq!(
            document_total(dec!(199.99), Decimal::ZERO, Decimal::ZERO),
            dec!(199.99)
        );
    }

    #[test]
    fn sum_applied_totals_application_rows() {
        let applied = [dec!(100.10), dec!(49.90), dec!(0.05)];
        assert_eq!(sum_applied(applied), dec!(150.05));
    }

    #[test]
    fn round_money_is_idempotent() {
        let value = dec!(10.005);
        let once = round_money(value);
        assert_eq!(once, dec!(10.01));
        assert_eq!(round_money(once), once);
    }
}
