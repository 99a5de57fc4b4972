//! Order lifecycle decisions: item merging, totals and payment settlement.
//!
//! Everything here is pure. The order controller runs these decisions inside
//! a single database transaction so that a rejected decision mutates nothing.

use derive_more::{Display, Error};
use rust_decimal::Decimal;
use serde::Serialize;

/// Payment methods accepted at checkout, plus the `Other` bucket that
/// settlement reporting folds unrecognized stored values into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PaymentMethod {
    Cash,
    Transfer,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }

    /// Reporting view of a stored method column. Unset or unrecognized
    /// values land in `Other` rather than erroring out of a report.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("cash") => PaymentMethod::Cash,
            Some("transfer") => PaymentMethod::Transfer,
            Some("card") => PaymentMethod::Card,
            _ => PaymentMethod::Other,
        }
    }
}

/// Per-line ceiling on a merged quantity. Keeps repeated submissions for the
/// same item far away from the column's integer bound.
pub(crate) const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum SubmissionError {
    #[display("no items submitted")]
    EmptySubmission,
    #[display("item quantity is out of range")]
    QuantityOutOfRange,
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum PaymentError {
    #[display("cash received is less than the order total")]
    Insufficient,
    #[display("unknown payment method")]
    InvalidMethod,
}

/// A settled payment, ready to be written onto the order row.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Payment {
    pub method: PaymentMethod,
    pub received: Decimal,
    pub change: Decimal,
}

/// Normalize a submitted item list: drop non-positive quantities and fold
/// duplicate menu items by summing their quantities, keeping first-seen
/// order. An empty result is a validation failure, not an empty order, and
/// any merged quantity above `MAX_LINE_QUANTITY` is rejected.
pub(crate) fn merge_items(items: &[(i32, i32)]) -> Result<Vec<(i32, i32)>, SubmissionError> {
    let mut merged: Vec<(i32, i32)> = Vec::with_capacity(items.len());
    for &(menu_item_id, quantity) in items {
        if quantity <= 0 {
            continue;
        }
        match merged.iter_mut().find(|(id, _)| *id == menu_item_id) {
            Some((_, q)) => {
                *q = q
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or(SubmissionError::QuantityOutOfRange)?;
            }
            None => {
                if quantity > MAX_LINE_QUANTITY {
                    return Err(SubmissionError::QuantityOutOfRange);
                }
                merged.push((menu_item_id, quantity));
            }
        }
    }
    if merged.is_empty() {
        return Err(SubmissionError::EmptySubmission);
    }
    Ok(merged)
}

/// What a close-without-payment request should do to the order row.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CloseAction {
    /// already closed; closing again is a no-op
    NoOp,
    /// close the order and free its table
    CloseAndFree,
}

pub(crate) fn plan_close(already_closed: bool) -> CloseAction {
    if already_closed {
        CloseAction::NoOp
    } else {
        CloseAction::CloseAndFree
    }
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum CheckoutError {
    /// re-charging a settled order would silently overwrite its payment
    #[display("order is already closed")]
    AlreadyClosed,
    #[display("{_0}")]
    Payment(PaymentError),
}

/// Everything a successful checkout writes onto the order: the computed
/// total and the settled payment. Closing the order and freeing its table
/// come with it; an `Err` means nothing may be written at all.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CheckoutPlan {
    pub total: Decimal,
    pub payment: Payment,
}

pub(crate) fn plan_checkout(
    already_closed: bool,
    method: &str,
    received_raw: &str,
    lines: &[(Decimal, i32)],
) -> Result<CheckoutPlan, CheckoutError> {
    if already_closed {
        return Err(CheckoutError::AlreadyClosed);
    }
    let total = order_total(lines);
    let payment = settle_payment(method, received_raw, total).map_err(CheckoutError::Payment)?;
    Ok(CheckoutPlan { total, payment })
}

/// Order total at the current menu prices (price-at-settlement model: a
/// price edit moves the total of any order that is still open).
pub(crate) fn order_total(lines: &[(Decimal, i32)]) -> Decimal {
    lines
        .iter()
        .map(|(price, quantity)| price * Decimal::from(*quantity))
        .sum()
}

/// Decide how a checkout request settles against `total`.
///
/// - `cash`: parse the raw received amount (unparseable counts as zero);
///   change is received minus total, and a negative change rejects the
///   checkout outright.
/// - `transfer` / `card`: no partial or over payment is modeled, received
///   is forced to the total and change to zero.
/// - anything else is rejected.
pub(crate) fn settle_payment(
    method: &str,
    received_raw: &str,
    total: Decimal,
) -> Result<Payment, PaymentError> {
    match method.trim().to_lowercase().as_str() {
        "cash" => {
            let received = received_raw.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO);
            let change = received - total;
            if change < Decimal::ZERO {
                return Err(PaymentError::Insufficient);
            }
            Ok(Payment {
                method: PaymentMethod::Cash,
                received,
                change,
            })
        }
        "transfer" => Ok(Payment {
            method: PaymentMethod::Transfer,
            received: total,
            change: Decimal::ZERO,
        }),
        "card" => Ok(Payment {
            method: PaymentMethod::Card,
            received: total,
            change: Decimal::ZERO,
        }),
        _ => Err(PaymentError::InvalidMethod),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn merge_sums_repeated_items_and_keeps_order() {
        let merged = merge_items(&[(3, 2), (7, 1), (3, 4)]).unwrap();
        assert_eq!(merged, vec![(3, 6), (7, 1)]);
    }

    #[test]
    fn merge_drops_non_positive_quantities() {
        let merged = merge_items(&[(1, 0), (2, -3), (5, 2)]).unwrap();
        assert_eq!(merged, vec![(5, 2)]);
    }

    #[test]
    fn merge_rejects_quantities_over_the_cap() {
        assert_eq!(
            merge_items(&[(1, MAX_LINE_QUANTITY + 1)]),
            Err(SubmissionError::QuantityOutOfRange)
        );
        // the sum of duplicates is capped too, even when it would overflow
        assert_eq!(
            merge_items(&[(1, MAX_LINE_QUANTITY), (1, 1)]),
            Err(SubmissionError::QuantityOutOfRange)
        );
        assert_eq!(
            merge_items(&[(1, i32::MAX), (1, i32::MAX)]),
            Err(SubmissionError::QuantityOutOfRange)
        );
        let merged = merge_items(&[(1, MAX_LINE_QUANTITY)]).unwrap();
        assert_eq!(merged, vec![(1, MAX_LINE_QUANTITY)]);
    }

    #[test]
    fn merge_rejects_empty_submission() {
        assert_eq!(merge_items(&[]), Err(SubmissionError::EmptySubmission));
        assert_eq!(
            merge_items(&[(1, 0), (2, 0)]),
            Err(SubmissionError::EmptySubmission)
        );
    }

    #[test]
    fn total_is_price_times_quantity() {
        let total = order_total(&[(dec(12000), 2), ("3500.50".parse().unwrap(), 3)]);
        assert_eq!(total, "34501.50".parse().unwrap());
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn cash_below_total_is_rejected() {
        let res = settle_payment("cash", "15000", dec(20000));
        assert_eq!(res, Err(PaymentError::Insufficient));
    }

    #[test]
    fn cash_exact_total_settles_with_zero_change() {
        let payment = settle_payment("cash", "20000", dec(20000)).unwrap();
        assert_eq!(payment.method, PaymentMethod::Cash);
        assert_eq!(payment.received, dec(20000));
        assert_eq!(payment.change, Decimal::ZERO);
    }

    #[test]
    fn cash_above_total_returns_change() {
        let payment = settle_payment("cash", "50000", dec(34500)).unwrap();
        assert_eq!(payment.change, dec(15500));
    }

    #[test]
    fn unparseable_cash_amount_counts_as_zero() {
        // zero received can never cover a positive total
        let res = settle_payment("cash", "a lot", dec(100));
        assert_eq!(res, Err(PaymentError::Insufficient));
        // but it does cover an empty order
        let payment = settle_payment("cash", "", Decimal::ZERO).unwrap();
        assert_eq!(payment.received, Decimal::ZERO);
    }

    #[test]
    fn transfer_and_card_force_received_to_total() {
        for method in ["transfer", "card"] {
            let payment = settle_payment(method, "99999", dec(20000)).unwrap();
            assert_eq!(payment.received, dec(20000));
            assert_eq!(payment.change, Decimal::ZERO);
        }
    }

    #[test]
    fn method_matching_is_case_insensitive_on_trimmed_input() {
        let payment = settle_payment(" Transfer ", "", dec(100)).unwrap();
        assert_eq!(payment.method, PaymentMethod::Transfer);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert_eq!(
            settle_payment("crypto", "20000", dec(100)),
            Err(PaymentError::InvalidMethod)
        );
        // "other" is a reporting bucket, not an accepted checkout method
        assert_eq!(
            settle_payment("other", "20000", dec(100)),
            Err(PaymentError::InvalidMethod)
        );
    }

    #[test]
    fn stored_methods_fold_into_fixed_buckets() {
        assert_eq!(PaymentMethod::from_stored(Some("CASH ")), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::from_stored(Some("check")), PaymentMethod::Other);
        assert_eq!(PaymentMethod::from_stored(None), PaymentMethod::Other);
    }

    #[test]
    fn close_is_idempotent_and_frees_the_table_once() {
        assert_eq!(plan_close(false), CloseAction::CloseAndFree);
        assert_eq!(plan_close(true), CloseAction::NoOp);
    }

    #[test]
    fn checkout_of_a_closed_order_is_rejected() {
        let res = plan_checkout(true, "cash", "99999", &[(dec(100), 1)]);
        assert_eq!(res, Err(CheckoutError::AlreadyClosed));
    }

    #[test]
    fn rejected_checkout_yields_no_plan() {
        let lines = [(dec(12000), 1), (dec(4000), 2)];
        assert_eq!(
            plan_checkout(false, "cash", "15000", &lines),
            Err(CheckoutError::Payment(PaymentError::Insufficient))
        );
        assert_eq!(
            plan_checkout(false, "crypto", "", &lines),
            Err(CheckoutError::Payment(PaymentError::InvalidMethod))
        );
    }

    #[test]
    fn accepted_checkout_carries_total_and_payment() {
        let plan = plan_checkout(false, "cash", "25000", &[(dec(12000), 1), (dec(4000), 2)]).unwrap();
        assert_eq!(plan.total, dec(20000));
        assert_eq!(plan.payment.received, dec(25000));
        assert_eq!(plan.payment.change, dec(5000));
    }

    /// Single-table model that applies the planned transitions the same way
    /// the order controller does, for checking the state machine end to end
    /// without a database.
    struct TableModel {
        occupied: bool,
        // lines of the open order, if one exists
        open_order: Option<Vec<(i32, i32)>>,
    }

    impl TableModel {
        const PRICE: i64 = 1000;

        fn new() -> Self {
            Self {
                occupied: false,
                open_order: None,
            }
        }

        fn submit(&mut self, items: &[(i32, i32)]) -> Result<(), SubmissionError> {
            let merged = merge_items(items)?;
            let lines = self.open_order.get_or_insert_with(Vec::new);
            for (item_id, quantity) in merged {
                match lines.iter_mut().find(|(id, _)| *id == item_id) {
                    Some((_, q)) => *q += quantity,
                    None => lines.push((item_id, quantity)),
                }
            }
            self.occupied = true;
            Ok(())
        }

        fn checkout(&mut self, method: &str, received: &str) -> Result<CheckoutPlan, CheckoutError> {
            let lines = self
                .open_order
                .iter()
                .flatten()
                .map(|&(_, q)| (dec(Self::PRICE), q))
                .collect::<Vec<_>>();
            let plan = plan_checkout(self.open_order.is_none(), method, received, &lines)?;
            self.open_order = None;
            self.occupied = false;
            Ok(plan)
        }
    }

    #[test]
    fn table_is_occupied_exactly_while_an_order_is_open() {
        let mut table = TableModel::new();
        assert!(!table.occupied);

        table.submit(&[(1, 2)]).unwrap();
        table.submit(&[(1, 1), (2, 1)]).unwrap();
        assert!(table.occupied);
        // one line per item, resubmission incremented instead of duplicating
        assert_eq!(table.open_order.as_deref(), Some(&[(1, 3), (2, 1)][..]));

        // a rejected checkout leaves the order open and the table occupied
        let res = table.checkout("cash", "100");
        assert_eq!(res, Err(CheckoutError::Payment(PaymentError::Insufficient)));
        assert!(table.occupied);
        assert!(table.open_order.is_some());

        // settling closes the order and frees the table in the same step
        let plan = table.checkout("cash", "4000").unwrap();
        assert_eq!(plan.total, dec(4000));
        assert_eq!(plan.payment.change, Decimal::ZERO);
        assert!(!table.occupied);
        assert!(table.open_order.is_none());

        // nothing left to charge
        assert_eq!(table.checkout("cash", "4000"), Err(CheckoutError::AlreadyClosed));
    }
}
