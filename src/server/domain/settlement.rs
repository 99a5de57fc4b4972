//! Daily settlement aggregation.
//!
//! Closing timestamps are stored in UTC; the report is cut along calendar
//! days of the restaurant's fixed IANA timezone. Every UTC<->local
//! conversion the settlement feature needs goes through this module, so the
//! day-boundary rules are testable without a database. The controller only
//! runs SELECTs with the bounds computed here.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::server::domain::lifecycle::{order_total, PaymentMethod};
use crate::server::model::settlement::{
    DailySettlementReport, MethodBreakdown, SettledOrder, TopItem,
};

const TOP_ITEMS: usize = 10;

/// An order row already filtered to the requested day by the controller.
#[derive(Debug)]
pub(crate) struct ClosedOrderRow {
    pub id: i64,
    pub table_number: i32,
    pub closed_at: DateTime<Utc>,
    pub method: Option<String>,
}

/// One order line of a closed order, joined with its current menu price.
#[derive(Debug)]
pub(crate) struct SettledLineRow {
    pub order_id: i64,
    pub item_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// Local calendar date a UTC instant falls on.
pub(crate) fn local_date_of(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// HH:MM wall-clock rendering of a UTC instant.
pub(crate) fn local_hhmm(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%H:%M").to_string()
}

/// UTC half-open window `[start, end)` covering one local calendar day.
/// Filtering `closed_at` against this window is what keeps orders closed
/// near midnight on the correct local day.
pub(crate) fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date, tz);
    let end = local_midnight(date + Duration::days(1), tz);
    (start, end)
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // midnight swallowed by a DST gap, the day starts an hour later
        None => match tz.from_local_datetime(&(naive + Duration::hours(1))).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&naive),
        },
    }
}

/// Distinct local calendar dates carrying at least one closed order,
/// newest first. Computed from the UTC instants, never from their UTC date
/// component.
pub(crate) fn available_dates(closed_at: &[DateTime<Utc>], tz: Tz) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = closed_at.iter().map(|ts| local_date_of(*ts, tz)).collect();
    dates.into_iter().rev().collect()
}

/// Which day the report should show: the requested date if it actually has
/// settled orders, otherwise the most recent such date, otherwise today.
pub(crate) fn choose_report_date(
    requested: Option<NaiveDate>,
    available: &[NaiveDate],
    today: NaiveDate,
) -> NaiveDate {
    requested
        .filter(|d| available.contains(d))
        .or_else(|| available.first().copied())
        .unwrap_or(today)
}

/// Assemble the report for one day out of its closed orders and their lines.
pub(crate) fn build_report(
    date: NaiveDate,
    available_dates: Vec<NaiveDate>,
    mut orders: Vec<ClosedOrderRow>,
    lines: Vec<SettledLineRow>,
    tz: Tz,
) -> DailySettlementReport {
    let mut lines_by_order: HashMap<i64, Vec<(Decimal, i32)>> = HashMap::new();
    let mut top: HashMap<String, (i64, Decimal)> = HashMap::new();
    for line in lines {
        let subtotal = line.price * Decimal::from(line.quantity);
        lines_by_order
            .entry(line.order_id)
            .or_default()
            .push((line.price, line.quantity));
        let entry = top.entry(line.item_name).or_insert((0, Decimal::ZERO));
        entry.0 += i64::from(line.quantity);
        entry.1 += subtotal;
    }

    orders.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));

    let mut total = Decimal::ZERO;
    let mut by_method = MethodBreakdown::default();
    let mut settled = Vec::with_capacity(orders.len());
    for order in &orders {
        let order_lines = lines_by_order.remove(&order.id).unwrap_or_default();
        let order_total = order_total(&order_lines);
        let method = PaymentMethod::from_stored(order.method.as_deref());
        total += order_total;
        by_method.add(method, order_total);
        settled.push(SettledOrder {
            id: order.id,
            table_number: order.table_number,
            time: local_hhmm(order.closed_at, tz),
            method,
            total: order_total,
        });
    }

    let count = settled.len() as u32;
    let average = if count > 0 {
        total / Decimal::from(count)
    } else {
        Decimal::ZERO
    };

    let mut top_items: Vec<TopItem> = top
        .into_iter()
        .map(|(name, (quantity, revenue))| TopItem {
            name,
            quantity,
            revenue,
        })
        .collect();
    // stable order among equal revenues is all we promise for ties
    top_items.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_items.truncate(TOP_ITEMS);

    DailySettlementReport {
        date,
        available_dates,
        orders: settled,
        total,
        count,
        average,
        by_method,
        top_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOGOTA: Tz = chrono_tz::America::Bogota;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn utc_instant_before_local_midnight_belongs_to_previous_local_day() {
        // 2024-03-01T04:59:00Z is 23:59 of Feb 29 in Bogota (UTC-5)
        let ts = utc("2024-03-01T04:59:00Z");
        assert_eq!(local_date_of(ts, BOGOTA), date("2024-02-29"));
    }

    #[test]
    fn day_bounds_are_local_midnights_in_utc() {
        let (start, end) = local_day_bounds(date("2024-02-29"), BOGOTA);
        assert_eq!(start, utc("2024-02-29T05:00:00Z"));
        assert_eq!(end, utc("2024-03-01T05:00:00Z"));

        // the boundary order from the previous test falls inside the window
        let ts = utc("2024-03-01T04:59:00Z");
        assert!(ts >= start && ts < end);
        // and the next local day excludes it
        let (next_start, _) = local_day_bounds(date("2024-03-01"), BOGOTA);
        assert!(ts < next_start);
    }

    #[test]
    fn available_dates_are_distinct_local_dates_descending() {
        let stamps = vec![
            utc("2024-03-01T04:59:00Z"), // local 2024-02-29
            utc("2024-03-01T15:00:00Z"), // local 2024-03-01
            utc("2024-02-29T18:30:00Z"), // local 2024-02-29
            utc("2024-02-10T12:00:00Z"), // local 2024-02-10
        ];
        assert_eq!(
            available_dates(&stamps, BOGOTA),
            vec![date("2024-03-01"), date("2024-02-29"), date("2024-02-10")]
        );
    }

    #[test]
    fn report_date_falls_back_to_latest_then_today() {
        let available = vec![date("2024-03-01"), date("2024-02-29")];
        let today = date("2024-03-05");
        // requested and present
        assert_eq!(
            choose_report_date(Some(date("2024-02-29")), &available, today),
            date("2024-02-29")
        );
        // requested but without settled orders
        assert_eq!(
            choose_report_date(Some(date("2024-02-15")), &available, today),
            date("2024-03-01")
        );
        // nothing requested
        assert_eq!(choose_report_date(None, &available, today), date("2024-03-01"));
        // no history at all
        assert_eq!(choose_report_date(None, &[], today), today);
    }

    fn two_order_fixture() -> (Vec<ClosedOrderRow>, Vec<SettledLineRow>) {
        let orders = vec![
            ClosedOrderRow {
                id: 1,
                table_number: 4,
                closed_at: utc("2024-02-29T17:00:00Z"),
                method: Some("cash".to_string()),
            },
            ClosedOrderRow {
                id: 2,
                table_number: 7,
                closed_at: utc("2024-02-29T23:30:00Z"),
                method: Some("transfer".to_string()),
            },
        ];
        let lines = vec![
            SettledLineRow {
                order_id: 1,
                item_name: "bandeja".to_string(),
                price: dec(10000),
                quantity: 1,
            },
            SettledLineRow {
                order_id: 2,
                item_name: "bandeja".to_string(),
                price: dec(10000),
                quantity: 2,
            },
            SettledLineRow {
                order_id: 2,
                item_name: "jugo".to_string(),
                price: dec(5000),
                quantity: 1,
            },
        ];
        (orders, lines)
    }

    #[test]
    fn report_totals_count_average_and_method_buckets() {
        let (orders, lines) = two_order_fixture();
        let report = build_report(date("2024-02-29"), vec![date("2024-02-29")], orders, lines, BOGOTA);

        assert_eq!(report.total, dec(35000));
        assert_eq!(report.count, 2);
        assert_eq!(report.average, dec(17500));
        assert_eq!(report.by_method.cash, dec(10000));
        assert_eq!(report.by_method.transfer, dec(25000));
        assert_eq!(report.by_method.card, Decimal::ZERO);
        assert_eq!(report.by_method.other, Decimal::ZERO);

        // newest closing first, wall clock in Bogota
        assert_eq!(report.orders[0].id, 2);
        assert_eq!(report.orders[0].time, "18:30");
        assert_eq!(report.orders[1].time, "12:00");
    }

    #[test]
    fn unknown_and_missing_methods_fold_into_other_bucket() {
        let orders = vec![
            ClosedOrderRow {
                id: 1,
                table_number: 1,
                closed_at: utc("2024-02-29T15:00:00Z"),
                method: Some("cheque".to_string()),
            },
            ClosedOrderRow {
                id: 2,
                table_number: 2,
                closed_at: utc("2024-02-29T16:00:00Z"),
                method: None,
            },
        ];
        let lines = vec![
            SettledLineRow {
                order_id: 1,
                item_name: "cafe".to_string(),
                price: dec(3000),
                quantity: 1,
            },
            SettledLineRow {
                order_id: 2,
                item_name: "cafe".to_string(),
                price: dec(3000),
                quantity: 2,
            },
        ];
        let report = build_report(date("2024-02-29"), vec![], orders, lines, BOGOTA);
        assert_eq!(report.by_method.other, dec(9000));
        assert!(report
            .orders
            .iter()
            .all(|o| o.method == PaymentMethod::Other));
    }

    #[test]
    fn empty_day_reports_zero_average() {
        let report = build_report(date("2024-02-29"), vec![], vec![], vec![], BOGOTA);
        assert_eq!(report.count, 0);
        assert_eq!(report.total, Decimal::ZERO);
        assert_eq!(report.average, Decimal::ZERO);
        assert!(report.top_items.is_empty());
    }

    #[test]
    fn top_items_rank_by_revenue_and_cap_at_ten() {
        let orders = vec![ClosedOrderRow {
            id: 1,
            table_number: 1,
            closed_at: utc("2024-02-29T15:00:00Z"),
            method: Some("cash".to_string()),
        }];
        let lines: Vec<SettledLineRow> = (0..12)
            .map(|i| SettledLineRow {
                order_id: 1,
                item_name: format!("item-{i}"),
                price: dec(1000 + i),
                quantity: 1,
            })
            .collect();
        let report = build_report(date("2024-02-29"), vec![], orders, lines, BOGOTA);
        assert_eq!(report.top_items.len(), 10);
        assert_eq!(report.top_items[0].name, "item-11");
        assert!(report
            .top_items
            .windows(2)
            .all(|w| w[0].revenue >= w[1].revenue));
    }

    #[test]
    fn top_items_aggregate_quantity_across_orders() {
        let (orders, lines) = two_order_fixture();
        let report = build_report(date("2024-02-29"), vec![], orders, lines, BOGOTA);
        assert_eq!(
            report.top_items[0],
            TopItem {
                name: "bandeja".to_string(),
                quantity: 3,
                revenue: dec(30000),
            }
        );
    }
}
