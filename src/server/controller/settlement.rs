//! Daily cash-register report. The controller only selects rows; all of the
//! day-boundary and aggregation rules live in `domain::settlement`.

use std::time::Duration;

use actix_web::rt::time;
use actix_web::{get, web, Responder};
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;

use crate::server::controller::auth::AuthContext;
use crate::server::controller::{db_err, error::CustomError, DB_TIMEOUT_SECONDS};
use crate::server::domain::settlement::{
    self, ClosedOrderRow, SettledLineRow,
};
use crate::server::model::settlement::SettlementQuery;
use crate::server::state::AppState;
use crate::server::util::time as clock;

#[get("/v1/settlement/dates")]
/// local calendar dates with settled orders, newest first (date picker)
async fn get_settlement_dates(
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let stamps = closing_instants(&conn).await?;
    Ok(web::Json(settlement::available_dates(&stamps, data.timezone())))
}

/// every closing instant on record; local-day math happens in the domain
async fn closing_instants(conn: &tokio_postgres::Client) -> Result<Vec<DateTime<Utc>>, CustomError> {
    let rows = conn
        .query(
            "SELECT closed_at FROM orders WHERE status = 'closed' AND closed_at IS NOT NULL",
            &[],
        )
        .await
        .map_err(db_err("closing_instants"))?;
    Ok(rows
        .into_iter()
        .map(|r| r.get::<_, DateTime<Utc>>("closed_at"))
        .collect())
}

#[get("/v1/settlement")]
async fn get_settlement(
    query: web::Query<SettlementQuery>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let tz = data.timezone();

    let sleep = time::sleep(Duration::from_secs(DB_TIMEOUT_SECONDS));
    tokio::pin!(sleep);
    let stamps = tokio::select! {
        result = closing_instants(&conn) => result?,
        _ = &mut sleep => {
            warn!("timeout enumerating settlement dates");
            return Err(CustomError::Timeout);
        }
    };
    let dates = settlement::available_dates(&stamps, tz);

    let requested = query
        .date
        .as_deref()
        .and_then(|s| s.trim().parse::<NaiveDate>().ok());
    let today = settlement::local_date_of(clock::helper::get_utc_now(), tz);
    let day = settlement::choose_report_date(requested, &dates, today);

    let (start, end) = settlement::local_day_bounds(day, tz);
    let order_rows = conn
        .query(
            r#"
            SELECT o.id, t.number AS table_number, o.closed_at, o.payment_method
            FROM orders o
            JOIN dining_table t ON t.id = o.table_id
            WHERE o.status = 'closed'
              AND o.closed_at >= $1 AND o.closed_at < $2
            ORDER BY o.closed_at DESC
            "#,
            &[&start, &end],
        )
        .await
        .map_err(db_err("get_settlement orders"))?;
    let orders = order_rows
        .into_iter()
        .map(|r| ClosedOrderRow {
            id: r.get("id"),
            table_number: r.get("table_number"),
            closed_at: r.get("closed_at"),
            method: r.get("payment_method"),
        })
        .collect::<Vec<_>>();

    let ids = orders.iter().map(|o| o.id).collect::<Vec<i64>>();
    let lines = if ids.is_empty() {
        vec![]
    } else {
        conn.query(
            r#"
            SELECT ol.order_id, mi.name, mi.price, ol.quantity
            FROM order_line ol
            JOIN menu_item mi ON mi.id = ol.menu_item_id
            WHERE ol.order_id = ANY($1)
            "#,
            &[&ids],
        )
        .await
        .map_err(db_err("get_settlement lines"))?
        .into_iter()
        .map(|r| SettledLineRow {
            order_id: r.get("order_id"),
            item_name: r.get("name"),
            price: r.get("price"),
            quantity: r.get("quantity"),
        })
        .collect()
    };

    Ok(web::Json(settlement::build_report(day, dates, orders, lines, tz)))
}
