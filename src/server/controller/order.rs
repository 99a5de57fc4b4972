//! Order lifecycle endpoints: open/append, live tracking, invoice, close
//! and checkout. Every mutation runs inside one transaction so the table
//! status and the open-order set can never drift apart.

use std::collections::HashMap;

use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::server::controller::auth::AuthContext;
use crate::server::controller::{db_err, error::CustomError};
use crate::server::domain::lifecycle::{self, CloseAction, PaymentMethod, SubmissionError};
use crate::server::model::order::{
    CheckoutRequest, CheckoutResponse, GetOpenOrdersResponse, OpenOrderView, OrderInvoice,
    OrderLineView, PaymentView, PostOrderRequest, PostOrderResponse,
};
use crate::server::state::AppState;
use crate::server::util::time;

#[post("/v1/table/{id}/order")]
/// open the table's order if none is open, then add the submitted items;
/// resubmitting an item increments its line instead of duplicating it
async fn post_table_order(
    id: web::Path<i16>,
    body: web::Json<PostOrderRequest>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_waiter()?;
    let submitted = body
        .items
        .iter()
        .map(|i| (i.menu_item_id, i.quantity))
        .collect::<Vec<_>>();
    let items = lifecycle::merge_items(&submitted)?;

    let Some(mut conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let table_id = id.into_inner();
    let txn = conn
        .transaction()
        .await
        .map_err(db_err("post_table_order begin"))?;

    txn.query_opt("SELECT id FROM dining_table WHERE id = $1 FOR UPDATE", &[&table_id])
        .await
        .map_err(db_err("post_table_order table lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;

    // every ordered item must still be on the active menu
    let item_ids = items.iter().map(|(id, _)| *id).collect::<Vec<i32>>();
    let known: i64 = txn
        .query_one(
            "SELECT count(*) FROM menu_item WHERE id = ANY($1) AND active",
            &[&item_ids],
        )
        .await
        .map_err(db_err("post_table_order menu check"))?
        .get(0);
    if known != item_ids.len() as i64 {
        return Err(CustomError::ResourceNotFound);
    }

    // find-or-create the table's open order; the partial unique index on
    // (table_id) WHERE status = 'open' makes this race-free
    txn.execute(
        r#"
        INSERT INTO orders(table_id, waiter_id, status, opened_at)
        VALUES ($1, $2, 'open', $3)
        ON CONFLICT (table_id) WHERE status = 'open' DO NOTHING
        "#,
        &[&table_id, &ctx.user_id, &time::helper::get_utc_now()],
    )
    .await
    .map_err(db_err("post_table_order order upsert"))?;
    let order_id: i64 = txn
        .query_one(
            "SELECT id FROM orders WHERE table_id = $1 AND status = 'open'",
            &[&table_id],
        )
        .await
        .map_err(db_err("post_table_order order lookup"))?
        .get("id");

    for (menu_item_id, quantity) in &items {
        // the WHERE clause skips the update when the accumulated line would
        // exceed the cap; zero affected rows then rejects the submission
        let affected = txn
            .execute(
                r#"
                INSERT INTO order_line(order_id, menu_item_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (order_id, menu_item_id)
                DO UPDATE SET quantity = order_line.quantity + EXCLUDED.quantity
                WHERE order_line.quantity + EXCLUDED.quantity <= $4
                "#,
                &[&order_id, menu_item_id, quantity, &lifecycle::MAX_LINE_QUANTITY],
            )
            .await
            .map_err(db_err("post_table_order line upsert"))?;
        if affected == 0 {
            return Err(SubmissionError::QuantityOutOfRange.into());
        }
    }

    txn.execute(
        "UPDATE dining_table SET status = 'occupied' WHERE id = $1",
        &[&table_id],
    )
    .await
    .map_err(db_err("post_table_order table flip"))?;
    txn.commit()
        .await
        .map_err(db_err("post_table_order commit"))?;

    Ok(web::Json(PostOrderResponse { order_id }))
}

#[get("/v1/orders/open")]
/// live tracking view of every open order with its lines and running total
async fn get_open_orders(
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let order_rows = conn
        .query(
            r#"
            SELECT o.id, t.number AS table_number, u.username AS waiter, o.opened_at
            FROM orders o
            JOIN dining_table t ON t.id = o.table_id
            JOIN app_user u ON u.id = o.waiter_id
            WHERE o.status = 'open'
            ORDER BY o.opened_at DESC
            "#,
            &[],
        )
        .await
        .map_err(db_err("get_open_orders"))?;

    let ids = order_rows
        .iter()
        .map(|r| r.get::<_, i64>("id"))
        .collect::<Vec<_>>();
    let mut lines_by_order = fetch_lines(&conn, &ids).await?;

    let orders = order_rows
        .into_iter()
        .map(|r| {
            let id: i64 = r.get("id");
            let opened_at: DateTime<Utc> = r.get("opened_at");
            let lines = lines_by_order.remove(&id).unwrap_or_default();
            let total = line_total(&lines);
            OpenOrderView {
                id,
                table_number: r.get("table_number"),
                waiter: r.get("waiter"),
                opened_at: time::rfc3339_utc(opened_at),
                lines,
                total,
            }
        })
        .collect::<Vec<_>>();

    Ok(web::Json(GetOpenOrdersResponse { orders }))
}

#[get("/v1/order/{id}")]
/// printable invoice view of one order
async fn get_order(
    id: web::Path<i64>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let order_id = id.into_inner();
    let row = conn
        .query_opt(
            r#"
            SELECT o.id, t.number AS table_number, o.status, o.opened_at,
                   o.payment_method, o.received, o.change, o.closed_at
            FROM orders o
            JOIN dining_table t ON t.id = o.table_id
            WHERE o.id = $1
            "#,
            &[&order_id],
        )
        .await
        .map_err(db_err("get_order"))?
        .ok_or(CustomError::ResourceNotFound)?;

    let mut lines_by_order = fetch_lines(&conn, &[order_id]).await?;
    let lines = lines_by_order.remove(&order_id).unwrap_or_default();
    let total = line_total(&lines);

    let status: String = row.get("status");
    let opened_at: DateTime<Utc> = row.get("opened_at");
    let payment = match status.as_str() {
        "closed" => {
            let closed_at: Option<DateTime<Utc>> = row.get("closed_at");
            Some(PaymentView {
                method: PaymentMethod::from_stored(row.get::<_, Option<String>>("payment_method").as_deref()),
                received: row.get("received"),
                change: row.get("change"),
                closed_at: closed_at.map(time::rfc3339_utc),
            })
        }
        _ => None,
    };

    Ok(web::Json(OrderInvoice {
        id: order_id,
        table_number: row.get("table_number"),
        status,
        opened_at: time::rfc3339_utc(opened_at),
        lines,
        total,
        payment,
    }))
}

#[post("/v1/order/{id}/close")]
/// close without recording payment; idempotent, frees the table
async fn close_order(
    id: web::Path<i64>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(mut conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let order_id = id.into_inner();
    let txn = conn.transaction().await.map_err(db_err("close_order begin"))?;

    let row = txn
        .query_opt(
            "SELECT table_id, status FROM orders WHERE id = $1 FOR UPDATE",
            &[&order_id],
        )
        .await
        .map_err(db_err("close_order lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;
    let status: String = row.get("status");
    match lifecycle::plan_close(status == "closed") {
        CloseAction::NoOp => return Ok(HttpResponse::Ok()),
        CloseAction::CloseAndFree => {}
    }
    let table_id: i16 = row.get("table_id");

    txn.execute("UPDATE orders SET status = 'closed' WHERE id = $1", &[&order_id])
        .await
        .map_err(db_err("close_order update"))?;
    txn.execute(
        "UPDATE dining_table SET status = 'free' WHERE id = $1",
        &[&table_id],
    )
    .await
    .map_err(db_err("close_order table flip"))?;
    txn.commit().await.map_err(db_err("close_order commit"))?;

    Ok(HttpResponse::Ok())
}

#[post("/v1/order/{id}/checkout")]
/// settle and close an order; a rejected payment leaves everything open
async fn checkout_order(
    id: web::Path<i64>,
    body: web::Json<CheckoutRequest>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(mut conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let order_id = id.into_inner();
    let txn = conn.transaction().await.map_err(db_err("checkout begin"))?;

    let row = txn
        .query_opt(
            "SELECT table_id, status FROM orders WHERE id = $1 FOR UPDATE",
            &[&order_id],
        )
        .await
        .map_err(db_err("checkout lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;
    let status: String = row.get("status");
    let table_id: i16 = row.get("table_id");

    let line_rows = txn
        .query(
            r#"
            SELECT mi.price, ol.quantity
            FROM order_line ol
            JOIN menu_item mi ON mi.id = ol.menu_item_id
            WHERE ol.order_id = $1
            "#,
            &[&order_id],
        )
        .await
        .map_err(db_err("checkout lines"))?;
    let lines = line_rows
        .into_iter()
        .map(|r| (r.get::<_, Decimal>("price"), r.get::<_, i32>("quantity")))
        .collect::<Vec<_>>();

    // a rejected plan returns before any UPDATE runs, so dropping the
    // transaction rolls back with the order open and the table occupied
    let plan = lifecycle::plan_checkout(
        status == "closed",
        &body.method,
        body.received.as_deref().unwrap_or(""),
        &lines,
    )?;

    let method = plan.payment.method.as_str();
    txn.execute(
        r#"
        UPDATE orders
        SET status = 'closed', payment_method = $2, received = $3, change = $4, closed_at = $5
        WHERE id = $1
        "#,
        &[
            &order_id,
            &method,
            &plan.payment.received,
            &plan.payment.change,
            &time::helper::get_utc_now(),
        ],
    )
    .await
    .map_err(db_err("checkout update"))?;
    txn.execute(
        "UPDATE dining_table SET status = 'free' WHERE id = $1",
        &[&table_id],
    )
    .await
    .map_err(db_err("checkout table flip"))?;
    txn.commit().await.map_err(db_err("checkout commit"))?;

    Ok(web::Json(CheckoutResponse {
        order_id,
        method: plan.payment.method,
        total: plan.total,
        received: plan.payment.received,
        change: plan.payment.change,
    }))
}

/// fetch the lines of the given orders, grouped by order id
async fn fetch_lines(
    conn: &tokio_postgres::Client,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderLineView>>, CustomError> {
    let mut lines_by_order: HashMap<i64, Vec<OrderLineView>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(lines_by_order);
    }
    let ids = order_ids.to_vec();
    let rows = conn
        .query(
            r#"
            SELECT ol.order_id, mi.name, mi.price, ol.quantity
            FROM order_line ol
            JOIN menu_item mi ON mi.id = ol.menu_item_id
            WHERE ol.order_id = ANY($1)
            ORDER BY mi.name ASC
            "#,
            &[&ids],
        )
        .await
        .map_err(db_err("fetch_lines"))?;
    for r in rows {
        let price: Decimal = r.get("price");
        let quantity: i32 = r.get("quantity");
        lines_by_order
            .entry(r.get("order_id"))
            .or_default()
            .push(OrderLineView {
                name: r.get("name"),
                quantity,
                price,
                subtotal: price * Decimal::from(quantity),
            });
    }
    Ok(lines_by_order)
}

fn line_total(lines: &[OrderLineView]) -> Decimal {
    lifecycle::order_total(
        &lines
            .iter()
            .map(|l| (l.price, l.quantity))
            .collect::<Vec<_>>(),
    )
}
