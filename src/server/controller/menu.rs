//! Menu administration. Deleting an item that appears on any order line is
//! downgraded to deactivation so settled history keeps its prices.

use actix_web::{delete, get, post, put, web, Responder};
use rust_decimal::Decimal;

use crate::server::controller::auth::AuthContext;
use crate::server::controller::{db_err, error::CustomError};
use crate::server::model::menu::{
    DeleteOutcome, GetMenuResponse, MenuItemView, PostMenuItemRequest, PostMenuItemResponse,
    PutMenuItemRequest,
};
use crate::server::state::AppState;

fn validated_item(name: &str, price: &str) -> Result<(String, Decimal), CustomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CustomError::Validation("name is required".to_string()));
    }
    let price = price
        .trim()
        .parse::<Decimal>()
        .ok()
        .filter(|p| *p >= Decimal::ZERO)
        .ok_or_else(|| CustomError::Validation("invalid price".to_string()))?;
    Ok((name.to_string(), price))
}

#[get("/v1/menu")]
/// active menu, what waitstaff can order from
async fn get_menu(
    _ctx: AuthContext, // both roles read the menu; mutation is admin-only
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let rows = conn
        .query(
            "SELECT id, name, price, active FROM menu_item WHERE active ORDER BY name ASC",
            &[],
        )
        .await
        .map_err(db_err("get_menu"))?;
    Ok(web::Json(GetMenuResponse {
        items: rows.into_iter().map(item_view).collect(),
    }))
}

#[get("/v1/menu/all")]
/// admin list, inactive items included
async fn get_menu_all(
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let rows = conn
        .query(
            "SELECT id, name, price, active FROM menu_item ORDER BY active DESC, name ASC",
            &[],
        )
        .await
        .map_err(db_err("get_menu_all"))?;
    Ok(web::Json(GetMenuResponse {
        items: rows.into_iter().map(item_view).collect(),
    }))
}

fn item_view(r: tokio_postgres::Row) -> MenuItemView {
    MenuItemView {
        id: r.get("id"),
        name: r.get("name"),
        price: r.get("price"),
        active: r.get("active"),
    }
}

#[post("/v1/menu")]
async fn post_menu_item(
    body: web::Json<PostMenuItemRequest>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let (name, price) = validated_item(&body.name, &body.price)?;
    let Some(conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let row = conn
        .query_one(
            "INSERT INTO menu_item(name, price, active) VALUES ($1, $2, true) RETURNING id",
            &[&name, &price],
        )
        .await
        .map_err(db_err("post_menu_item"))?;
    Ok(web::Json(PostMenuItemResponse { id: row.get("id") }))
}

#[put("/v1/menu/{id}")]
async fn put_menu_item(
    id: web::Path<i32>,
    body: web::Json<PutMenuItemRequest>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let (name, price) = validated_item(&body.name, &body.price)?;
    let Some(conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let affected = conn
        .execute(
            "UPDATE menu_item SET name = $2, price = $3, active = $4 WHERE id = $1",
            &[&id.into_inner(), &name, &price, &body.active],
        )
        .await
        .map_err(db_err("put_menu_item"))?;
    if affected == 0 {
        return Err(CustomError::ResourceNotFound);
    }
    Ok(actix_web::HttpResponse::Ok())
}

#[post("/v1/menu/{id}/toggle")]
async fn toggle_menu_item(
    id: web::Path<i32>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let affected = conn
        .execute(
            "UPDATE menu_item SET active = NOT active WHERE id = $1",
            &[&id.into_inner()],
        )
        .await
        .map_err(db_err("toggle_menu_item"))?;
    if affected == 0 {
        return Err(CustomError::ResourceNotFound);
    }
    Ok(actix_web::HttpResponse::Ok())
}

#[delete("/v1/menu/{id}")]
/// check-then-branch: an item with order history is deactivated, a never
/// used one is removed
async fn delete_menu_item(
    id: web::Path<i32>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(mut conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let item_id = id.into_inner();
    let txn = conn
        .transaction()
        .await
        .map_err(db_err("delete_menu_item begin"))?;

    txn.query_opt("SELECT id FROM menu_item WHERE id = $1 FOR UPDATE", &[&item_id])
        .await
        .map_err(db_err("delete_menu_item lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;

    let used = txn
        .query_opt(
            "SELECT 1 FROM order_line WHERE menu_item_id = $1 LIMIT 1",
            &[&item_id],
        )
        .await
        .map_err(db_err("delete_menu_item usage check"))?
        .is_some();

    let outcome = if used {
        txn.execute("UPDATE menu_item SET active = false WHERE id = $1", &[&item_id])
            .await
            .map_err(db_err("delete_menu_item deactivate"))?;
        DeleteOutcome {
            deleted: false,
            deactivated: true,
        }
    } else {
        txn.execute("DELETE FROM menu_item WHERE id = $1", &[&item_id])
            .await
            .map_err(db_err("delete_menu_item delete"))?;
        DeleteOutcome {
            deleted: true,
            deactivated: false,
        }
    };
    txn.commit()
        .await
        .map_err(db_err("delete_menu_item commit"))?;

    Ok(web::Json(outcome))
}
