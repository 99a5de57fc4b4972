//! Staff administration. Only waiter accounts are managed here; deleting a
//! waiter who owns any order is downgraded to deactivation so settled
//! history keeps its author.

use actix_web::{delete, get, post, web, Responder};

use crate::server::controller::auth::{hash_password, AuthContext};
use crate::server::controller::{db_err, error::CustomError};
use crate::server::model::menu::DeleteOutcome;
use crate::server::model::user::{GetUsersResponse, PostUserRequest, PostUserResponse, UserView};
use crate::server::state::AppState;

#[get("/v1/users")]
async fn get_users(ctx: AuthContext, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let rows = conn
        .query(
            "SELECT id, username, role, active FROM app_user ORDER BY role ASC, username ASC",
            &[],
        )
        .await
        .map_err(db_err("get_users"))?;
    Ok(web::Json(GetUsersResponse {
        users: rows
            .into_iter()
            .map(|r| UserView {
                id: r.get("id"),
                username: r.get("username"),
                role: r.get("role"),
                active: r.get("active"),
            })
            .collect(),
    }))
}

#[post("/v1/users")]
/// admin creates waiter accounts only; the role is never caller-controlled
async fn post_user(
    body: web::Json<PostUserRequest>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(CustomError::Validation(
            "username and password are required".to_string(),
        ));
    }
    let Some(conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let taken = conn
        .query_opt("SELECT 1 FROM app_user WHERE username = $1", &[&username])
        .await
        .map_err(db_err("post_user duplicate check"))?
        .is_some();
    if taken {
        return Err(CustomError::Validation("username already exists".to_string()));
    }
    let password_hash = hash_password(&body.password)?;
    let row = conn
        .query_one(
            r#"
            INSERT INTO app_user(username, password_hash, role, active)
            VALUES ($1, $2, 'waiter', true)
            RETURNING id
            "#,
            &[&username, &password_hash],
        )
        .await
        .map_err(db_err("post_user insert"))?;
    Ok(web::Json(PostUserResponse { id: row.get("id") }))
}

#[post("/v1/user/{id}/toggle")]
async fn toggle_user(
    id: web::Path<i32>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let user_id = id.into_inner();
    // nobody flips their own account off
    if user_id == ctx.user_id {
        return Err(CustomError::Forbidden);
    }
    let Some(conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let row = conn
        .query_opt("SELECT role FROM app_user WHERE id = $1", &[&user_id])
        .await
        .map_err(db_err("toggle_user lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;
    if row.get::<_, String>("role") != "waiter" {
        return Err(CustomError::Forbidden);
    }
    conn.execute(
        "UPDATE app_user SET active = NOT active WHERE id = $1",
        &[&user_id],
    )
    .await
    .map_err(db_err("toggle_user update"))?;
    Ok(actix_web::HttpResponse::Ok())
}

#[delete("/v1/user/{id}")]
/// check-then-branch: a waiter with order history is deactivated, one
/// without is removed
async fn delete_user(
    id: web::Path<i32>,
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_admin()?;
    let user_id = id.into_inner();
    if user_id == ctx.user_id {
        return Err(CustomError::Forbidden);
    }
    let Some(mut conn) = data.get_db_write_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let txn = conn.transaction().await.map_err(db_err("delete_user begin"))?;

    let row = txn
        .query_opt("SELECT role FROM app_user WHERE id = $1 FOR UPDATE", &[&user_id])
        .await
        .map_err(db_err("delete_user lookup"))?
        .ok_or(CustomError::ResourceNotFound)?;
    if row.get::<_, String>("role") != "waiter" {
        return Err(CustomError::Forbidden);
    }

    let owns_orders = txn
        .query_opt("SELECT 1 FROM orders WHERE waiter_id = $1 LIMIT 1", &[&user_id])
        .await
        .map_err(db_err("delete_user history check"))?
        .is_some();

    let outcome = if owns_orders {
        txn.execute("UPDATE app_user SET active = false WHERE id = $1", &[&user_id])
            .await
            .map_err(db_err("delete_user deactivate"))?;
        DeleteOutcome {
            deleted: false,
            deactivated: true,
        }
    } else {
        txn.execute("DELETE FROM app_user WHERE id = $1", &[&user_id])
            .await
            .map_err(db_err("delete_user delete"))?;
        DeleteOutcome {
            deleted: true,
            deactivated: false,
        }
    };
    txn.commit().await.map_err(db_err("delete_user commit"))?;

    Ok(web::Json(outcome))
}
