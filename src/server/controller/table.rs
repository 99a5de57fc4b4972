use actix_web::{get, web, Responder};

use crate::server::controller::auth::AuthContext;
use crate::server::controller::{db_err, error::CustomError};
use crate::server::model::table::{GetTablesResponse, TableView};
use crate::server::state::AppState;

#[get("/v1/tables")]
/// floor view: every table with its status and open order, by table number
async fn get_tables(
    ctx: AuthContext,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    ctx.require_waiter()?;
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let rows = conn
        .query(
            r#"
            SELECT t.id, t.number, t.status, o.id AS open_order_id
            FROM dining_table t
            LEFT JOIN orders o ON o.table_id = t.id AND o.status = 'open'
            ORDER BY t.number ASC
            "#,
            &[],
        )
        .await
        .map_err(db_err("get_tables"))?;

    let tables = rows
        .into_iter()
        .map(|r| TableView {
            id: r.get("id"),
            number: r.get("number"),
            status: r.get("status"),
            open_order_id: r.get("open_order_id"),
        })
        .collect::<Vec<_>>();

    Ok(web::Json(GetTablesResponse { tables }))
}
