//! main file for the server

pub(crate) mod controller;
pub(crate) mod database;
pub(crate) mod domain;
pub(crate) mod model;
pub(crate) mod state;
pub(crate) mod util;

use actix_web::{middleware::Logger, web, App, HttpServer};

use crate::server::controller::{auth, menu, order, settlement, table, user};
use crate::server::database::pool::Pool;
use crate::server::model::config::ServerConfig;
use crate::server::state::AppState;

/// Run the server
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let read_pool = Pool::new("read");
    let write_pool = Pool::new("write");
    read_pool
        .init(&config.db_read_conn_str)
        .await
        .map_err(std::io::Error::other)?;
    write_pool
        .init(&config.db_write_conn_str)
        .await
        .map_err(std::io::Error::other)?;

    let data = web::Data::new(AppState::new(read_pool, write_pool, config.timezone));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .service(auth::login)
            .service(auth::logout)
            .service(table::get_tables)
            .service(menu::get_menu)
            .service(menu::get_menu_all)
            .service(menu::post_menu_item)
            .service(menu::put_menu_item)
            .service(menu::toggle_menu_item)
            .service(menu::delete_menu_item)
            .service(order::post_table_order)
            .service(order::get_open_orders)
            .service(order::get_order)
            .service(order::close_order)
            .service(order::checkout_order)
            .service(settlement::get_settlement)
            .service(settlement::get_settlement_dates)
            .service(user::get_users)
            .service(user::post_user)
            .service(user::toggle_user)
            .service(user::delete_user)
    })
    .bind(config.addr)?
    .run()
    .await
}
