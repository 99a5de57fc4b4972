use std::fmt::Display;

use log::warn;

use crate::server::controller::error::CustomError;

pub(crate) mod auth;
pub(crate) mod error;
pub(crate) mod menu;
pub(crate) mod order;
pub(crate) mod settlement;
pub(crate) mod table;
pub(crate) mod user;

pub(crate) const DB_TIMEOUT_SECONDS: u64 = 5;

/// uniform logging for statement failures before collapsing to `DbError`
pub(crate) fn db_err<E: Display>(op: &'static str) -> impl Fn(E) -> CustomError {
    move |e| {
        warn!("{} failed, {}", op, e);
        CustomError::DbError
    }
}
