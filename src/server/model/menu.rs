use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct GetMenuResponse {
    pub items: Vec<MenuItemView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MenuItemView {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

/// price travels as the raw form string; validation happens server side
#[derive(Debug, Deserialize)]
pub(crate) struct PostMenuItemRequest {
    pub name: String,
    pub price: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostMenuItemResponse {
    pub id: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutMenuItemRequest {
    pub name: String,
    pub price: String,
    pub active: bool,
}

/// outcome of a delete request: items with order history are deactivated
/// instead of removed
#[derive(Debug, Serialize)]
pub(crate) struct DeleteOutcome {
    pub deleted: bool,
    pub deactivated: bool,
}
