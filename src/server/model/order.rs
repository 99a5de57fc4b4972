use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::server::domain::lifecycle::PaymentMethod;

#[derive(Debug, Deserialize)]
pub(crate) struct PostOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderItemRequest {
    pub menu_item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostOrderResponse {
    pub order_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderLineView {
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetOpenOrdersResponse {
    pub orders: Vec<OpenOrderView>,
}

/// kitchen/admin tracking view of one live order
#[derive(Debug, Serialize)]
pub(crate) struct OpenOrderView {
    pub id: i64,
    pub table_number: i32,
    pub waiter: String,
    pub opened_at: String,
    pub lines: Vec<OrderLineView>,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderInvoice {
    pub id: i64,
    pub table_number: i32,
    pub status: String,
    pub opened_at: String,
    pub lines: Vec<OrderLineView>,
    pub total: Decimal,
    pub payment: Option<PaymentView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaymentView {
    pub method: PaymentMethod,
    pub received: Option<Decimal>,
    pub change: Option<Decimal>,
    pub closed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutRequest {
    pub method: String,
    /// raw received amount, only meaningful for cash
    pub received: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutResponse {
    pub order_id: i64,
    pub method: PaymentMethod,
    pub total: Decimal,
    pub received: Decimal,
    pub change: Decimal,
}
