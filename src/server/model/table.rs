use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct GetTablesResponse {
    pub tables: Vec<TableView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableView {
    pub id: i16,
    pub number: i32,
    pub status: String,
    /// only an occupied table has an open order
    pub open_order_id: Option<i64>,
}
