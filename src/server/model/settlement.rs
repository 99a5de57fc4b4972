use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::server::domain::lifecycle::PaymentMethod;

#[derive(Debug, Deserialize)]
pub(crate) struct SettlementQuery {
    /// requested local calendar date (YYYY-MM-DD); latest available if absent
    pub date: Option<String>,
}

/// End-of-day cash register report for one local calendar date.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct DailySettlementReport {
    pub date: NaiveDate,
    /// local dates with at least one settled order, newest first
    pub available_dates: Vec<NaiveDate>,
    pub orders: Vec<SettledOrder>,
    pub total: Decimal,
    pub count: u32,
    pub average: Decimal,
    pub by_method: MethodBreakdown,
    pub top_items: Vec<TopItem>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct SettledOrder {
    pub id: i64,
    pub table_number: i32,
    /// closing time formatted HH:MM in the restaurant timezone
    pub time: String,
    pub method: PaymentMethod,
    pub total: Decimal,
}

/// Revenue per payment method over the fixed bucket set.
#[derive(Debug, Default, Serialize, PartialEq)]
pub(crate) struct MethodBreakdown {
    pub cash: Decimal,
    pub transfer: Decimal,
    pub card: Decimal,
    pub other: Decimal,
}

impl MethodBreakdown {
    pub fn add(&mut self, method: PaymentMethod, amount: Decimal) {
        match method {
            PaymentMethod::Cash => self.cash += amount,
            PaymentMethod::Transfer => self.transfer += amount,
            PaymentMethod::Card => self.card += amount,
            PaymentMethod::Other => self.other += amount,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct TopItem {
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}
