//! Shared fixtures for unit tests.

use chrono::NaiveDateTime;

use crate::data::model::{SaleRecord, SalesTable};

pub fn record(date: &str, category: &str, product: &str, sales: f64, profit: f64) -> SaleRecord {
    SaleRecord {
        order_date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
        category: category.to_string(),
        subcategory: format!("{category}-sub"),
        product_name: product.to_string(),
        region: "West".to_string(),
        state: "California".to_string(),
        city: "Los Angeles".to_string(),
        segment: "Consumer".to_string(),
        customer: "Claire Gute".to_string(),
        sales,
        profit,
        discount: 0.0,
        quantity: 1,
        profit_margin: SaleRecord::resolve_margin(sales, profit, None),
    }
}

/// `[{A, 100, 20}, {A, 50, -5}, {B, 200, 40}]`
pub fn scenario_table() -> SalesTable {
    SalesTable::from_records(vec![
        record("2024-01-01 09:30:00", "A", "Stapler", 100.0, 20.0),
        record("2024-01-02 14:00:00", "A", "Binder", 50.0, -5.0),
        record("2024-01-03 17:45:00", "B", "Chair", 200.0, 40.0),
    ])
}
