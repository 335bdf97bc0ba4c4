use std::collections::HashSet;

use serde::Serialize;

use super::aggregate::{KeyField, NumericField, sum_by_key};
use super::result::{AggregationResult, Ranking};
use crate::data::enrich::{EnrichedRecord, EnrichedTable};
use crate::data::model::{CategoricalField, SaleRecord};

/// Purchases of one customer within the filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDetail {
    pub customer: String,
    pub purchases: Vec<SaleRecord>,
    pub sales_by_product: AggregationResult,
    pub sales_over_time: AggregationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    /// Distinct customers in the summary source.
    pub distinct_customers: usize,
    /// Top customers by summed profit in the summary source.
    pub top_customers: AggregationResult,
    /// Customers present in the filtered view, in first-seen order.
    pub customers: Vec<String>,
    pub detail: Option<CustomerDetail>,
}

/// Customers in first-appearance order.
pub fn distinct_customers(table: &EnrichedTable) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut customers = Vec::new();
    for row in table {
        if seen.insert(row.record.customer.as_str()) {
            customers.push(row.record.customer.clone());
        }
    }
    customers
}

/// Build the customer page.
///
/// Counting and ranking read `summary_source`; the customer list and the
/// per-customer detail read `filtered`. `selected` falls back to the first
/// filtered customer when absent or no longer present.
pub fn customer_summary(
    summary_source: &EnrichedTable,
    filtered: &EnrichedTable,
    selected: Option<&str>,
    top_k: usize,
) -> CustomerSummary {
    let by_profit = sum_by_key(summary_source, KeyField::Customer, &[NumericField::Profit]);
    let top_customers = by_profit.top_k("profit", top_k, Ranking::Top);

    let customers = distinct_customers(filtered);
    let chosen = selected
        .filter(|name| customers.iter().any(|c| c == *name))
        .map(str::to_string)
        .or_else(|| customers.first().cloned());

    CustomerSummary {
        distinct_customers: by_profit.len(),
        top_customers,
        detail: chosen.map(|customer| customer_detail(filtered, customer)),
        customers,
    }
}

fn customer_detail(filtered: &EnrichedTable, customer: String) -> CustomerDetail {
    let rows: EnrichedTable = filtered
        .iter()
        .filter(|row| row.record.customer == customer)
        .cloned()
        .collect();

    CustomerDetail {
        purchases: rows.iter().map(|row: &EnrichedRecord| row.record.clone()).collect(),
        sales_by_product: sum_by_key(
            &rows,
            KeyField::Categorical(CategoricalField::ProductName),
            &[NumericField::Sales],
        ),
        sales_over_time: sum_by_key(&rows, KeyField::OrderDate, &[NumericField::Sales]),
        customer,
    }
}
