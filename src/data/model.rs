use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CategoricalField – the text columns users can filter on
// ---------------------------------------------------------------------------

/// A text column that carries a sidebar multi-select filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Category,
    Region,
    ProductName,
    Segment,
    Subcategory,
    State,
    City,
}

impl CategoricalField {
    /// All filterable fields, in sidebar order.
    pub const ALL: [CategoricalField; 7] = [
        CategoricalField::Category,
        CategoricalField::Region,
        CategoricalField::ProductName,
        CategoricalField::Segment,
        CategoricalField::Subcategory,
        CategoricalField::State,
        CategoricalField::City,
    ];

    /// Column name in the source file.
    pub fn column_name(self) -> &'static str {
        match self {
            CategoricalField::Category => "category",
            CategoricalField::Region => "region",
            CategoricalField::ProductName => "product_name",
            CategoricalField::Segment => "segment",
            CategoricalField::Subcategory => "subcategory",
            CategoricalField::State => "state",
            CategoricalField::City => "city",
        }
    }

    /// Human readable label for the UI.
    pub fn label(self) -> &'static str {
        match self {
            CategoricalField::Category => "Product Category",
            CategoricalField::Region => "Region",
            CategoricalField::ProductName => "Product",
            CategoricalField::Segment => "Segment",
            CategoricalField::Subcategory => "Subcategory",
            CategoricalField::State => "State",
            CategoricalField::City => "City",
        }
    }

    /// Borrow this field's value from a record.
    pub fn value(self, record: &SaleRecord) -> &str {
        match self {
            CategoricalField::Category => &record.category,
            CategoricalField::Region => &record.region,
            CategoricalField::ProductName => &record.product_name,
            CategoricalField::Segment => &record.segment,
            CategoricalField::Subcategory => &record.subcategory,
            CategoricalField::State => &record.state,
            CategoricalField::City => &record.city,
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

// ---------------------------------------------------------------------------
// SaleRecord – one row of the dataset
// ---------------------------------------------------------------------------

/// A single point-of-sale transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub order_date: NaiveDateTime,
    pub category: String,
    pub subcategory: String,
    pub product_name: String,
    pub region: String,
    pub state: String,
    pub city: String,
    pub segment: String,
    pub customer: String,
    pub sales: f64,
    /// Signed: losses are negative.
    pub profit: f64,
    /// Fraction in `[0, 1]`.
    pub discount: f64,
    pub quantity: u32,
    /// `profit / sales`; `None` when sales is zero.
    pub profit_margin: Option<f64>,
}

impl SaleRecord {
    /// Resolve the profit margin for a row.
    ///
    /// A finite margin supplied by the source wins; otherwise it is derived
    /// from `profit / sales`. Zero sales always leaves the margin undefined.
    pub fn resolve_margin(sales: f64, profit: f64, supplied: Option<f64>) -> Option<f64> {
        if sales == 0.0 {
            return None;
        }
        match supplied {
            Some(m) if m.is_finite() => Some(m),
            _ => Some(profit / sales),
        }
    }

    /// Calendar date of the order.
    pub fn order_day(&self) -> NaiveDate {
        self.order_date.date()
    }
}

// ---------------------------------------------------------------------------
// SalesTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// An ordered, immutable collection of sales records with pre-computed
/// column indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesTable {
    rows: Vec<SaleRecord>,
    /// For each categorical column the sorted set of distinct values.
    unique_values: BTreeMap<CategoricalField, BTreeSet<String>>,
    /// Earliest and latest order date.
    date_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl SalesTable {
    /// Build column indices from the loaded records.
    pub fn from_records(rows: Vec<SaleRecord>) -> Self {
        let mut unique_values: BTreeMap<CategoricalField, BTreeSet<String>> = BTreeMap::new();
        let mut date_bounds: Option<(NaiveDate, NaiveDate)> = None;

        for row in &rows {
            for field in CategoricalField::ALL {
                unique_values
                    .entry(field)
                    .or_default()
                    .insert(field.value(row).to_string());
            }
            let day = row.order_day();
            date_bounds = Some(match date_bounds {
                Some((lo, hi)) => (lo.min(day), hi.max(day)),
                None => (day, day),
            });
        }

        SalesTable {
            rows,
            unique_values,
            date_bounds,
        }
    }

    /// All records in load order.
    pub fn rows(&self) -> &[SaleRecord] {
        &self.rows
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted distinct values of a categorical column.
    pub fn unique_values(&self, field: CategoricalField) -> Option<&BTreeSet<String>> {
        self.unique_values.get(&field)
    }

    /// `(min, max)` order date, `None` for an empty table.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.date_bounds
    }

    /// New table holding the rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> SalesTable {
        SalesTable::from_records(indices.iter().map(|&i| self.rows[i].clone()).collect())
    }
}
