use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::result::{AggregationResult, GroupKey, Metric, Ranking, ResultRow, rank_by};
use crate::data::enrich::{EnrichedRecord, EnrichedTable};
use crate::data::model::{CategoricalField, SaleRecord};

// ---------------------------------------------------------------------------
// Columns the catalog can reduce and group on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Sales,
    Profit,
    Discount,
    Quantity,
    ProfitMargin,
}

impl NumericField {
    pub fn column_name(self) -> &'static str {
        match self {
            NumericField::Sales => "sales",
            NumericField::Profit => "profit",
            NumericField::Discount => "discount",
            NumericField::Quantity => "quantity",
            NumericField::ProfitMargin => "profit_margin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NumericField::Sales => "Sales",
            NumericField::Profit => "Profit",
            NumericField::Discount => "Discount",
            NumericField::Quantity => "Quantity",
            NumericField::ProfitMargin => "Profit Margin",
        }
    }

    /// `None` only for an undefined profit margin.
    pub fn value(self, record: &SaleRecord) -> Option<f64> {
        match self {
            NumericField::Sales => Some(record.sales),
            NumericField::Profit => Some(record.profit),
            NumericField::Discount => Some(record.discount),
            NumericField::Quantity => Some(f64::from(record.quantity)),
            NumericField::ProfitMargin => record.profit_margin,
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A column to group on, including the derived ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Categorical(CategoricalField),
    Customer,
    Year,
    /// Calendar month, keyed by its first day.
    Month,
    Day,
    Hour,
    /// Full order timestamp.
    OrderDate,
    /// Exact discount value.
    Discount,
    DiscountRange,
}

impl KeyField {
    pub fn column_name(self) -> &'static str {
        match self {
            KeyField::Categorical(field) => field.column_name(),
            KeyField::Customer => "customer",
            KeyField::Year => "year",
            KeyField::Month => "month",
            KeyField::Day => "day",
            KeyField::Hour => "hour",
            KeyField::OrderDate => "order_date",
            KeyField::Discount => "discount",
            KeyField::DiscountRange => "discount_range",
        }
    }

    /// Key of a row; rows without one (no discount range) drop out of the
    /// grouping.
    fn key(self, row: &EnrichedRecord) -> Option<GroupKey> {
        let record = &row.record;
        Some(match self {
            KeyField::Categorical(field) => GroupKey::Text(field.value(record).to_string()),
            KeyField::Customer => GroupKey::Text(record.customer.clone()),
            KeyField::Year => GroupKey::Int(i64::from(row.year)),
            KeyField::Month => GroupKey::Date(NaiveDate::from_ymd_opt(row.year, row.month, 1)?),
            KeyField::Day => GroupKey::Date(row.day),
            KeyField::Hour => GroupKey::Int(i64::from(row.hour)),
            KeyField::OrderDate => GroupKey::Timestamp(record.order_date),
            KeyField::Discount => GroupKey::Number(record.discount),
            KeyField::DiscountRange => GroupKey::Band(row.discount_range?),
        })
    }
}

impl From<CategoricalField> for KeyField {
    fn from(field: CategoricalField) -> Self {
        KeyField::Categorical(field)
    }
}

/// A reduction over one group. `Sum` and `Mean` name their output column
/// after the field, `Count` after itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum(NumericField),
    Mean(NumericField),
    Count,
}

impl Aggregate {
    pub fn column_name(self) -> &'static str {
        match self {
            Aggregate::Sum(field) | Aggregate::Mean(field) => field.column_name(),
            Aggregate::Count => "count",
        }
    }

    fn field(self) -> Option<NumericField> {
        match self {
            Aggregate::Sum(field) | Aggregate::Mean(field) => Some(field),
            Aggregate::Count => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    defined: usize,
    rows: usize,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        self.rows += 1;
        if let Some(v) = value {
            self.sum += v;
            self.defined += 1;
        }
    }

    fn finish(self, aggregate: Aggregate) -> Metric {
        match aggregate {
            Aggregate::Sum(_) => Metric::Value(self.sum),
            Aggregate::Mean(_) if self.defined == 0 => Metric::Undefined,
            Aggregate::Mean(_) => Metric::Value(self.sum / self.defined as f64),
            Aggregate::Count => Metric::Value(self.rows as f64),
        }
    }
}

// ---------------------------------------------------------------------------
// Generic group-by
// ---------------------------------------------------------------------------

/// Group `table` by `keys` and reduce each group with `aggregates`.
///
/// Groups come out sorted by key. Undefined inputs are skipped by `Sum` and
/// `Mean`; a mean over no defined input is `Undefined`.
pub fn group_by(table: &EnrichedTable, keys: &[KeyField], aggregates: &[Aggregate]) -> AggregationResult {
    let mut groups: BTreeMap<Vec<GroupKey>, Vec<Accumulator>> = BTreeMap::new();

    'rows: for row in table {
        let mut group = Vec::with_capacity(keys.len());
        for field in keys {
            match field.key(row) {
                Some(key) => group.push(key),
                None => continue 'rows,
            }
        }
        let accumulators = groups
            .entry(group)
            .or_insert_with(|| vec![Accumulator::default(); aggregates.len()]);
        for (acc, aggregate) in accumulators.iter_mut().zip(aggregates) {
            acc.push(aggregate.field().and_then(|f| f.value(&row.record)));
        }
    }

    AggregationResult {
        key_columns: keys.iter().map(|k| k.column_name().to_string()).collect(),
        value_columns: aggregates.iter().map(|a| a.column_name().to_string()).collect(),
        rows: groups
            .into_iter()
            .map(|(keys, accumulators)| ResultRow {
                keys,
                values: accumulators
                    .into_iter()
                    .zip(aggregates)
                    .map(|(acc, aggregate)| acc.finish(*aggregate))
                    .collect(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Catalog shapes
// ---------------------------------------------------------------------------

/// Total of each field per key value.
pub fn sum_by_key(table: &EnrichedTable, key: KeyField, fields: &[NumericField]) -> AggregationResult {
    let aggregates: Vec<Aggregate> = fields.iter().copied().map(Aggregate::Sum).collect();
    group_by(table, &[key], &aggregates)
}

/// Mean of one field per key value, over defined values only.
pub fn mean_by_key(table: &EnrichedTable, key: KeyField, field: NumericField) -> AggregationResult {
    group_by(table, &[key], &[Aggregate::Mean(field)])
}

/// Sum and mean-margin per (category, product), optionally split further.
pub fn product_margin(table: &EnrichedTable, extra_key: Option<KeyField>) -> AggregationResult {
    let mut keys = vec![
        KeyField::Categorical(CategoricalField::Category),
        KeyField::Categorical(CategoricalField::ProductName),
    ];
    keys.extend(extra_key);
    group_by(
        table,
        &keys,
        &[
            Aggregate::Sum(NumericField::Sales),
            Aggregate::Sum(NumericField::Profit),
            Aggregate::Mean(NumericField::ProfitMargin),
        ],
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    #[default]
    Day,
    Hour,
    Month,
    Year,
}

impl TimeBucket {
    pub fn key_field(self) -> KeyField {
        match self {
            TimeBucket::Day => KeyField::Day,
            TimeBucket::Hour => KeyField::Hour,
            TimeBucket::Month => KeyField::Month,
            TimeBucket::Year => KeyField::Year,
        }
    }
}

/// Sums per time bucket (and optional secondary column), chronological.
pub fn time_bucketed_sum(
    table: &EnrichedTable,
    bucket: TimeBucket,
    secondary: Option<CategoricalField>,
    fields: &[NumericField],
) -> AggregationResult {
    let mut keys = vec![bucket.key_field()];
    keys.extend(secondary.map(KeyField::Categorical));
    let aggregates: Vec<Aggregate> = fields.iter().copied().map(Aggregate::Sum).collect();
    group_by(table, &keys, &aggregates)
}

/// Sums per discount range, in range order. Empty ranges are omitted.
pub fn discount_range_sum(table: &EnrichedTable, fields: &[NumericField]) -> AggregationResult {
    sum_by_key(table, KeyField::DiscountRange, fields)
}

/// Per-key sums of sales, profit and quantity plus
/// `turnover_rate = sales / quantity`.
pub fn turnover_by_key(table: &EnrichedTable, key: KeyField) -> AggregationResult {
    sum_by_key(
        table,
        key,
        &[NumericField::Sales, NumericField::Profit, NumericField::Quantity],
    )
    .with_ratio("sales", "quantity", "turnover_rate")
}

/// The `k` records with the largest or smallest `field`.
pub fn top_records(
    table: &EnrichedTable,
    field: NumericField,
    k: usize,
    ranking: Ranking,
) -> Vec<SaleRecord> {
    rank_by(table.iter(), k, ranking, |row| field.value(&row.record).into())
        .into_iter()
        .map(|row| row.record.clone())
        .collect()
}

/// Plain total of a field over all rows (undefined values skipped).
pub fn total(table: &EnrichedTable, field: NumericField) -> f64 {
    table.iter().filter_map(|row| field.value(&row.record)).sum()
}
