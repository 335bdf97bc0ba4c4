use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::data::enrich::DiscountBand;

// ---------------------------------------------------------------------------
// Metric – a numeric cell that may be undefined
// ---------------------------------------------------------------------------

/// A computed value. `Undefined` marks a division by zero or a mean over no
/// defined inputs; it serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Value(f64),
    Undefined,
}

impl Metric {
    /// `numerator / denominator`, undefined for a zero denominator.
    pub fn ratio(numerator: f64, denominator: f64) -> Metric {
        if denominator == 0.0 {
            Metric::Undefined
        } else {
            Metric::Value(numerator / denominator)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Metric::Value(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Metric {
        match self {
            Metric::Value(v) => Metric::Value(f(v)),
            Metric::Undefined => Metric::Undefined,
        }
    }
}

impl From<f64> for Metric {
    fn from(v: f64) -> Self {
        Metric::Value(v)
    }
}

impl From<Option<f64>> for Metric {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Metric::Undefined, Metric::Value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{v:.2}"),
            Metric::Undefined => write!(f, "n/a"),
        }
    }
}

// ---------------------------------------------------------------------------
// GroupKey – a single key cell of an aggregation result
// ---------------------------------------------------------------------------

/// A dynamically-typed grouping key. Ordered so that time keys sort
/// chronologically and numbers numerically.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    Text(String),
    Int(i64),
    Number(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Band(DiscountBand),
}

// -- Manual Eq/Ord so keys can live in a BTreeMap --

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use GroupKey::*;
        fn discriminant(k: &GroupKey) -> u8 {
            match k {
                Int(_) => 0,
                Number(_) => 1,
                Date(_) => 2,
                Timestamp(_) => 3,
                Band(_) => 4,
                Text(_) => 5,
            }
        }
        match (self, other) {
            (Text(a), Text(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Number(a), Number(b)) => a.total_cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Band(a), Band(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for GroupKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            GroupKey::Text(s) => s.hash(state),
            GroupKey::Int(i) => i.hash(state),
            GroupKey::Number(f) => f.to_bits().hash(state),
            GroupKey::Date(d) => d.hash(state),
            GroupKey::Timestamp(t) => t.hash(state),
            GroupKey::Band(b) => b.hash(state),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Text(s) => write!(f, "{s}"),
            GroupKey::Int(i) => write!(f, "{i}"),
            GroupKey::Number(v) => write!(f, "{v}"),
            GroupKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            GroupKey::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            GroupKey::Band(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GroupKey::Int(i) => serializer.serialize_i64(*i),
            GroupKey::Number(v) => serializer.serialize_f64(*v),
            other => serializer.collect_str(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    #[default]
    Top,
    Bottom,
}

impl Ranking {
    pub fn label(self, k: usize) -> String {
        match self {
            Ranking::Top => format!("Top {k}"),
            Ranking::Bottom => format!("Bottom {k}"),
        }
    }
}

/// Keep the `k` items with the largest (`Top`) or smallest (`Bottom`)
/// metric. Ties keep input order; undefined metrics are never ranked.
pub fn rank_by<T>(
    items: impl IntoIterator<Item = T>,
    k: usize,
    ranking: Ranking,
    metric: impl Fn(&T) -> Metric,
) -> Vec<T> {
    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .filter_map(|item| metric(&item).value().map(|v| (v, item)))
        .collect();
    match ranking {
        Ranking::Top => scored.sort_by(|a, b| b.0.total_cmp(&a.0)),
        Ranking::Bottom => scored.sort_by(|a, b| a.0.total_cmp(&b.0)),
    }
    scored.into_iter().take(k).map(|(_, item)| item).collect()
}

// ---------------------------------------------------------------------------
// AggregationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub keys: Vec<GroupKey>,
    pub values: Vec<Metric>,
}

/// Output of a group-by / reduce / derive query: key columns followed by
/// metric columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationResult {
    pub key_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl AggregationResult {
    pub fn new(key_columns: Vec<String>, value_columns: Vec<String>) -> Self {
        AggregationResult {
            key_columns,
            value_columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value_index(&self, column: &str) -> Option<usize> {
        self.value_columns.iter().position(|c| c == column)
    }

    /// Metric of `column` in every row; `Undefined` for an unknown column.
    pub fn column(&self, column: &str) -> Vec<Metric> {
        let idx = self.value_index(column);
        self.rows
            .iter()
            .map(|row| idx.map_or(Metric::Undefined, |i| row.values[i]))
            .collect()
    }

    /// Look up one cell by its full key.
    pub fn get(&self, keys: &[GroupKey], column: &str) -> Option<Metric> {
        let idx = self.value_index(column)?;
        self.rows
            .iter()
            .find(|row| row.keys == keys)
            .map(|row| row.values[idx])
    }

    /// Append `name = numerator / denominator`. A zero (or undefined)
    /// denominator yields `Undefined` for that row.
    pub fn with_ratio(mut self, numerator: &str, denominator: &str, name: &str) -> Self {
        let (num, den) = match (self.value_index(numerator), self.value_index(denominator)) {
            (Some(n), Some(d)) => (n, d),
            _ => {
                log::warn!("ratio {name}: unknown column {numerator} or {denominator}");
                self.value_columns.push(name.to_string());
                for row in &mut self.rows {
                    row.values.push(Metric::Undefined);
                }
                return self;
            }
        };

        self.value_columns.push(name.to_string());
        for row in &mut self.rows {
            let ratio = match (row.values[num], row.values[den]) {
                (Metric::Value(n), Metric::Value(d)) => Metric::ratio(n, d),
                _ => Metric::Undefined,
            };
            row.values.push(ratio);
        }
        self
    }

    /// The `k` rows with the largest or smallest `column`.
    pub fn top_k(&self, column: &str, k: usize, ranking: Ranking) -> AggregationResult {
        let Some(idx) = self.value_index(column) else {
            return AggregationResult::new(self.key_columns.clone(), self.value_columns.clone());
        };
        AggregationResult {
            key_columns: self.key_columns.clone(),
            value_columns: self.value_columns.clone(),
            rows: rank_by(self.rows.iter().cloned(), k, ranking, |row| row.values[idx]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rows: &[(&str, f64, f64)]) -> AggregationResult {
        AggregationResult {
            key_columns: vec!["category".into()],
            value_columns: vec!["sales".into(), "quantity".into()],
            rows: rows
                .iter()
                .map(|(k, s, q)| ResultRow {
                    keys: vec![GroupKey::Text(k.to_string())],
                    values: vec![Metric::Value(*s), Metric::Value(*q)],
                })
                .collect(),
        }
    }

    #[test]
    fn ratio_with_zero_denominator_is_undefined() {
        let out = result(&[("A", 100.0, 4.0), ("B", 50.0, 0.0)]).with_ratio(
            "sales",
            "quantity",
            "turnover_rate",
        );
        assert_eq!(out.column("turnover_rate"), vec![Metric::Value(25.0), Metric::Undefined]);
    }

    #[test]
    fn rank_by_breaks_ties_by_input_order() {
        let items = vec![("a", 3.0), ("b", 5.0), ("c", 5.0), ("d", 1.0)];
        let top = rank_by(items.clone(), 2, Ranking::Top, |(_, v)| Metric::Value(*v));
        assert_eq!(top, vec![("b", 5.0), ("c", 5.0)]);
        let bottom = rank_by(items, 2, Ranking::Bottom, |(_, v)| Metric::Value(*v));
        assert_eq!(bottom, vec![("d", 1.0), ("a", 3.0)]);
    }

    #[test]
    fn rank_by_skips_undefined_metrics() {
        let items = vec![Metric::Undefined, Metric::Value(-1.0), Metric::Undefined];
        assert_eq!(rank_by(items, 5, Ranking::Top, |m| *m), vec![Metric::Value(-1.0)]);
    }

    #[test]
    fn top_k_on_result_rows() {
        let data = result(&[("A", 10.0, 1.0), ("B", 30.0, 1.0), ("C", 20.0, 1.0)]);
        let top = data.top_k("sales", 2, Ranking::Top);
        let keys: Vec<String> = top.rows.iter().map(|r| r.keys[0].to_string()).collect();
        assert_eq!(keys, vec!["B", "C"]);
        assert!(data.top_k("nope", 2, Ranking::Top).is_empty());
    }

    #[test]
    fn keys_order_within_and_across_kinds() {
        let mut keys = vec![
            GroupKey::Text("b".into()),
            GroupKey::Int(2),
            GroupKey::Text("a".into()),
            GroupKey::Int(-1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                GroupKey::Int(-1),
                GroupKey::Int(2),
                GroupKey::Text("a".into()),
                GroupKey::Text("b".into()),
            ]
        );
    }

    #[test]
    fn undefined_serializes_as_null() {
        let json = serde_json::to_string(&vec![Metric::Value(1.5), Metric::Undefined]).unwrap();
        assert_eq!(json, "[1.5,null]");
    }
}
