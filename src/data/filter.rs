use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{CategoricalField, SaleRecord, SalesTable};

// ---------------------------------------------------------------------------
// Filter predicate: date window plus accepted values per column
// ---------------------------------------------------------------------------

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Start Date ({start}) cannot be after End Date ({end})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Active predicates for a session.
///
/// A column that is absent from `selections`, or whose set is empty, imposes
/// no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub date_range: Option<DateRange>,
    pub selections: BTreeMap<CategoricalField, BTreeSet<String>>,
}

impl FilterSpec {
    /// A filter spanning the table's full date range with no column filters.
    pub fn unrestricted(table: &SalesTable) -> Self {
        FilterSpec {
            date_range: table
                .date_bounds()
                .map(|(start, end)| DateRange::new(start, end)),
            selections: BTreeMap::new(),
        }
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn with_values<I, S>(mut self, field: CategoricalField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Accepted values for `field`, or `None` when the field is unconstrained.
    pub fn accepted(&self, field: CategoricalField) -> Option<&BTreeSet<String>> {
        self.selections.get(&field).filter(|set| !set.is_empty())
    }

    /// Flip membership of a single value.
    pub fn toggle(&mut self, field: CategoricalField, value: &str) {
        let selected = self.selections.entry(field).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
    }

    /// Drop every selection for `field`.
    pub fn clear_field(&mut self, field: CategoricalField) {
        self.selections.remove(&field);
    }

    /// Reject a date range whose start lies after its end.
    pub fn validate(&self) -> Result<(), FilterError> {
        match self.date_range {
            Some(DateRange { start, end }) if start > end => {
                Err(FilterError::InvalidRange { start, end })
            }
            _ => Ok(()),
        }
    }

    /// Whether a record satisfies every active predicate.
    pub fn matches(&self, record: &SaleRecord) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(record.order_day()) {
                return false;
            }
        }
        self.selections
            .iter()
            .filter(|(_, selected)| !selected.is_empty())
            .all(|(field, selected)| selected.contains(field.value(record)))
    }
}

/// Return indices of records that pass all active filters, in table order.
pub fn filtered_indices(table: &SalesTable, spec: &FilterSpec) -> Result<Vec<usize>, FilterError> {
    spec.validate()?;
    Ok(table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, record)| spec.matches(record))
        .map(|(i, _)| i)
        .collect())
}

/// Produce the filtered view of `table`. The input is left untouched.
pub fn apply(table: &SalesTable, spec: &FilterSpec) -> Result<SalesTable, FilterError> {
    let indices = filtered_indices(table, spec)?;
    log::debug!("filter kept {} of {} rows", indices.len(), table.len());
    if indices.len() == table.len() {
        return Ok(table.clone());
    }
    Ok(table.select(&indices))
}
