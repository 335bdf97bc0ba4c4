use std::fmt;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Serialize, Serializer};

use super::model::{SaleRecord, SalesTable};

// ---------------------------------------------------------------------------
// Discount bands
// ---------------------------------------------------------------------------

/// Fixed discount ranges. Each band is `[lower, upper)` except the last,
/// which also includes `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscountBand {
    UpTo10,
    From10To20,
    From20To30,
    From30To50,
    From50To100,
}

impl DiscountBand {
    pub const ALL: [DiscountBand; 5] = [
        DiscountBand::UpTo10,
        DiscountBand::From10To20,
        DiscountBand::From20To30,
        DiscountBand::From30To50,
        DiscountBand::From50To100,
    ];

    const UPPER_EDGES: [f64; 5] = [0.1, 0.2, 0.3, 0.5, 1.0];

    /// Band for a discount fraction; `None` outside `[0, 1]` (and for NaN).
    pub fn from_discount(discount: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&discount) {
            return None;
        }
        Self::ALL
            .iter()
            .zip(Self::UPPER_EDGES)
            .find(|(_, upper)| discount < *upper)
            .map(|(band, _)| *band)
            .or(Some(DiscountBand::From50To100))
    }

    pub fn label(self) -> &'static str {
        match self {
            DiscountBand::UpTo10 => "0-10%",
            DiscountBand::From10To20 => "10-20%",
            DiscountBand::From20To30 => "20-30%",
            DiscountBand::From30To50 => "30-50%",
            DiscountBand::From50To100 => "50-100%",
        }
    }
}

impl fmt::Display for DiscountBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DiscountBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Enriched view: base record plus derived columns
// ---------------------------------------------------------------------------

/// A record together with every derived column the queries group on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: SaleRecord,
    pub year: i32,
    pub month: u32,
    pub day: NaiveDate,
    pub hour: u32,
    pub discount_range: Option<DiscountBand>,
}

impl EnrichedRecord {
    pub fn new(record: SaleRecord) -> Self {
        let ts = record.order_date;
        EnrichedRecord {
            year: ts.year(),
            month: ts.month(),
            day: ts.date(),
            hour: ts.hour(),
            discount_range: DiscountBand::from_discount(record.discount),
            record,
        }
    }
}

/// The filtered table after enrichment. Every query reads this schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTable {
    rows: Vec<EnrichedRecord>,
}

impl EnrichedTable {
    pub fn rows(&self) -> &[EnrichedRecord] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedRecord> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> &[EnrichedRecord] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &[EnrichedRecord] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

impl FromIterator<EnrichedRecord> for EnrichedTable {
    fn from_iter<I: IntoIterator<Item = EnrichedRecord>>(iter: I) -> Self {
        EnrichedTable {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EnrichedTable {
    type Item = &'a EnrichedRecord;
    type IntoIter = std::slice::Iter<'a, EnrichedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Derive year, month, day, hour and discount range for every row.
pub fn enrich(table: &SalesTable) -> EnrichedTable {
    table
        .rows()
        .iter()
        .cloned()
        .map(EnrichedRecord::new)
        .collect()
}
