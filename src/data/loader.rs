use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use calamine::{Data, DataType, Reader, Xlsx, open_workbook_from_rs};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use super::model::{SaleRecord, SalesTable};

// ---------------------------------------------------------------------------
// Sources, settings and errors
// ---------------------------------------------------------------------------

/// Where the bundled dataset lives and which sheet to read from workbooks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetSettings {
    pub default_path: PathBuf,
    pub sheet_name: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        DatasetSettings {
            default_path: PathBuf::from("superstore.xlsx"),
            sheet_name: "superstore_dataset".to_string(),
        }
    }
}

/// The bundled dataset, or a file the user picked.
#[derive(Debug, Clone)]
pub enum DataSource {
    Default,
    Upload { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type '{file_name}': upload an Excel (.xlsx) or CSV (.csv) file")]
    UnsupportedFormat { file_name: String },
    #[error("error loading '{file_name}'")]
    Read {
        file_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl LoadError {
    fn read(file_name: &str, err: anyhow::Error) -> Self {
        LoadError::Read {
            file_name: file_name.to_string(),
            source: err.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Spreadsheet,
    Csv,
}

impl FileFormat {
    /// Pick the format from a file name suffix (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "xlsx" => Some(FileFormat::Spreadsheet),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from either source. Uncached; see `DatasetCache`.
pub fn load(source: &DataSource, settings: &DatasetSettings) -> Result<SalesTable, LoadError> {
    match source {
        DataSource::Default => load_path(&settings.default_path, &settings.sheet_name),
        DataSource::Upload { file_name, bytes } => {
            load_bytes(file_name, bytes, &settings.sheet_name)
        }
    }
}

/// Load a dataset file from disk. Dispatch by extension.
pub fn load_path(path: &Path, sheet_name: &str) -> Result<SalesTable, LoadError> {
    let file_name = path.display().to_string();
    let format = detect_format(&file_name)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {file_name}"))
        .map_err(|e| LoadError::read(&file_name, e))?;
    parse(format, &file_name, &bytes, sheet_name)
}

/// Load an in-memory upload. Dispatch by the file name's extension.
pub fn load_bytes(file_name: &str, bytes: &[u8], sheet_name: &str) -> Result<SalesTable, LoadError> {
    let format = detect_format(file_name)?;
    parse(format, file_name, bytes, sheet_name)
}

fn detect_format(file_name: &str) -> Result<FileFormat, LoadError> {
    FileFormat::from_file_name(file_name).ok_or_else(|| LoadError::UnsupportedFormat {
        file_name: file_name.to_string(),
    })
}

fn parse(
    format: FileFormat,
    file_name: &str,
    bytes: &[u8],
    sheet_name: &str,
) -> Result<SalesTable, LoadError> {
    let records = match format {
        FileFormat::Spreadsheet => read_xlsx(bytes, sheet_name),
        FileFormat::Csv => read_csv(bytes),
    }
    .map_err(|e| LoadError::read(file_name, e))?;

    log::info!("Loaded {} sales records from {file_name}", records.len());
    Ok(SalesTable::from_records(records))
}

// ---------------------------------------------------------------------------
// Column layout (shared by both formats)
// ---------------------------------------------------------------------------

/// Positions of the fixed, case-sensitive columns in a header row.
#[derive(Debug)]
struct ColumnIndex {
    order_date: usize,
    category: usize,
    subcategory: usize,
    product_name: usize,
    region: usize,
    state: usize,
    city: usize,
    segment: usize,
    customer: usize,
    sales: usize,
    profit: usize,
    discount: usize,
    quantity: usize,
    profit_margin: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| find(name).with_context(|| format!("missing '{name}' column"));

        Ok(ColumnIndex {
            order_date: require("order_date")?,
            category: require("category")?,
            subcategory: require("subcategory")?,
            product_name: require("product_name")?,
            region: require("region")?,
            state: require("state")?,
            city: require("city")?,
            segment: require("segment")?,
            customer: require("customer")?,
            sales: require("sales")?,
            profit: require("profit")?,
            discount: require("discount")?,
            quantity: require("quantity")?,
            profit_margin: find("profit_margin"),
        })
    }

    fn record<C: Cells + ?Sized>(&self, cells: &C) -> Result<SaleRecord> {
        let text = |idx: usize, name: &str| {
            cells
                .text(idx)
                .with_context(|| format!("column '{name}'"))
        };
        let number = |idx: usize, name: &str| -> Result<f64> {
            cells
                .number(idx)
                .and_then(|value| value.context("empty value"))
                .with_context(|| format!("column '{name}'"))
        };

        let sales = number(self.sales, "sales")?;
        let profit = number(self.profit, "profit")?;
        // Unreadable margin cells (`#DIV/0!`, "n/a") fall back to profit / sales.
        let supplied_margin = self
            .profit_margin
            .and_then(|idx| cells.number(idx).ok().flatten());

        Ok(SaleRecord {
            order_date: cells.datetime(self.order_date).context("column 'order_date'")?,
            category: text(self.category, "category")?,
            subcategory: text(self.subcategory, "subcategory")?,
            product_name: text(self.product_name, "product_name")?,
            region: text(self.region, "region")?,
            state: text(self.state, "state")?,
            city: text(self.city, "city")?,
            segment: text(self.segment, "segment")?,
            customer: text(self.customer, "customer")?,
            sales,
            profit,
            discount: number(self.discount, "discount")?,
            quantity: to_quantity(number(self.quantity, "quantity")?)?,
            profit_margin: SaleRecord::resolve_margin(sales, profit, supplied_margin),
        })
    }
}

/// Typed access to the cells of one data row.
trait Cells {
    fn text(&self, idx: usize) -> Result<String>;
    /// `None` for an empty cell.
    fn number(&self, idx: usize) -> Result<Option<f64>>;
    fn datetime(&self, idx: usize) -> Result<NaiveDateTime>;
}

fn to_quantity(value: f64) -> Result<u32> {
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        bail!("quantity must be a non-negative integer, got {value}");
    }
    Ok(value as u32)
}

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse the textual date forms accepted in `order_date`.
pub fn parse_datetime_text(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(day.and_time(chrono::NaiveTime::MIN));
        }
    }
    bail!("'{text}' is not a recognised date")
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

impl Cells for csv::StringRecord {
    fn text(&self, idx: usize) -> Result<String> {
        self.get(idx)
            .map(str::to_string)
            .context("missing field")
    }

    fn number(&self, idx: usize) -> Result<Option<f64>> {
        let raw = self.get(idx).context("missing field")?.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .with_context(|| format!("'{raw}' is not a number"))
    }

    fn datetime(&self, idx: usize) -> Result<NaiveDateTime> {
        parse_datetime_text(self.get(idx).context("missing field")?)
    }
}

/// CSV layout: header row with the fixed column names, one sale per line.
fn read_csv(bytes: &[u8]) -> Result<Vec<SaleRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = ColumnIndex::from_headers(&headers)?;

    // Rows are numbered as a spreadsheet shows them: the header is row 1.
    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.context("reading CSV record")?;
        let line = row.position().map_or(0, |pos| pos.line());
        records.push(columns.record(&row).with_context(|| format!("row {line}"))?);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

impl Cells for [Data] {
    fn text(&self, idx: usize) -> Result<String> {
        Ok(self.get(idx).map(|cell| cell.to_string()).unwrap_or_default())
    }

    fn number(&self, idx: usize) -> Result<Option<f64>> {
        match self.get(idx) {
            None | Some(Data::Empty) => Ok(None),
            Some(Data::Float(f)) => Ok(Some(*f)),
            Some(Data::Int(i)) => Ok(Some(*i as f64)),
            Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Data::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .with_context(|| format!("'{s}' is not a number")),
            Some(other) => bail!("'{other}' is not a number"),
        }
    }

    fn datetime(&self, idx: usize) -> Result<NaiveDateTime> {
        match self.get(idx) {
            None | Some(Data::Empty) => bail!("empty value"),
            Some(Data::String(s)) => parse_datetime_text(s),
            Some(cell) => cell
                .as_datetime()
                .with_context(|| format!("'{cell}' is not a date")),
        }
    }
}

/// Workbook layout: the named sheet, header in the first row.
fn read_xlsx(bytes: &[u8], sheet_name: &str) -> Result<Vec<SaleRecord>> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).context("opening Excel workbook")?;
    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("reading sheet '{sheet_name}'"))?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .with_context(|| format!("sheet '{sheet_name}' is empty"))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let columns = ColumnIndex::from_headers(&headers)?;

    let mut records = Vec::new();
    for (row_no, row) in rows.enumerate() {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        records.push(
            columns
                .record(row)
                .with_context(|| format!("row {}", first_row + row_no + 2))?,
        );
    }
    Ok(records)
}
