use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use rusty_till::config::Config;
use rusty_till::data::cache::DatasetCache;
use rusty_till::data::filter::{DateRange, FilterError, FilterSpec};
use rusty_till::data::loader::DataSource;
use rusty_till::data::model::{CategoricalField, SalesTable};
use rusty_till::query::pages::{Page, PageParams, PageReport, run_page};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChoice {
    Default,
    Upload,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: Config,
    cache: DatasetCache,

    pub source: SourceChoice,
    /// Name and bytes of the last uploaded file.
    upload: Option<DataSource>,

    /// Loaded dataset (None until a load succeeds).
    pub dataset: Option<Arc<SalesTable>>,

    pub filters: FilterSpec,
    /// Set while the date range is inverted; recomputation is skipped.
    pub filter_error: Option<FilterError>,

    pub page: Page,
    pub params: PageParams,
    pub report: Option<PageReport>,

    /// Colours keyed by category label.
    pub category_colors: ColorMap,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    dirty: bool,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let mut state = AppState {
            config,
            cache: DatasetCache::new(),
            source: SourceChoice::Default,
            upload: None,
            dataset: None,
            filters: FilterSpec::default(),
            filter_error: None,
            page: Page::default(),
            params: PageParams::default(),
            report: None,
            category_colors: ColorMap::default(),
            status_message: None,
            dirty: false,
        };
        state.load_default();
        state
    }

    // -- Loading --

    /// Load (or reuse) the configured default dataset.
    pub fn load_default(&mut self) {
        self.source = SourceChoice::Default;
        let result = self.cache.load(&DataSource::Default, &self.config.dataset);
        self.finish_load(result.map_err(anyhow::Error::from));
    }

    /// Drop the cached default dataset and read it again.
    pub fn reload_default(&mut self) {
        self.cache.clear();
        self.load_default();
    }

    /// Load a picked file. Only an upload that loads is kept for `use_upload`.
    pub fn load_upload(&mut self, file_name: String, bytes: Vec<u8>) {
        self.source = SourceChoice::Upload;
        let source = DataSource::Upload { file_name, bytes };
        let result = self.cache.load(&source, &self.config.dataset);
        if result.is_ok() {
            self.upload = Some(source);
        }
        self.finish_load(result.map_err(anyhow::Error::from));
    }

    /// Re-apply the last upload after switching back from the default source.
    pub fn use_upload(&mut self) {
        match self.upload.take() {
            Some(DataSource::Upload { file_name, bytes }) => self.load_upload(file_name, bytes),
            _ => {
                self.source = SourceChoice::Upload;
                self.dataset = None;
                self.report = None;
                self.status_message = Some("Upload an Excel (.xlsx) or CSV (.csv) file".into());
            }
        }
    }

    fn finish_load(&mut self, result: Result<Arc<SalesTable>>) {
        match result {
            Ok(table) => {
                log::info!("Dataset ready: {} rows", table.len());
                self.set_dataset(table);
            }
            Err(e) => {
                log::error!("Failed to load dataset: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
                self.dataset = None;
                self.report = None;
            }
        }
    }

    /// Ingest a newly loaded dataset and reset the filters to span it.
    pub fn set_dataset(&mut self, table: Arc<SalesTable>) {
        self.filters = FilterSpec::unrestricted(&table);
        self.filter_error = None;
        self.params.customer = None;
        self.params.hours.clear();
        self.category_colors = table
            .unique_values(CategoricalField::Category)
            .map(ColorMap::new)
            .unwrap_or_default();
        self.dataset = Some(table);
        self.status_message = None;
        self.dirty = true;
    }

    // -- Filter edits --

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_page(&mut self, page: Page) {
        if self.page != page {
            self.page = page;
            self.dirty = true;
        }
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.filters.date_range
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        self.filters.date_range = Some(DateRange::new(start, end));
        self.dirty = true;
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, field: CategoricalField, value: &str) {
        self.filters.toggle(field, value);
        self.dirty = true;
    }

    /// Select every value of a column.
    pub fn select_all(&mut self, field: CategoricalField) {
        if let Some(values) = self.dataset.as_ref().and_then(|ds| ds.unique_values(field)) {
            self.filters.selections.insert(field, values.clone());
            self.dirty = true;
        }
    }

    /// Clear a column's selection, which accepts every value again.
    pub fn select_none(&mut self, field: CategoricalField) {
        self.filters.clear_field(field);
        self.dirty = true;
    }

    // -- Recompute --

    /// Re-run the current page if anything changed since the last frame.
    pub fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let Some(dataset) = &self.dataset else {
            return;
        };

        match run_page(dataset, &self.filters, self.page, &self.params, &self.config.queries) {
            Ok(report) => {
                self.filter_error = None;
                self.report = Some(report);
            }
            Err(e) => {
                log::debug!("page not recomputed: {e}");
                self.filter_error = Some(e);
            }
        }
    }

    // -- Export --

    /// Write the current report as pretty JSON.
    pub fn export_report(&self, path: &Path) -> Result<()> {
        let report = self.report.as_ref().context("nothing to export")?;
        let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Exported {} report to {}", self.page.title(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rusty_till::data::loader::DatasetSettings;

    use super::*;

    const CSV: &str = "\
order_date,category,subcategory,product_name,region,state,city,segment,customer,sales,profit,discount,quantity
2024-03-01 09:10:00,Furniture,Chairs,Task Chair,West,California,Los Angeles,Consumer,Ann Lee,250.0,40.0,0.1,2
";

    fn state_without_default() -> AppState {
        let config = Config {
            dataset: DatasetSettings {
                default_path: PathBuf::from("/nonexistent/superstore.xlsx"),
                ..DatasetSettings::default()
            },
            ..Config::default()
        };
        AppState::new(config)
    }

    #[test]
    fn rejected_upload_is_not_reused() {
        let mut state = state_without_default();
        assert!(state.dataset.is_none());

        state.load_upload("notes.txt".to_string(), b"hello".to_vec());
        assert!(state.dataset.is_none());
        assert!(state.status_message.as_deref().is_some_and(|m| m.starts_with("Error")));

        state.load_default();
        state.use_upload();
        assert_eq!(state.source, SourceChoice::Upload);
        assert!(state.dataset.is_none());
        assert_eq!(
            state.status_message.as_deref(),
            Some("Upload an Excel (.xlsx) or CSV (.csv) file")
        );
    }

    #[test]
    fn loaded_upload_survives_a_source_switch() {
        let mut state = state_without_default();
        state.load_upload("orders.csv".to_string(), CSV.as_bytes().to_vec());
        assert_eq!(state.dataset.as_ref().map(|ds| ds.len()), Some(1));

        // A later bad pick leaves the good upload in place.
        state.load_upload("orders.txt".to_string(), b"x".to_vec());
        state.load_default();
        assert!(state.dataset.is_none());

        state.use_upload();
        assert_eq!(state.dataset.as_ref().map(|ds| ds.len()), Some(1));
        assert!(state.status_message.is_none());
    }
}
