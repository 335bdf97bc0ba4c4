use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::aggregate::{
    KeyField, NumericField, TimeBucket, discount_range_sum, mean_by_key, product_margin, sum_by_key,
    time_bucketed_sum, top_records, total, turnover_by_key,
};
use super::customer::{CustomerSummary, customer_summary};
use super::result::{AggregationResult, Metric, Ranking};
use crate::data::enrich::{EnrichedTable, enrich};
use crate::data::filter::{self, FilterError, FilterSpec};
use crate::data::model::{CategoricalField, SaleRecord, SalesTable};

// ---------------------------------------------------------------------------
// Settings and parameters
// ---------------------------------------------------------------------------

/// Table read by the summaries that ignore the sidebar filters in the
/// classic dashboard layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// The unfiltered dataset.
    #[default]
    Base,
    /// The filtered view, like every other query.
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySettings {
    /// K for every top/bottom-K query.
    pub top_k: usize,
    /// Rows shown in the overview data sample.
    pub sample_rows: usize,
    pub summary_source: SummarySource,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            top_k: 5,
            sample_rows: 5,
            summary_source: SummarySource::Base,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEnd {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGranularity {
    #[default]
    Day,
    Hour,
}

/// Page-local widget state supplied by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub sample: SampleEnd,
    pub granularity: TrendGranularity,
    /// Hours kept on the hour-wise trend; empty keeps all.
    pub hours: BTreeSet<u32>,
    pub customer: Option<String>,
    pub ranking: Ranking,
    /// Sort column of the inventory product table.
    pub inventory_metric: NumericField,
}

impl Default for PageParams {
    fn default() -> Self {
        PageParams {
            sample: SampleEnd::First,
            granularity: TrendGranularity::Day,
            hours: BTreeSet::new(),
            customer: None,
            ranking: Ranking::Top,
            inventory_metric: NumericField::Sales,
        }
    }
}

impl PageParams {
    /// Flip one hour, starting from the hours the last report kept.
    pub fn toggle_hour(&mut self, hour: u32, selected: &[u32]) {
        let mut hours: BTreeSet<u32> = selected.iter().copied().collect();
        if !hours.remove(&hour) {
            hours.insert(hour);
        }
        self.hours = hours;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Overview,
    Category,
    TimeTrend,
    Customers,
    Inventory,
    ProfitMargin,
    Discount,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Overview,
        Page::Category,
        Page::TimeTrend,
        Page::Customers,
        Page::Inventory,
        Page::ProfitMargin,
        Page::Discount,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Page::Overview => "Overall Overview",
            Page::Category => "Sales by Product Category",
            Page::TimeTrend => "Daily & Hourly Sales Trend",
            Page::Customers => "Customer Sales Analytics",
            Page::Inventory => "Inventory Turnover Rate",
            Page::ProfitMargin => "Profit Margin by Product and Category",
            Page::Discount => "Discount Effectiveness Analysis",
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_discount: f64,
    pub total_quantity: u64,
    pub rows: usize,
    /// `100 * Σprofit / Σsales`.
    pub avg_profit_margin_pct: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewReport {
    pub kpis: Kpis,
    pub sales_by_region: AggregationResult,
    pub margin_by_region: AggregationResult,
    pub sample_end: SampleEnd,
    pub sample: Vec<SaleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub sales_profit: AggregationResult,
    pub product_margin: AggregationResult,
    pub yearly: AggregationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub total_sales: f64,
    pub granularity: TrendGranularity,
    /// Hours present in the filtered view (hour-wise only).
    pub available_hours: Vec<u32>,
    pub selected_hours: Vec<u32>,
    /// Sales inside the selected hours.
    pub selected_total: f64,
    pub series: AggregationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    pub ranking: Ranking,
    pub metric: NumericField,
    pub k: usize,
    pub products: Vec<SaleRecord>,
    pub turnover: AggregationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginReport {
    pub ranking: Ranking,
    pub k: usize,
    pub ranked_products: AggregationResult,
    pub product_margin: AggregationResult,
    pub yearly: AggregationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiscountPoint {
    pub discount: f64,
    pub profit_margin: Metric,
    pub sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountReport {
    pub overall: AggregationResult,
    pub points: Vec<DiscountPoint>,
    pub by_range: AggregationResult,
    pub by_product: AggregationResult,
}

/// Everything one page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum PageReport {
    Overview(OverviewReport),
    Category(CategoryReport),
    TimeTrend(TrendReport),
    Customers(CustomerSummary),
    Inventory(InventoryReport),
    ProfitMargin(MarginReport),
    Discount(DiscountReport),
}

impl PageReport {
    pub fn page(&self) -> Page {
        match self {
            PageReport::Overview(_) => Page::Overview,
            PageReport::Category(_) => Page::Category,
            PageReport::TimeTrend(_) => Page::TimeTrend,
            PageReport::Customers(_) => Page::Customers,
            PageReport::Inventory(_) => Page::Inventory,
            PageReport::ProfitMargin(_) => Page::ProfitMargin,
            PageReport::Discount(_) => Page::Discount,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Filter `base`, enrich the survivors and run the queries behind `page`.
///
/// Fails only when the filter's date range is inverted.
pub fn run_page(
    base: &SalesTable,
    spec: &FilterSpec,
    page: Page,
    params: &PageParams,
    settings: &QuerySettings,
) -> Result<PageReport, FilterError> {
    let filtered = enrich(&filter::apply(base, spec)?);
    log::debug!("rendering {:?} over {} rows", page, filtered.len());

    let report = match page {
        Page::Overview => {
            PageReport::Overview(overview(base, &filtered, params.sample, settings))
        }
        Page::Category => PageReport::Category(CategoryReport {
            sales_profit: sum_by_key(
                &filtered,
                CategoricalField::Category.into(),
                &[NumericField::Sales, NumericField::Profit],
            ),
            product_margin: product_margin(&filtered, None),
            yearly: yearly_by_category(&filtered),
        }),
        Page::TimeTrend => PageReport::TimeTrend(trend(&filtered, params)),
        Page::Customers => {
            let source = summary_view(base, &filtered, settings.summary_source);
            PageReport::Customers(customer_summary(
                &source,
                &filtered,
                params.customer.as_deref(),
                settings.top_k,
            ))
        }
        Page::Inventory => PageReport::Inventory(InventoryReport {
            ranking: params.ranking,
            metric: params.inventory_metric,
            k: settings.top_k,
            products: top_records(&filtered, params.inventory_metric, settings.top_k, params.ranking),
            turnover: turnover_by_key(&filtered, CategoricalField::Category.into()),
        }),
        Page::ProfitMargin => {
            let margins = product_margin(&filtered, None);
            PageReport::ProfitMargin(MarginReport {
                ranking: params.ranking,
                k: settings.top_k,
                ranked_products: margins.top_k("profit_margin", settings.top_k, params.ranking),
                product_margin: margins,
                yearly: yearly_by_category(&filtered),
            })
        }
        Page::Discount => PageReport::Discount(discount(base, &filtered, settings)),
    };
    Ok(report)
}

fn summary_view<'a>(
    base: &SalesTable,
    filtered: &'a EnrichedTable,
    source: SummarySource,
) -> Cow<'a, EnrichedTable> {
    match source {
        SummarySource::Base => Cow::Owned(enrich(base)),
        SummarySource::Filtered => Cow::Borrowed(filtered),
    }
}

fn yearly_by_category(view: &EnrichedTable) -> AggregationResult {
    time_bucketed_sum(
        view,
        TimeBucket::Year,
        Some(CategoricalField::Category),
        &[NumericField::Sales, NumericField::Profit],
    )
}

pub fn kpis(view: &EnrichedTable) -> Kpis {
    let total_sales = total(view, NumericField::Sales);
    let total_profit = total(view, NumericField::Profit);
    Kpis {
        total_sales,
        total_profit,
        total_discount: total(view, NumericField::Discount),
        total_quantity: view.iter().map(|row| u64::from(row.record.quantity)).sum(),
        rows: view.len(),
        avg_profit_margin_pct: Metric::ratio(total_profit, total_sales).map(|m| m * 100.0),
    }
}

fn overview(
    base: &SalesTable,
    filtered: &EnrichedTable,
    sample_end: SampleEnd,
    settings: &QuerySettings,
) -> OverviewReport {
    let source = summary_view(base, filtered, settings.summary_source);
    let region: KeyField = CategoricalField::Region.into();
    let sample = match sample_end {
        SampleEnd::First => filtered.head(settings.sample_rows),
        SampleEnd::Last => filtered.tail(settings.sample_rows),
    };

    OverviewReport {
        kpis: kpis(filtered),
        sales_by_region: sum_by_key(&source, region, &[NumericField::Sales]),
        margin_by_region: mean_by_key(&source, region, NumericField::ProfitMargin),
        sample_end,
        sample: sample.iter().map(|row| row.record.clone()).collect(),
    }
}

fn trend(filtered: &EnrichedTable, params: &PageParams) -> TrendReport {
    let total_sales = total(filtered, NumericField::Sales);
    match params.granularity {
        TrendGranularity::Day => TrendReport {
            total_sales,
            granularity: TrendGranularity::Day,
            available_hours: Vec::new(),
            selected_hours: Vec::new(),
            selected_total: total_sales,
            series: time_bucketed_sum(filtered, TimeBucket::Day, None, &[NumericField::Sales]),
        },
        TrendGranularity::Hour => {
            let available: BTreeSet<u32> = filtered.iter().map(|row| row.hour).collect();
            let selected: Vec<u32> = if params.hours.is_empty() {
                available.iter().copied().collect()
            } else {
                available.intersection(&params.hours).copied().collect()
            };
            let in_hours: EnrichedTable = filtered
                .iter()
                .filter(|row| params.hours.is_empty() || params.hours.contains(&row.hour))
                .cloned()
                .collect();
            TrendReport {
                total_sales,
                granularity: TrendGranularity::Hour,
                available_hours: available.into_iter().collect(),
                selected_hours: selected,
                selected_total: total(&in_hours, NumericField::Sales),
                series: time_bucketed_sum(&in_hours, TimeBucket::Hour, None, &[NumericField::Sales]),
            }
        }
    }
}

fn discount(base: &SalesTable, filtered: &EnrichedTable, settings: &QuerySettings) -> DiscountReport {
    let source = summary_view(base, filtered, settings.summary_source);
    DiscountReport {
        overall: sum_by_key(
            &source,
            KeyField::Discount,
            &[NumericField::Sales, NumericField::Profit],
        ),
        points: filtered
            .iter()
            .map(|row| DiscountPoint {
                discount: row.record.discount,
                profit_margin: row.record.profit_margin.into(),
                sales: row.record.sales,
            })
            .collect(),
        by_range: discount_range_sum(filtered, &[NumericField::Sales, NumericField::Profit]),
        by_product: product_margin(filtered, Some(KeyField::Discount)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::result::GroupKey;
    use crate::testing::{record, scenario_table};

    fn run(table: &SalesTable, spec: &FilterSpec, page: Page, params: &PageParams) -> PageReport {
        run_page(table, spec, page, params, &QuerySettings::default()).unwrap()
    }

    #[test]
    fn overview_kpis_follow_filters_and_regions_follow_base() {
        let mut east = record("2024-02-01 10:00:00", "B", "Lamp", 40.0, 10.0);
        east.region = "East".to_string();
        let table = SalesTable::from_records(vec![
            record("2024-01-01 10:00:00", "A", "Desk", 100.0, 20.0),
            east,
        ]);
        let spec = FilterSpec::default().with_values(CategoricalField::Category, ["A"]);

        let PageReport::Overview(report) = run(&table, &spec, Page::Overview, &PageParams::default()) else {
            panic!("wrong page");
        };
        assert_eq!(report.kpis.rows, 1);
        assert_eq!(report.kpis.total_sales, 100.0);
        assert_eq!(report.kpis.avg_profit_margin_pct, Metric::Value(20.0));
        assert_eq!(report.sales_by_region.len(), 2);
        assert_eq!(report.sample.len(), 1);
    }

    #[test]
    fn filtered_summary_source_applies_filters_everywhere() {
        let settings = QuerySettings {
            summary_source: SummarySource::Filtered,
            ..QuerySettings::default()
        };
        let spec = FilterSpec::default().with_values(CategoricalField::Category, ["B"]);
        let report = run_page(&scenario_table(), &spec, Page::Customers, &PageParams::default(), &settings).unwrap();
        let PageReport::Customers(summary) = report else {
            panic!("wrong page");
        };
        assert_eq!(summary.distinct_customers, 1);
        assert_eq!(summary.top_customers.column("profit"), vec![Metric::Value(40.0)]);
    }

    #[test]
    fn overview_margin_is_undefined_without_sales() {
        let table = SalesTable::from_records(vec![record("2024-01-01 10:00:00", "A", "Desk", 0.0, 0.0)]);
        let PageReport::Overview(report) = run(&table, &FilterSpec::default(), Page::Overview, &PageParams::default()) else {
            panic!("wrong page");
        };
        assert_eq!(report.kpis.avg_profit_margin_pct, Metric::Undefined);
    }

    #[test]
    fn last_sample_takes_the_tail() {
        let rows = (1..=7)
            .map(|d| record(&format!("2024-01-0{d} 10:00:00"), "A", &format!("p{d}"), 1.0, 0.0))
            .collect();
        let table = SalesTable::from_records(rows);
        let params = PageParams {
            sample: SampleEnd::Last,
            ..PageParams::default()
        };
        let PageReport::Overview(report) = run(&table, &FilterSpec::default(), Page::Overview, &params) else {
            panic!("wrong page");
        };
        let names: Vec<_> = report.sample.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["p3", "p4", "p5", "p6", "p7"]);
    }

    #[test]
    fn hour_selection_restricts_series_and_total() {
        let params = PageParams {
            granularity: TrendGranularity::Hour,
            hours: BTreeSet::from([14, 23]),
            ..PageParams::default()
        };
        let PageReport::TimeTrend(report) = run(&scenario_table(), &FilterSpec::default(), Page::TimeTrend, &params) else {
            panic!("wrong page");
        };
        assert_eq!(report.available_hours, vec![9, 14, 17]);
        assert_eq!(report.selected_hours, vec![14]);
        assert_eq!(report.total_sales, 350.0);
        assert_eq!(report.selected_total, 50.0);
        assert_eq!(report.series.rows.len(), 1);
        assert_eq!(report.series.rows[0].keys, vec![GroupKey::Int(14)]);
    }

    #[test]
    fn unticking_an_hour_keeps_the_others() {
        let mut params = PageParams {
            granularity: TrendGranularity::Hour,
            ..PageParams::default()
        };
        let PageReport::TimeTrend(report) = run(&scenario_table(), &FilterSpec::default(), Page::TimeTrend, &params) else {
            panic!("wrong page");
        };
        // Nothing chosen yet, so every hour shows as selected.
        assert_eq!(report.selected_hours, vec![9, 14, 17]);

        params.toggle_hour(14, &report.selected_hours);
        assert_eq!(params.hours, BTreeSet::from([9, 17]));
        let PageReport::TimeTrend(report) = run(&scenario_table(), &FilterSpec::default(), Page::TimeTrend, &params) else {
            panic!("wrong page");
        };
        assert_eq!(report.selected_total, 300.0);

        params.toggle_hour(14, &report.selected_hours);
        assert_eq!(params.hours, BTreeSet::from([9, 14, 17]));
    }

    #[test]
    fn empty_filtered_view_yields_empty_results() {
        let spec = FilterSpec::default().with_values(CategoricalField::City, ["Nowhere"]);
        for page in Page::ALL {
            let report = run(&scenario_table(), &spec, page, &PageParams::default());
            assert_eq!(report.page(), page);
            match report {
                PageReport::Category(r) => assert!(r.sales_profit.is_empty() && r.yearly.is_empty()),
                PageReport::TimeTrend(r) => assert!(r.series.is_empty()),
                PageReport::Inventory(r) => assert!(r.products.is_empty() && r.turnover.is_empty()),
                PageReport::ProfitMargin(r) => assert!(r.ranked_products.is_empty()),
                PageReport::Discount(r) => assert!(r.points.is_empty() && r.by_range.is_empty()),
                PageReport::Customers(r) => assert!(r.detail.is_none()),
                PageReport::Overview(r) => assert_eq!(r.kpis.rows, 0),
            }
        }
    }

    #[test]
    fn inverted_date_range_fails_the_page() {
        let day = |d| chrono::NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let spec = FilterSpec::default().with_date_range(day(3), day(1));
        let err = run_page(&scenario_table(), &spec, Page::Category, &PageParams::default(), &QuerySettings::default());
        assert!(matches!(err, Err(FilterError::InvalidRange { .. })));
    }

    #[test]
    fn margin_page_ranks_products_by_margin() {
        let params = PageParams {
            ranking: Ranking::Bottom,
            ..PageParams::default()
        };
        let PageReport::ProfitMargin(report) = run(&scenario_table(), &FilterSpec::default(), Page::ProfitMargin, &params) else {
            panic!("wrong page");
        };
        let first = &report.ranked_products.rows[0];
        assert_eq!(first.keys[1], GroupKey::Text("Binder".into()));
        assert_eq!(report.product_margin.len(), 3);
    }

    #[test]
    fn reports_carry_the_plotted_columns() {
        let table = scenario_table();
        let spec = FilterSpec::default();
        let params = PageParams::default();

        let PageReport::Category(category) = run(&table, &spec, Page::Category, &params) else {
            panic!("wrong page");
        };
        assert_eq!(category.sales_profit.column("profit"), vec![Metric::Value(15.0), Metric::Value(40.0)]);

        let PageReport::Inventory(inventory) = run(&table, &spec, Page::Inventory, &params) else {
            panic!("wrong page");
        };
        assert_eq!(inventory.turnover.column("quantity"), vec![Metric::Value(2.0), Metric::Value(1.0)]);
        assert_eq!(inventory.turnover.column("sales"), vec![Metric::Value(150.0), Metric::Value(200.0)]);

        let PageReport::ProfitMargin(margin) = run(&table, &spec, Page::ProfitMargin, &params) else {
            panic!("wrong page");
        };
        assert!(margin.product_margin.value_index("profit_margin").is_some());
        assert!(margin.product_margin.value_index("sales").is_some());

        let PageReport::Discount(discount) = run(&table, &spec, Page::Discount, &params) else {
            panic!("wrong page");
        };
        // Every scenario order is undiscounted.
        assert_eq!(discount.overall.len(), 1);
        assert_eq!(discount.overall.column("sales"), vec![Metric::Value(350.0)]);
        assert_eq!(discount.overall.column("profit"), vec![Metric::Value(55.0)]);
    }

    #[test]
    fn report_serializes_with_page_tag() {
        let report = run(&scenario_table(), &FilterSpec::default(), Page::Inventory, &PageParams::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["page"], "inventory");
        assert_eq!(json["turnover"]["value_columns"][3], "turnover_rate");
    }
}
