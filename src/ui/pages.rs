use eframe::egui::{self, Color32, RichText, Ui};

use rusty_till::query::aggregate::NumericField;
use rusty_till::query::pages::{
    CategoryReport, DiscountReport, InventoryReport, Kpis, MarginReport, OverviewReport, Page, PageReport,
    SampleEnd, TrendGranularity, TrendReport,
};
use rusty_till::query::customer::CustomerSummary;
use rusty_till::query::result::Ranking;

use crate::color::ColorMap;
use crate::state::AppState;
use crate::ui::{charts, tables};

// ---------------------------------------------------------------------------
// Central panel – current page
// ---------------------------------------------------------------------------

pub fn page_view(ui: &mut Ui, state: &mut AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Load a dataset to start  (File → Open…)");
        });
        return;
    }

    ui.heading(state.page.title());
    ui.separator();

    page_controls(ui, state);

    let Some(report) = &state.report else {
        return;
    };
    if report.page() != state.page {
        ui.spinner();
        return;
    }

    let colors = &state.category_colors;
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| match report {
            PageReport::Overview(r) => overview(ui, r),
            PageReport::Category(r) => category(ui, r, colors),
            PageReport::TimeTrend(r) => trend(ui, r),
            PageReport::Customers(r) => customers(ui, r),
            PageReport::Inventory(r) => inventory(ui, r, colors),
            PageReport::ProfitMargin(r) => margin(ui, r, colors),
            PageReport::Discount(r) => discount(ui, r),
        });
}

// ---------------------------------------------------------------------------
// Page-local widgets
// ---------------------------------------------------------------------------

fn ranking_toggle(ui: &mut Ui, ranking: &mut Ranking, k: usize) -> bool {
    let before = *ranking;
    ui.radio_value(ranking, Ranking::Top, Ranking::Top.label(k));
    ui.radio_value(ranking, Ranking::Bottom, Ranking::Bottom.label(k));
    before != *ranking
}

fn page_controls(ui: &mut Ui, state: &mut AppState) {
    let k = state.config.queries.top_k;
    let params = &mut state.params;
    let mut changed = false;

    ui.horizontal(|ui: &mut Ui| match state.page {
        Page::Overview => {
            ui.label("Dataset sample:");
            let before = params.sample;
            ui.radio_value(&mut params.sample, SampleEnd::First, "First rows");
            ui.radio_value(&mut params.sample, SampleEnd::Last, "Last rows");
            changed = before != params.sample;
        }
        Page::TimeTrend => {
            let before = params.granularity;
            ui.radio_value(&mut params.granularity, TrendGranularity::Day, "Day-wise");
            ui.radio_value(&mut params.granularity, TrendGranularity::Hour, "Hour-wise");
            changed = before != params.granularity;

            if params.granularity == TrendGranularity::Hour {
                if let Some(PageReport::TimeTrend(report)) = &state.report {
                    ui.separator();
                    ui.label("Hours:");
                    for hour in &report.available_hours {
                        let mut on = report.selected_hours.contains(hour);
                        if ui.checkbox(&mut on, format!("{hour:02}")).changed() {
                            params.toggle_hour(*hour, &report.selected_hours);
                            changed = true;
                        }
                    }
                }
            }
        }
        Page::Customers => {
            if let Some(PageReport::Customers(report)) = &state.report {
                let current = report
                    .detail
                    .as_ref()
                    .map(|d| d.customer.clone())
                    .unwrap_or_default();
                ui.label("Customer:");
                egui::ComboBox::from_id_salt("customer_select")
                    .selected_text(&current)
                    .height(300.0)
                    .show_ui(ui, |ui: &mut Ui| {
                        for name in &report.customers {
                            if ui.selectable_label(*name == current, name).clicked() {
                                params.customer = Some(name.clone());
                                changed = true;
                            }
                        }
                    });
            }
        }
        Page::Inventory => {
            ui.label("Sort by:");
            egui::ComboBox::from_id_salt("inventory_metric")
                .selected_text(params.inventory_metric.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for field in [NumericField::Sales, NumericField::Profit, NumericField::Quantity] {
                        let before = params.inventory_metric;
                        ui.selectable_value(&mut params.inventory_metric, field, field.label());
                        changed |= before != params.inventory_metric;
                    }
                });
            changed |= ranking_toggle(ui, &mut params.ranking, k);
        }
        Page::ProfitMargin => {
            changed = ranking_toggle(ui, &mut params.ranking, k);
        }
        Page::Category | Page::Discount => {}
    });

    if changed {
        state.mark_dirty();
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

fn kpi_tile(ui: &mut Ui, label: &str, value: String) {
    ui.group(|ui: &mut Ui| {
        ui.vertical(|ui: &mut Ui| {
            ui.label(RichText::new(label).small());
            ui.label(RichText::new(value).heading().strong());
        });
    });
}

fn kpi_row(ui: &mut Ui, kpis: &Kpis) {
    ui.horizontal_wrapped(|ui: &mut Ui| {
        kpi_tile(ui, "Total Sales", format!("${:.2}", kpis.total_sales));
        kpi_tile(ui, "Total Profit", format!("${:.2}", kpis.total_profit));
        kpi_tile(ui, "Total Discount", format!("{:.2}", kpis.total_discount));
        kpi_tile(ui, "Total Quantity", kpis.total_quantity.to_string());
        kpi_tile(ui, "Orders", kpis.rows.to_string());
        kpi_tile(
            ui,
            "Avg Profit Margin",
            kpis.avg_profit_margin_pct
                .value()
                .map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}%")),
        );
    });
}

fn section(ui: &mut Ui, title: &str) {
    ui.add_space(8.0);
    ui.label(RichText::new(title).strong().size(16.0));
}

fn overview(ui: &mut Ui, r: &OverviewReport) {
    kpi_row(ui, &r.kpis);

    ui.columns(2, |cols| {
        section(&mut cols[0], "Sales by Region");
        charts::bar_chart(&mut cols[0], "region_sales", &r.sales_by_region, "sales", None);
        section(&mut cols[1], "Profit Margin by Region");
        charts::bar_chart(&mut cols[1], "region_margin", &r.margin_by_region, "profit_margin", None);
    });

    let title = match r.sample_end {
        SampleEnd::First => "First rows",
        SampleEnd::Last => "Last rows",
    };
    section(ui, title);
    tables::records_table(ui, "overview_sample", &r.sample);
}

fn category(ui: &mut Ui, r: &CategoryReport, colors: &ColorMap) {
    ui.columns(2, |cols| {
        section(&mut cols[0], "Sales by Category");
        charts::bar_chart(&mut cols[0], "cat_sales", &r.sales_profit, "sales", Some(colors));
        section(&mut cols[1], "Profit by Category");
        charts::bar_chart(&mut cols[1], "cat_profit", &r.sales_profit, "profit", Some(colors));
    });

    section(ui, "Sales vs Profit by Category");
    charts::scatter(ui, "cat_sales_profit", &r.sales_profit, "sales", "profit", colors);

    section(ui, "Yearly Sales by Category");
    charts::grouped_bar_chart(ui, "cat_yearly", &r.yearly, "sales", colors);

    section(ui, "Products");
    tables::result_table(ui, "cat_products", &r.product_margin);
}

fn trend(ui: &mut Ui, r: &TrendReport) {
    ui.horizontal(|ui: &mut Ui| {
        kpi_tile(ui, "Total Sales", format!("${:.2}", r.total_sales));
        if r.granularity == TrendGranularity::Hour {
            kpi_tile(ui, "Sales in Selected Hours", format!("${:.2}", r.selected_total));
        }
    });

    match r.granularity {
        TrendGranularity::Day => {
            section(ui, "Daily Sales");
            charts::line_chart(ui, "trend_day", &r.series, &["sales"]);
        }
        TrendGranularity::Hour => {
            section(ui, "Hourly Sales");
            charts::bar_chart(ui, "trend_hour", &r.series, "sales", None);
        }
    }
    tables::result_table(ui, "trend_table", &r.series);
}

fn customers(ui: &mut Ui, r: &CustomerSummary) {
    kpi_tile(ui, "Distinct Customers", r.distinct_customers.to_string());

    section(ui, "Top Customers by Profit");
    charts::bar_chart(ui, "top_customers", &r.top_customers, "profit", None);

    let Some(detail) = &r.detail else {
        ui.label("No customers in the current selection.");
        return;
    };
    section(ui, &format!("Purchases of {}", detail.customer));
    ui.columns(2, |cols| {
        charts::bar_chart(&mut cols[0], "customer_products", &detail.sales_by_product, "sales", None);
        charts::line_chart(&mut cols[1], "customer_timeline", &detail.sales_over_time, &["sales"]);
    });
    tables::records_table(ui, "customer_purchases", &detail.purchases);
}

fn inventory(ui: &mut Ui, r: &InventoryReport, colors: &ColorMap) {
    section(ui, &format!("{} Products by {}", r.ranking.label(r.k), r.metric.label()));
    tables::records_table(ui, "inventory_products", &r.products);

    section(ui, "Turnover Rate by Category");
    charts::bar_chart(ui, "turnover", &r.turnover, "turnover_rate", Some(colors));
    ui.columns(2, |cols| {
        section(&mut cols[0], "Quantity vs Sales");
        charts::scatter(&mut cols[0], "turnover_sales", &r.turnover, "quantity", "sales", colors);
        section(&mut cols[1], "Quantity vs Profit");
        charts::scatter(&mut cols[1], "turnover_profit", &r.turnover, "quantity", "profit", colors);
    });
    tables::result_table(ui, "turnover_table", &r.turnover);
}

fn margin(ui: &mut Ui, r: &MarginReport, colors: &ColorMap) {
    section(ui, &format!("{} Products by Profit Margin", r.ranking.label(r.k)));
    tables::result_table(ui, "margin_ranked", &r.ranked_products);

    ui.columns(2, |cols| {
        section(&mut cols[0], "Profit Margin vs Sales");
        charts::scatter(&mut cols[0], "margin_sales", &r.product_margin, "profit_margin", "sales", colors);
        section(&mut cols[1], "Profit Margin vs Profit");
        charts::scatter(&mut cols[1], "margin_profit", &r.product_margin, "profit_margin", "profit", colors);
    });

    section(ui, "Yearly Profit by Category");
    charts::grouped_bar_chart(ui, "margin_yearly", &r.yearly, "profit", colors);

    section(ui, "All Products");
    tables::result_table(ui, "margin_products", &r.product_margin);
}

fn discount(ui: &mut Ui, r: &DiscountReport) {
    section(ui, "Sales and Profit by Discount");
    charts::line_chart(ui, "discount_overall", &r.overall, &["sales", "profit"]);

    section(ui, "Discount vs Profit Margin");
    if r.points.iter().all(|p| !p.profit_margin.is_defined()) {
        ui.label(RichText::new("No orders with a defined margin.").color(Color32::GRAY));
    }
    charts::discount_scatter(ui, "discount_scatter", &r.points);

    section(ui, "Sales and Profit by Discount Range");
    ui.columns(2, |cols| {
        charts::bar_chart(&mut cols[0], "range_sales", &r.by_range, "sales", None);
        charts::bar_chart(&mut cols[1], "range_profit", &r.by_range, "profit", None);
    });

    section(ui, "Profit Margin by Product and Discount");
    tables::result_table(ui, "discount_products", &r.by_product);
}
