use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder};

use rusty_till::data::model::SaleRecord;
use rusty_till::query::result::AggregationResult;

const ROW_HEIGHT: f32 = 18.0;
const MAX_HEIGHT: f32 = 280.0;

/// Key columns followed by metric columns.
pub fn result_table(ui: &mut Ui, id: &str, result: &AggregationResult) {
    let headers: Vec<&str> = result
        .key_columns
        .iter()
        .chain(&result.value_columns)
        .map(String::as_str)
        .collect();

    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(MAX_HEIGHT)
            .columns(Column::auto().at_least(80.0).resizable(true), headers.len())
            .header(ROW_HEIGHT + 4.0, |mut header| {
                for name in &headers {
                    header.col(|ui: &mut Ui| {
                        ui.strong(*name);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, result.rows.len(), |mut row| {
                    let r = &result.rows[row.index()];
                    for key in &r.keys {
                        row.col(|ui: &mut Ui| {
                            ui.label(key.to_string());
                        });
                    }
                    for value in &r.values {
                        row.col(|ui: &mut Ui| {
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                ui.label(value.to_string());
                            });
                        });
                    }
                });
            });
    });
}

const RECORD_HEADERS: [&str; 14] = [
    "Order Date",
    "Category",
    "Sub-Category",
    "Product Name",
    "Region",
    "State",
    "City",
    "Segment",
    "Customer",
    "Sales",
    "Profit",
    "Discount",
    "Quantity",
    "Profit Margin",
];

fn record_cells(record: &SaleRecord) -> [String; 14] {
    [
        record.order_date.format("%Y-%m-%d %H:%M").to_string(),
        record.category.clone(),
        record.subcategory.clone(),
        record.product_name.clone(),
        record.region.clone(),
        record.state.clone(),
        record.city.clone(),
        record.segment.clone(),
        record.customer.clone(),
        format!("{:.2}", record.sales),
        format!("{:.2}", record.profit),
        format!("{:.2}", record.discount),
        record.quantity.to_string(),
        record
            .profit_margin
            .map_or_else(|| "n/a".to_string(), |m| format!("{m:.3}")),
    ]
}

/// Raw rows, as the dataset sample and the ranked product lists show them.
pub fn records_table(ui: &mut Ui, id: &str, records: &[SaleRecord]) {
    ui.push_id(id, |ui: &mut Ui| {
        egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .max_scroll_height(MAX_HEIGHT)
                .columns(Column::auto().resizable(true), RECORD_HEADERS.len())
                .header(ROW_HEIGHT + 4.0, |mut header| {
                    for name in RECORD_HEADERS {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, records.len(), |mut row| {
                        let cells = record_cells(&records[row.index()]);
                        for cell in cells {
                            row.col(|ui: &mut Ui| {
                                ui.label(cell);
                            });
                        }
                    });
                });
        });
    });
}
