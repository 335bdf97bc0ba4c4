use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use rusty_till::data::model::CategoricalField;
use rusty_till::query::pages::Page;

use crate::state::{AppState, SourceChoice};

// ---------------------------------------------------------------------------
// Left side panel – source, page and filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Rusty Till");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            source_selector(ui, state);
            ui.separator();

            // ---- Page selector ----
            ui.strong("Page");
            let mut page = state.page;
            for candidate in Page::ALL {
                ui.radio_value(&mut page, candidate, candidate.title());
            }
            state.set_page(page);
            ui.separator();

            let Some(dataset) = state.dataset.as_ref().map(Arc::clone) else {
                ui.label("No dataset loaded.");
                return;
            };

            ui.heading("Filters");
            date_filter(ui, state);
            ui.separator();

            // ---- Per-column filter widgets (collapsible) ----
            for field in CategoricalField::ALL {
                let Some(all_values) = dataset.unique_values(field) else {
                    continue;
                };

                // An empty selection accepts everything.
                let n_selected = state.filters.accepted(field).map_or(0, |s| s.len());
                let n_total = all_values.len();
                let header_text = if n_selected == 0 {
                    format!("{}  (all {n_total})", field.label())
                } else {
                    format!("{}  ({n_selected}/{n_total})", field.label())
                };

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(field.column_name())
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(field);
                            }
                            if ui.small_button("Clear").clicked() {
                                state.select_none(field);
                            }
                        });

                        for val in all_values {
                            let mut checked = state
                                .filters
                                .accepted(field)
                                .is_some_and(|s| s.contains(val));

                            let mut text = RichText::new(val);
                            if field == CategoricalField::Category {
                                text = text.color(state.category_colors.color_for(val));
                            }

                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(field, val);
                            }
                        }
                    });
            }
        });
}

fn source_selector(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Data source");
    let mut choice = state.source;
    ui.radio_value(&mut choice, SourceChoice::Default, "Default dataset");
    ui.radio_value(&mut choice, SourceChoice::Upload, "Upload file");
    if choice != state.source {
        match choice {
            SourceChoice::Default => state.load_default(),
            SourceChoice::Upload => state.use_upload(),
        }
    }

    ui.horizontal(|ui: &mut Ui| match state.source {
        SourceChoice::Default => {
            if ui.small_button("Reload").clicked() {
                state.reload_default();
            }
        }
        SourceChoice::Upload => {
            if ui.small_button("Choose file…").clicked() {
                open_file_dialog(state);
            }
        }
    });
}

fn date_filter(ui: &mut Ui, state: &mut AppState) {
    let Some(range) = state.date_range() else {
        return;
    };
    let (mut start, mut end) = (range.start, range.end);

    egui::Grid::new("date_range").num_columns(2).show(ui, |ui: &mut Ui| {
        ui.label("Start Date");
        ui.add(DatePickerButton::new(&mut start).id_salt("start_date"));
        ui.end_row();
        ui.label("End Date");
        ui.add(DatePickerButton::new(&mut end).id_salt("end_date"));
        ui.end_row();
    });

    if (start, end) != (range.start, range.end) {
        state.set_date_range(start, end);
    }
    if let Some(err) = &state.filter_error {
        ui.label(RichText::new(err.to_string()).color(Color32::RED));
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.report.is_some(), egui::Button::new("Export report…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!("{} orders loaded", ds.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open sales data")
        .add_filter("Supported files", &["xlsx", "csv"])
        .add_filter("Excel", &["xlsx"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    let Some(path) = file else {
        return;
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match std::fs::read(&path) {
        Ok(bytes) => state.load_upload(file_name, bytes),
        Err(e) => {
            log::error!("Failed to read {}: {e}", path.display());
            state.status_message = Some(format!("Error: cannot read {file_name}: {e}"));
        }
    }
}

fn export_dialog(state: &mut AppState) {
    let file: Option<PathBuf> = rfd::FileDialog::new()
        .set_title("Export report")
        .add_filter("JSON", &["json"])
        .set_file_name("report.json")
        .save_file();

    if let Some(path) = file {
        if let Err(e) = state.export_report(&path) {
            log::error!("Export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
