use eframe::egui;

use rusty_till::config::Config;

use crate::state::AppState;
use crate::ui::{pages, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyTillApp {
    pub state: AppState,
}

impl RustyTillApp {
    pub fn new(config: Config) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for RustyTillApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: source, page, filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        self.state.refresh();

        // ---- Central panel: page ----
        egui::CentralPanel::default().show(ctx, |ui| {
            pages::page_view(ui, &mut self.state);
        });

        // Page controls changed something after the refresh above.
        if self.state.is_dirty() {
            ctx.request_repaint();
        }
    }
}
