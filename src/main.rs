mod app;
mod color;
mod state;
mod ui;

use anyhow::{Result, anyhow};
use app::RustyTillApp;
use eframe::egui;
use rusty_till::config::Config;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::discover()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Till – Point of Sale Analysis",
        options,
        Box::new(|_cc| Ok(Box::new(RustyTillApp::new(config)))),
    )
    .map_err(|e| anyhow!("{e}"))
}
