mod app;
mod color;
mod state;
mod ui;

use app::EphysPandaApp;
use eframe::egui;
use ephys_panda::AnalysisConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = match AnalysisConfig::path_from(std::env::args().skip(1)) {
        Some(path) => AnalysisConfig::load(&path).unwrap_or_else(|e| {
            log::error!("Invalid config, falling back to defaults: {e:#}");
            AnalysisConfig::default()
        }),
        None => AnalysisConfig::default(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Ephys Panda – Electrophysiology Analyzer",
        options,
        Box::new(move |_cc| Ok(Box::new(EphysPandaApp::new(config)))),
    )
}
