use eframe::egui;

use ephys_panda::AnalysisConfig;

use crate::state::AppState;
use crate::ui::{panels, plot, stats};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct EphysPandaApp {
    pub state: AppState,
}

impl EphysPandaApp {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for EphysPandaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: analysis controls ----
        egui::SidePanel::left("control_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: statistics ----
        egui::TopBottomPanel::bottom("statistics_panel")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                egui::ScrollArea::both().show(ui, |ui| {
                    stats::statistics_panel(ui, &self.state);
                });
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::central_plot(ui, &self.state);
        });

        panels::confirmations(ctx, &mut self.state);
    }
}
