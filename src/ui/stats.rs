use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

const ROW_HEIGHT: f32 = 18.0;

/// Render channel and peak statistics tables side by side.
pub fn statistics_panel(ui: &mut Ui, state: &AppState) {
    let Some(rec) = state.recording() else {
        ui.label("No statistics available.");
        return;
    };

    ui.columns(2, |cols| {
        cols[0].strong("Channel statistics");
        cols[0].push_id("channel_statistics", |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto())
                .columns(Column::remainder(), 2)
                .header(ROW_HEIGHT, |mut header| {
                    for title in ["Channel", "Mean", "Std"] {
                        header.col(|ui| {
                            ui.strong(title);
                        });
                    }
                })
                .body(|mut body| {
                    for s in rec.channel_statistics() {
                        body.row(ROW_HEIGHT, |mut row| {
                            row.col(|ui| {
                                ui.label(s.channel.to_string());
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.2}", s.mean));
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.2}", s.std));
                            });
                        });
                    }
                });
        });

        cols[1].strong("Peak statistics");
        let Some(peak_stats) = rec.peak_statistics() else {
            cols[1].label("Detect peaks to compute peak statistics.");
            return;
        };
        cols[1].push_id("peak_statistics", |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto())
                .columns(Column::auto().at_least(60.0), 8)
                .header(ROW_HEIGHT, |mut header| {
                    for title in [
                        "Channel",
                        "Peaks",
                        "Freq (Hz)",
                        "Avg amp",
                        "Std amp",
                        "Mean IPD",
                        "Std IPD",
                        "Mean IPI (ms)",
                        "Std IPI (ms)",
                    ] {
                        header.col(|ui| {
                            ui.strong(title);
                        });
                    }
                })
                .body(|mut body| {
                    for s in peak_stats {
                        body.row(ROW_HEIGHT, |mut row| {
                            let cells = [
                                s.channel.to_string(),
                                s.num_peaks.to_string(),
                                format!("{:.2}", s.frequency),
                                format!("{:.2}", s.avg_amplitude),
                                format!("{:.2}", s.std_amplitude),
                                format!("{:.2}", s.mean_inter_peak_distance),
                                format!("{:.2}", s.std_inter_peak_distance),
                                format!("{:.2}", s.mean_inter_peak_time * 1000.0),
                                format!("{:.2}", s.std_inter_peak_time * 1000.0),
                            ];
                            for cell in cells {
                                row.col(|ui| {
                                    ui.label(cell);
                                });
                            }
                        });
                    }
                });
        });
    });
}
