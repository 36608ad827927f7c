use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};

use ephys_panda::dsp::peaks::Polarity;

use crate::state::{AppState, PlotView};

// ---------------------------------------------------------------------------
// Left side panel – analysis controls
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Analysis");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            recording_section(ui, state);

            if state.recording().is_none() {
                ui.label("No recording loaded.");
                return;
            }

            filter_section(ui, state);
            artifact_section(ui, state);
            peak_section(ui, state);
            channel_section(ui, state);
            trim_section(ui, state);
        });
}

fn recording_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Recording");
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Sampling rate (Hz)");
        ui.add(
            DragValue::new(&mut state.params.sampling_rate)
                .speed(100.0)
                .range(1.0..=1.0e7),
        );
    });
    if let Some(rec) = state.recording() {
        ui.label(format!(
            "{} samples × {} channels, {:.3} s",
            rec.n_samples(),
            rec.n_channels(),
            rec.duration()
        ));
        ui.label(format!("Rate in use: {} Hz", rec.sampling_rate()));
    }
    ui.separator();
}

fn filter_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Filters").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let f = &mut state.params.filters;
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Order");
                ui.add(DragValue::new(&mut f.order).range(1..=10));
            });

            ui.horizontal(|ui: &mut Ui| {
                ui.add(DragValue::new(&mut f.notch_hz).speed(1.0).suffix(" Hz"));
                ui.add(DragValue::new(&mut f.notch_q).speed(1.0).prefix("Q "));
            });
            let notch = f.notch();
            if ui.button("Apply notch").clicked() {
                state.apply_filter(notch);
            }

            let f = &mut state.params.filters;
            ui.horizontal(|ui: &mut Ui| {
                ui.add(DragValue::new(&mut f.low_pass_hz).speed(1.0).suffix(" Hz"));
            });
            let low_pass = f.low_pass();
            if ui.button("Apply low-pass").clicked() {
                state.apply_filter(low_pass);
            }

            let f = &mut state.params.filters;
            ui.horizontal(|ui: &mut Ui| {
                ui.add(DragValue::new(&mut f.high_pass_hz).speed(0.1).suffix(" Hz"));
            });
            let high_pass = f.high_pass();
            if ui.button("Apply high-pass").clicked() {
                state.apply_filter(high_pass);
            }

            let f = &mut state.params.filters;
            ui.horizontal(|ui: &mut Ui| {
                ui.add(DragValue::new(&mut f.band_low_hz).speed(0.1).suffix(" Hz"));
                ui.label("–");
                ui.add(DragValue::new(&mut f.band_high_hz).speed(1.0).suffix(" Hz"));
            });
            let band_pass = f.band_pass();
            if ui.button("Apply band-pass").clicked() {
                state.apply_filter(band_pass);
            }
        });
}

fn artifact_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Artifacts").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let a = &mut state.params.artifacts;
            egui::Grid::new("artifact_params").show(ui, |ui: &mut Ui| {
                ui.label("Threshold (z)");
                ui.add(DragValue::new(&mut a.threshold).speed(0.1).range(0.0..=100.0));
                ui.end_row();
                ui.label("Segment size");
                ui.add(DragValue::new(&mut a.segment_size).speed(10).range(1..=1_000_000));
                ui.end_row();
                ui.label("Positive penalty");
                ui.add(DragValue::new(&mut a.positive_penalty).speed(0.05).range(0.01..=10.0));
                ui.end_row();
            });
            if ui.button("Detect artifacts").clicked() {
                state.detect_artifacts();
            }
        });
}

fn peak_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Peaks").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let p = &mut state.params.peaks;
            egui::Grid::new("peak_params").show(ui, |ui: &mut Ui| {
                ui.label("Polarity");
                egui::ComboBox::from_id_salt("polarity")
                    .selected_text(format!("{:?}", p.polarity))
                    .show_ui(ui, |ui: &mut Ui| {
                        ui.selectable_value(&mut p.polarity, Polarity::Negative, "Negative");
                        ui.selectable_value(&mut p.polarity, Polarity::Positive, "Positive");
                    });
                ui.end_row();

                ui.label("Height");
                ui.horizontal(|ui: &mut Ui| {
                    let mut enabled = p.height.is_some();
                    ui.checkbox(&mut enabled, "");
                    let mut value = p.height.unwrap_or(50.0);
                    ui.add_enabled(enabled, DragValue::new(&mut value).speed(1.0));
                    p.height = enabled.then_some(value);
                });
                ui.end_row();

                ui.label("Prominence");
                ui.horizontal(|ui: &mut Ui| {
                    let mut enabled = p.prominence.is_some();
                    ui.checkbox(&mut enabled, "");
                    let mut value = p.prominence.unwrap_or(10.0);
                    ui.add_enabled(
                        enabled,
                        DragValue::new(&mut value).speed(1.0).range(0.0..=f64::MAX),
                    );
                    p.prominence = enabled.then_some(value);
                });
                ui.end_row();

                ui.label("Min distance (s)");
                ui.add(DragValue::new(&mut p.min_distance_s).speed(0.01).range(0.0..=60.0));
                ui.end_row();

                ui.label("Window (s)");
                ui.add(DragValue::new(&mut p.window_s).speed(0.005).range(0.0001..=10.0));
                ui.end_row();
            });
            if ui.button("Detect peaks").clicked() {
                state.detect_peaks();
            }
        });
}

fn channel_section(ui: &mut Ui, state: &mut AppState) {
    let Some(rec) = state.recording() else {
        return;
    };
    let channels = rec.channel_mapping().to_vec();
    let peak_counts: Option<Vec<usize>> = rec.peaks().map(|p| p.iter().map(Vec::len).collect());

    let header_text = format!("Channels  ({}/{} shown)", state.shown.len(), channels.len());
    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt("channels")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("Show all").clicked() {
                    state.show_all();
                }
                if ui.small_button("Show none").clicked() {
                    state.show_none();
                }
            });

            for (idx, &id) in channels.iter().enumerate() {
                ui.horizontal(|ui: &mut Ui| {
                    let mut shown = state.shown.contains(&id);
                    let label = RichText::new(format!("Ch {id}")).color(state.colors.color_for(id));
                    if ui.checkbox(&mut shown, label).changed() {
                        ephys_panda::data::selection::toggle(&mut state.shown, id);
                    }
                    let mut marked = state.marked.contains(&id);
                    if ui.checkbox(&mut marked, "mark").changed() {
                        ephys_panda::data::selection::toggle(&mut state.marked, id);
                    }
                    if let Some(counts) = &peak_counts {
                        ui.weak(format!("{} peaks", counts[idx]));
                    }
                });
            }

            ui.add_space(4.0);
            ui.horizontal(|ui: &mut Ui| {
                let any_marked = !state.marked.is_empty();
                if ui.add_enabled(any_marked, egui::Button::new("Delete marked")).clicked() {
                    state.delete_marked();
                }
                if ui.add_enabled(any_marked, egui::Button::new("Keep marked")).clicked() {
                    state.keep_marked();
                }
            });
        });
}

fn trim_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Trim").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("trim_range").show(ui, |ui: &mut Ui| {
                ui.label("Start (s)");
                ui.add(DragValue::new(&mut state.trim_start_s).speed(0.01));
                ui.end_row();
                ui.label("End (s)");
                ui.add(DragValue::new(&mut state.trim_end_s).speed(0.01));
                ui.end_row();
            });
            if ui.button("Trim…").clicked() {
                state.request_trim();
            }
        });
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
            ui.separator();
            let loaded = state.recording().is_some();
            if ui.add_enabled(loaded, egui::Button::new("Export statistics…")).clicked() {
                if let Some(path) = save_dialog("statistics.xlsx") {
                    state.export_statistics(&path);
                }
                ui.close_menu();
            }
            let has_peaks = state.recording().is_some_and(|r| r.peak_set().is_some());
            if ui.add_enabled(has_peaks, egui::Button::new("Export peak events…")).clicked() {
                if let Some(path) = save_dialog("peaks.csv") {
                    state.export_peak_events(&path);
                }
                ui.close_menu();
            }
            if ui.add_enabled(has_peaks, egui::Button::new("Export peak windows…")).clicked() {
                if let Some(path) = save_dialog("peak_windows.csv") {
                    state.export_peak_windows(&path);
                }
                ui.close_menu();
            }
            ui.separator();
            if ui.add_enabled(loaded, egui::Button::new("Clear all…")).clicked() {
                state.confirm_clear = true;
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(path) = &state.loaded_path {
            ui.label(path.display().to_string());
            ui.separator();
        }

        ui.selectable_value(&mut state.view, PlotView::Traces, "Traces");
        ui.selectable_value(&mut state.view, PlotView::AveragePeaks, "Average peaks");

        if let Some(status) = &state.status {
            ui.separator();
            let color = if status.is_error { Color32::RED } else { ui.visuals().text_color() };
            ui.label(RichText::new(&status.text).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// Confirmation dialogs
// ---------------------------------------------------------------------------

pub fn confirmations(ctx: &egui::Context, state: &mut AppState) {
    if let Some((start_s, end_s)) = state.pending_trim {
        egui::Window::new("Confirm trim")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui: &mut Ui| {
                ui.label(format!(
                    "Trim the recording to [{start_s:.3} s, {end_s:.3} s)? This cannot be undone."
                ));
                ui.horizontal(|ui: &mut Ui| {
                    if ui.button("Trim").clicked() {
                        state.confirm_trim();
                    }
                    if ui.button("Cancel").clicked() {
                        state.pending_trim = None;
                    }
                });
            });
    }

    if state.confirm_clear {
        egui::Window::new("Confirm clear")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui: &mut Ui| {
                ui.label("Clear all data and statistics? This cannot be undone.");
                ui.horizontal(|ui: &mut Ui| {
                    if ui.button("Clear").clicked() {
                        state.clear();
                    }
                    if ui.button("Cancel").clicked() {
                        state.confirm_clear = false;
                    }
                });
            });
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open recording")
        .add_filter("Supported files", &AppState::open_extensions()[..])
        .add_filter("NumPy", &["npy"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

fn save_dialog(default_name: &str) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_file_name(default_name)
        .add_filter("CSV", &["csv"])
        .save_file()
}
