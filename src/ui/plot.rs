use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points};

use ephys_panda::Recording;
use ephys_panda::data::selection::visible_indices;
use ephys_panda::dsp::window::window_std;

use crate::state::{AppState, PlotView};

/// Upper bound on vertices per trace; longer channels are decimated by stride.
const MAX_POINTS_PER_TRACE: usize = 20_000;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the plot in the central panel.
pub fn central_plot(ui: &mut Ui, state: &AppState) {
    let rec = match state.recording() {
        Some(rec) => rec,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open a file to view a recording  (File → Open…)");
            });
            return;
        }
    };

    let channels = visible_indices(rec, &state.shown);
    if channels.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("No channels selected.");
        });
        return;
    }

    match state.view {
        PlotView::Traces => trace_plot(ui, state, rec, &channels),
        PlotView::AveragePeaks => average_plot(ui, state, rec, &channels),
    }
}

fn trace_plot(ui: &mut Ui, state: &AppState, rec: &Recording, channels: &[usize]) {
    let time = rec.time();
    let stride = (rec.n_samples() / MAX_POINTS_PER_TRACE).max(1);

    Plot::new("trace_plot")
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label("Voltage")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for &idx in channels {
                let id = rec.channel_mapping()[idx];
                let color = state.colors.color_for(id);
                let column = rec.data().column(idx);

                let points: PlotPoints = (0..rec.n_samples())
                    .step_by(stride)
                    .map(|i| [time[i], column[i]])
                    .collect();
                plot_ui.line(Line::new(points).name(format!("Ch {id}")).color(color).width(1.0));

                if let Some(mask) = rec.artifacts() {
                    let flagged: Vec<[f64; 2]> = mask
                        .column(idx)
                        .iter()
                        .enumerate()
                        .filter(|(_, &f)| f)
                        .step_by(stride)
                        .map(|(i, _)| [time[i], column[i]])
                        .collect();
                    if !flagged.is_empty() {
                        plot_ui.points(
                            Points::new(flagged)
                                .name(format!("Ch {id} artifacts"))
                                .color(Color32::RED)
                                .radius(1.5),
                        );
                    }
                }

                if let Some(peaks) = rec.peaks() {
                    let markers: Vec<[f64; 2]> =
                        peaks[idx].iter().map(|&p| [time[p], column[p]]).collect();
                    plot_ui.points(
                        Points::new(markers)
                            .name(format!("Ch {id} peaks"))
                            .shape(MarkerShape::Diamond)
                            .color(color)
                            .radius(4.0),
                    );
                }
            }
        });
}

fn average_plot(ui: &mut Ui, state: &AppState, rec: &Recording, channels: &[usize]) {
    let Some(set) = rec.peak_set() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("Detect peaks to see average waveforms.");
        });
        return;
    };

    // Offsets in ms relative to the peak at column window_size / 2.
    let half = (set.window_size() / 2) as f64;
    let ms_per_sample = 1000.0 / rec.sampling_rate();
    let offset = |k: usize| (k as f64 - half) * ms_per_sample;

    Plot::new("average_plot")
        .legend(Legend::default())
        .x_axis_label("Time from peak (ms)")
        .y_axis_label("Voltage")
        .show(ui, |plot_ui| {
            for &idx in channels {
                let Some(avg) = &set.averages()[idx] else {
                    continue;
                };
                let id = rec.channel_mapping()[idx];
                let color = state.colors.color_for(id);
                let n = set.peaks()[idx].len();

                let mean: PlotPoints =
                    avg.iter().enumerate().map(|(k, &v)| [offset(k), v]).collect();
                plot_ui.line(
                    Line::new(mean)
                        .name(format!("Ch {id} (n={n})"))
                        .color(color)
                        .width(2.0),
                );

                if let Some(std) = window_std(&set.windows()[idx]) {
                    let faded = color.gamma_multiply(0.4);
                    for sign in [1.0, -1.0] {
                        let band: PlotPoints = avg
                            .iter()
                            .zip(std.iter())
                            .enumerate()
                            .map(|(k, (&m, &s))| [offset(k), m + sign * s])
                            .collect();
                        plot_ui.line(Line::new(band).color(faded).width(1.0));
                    }
                }
            }
        });
}
