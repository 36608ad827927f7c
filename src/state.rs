use std::path::{Path, PathBuf};

use ephys_panda::data::export;
use ephys_panda::data::loader::{self, Loader};
use ephys_panda::data::selection::{self, ChannelSelection};
use ephys_panda::dsp::filter::FilterSpec;
use ephys_panda::{AnalysisConfig, AnalysisError, Command, CommandOutcome, Recording, Session};

use crate::color::ChannelColors;

/// What the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotView {
    #[default]
    Traces,
    AveragePeaks,
}

/// Message shown in the top bar after the last action.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Recording and everything derived from it.
    pub session: Session,

    /// Loader with any registered container readers.
    pub loader: Loader,

    /// Editable parameters, seeded from the config file.
    pub params: AnalysisConfig,

    /// Channels drawn in the plot.
    pub shown: ChannelSelection,

    /// Channels ticked for delete / keep.
    pub marked: ChannelSelection,

    pub colors: ChannelColors,

    pub view: PlotView,

    /// Trim range in seconds, as typed in the side panel.
    pub trim_start_s: f64,
    pub trim_end_s: f64,

    /// Trim waiting for confirmation, in seconds.
    pub pending_trim: Option<(f64, f64)>,

    pub confirm_clear: bool,

    pub loaded_path: Option<PathBuf>,

    pub status: Option<Status>,
}

impl AppState {
    pub fn new(params: AnalysisConfig) -> Self {
        Self {
            session: Session::new(),
            loader: Loader::new(),
            params,
            shown: ChannelSelection::new(),
            marked: ChannelSelection::new(),
            colors: ChannelColors::default(),
            view: PlotView::default(),
            trim_start_s: 0.0,
            trim_end_s: 0.0,
            pending_trim: None,
            confirm_clear: false,
            loaded_path: None,
            status: None,
        }
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.session.recording()
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(Status { text: text.into(), is_error: false });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::error!("{text}");
        self.status = Some(Status { text, is_error: true });
    }

    /// Apply a command and keep the view state in step with the result.
    pub fn run(&mut self, command: Command) -> bool {
        let is_load = matches!(command, Command::Load(_));
        match self.session.apply(command) {
            Ok(outcome) => {
                self.after(&outcome, is_load);
                self.set_info(outcome.to_string());
                true
            }
            Err(e) => {
                self.set_error(format!("Error: {e}"));
                false
            }
        }
    }

    fn after(&mut self, outcome: &CommandOutcome, is_load: bool) {
        match (outcome, self.session.recording()) {
            (CommandOutcome::Cleared, _) | (_, None) => {
                self.shown.clear();
                self.marked.clear();
                self.colors = ChannelColors::default();
                self.loaded_path = None;
            }
            (_, Some(rec)) if is_load => {
                self.shown = selection::init_selection(rec, self.params.select_all_channels);
                self.marked.clear();
                self.colors = ChannelColors::new(rec.channel_mapping());
                self.trim_start_s = rec.time().first().copied().unwrap_or(0.0);
                self.trim_end_s = rec.time().last().copied().unwrap_or(0.0);
            }
            (_, Some(rec)) => {
                selection::prune(&mut self.shown, rec);
                selection::prune(&mut self.marked, rec);
            }
        }
    }

    // -- file operations --

    pub fn load_path(&mut self, path: &Path) {
        let raw = self
            .loader
            .load(path)
            .and_then(|loaded| Ok(loaded.into_raw(self.params.sampling_rate)?));
        match raw {
            Ok(raw) => {
                if self.run(Command::Load(raw)) {
                    self.loaded_path = Some(path.to_path_buf());
                }
            }
            Err(e) => self.set_error(format!("Failed to load file: {e:#}")),
        }
    }

    pub fn export_statistics(&mut self, target: &Path) {
        let Some(rec) = self.session.recording() else {
            return self.set_error(AnalysisError::NotLoaded.to_string());
        };
        match export::export_statistics(rec, target) {
            Ok(paths) if paths.peak_statistics.is_none() => self.set_info(format!(
                "No peak statistics available. Only channel statistics saved to {}",
                paths.channel_statistics.display()
            )),
            Ok(paths) => self.set_info(format!(
                "Statistics saved to {}",
                paths.channel_statistics.display()
            )),
            Err(e) => self.set_error(format!("Export failed: {e:#}")),
        }
    }

    pub fn export_peak_events(&mut self, path: &Path) {
        let Some(rec) = self.session.recording() else {
            return self.set_error(AnalysisError::NotLoaded.to_string());
        };
        match export::export_peak_events(rec, path) {
            Ok(rows) => self.set_info(format!("Saved {rows} peaks to {}", path.display())),
            Err(e) => self.set_error(format!("Export failed: {e:#}")),
        }
    }

    pub fn export_peak_windows(&mut self, path: &Path) {
        let Some(rec) = self.session.recording() else {
            return self.set_error(AnalysisError::NotLoaded.to_string());
        };
        match export::export_peak_windows(rec, path) {
            Ok(rows) => self.set_info(format!("Saved {rows} peak windows to {}", path.display())),
            Err(e) => self.set_error(format!("Export failed: {e:#}")),
        }
    }

    // -- analysis --

    pub fn apply_filter(&mut self, spec: FilterSpec) {
        self.run(Command::ApplyFilter(spec));
    }

    pub fn detect_artifacts(&mut self) {
        self.run(Command::DetectArtifacts(self.params.artifacts));
    }

    pub fn detect_peaks(&mut self) {
        let Some(rate) = self.recording().map(Recording::sampling_rate) else {
            return self.set_error(AnalysisError::NotLoaded.to_string());
        };
        self.run(Command::DetectPeaks(self.params.peak_params(rate)));
    }

    // -- channel editing --

    pub fn delete_marked(&mut self) {
        let ids = self.marked.iter().copied().collect();
        self.run(Command::DeleteChannels(ids));
    }

    pub fn keep_marked(&mut self) {
        let ids = self.marked.iter().copied().collect();
        self.run(Command::KeepChannels(ids));
    }

    pub fn show_all(&mut self) {
        if let Some(rec) = self.session.recording() {
            self.shown = selection::init_selection(rec, true);
        }
    }

    pub fn show_none(&mut self) {
        self.shown.clear();
    }

    // -- trim --

    pub fn request_trim(&mut self) {
        self.pending_trim = Some((self.trim_start_s, self.trim_end_s));
    }

    pub fn confirm_trim(&mut self) {
        if let Some((start_s, end_s)) = self.pending_trim.take() {
            self.run(Command::TrimTime { start_s, end_s });
        }
    }

    pub fn clear(&mut self) {
        self.confirm_clear = false;
        self.run(Command::Clear);
    }

    /// Supported extensions for the open dialog.
    pub fn open_extensions() -> Vec<&'static str> {
        let mut exts = vec!["npy", "csv", "parquet", "pq"];
        exts.extend_from_slice(loader::CONTAINER_EXTENSIONS);
        exts
    }
}
