use std::fmt;

use crate::data::edit::{delete_channels, keep_channels, time_range_to_indices, trim};
use crate::data::model::{ChannelId, RawRecording, Recording};
use crate::dsp::artifact::{ArtifactParams, detect_artifacts_all_channels};
use crate::dsp::filter::{FilterSpec, apply_filter};
use crate::dsp::peaks::{PeakParams, detect_peaks};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Every edit a user can make to the analysis state.
#[derive(Debug, Clone)]
pub enum Command {
    Load(RawRecording),
    Clear,
    ApplyFilter(FilterSpec),
    DetectArtifacts(ArtifactParams),
    DetectPeaks(PeakParams),
    DeleteChannels(Vec<ChannelId>),
    KeepChannels(Vec<ChannelId>),
    /// Keep samples `[start, end)`.
    Trim { start: usize, end: usize },
    /// Keep samples whose time lies in `[start_s, end_s)`.
    TrimTime { start_s: f64, end_s: f64 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Load(_) => "load",
            Command::Clear => "clear",
            Command::ApplyFilter(_) => "filter",
            Command::DetectArtifacts(_) => "detect artifacts",
            Command::DetectPeaks(_) => "detect peaks",
            Command::DeleteChannels(_) => "delete channels",
            Command::KeepChannels(_) => "keep channels",
            Command::Trim { .. } | Command::TrimTime { .. } => "trim",
        }
    }
}

/// Summary of what a successful command changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Loaded { samples: usize, channels: usize },
    Cleared,
    Filtered { label: String },
    ArtifactsDetected { flagged_samples: usize },
    PeaksDetected { total: usize, window_size: usize },
    ChannelsRemoved { removed: usize, remaining: usize },
    Trimmed { start: usize, end: usize },
    /// Nothing to do, e.g. an empty channel list.
    Unchanged,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Loaded { samples, channels } => {
                write!(f, "Loaded {samples} samples × {channels} channels")
            }
            CommandOutcome::Cleared => write!(f, "All data cleared"),
            CommandOutcome::Filtered { label } => write!(f, "Applied {label}"),
            CommandOutcome::ArtifactsDetected { flagged_samples } => {
                write!(f, "Flagged {flagged_samples} artifact samples")
            }
            CommandOutcome::PeaksDetected { total, window_size } => {
                write!(f, "Detected {total} peaks (window {window_size} samples)")
            }
            CommandOutcome::ChannelsRemoved { removed, remaining } => {
                write!(f, "Removed {removed} channel(s), {remaining} remaining")
            }
            CommandOutcome::Trimmed { start, end } => {
                write!(f, "Trimmed to samples [{start}, {end})")
            }
            CommandOutcome::Unchanged => write!(f, "Nothing to do"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// How a command changes the stored recording.
enum Transition {
    Keep,
    Replace(Recording),
    Clear,
}

/// Owner of the analysis state. All edits go through [`Session::apply`].
///
/// A command computes a complete replacement [`Recording`] and only then
/// swaps it in, so an error leaves the previous state intact.
#[derive(Debug, Default)]
pub struct Session {
    recording: Option<Recording>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.recording.is_some()
    }

    fn loaded(&self) -> Result<&Recording> {
        self.recording.as_ref().ok_or(AnalysisError::NotLoaded)
    }

    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome> {
        let name = command.name();
        match self.execute(command) {
            Ok((transition, outcome)) => {
                match transition {
                    Transition::Keep => {}
                    Transition::Replace(next) => self.recording = Some(next),
                    Transition::Clear => self.recording = None,
                }
                log::info!("{name}: {outcome}");
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("{name} failed: {e}");
                Err(e)
            }
        }
    }

    /// Compute the replacement state without touching `self`.
    fn execute(&self, command: Command) -> Result<(Transition, CommandOutcome)> {
        let (next, outcome) = match command {
            Command::Load(raw) => {
                let recording = Recording::new(raw)?;
                let outcome = CommandOutcome::Loaded {
                    samples: recording.n_samples(),
                    channels: recording.n_channels(),
                };
                (recording, outcome)
            }
            Command::Clear => return Ok((Transition::Clear, CommandOutcome::Cleared)),
            Command::ApplyFilter(spec) => {
                let current = self.loaded()?;
                let filtered = apply_filter(current.data(), current.sampling_rate(), &spec)?;
                (current.with_data(filtered)?, CommandOutcome::Filtered { label: spec.label() })
            }
            Command::DetectArtifacts(params) => {
                let current = self.loaded()?;
                let mask = detect_artifacts_all_channels(current.data(), &params)?;
                let flagged_samples = mask.iter().filter(|&&f| f).count();
                let outcome = CommandOutcome::ArtifactsDetected { flagged_samples };
                (current.with_artifacts(mask)?, outcome)
            }
            Command::DetectPeaks(params) => {
                let current = self.loaded()?;
                let peaks = detect_peaks(current.data(), current.sampling_rate(), &params)?;
                let next = current.with_peaks(peaks, params.window_size)?;
                let total = next.peak_set().map_or(0, |set| set.total());
                (next, CommandOutcome::PeaksDetected { total, window_size: params.window_size })
            }
            Command::DeleteChannels(ids) | Command::KeepChannels(ids) if ids.is_empty() => {
                self.loaded()?;
                return Ok((Transition::Keep, CommandOutcome::Unchanged));
            }
            Command::DeleteChannels(ids) => {
                let current = self.loaded()?;
                let next = delete_channels(current, &ids)?;
                let outcome = CommandOutcome::ChannelsRemoved {
                    removed: current.n_channels() - next.n_channels(),
                    remaining: next.n_channels(),
                };
                (next, outcome)
            }
            Command::KeepChannels(ids) => {
                let current = self.loaded()?;
                let next = keep_channels(current, &ids)?;
                let outcome = CommandOutcome::ChannelsRemoved {
                    removed: current.n_channels() - next.n_channels(),
                    remaining: next.n_channels(),
                };
                (next, outcome)
            }
            Command::Trim { start, end } => {
                let current = self.loaded()?;
                (trim(current, start, end)?, CommandOutcome::Trimmed { start, end })
            }
            Command::TrimTime { start_s, end_s } => {
                let current = self.loaded()?;
                let (start, end) = time_range_to_indices(current, start_s, end_s)?;
                (trim(current, start, end)?, CommandOutcome::Trimmed { start, end })
            }
        };
        Ok((Transition::Replace(next), outcome))
    }
}
