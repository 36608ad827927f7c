use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::artifact::ArtifactParams;
use crate::dsp::filter::{DEFAULT_NOTCH_Q, DEFAULT_ORDER, FilterSpec};
use crate::dsp::peaks::{DEFAULT_WINDOW_S, PeakParams, Polarity, window_size_for};
use crate::error::{AnalysisError, ensure_positive};

/// Environment variable naming a config file when none is given on the
/// command line.
pub const CONFIG_ENV: &str = "EPHYS_PANDA_CONFIG";

/// Default cutoffs for the four filter buttons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    pub notch_hz: f64,
    pub notch_q: f64,
    pub low_pass_hz: f64,
    pub high_pass_hz: f64,
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    pub order: usize,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            notch_hz: 50.0,
            notch_q: DEFAULT_NOTCH_Q,
            low_pass_hz: 100.0,
            high_pass_hz: 1.0,
            band_low_hz: 0.5,
            band_high_hz: 50.0,
            order: DEFAULT_ORDER,
        }
    }
}

impl FilterDefaults {
    pub fn notch(&self) -> FilterSpec {
        FilterSpec::Notch { center_hz: self.notch_hz, quality: self.notch_q }
    }

    pub fn low_pass(&self) -> FilterSpec {
        FilterSpec::LowPass { cutoff_hz: self.low_pass_hz, order: self.order }
    }

    pub fn high_pass(&self) -> FilterSpec {
        FilterSpec::HighPass { cutoff_hz: self.high_pass_hz, order: self.order }
    }

    pub fn band_pass(&self) -> FilterSpec {
        FilterSpec::BandPass {
            low_hz: self.band_low_hz,
            high_hz: self.band_high_hz,
            order: self.order,
        }
    }
}

/// Peak detection defaults. The window is given in seconds here and turned
/// into an even sample count once the sampling rate is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDefaults {
    pub polarity: Polarity,
    pub height: Option<f64>,
    pub prominence: Option<f64>,
    pub min_distance_s: f64,
    pub window_s: f64,
}

impl Default for PeakDefaults {
    fn default() -> Self {
        Self {
            polarity: Polarity::Negative,
            height: Some(50.0),
            prominence: None,
            min_distance_s: 0.5,
            window_s: DEFAULT_WINDOW_S,
        }
    }
}

/// Startup settings for the analysis tool. Every field may be omitted from
/// the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Used for formats that do not store a sampling rate.
    pub sampling_rate: f64,
    pub filters: FilterDefaults,
    pub artifacts: ArtifactParams,
    pub peaks: PeakDefaults,
    /// Plot every channel after a load instead of only the first.
    pub select_all_channels: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 20_000.0,
            filters: FilterDefaults::default(),
            artifacts: ArtifactParams::default(),
            peaks: PeakDefaults::default(),
            select_all_channels: false,
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Config path from the first CLI argument, else from [`CONFIG_ENV`].
    pub fn path_from(mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
        args.next()
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing config {}", path.display()))
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        ensure_positive("sampling rate", self.sampling_rate)?;
        ensure_positive("notch Q", self.filters.notch_q)?;
        if self.filters.order == 0 {
            return Err(AnalysisError::InvalidParameter("filter order must be at least 1".into()));
        }
        for (name, hz) in [
            ("notch frequency", self.filters.notch_hz),
            ("low-pass cutoff", self.filters.low_pass_hz),
            ("high-pass cutoff", self.filters.high_pass_hz),
            ("band-pass low cutoff", self.filters.band_low_hz),
            ("band-pass high cutoff", self.filters.band_high_hz),
        ] {
            ensure_positive(name, hz)?;
        }
        if self.filters.band_low_hz >= self.filters.band_high_hz {
            return Err(AnalysisError::InvalidParameter(format!(
                "band-pass low cutoff {} must be below the high cutoff {}",
                self.filters.band_low_hz, self.filters.band_high_hz
            )));
        }
        self.artifacts.validate()?;
        ensure_positive("peak window", self.peaks.window_s)?;
        self.peak_params(self.sampling_rate).validate(self.sampling_rate)
    }

    /// Peak parameters for a recording at `sampling_rate`.
    pub fn peak_params(&self, sampling_rate: f64) -> PeakParams {
        PeakParams {
            polarity: self.peaks.polarity,
            min_distance_s: self.peaks.min_distance_s,
            height: self.peaks.height,
            prominence: self.peaks.prominence,
            window_size: window_size_for(self.peaks.window_s, sampling_rate),
        }
    }
}
