use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result, ensure_positive};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Which direction of deflection counts as an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    /// Spikes in extracellular recordings are usually negative-going.
    #[default]
    Negative,
}

impl Polarity {
    fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    pub polarity: Polarity,
    /// Minimum spacing between retained peaks, in seconds.
    pub min_distance_s: f64,
    /// Minimum height of the oriented signal (so a negative-polarity height of
    /// 50 keeps samples at or below -50).
    pub height: Option<f64>,
    pub prominence: Option<f64>,
    /// Width of the waveform window cut around each peak, in samples. Even.
    pub window_size: usize,
}

impl PeakParams {
    /// Defaults for a recording sampled at `sampling_rate`.
    pub fn for_rate(sampling_rate: f64) -> Self {
        Self {
            polarity: Polarity::Negative,
            min_distance_s: 0.5,
            height: Some(50.0),
            prominence: None,
            window_size: default_window_size(sampling_rate),
        }
    }

    pub fn distance_samples(&self, sampling_rate: f64) -> usize {
        (self.min_distance_s * sampling_rate).round() as usize
    }

    /// Samples kept clear at each boundary so every peak yields a full window.
    pub fn edge_padding(&self) -> usize {
        self.window_size / 2
    }

    pub fn validate(&self, sampling_rate: f64) -> Result<()> {
        ensure_positive("sampling rate", sampling_rate)?;
        if !self.min_distance_s.is_finite() || self.min_distance_s < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "minimum peak distance must be a non-negative number of seconds, got {}",
                self.min_distance_s
            )));
        }
        if let Some(height) = self.height {
            if !height.is_finite() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "peak height threshold must be finite, got {height}"
                )));
            }
        }
        if let Some(prominence) = self.prominence {
            if !prominence.is_finite() || prominence < 0.0 {
                return Err(AnalysisError::InvalidParameter(format!(
                    "peak prominence must be a non-negative number, got {prominence}"
                )));
            }
        }
        validate_window_size(self.window_size)
    }
}

pub const DEFAULT_WINDOW_S: f64 = 0.1;

/// `seconds` worth of samples, rounded to the nearest even count (at least 2).
pub fn window_size_for(seconds: f64, sampling_rate: f64) -> usize {
    let half = (0.5 * seconds * sampling_rate).round().max(1.0) as usize;
    half * 2
}

pub fn default_window_size(sampling_rate: f64) -> usize {
    window_size_for(DEFAULT_WINDOW_S, sampling_rate)
}

pub fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size < 2 || window_size % 2 != 0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "window size must be an even number of samples >= 2, got {window_size}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Peak finding on an oriented signal
// ---------------------------------------------------------------------------

/// Indices of local maxima. A flat plateau counts once, at its midpoint.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of a peak above the higher of the two lowest points reachable on
/// either side before the signal rises above the peak again.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let value = x[peak];

    let mut left_min = value;
    for &v in x[..peak].iter().rev() {
        if v > value {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = value;
    for &v in &x[peak + 1..] {
        if v > value {
            break;
        }
        right_min = right_min.min(v);
    }

    value - left_min.max(right_min)
}

/// Keep the tallest peaks first, dropping any neighbour within `distance`
/// samples of an already kept one. Output stays sorted.
pub fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let n = peaks.len();
    let mut keep = vec![true; n];

    let mut priority: Vec<usize> = (0..n).collect();
    priority.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &i in priority.iter().rev() {
        if !keep[i] {
            continue;
        }
        let mut k = i;
        while k > 0 && peaks[i] - peaks[k - 1] <= distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = i + 1;
        while k < n && peaks[k] - peaks[i] <= distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Peaks of an oriented signal, after height, distance, prominence and
/// edge constraints.
pub fn find_peaks(
    x: &[f64],
    distance: usize,
    height: Option<f64>,
    min_prominence: Option<f64>,
    edge_padding: usize,
) -> Vec<usize> {
    let mut peaks = local_maxima(x);

    if let Some(h) = height {
        peaks.retain(|&p| x[p] >= h);
    }
    if distance > 0 && peaks.len() > 1 {
        peaks = select_by_distance(x, &peaks, distance);
    }
    if let Some(min) = min_prominence {
        peaks.retain(|&p| prominence(x, p) >= min);
    }

    let n = x.len();
    peaks.retain(|&p| p >= edge_padding && p + edge_padding < n);
    peaks
}

// ---------------------------------------------------------------------------
// Recording-level detection
// ---------------------------------------------------------------------------

pub fn detect_channel_peaks(
    channel: ArrayView1<'_, f64>,
    sampling_rate: f64,
    params: &PeakParams,
) -> Vec<usize> {
    let sign = params.polarity.sign();
    let oriented: Vec<f64> = channel.iter().map(|v| sign * v).collect();
    find_peaks(
        &oriented,
        params.distance_samples(sampling_rate),
        params.height,
        params.prominence,
        params.edge_padding(),
    )
}

/// Detect peaks in every channel (column) of `data`.
pub fn detect_peaks(
    data: &Array2<f64>,
    sampling_rate: f64,
    params: &PeakParams,
) -> Result<Vec<Vec<usize>>> {
    params.validate(sampling_rate)?;

    let peaks: Vec<Vec<usize>> = (0..data.ncols())
        .into_par_iter()
        .map(|ch| detect_channel_peaks(data.column(ch), sampling_rate, params))
        .collect();

    log::info!(
        "Detected {} {:?} peaks across {} channels",
        peaks.iter().map(Vec::len).sum::<usize>(),
        params.polarity,
        peaks.len()
    );
    Ok(peaks)
}
