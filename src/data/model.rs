use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::dsp::peaks::validate_window_size;
use crate::dsp::stats::{
    ChannelStatistics, PeakStatistics, compute_channel_statistics, compute_peak_statistics,
};
use crate::dsp::window::{average_window, extract_windows};
use crate::error::{AnalysisError, Result, ensure_positive};

// ---------------------------------------------------------------------------
// ChannelId – original hardware channel identifier
// ---------------------------------------------------------------------------

/// Identifier of a channel as numbered at load time. Survives deletions, so
/// it is what users and exports refer to; current column positions are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub usize);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RawRecording – what a loader hands over
// ---------------------------------------------------------------------------

/// Samples × channels matrix with its time axis (seconds) and sampling rate.
#[derive(Debug, Clone)]
pub struct RawRecording {
    pub data: Array2<f64>,
    pub time: Array1<f64>,
    pub sampling_rate: f64,
}

impl RawRecording {
    /// Build a recording whose time axis is `sample_index / sampling_rate`.
    pub fn from_samples(data: Array2<f64>, sampling_rate: f64) -> Result<Self> {
        ensure_positive("sampling rate", sampling_rate)?;
        let time = Array1::from_shape_fn(data.nrows(), |i| i as f64 / sampling_rate);
        Ok(Self { data, time, sampling_rate })
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("sampling rate", self.sampling_rate)?;
        let (rows, cols) = self.data.dim();
        if rows == 0 || cols == 0 {
            return Err(AnalysisError::ShapeMismatch(format!(
                "recording must have at least one sample and one channel, got {rows}×{cols}"
            )));
        }
        if self.time.len() != rows {
            return Err(AnalysisError::ShapeMismatch(format!(
                "time vector has {} entries but data has {rows} samples",
                self.time.len()
            )));
        }
        let decreasing = self.time.windows(2).into_iter().any(|w| w[1] < w[0]);
        if decreasing || self.time.iter().any(|t| !t.is_finite()) {
            return Err(AnalysisError::InvalidParameter(
                "time vector must be finite and monotonically increasing".into(),
            ));
        }
        if let Some(((row, col), _)) = self.data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::InvalidParameter(format!(
                "sample {row} of channel {col} is not a finite number"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PeakSet – peaks and everything cut out around them
// ---------------------------------------------------------------------------

/// Per-channel peaks together with their waveform windows and averages.
///
/// Kept as one value so peaks and windows can only be replaced together:
/// `windows[c].nrows() == peaks[c].len()` for every channel `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSet {
    window_size: usize,
    peaks: Vec<Vec<usize>>,
    windows: Vec<Array2<f64>>,
    averages: Vec<Option<Array1<f64>>>,
}

impl PeakSet {
    /// Cut windows for `peaks` out of `data` and average them.
    pub(crate) fn extract(data: &Array2<f64>, peaks: Vec<Vec<usize>>, window_size: usize) -> Self {
        let windows: Vec<Array2<f64>> = peaks
            .iter()
            .enumerate()
            .map(|(ch, channel_peaks)| extract_windows(data.column(ch), channel_peaks, window_size))
            .collect();
        Self::from_windows(window_size, peaks, windows)
    }

    /// Assemble from already filtered peaks and windows, recomputing averages.
    pub(crate) fn from_windows(
        window_size: usize,
        peaks: Vec<Vec<usize>>,
        windows: Vec<Array2<f64>>,
    ) -> Self {
        let averages = windows.iter().map(average_window).collect();
        Self { window_size, peaks, windows, averages }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn peaks(&self) -> &[Vec<usize>] {
        &self.peaks
    }

    pub fn windows(&self) -> &[Array2<f64>] {
        &self.windows
    }

    pub fn averages(&self) -> &[Option<Array1<f64>>] {
        &self.averages
    }

    pub fn total(&self) -> usize {
        self.peaks.iter().map(Vec::len).sum()
    }

    pub(crate) fn into_parts(self) -> (usize, Vec<Vec<usize>>, Vec<Array2<f64>>) {
        (self.window_size, self.peaks, self.windows)
    }
}

// ---------------------------------------------------------------------------
// Recording – the time-series store
// ---------------------------------------------------------------------------

/// A loaded recording and all state derived from it.
///
/// Fields are private: reads go through accessors and every structural edit
/// goes through [`crate::session::Session::apply`], which swaps in a fully
/// rebuilt value.
#[derive(Debug, Clone)]
pub struct Recording {
    data: Array2<f64>,
    time: Array1<f64>,
    sampling_rate: f64,
    channel_mapping: Vec<ChannelId>,
    artifacts: Option<Array2<bool>>,
    peaks: Option<PeakSet>,
    channel_statistics: Vec<ChannelStatistics>,
    peak_statistics: Option<Vec<PeakStatistics>>,
}

impl Recording {
    /// Take ownership of a freshly loaded recording. Channels are numbered
    /// `0..columns` and no derived state exists yet.
    pub fn new(raw: RawRecording) -> Result<Self> {
        raw.validate()?;
        let channel_mapping = (0..raw.data.ncols()).map(ChannelId).collect();
        Ok(Self::from_parts(raw.data, raw.time, raw.sampling_rate, channel_mapping, None, None))
    }

    /// Assemble a recording and derive both statistics tables from it.
    pub(crate) fn from_parts(
        data: Array2<f64>,
        time: Array1<f64>,
        sampling_rate: f64,
        channel_mapping: Vec<ChannelId>,
        artifacts: Option<Array2<bool>>,
        peaks: Option<PeakSet>,
    ) -> Self {
        let mut recording = Self {
            data,
            time,
            sampling_rate,
            channel_mapping,
            artifacts,
            peaks,
            channel_statistics: Vec::new(),
            peak_statistics: None,
        };
        recording.refresh_statistics();
        recording
    }

    fn refresh_statistics(&mut self) {
        self.channel_statistics = compute_channel_statistics(&self.data, &self.channel_mapping);
        self.peak_statistics = self.peaks.as_ref().map(|set| {
            compute_peak_statistics(&self.data, set.peaks(), &self.time, &self.channel_mapping)
        });
    }

    // -- accessors --

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn channel_mapping(&self) -> &[ChannelId] {
        &self.channel_mapping
    }

    pub fn artifacts(&self) -> Option<&Array2<bool>> {
        self.artifacts.as_ref()
    }

    pub fn peak_set(&self) -> Option<&PeakSet> {
        self.peaks.as_ref()
    }

    pub fn peaks(&self) -> Option<&[Vec<usize>]> {
        self.peaks.as_ref().map(PeakSet::peaks)
    }

    pub fn peak_windows(&self) -> Option<&[Array2<f64>]> {
        self.peaks.as_ref().map(PeakSet::windows)
    }

    pub fn average_peak_windows(&self) -> Option<&[Option<Array1<f64>>]> {
        self.peaks.as_ref().map(PeakSet::averages)
    }

    pub fn channel_statistics(&self) -> &[ChannelStatistics] {
        &self.channel_statistics
    }

    pub fn peak_statistics(&self) -> Option<&[PeakStatistics]> {
        self.peak_statistics.as_deref()
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Current column of an original channel id.
    pub fn index_of(&self, id: ChannelId) -> Option<usize> {
        self.channel_mapping.iter().position(|&c| c == id)
    }

    // -- whole-value replacements used by session commands --

    pub(crate) fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        if data.dim() != self.data.dim() {
            return Err(AnalysisError::ShapeMismatch(format!(
                "replacement data is {:?}, recording is {:?}",
                data.dim(),
                self.data.dim()
            )));
        }
        // Windows are cut from the data, so they follow the new samples.
        let peaks = self
            .peaks
            .as_ref()
            .map(|set| PeakSet::extract(&data, set.peaks().to_vec(), set.window_size()));
        Ok(Self::from_parts(
            data,
            self.time.clone(),
            self.sampling_rate,
            self.channel_mapping.clone(),
            self.artifacts.clone(),
            peaks,
        ))
    }

    pub(crate) fn with_artifacts(&self, artifacts: Array2<bool>) -> Result<Self> {
        if artifacts.dim() != self.data.dim() {
            return Err(AnalysisError::ShapeMismatch(format!(
                "artifact mask is {:?}, recording is {:?}",
                artifacts.dim(),
                self.data.dim()
            )));
        }
        let mut next = self.clone();
        next.artifacts = Some(artifacts);
        Ok(next)
    }

    pub(crate) fn with_peaks(&self, peaks: Vec<Vec<usize>>, window_size: usize) -> Result<Self> {
        validate_window_size(window_size)?;
        if peaks.len() != self.n_channels() {
            return Err(AnalysisError::ShapeMismatch(format!(
                "{} peak lists for {} channels",
                peaks.len(),
                self.n_channels()
            )));
        }
        let rows = self.n_samples();
        for (ch, channel_peaks) in peaks.iter().enumerate() {
            let sorted = channel_peaks.windows(2).all(|w| w[0] < w[1]);
            let in_range = channel_peaks.iter().all(|&p| p < rows);
            if !sorted || !in_range {
                return Err(AnalysisError::InvalidParameter(format!(
                    "peaks of channel {} must be strictly increasing indices below {rows}",
                    self.channel_mapping[ch]
                )));
            }
        }
        let set = PeakSet::extract(&self.data, peaks, window_size);
        Ok(Self::from_parts(
            self.data.clone(),
            self.time.clone(),
            self.sampling_rate,
            self.channel_mapping.clone(),
            self.artifacts.clone(),
            Some(set),
        ))
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Array2<f64>, Array1<f64>, f64, Vec<ChannelId>, Option<Array2<bool>>, Option<PeakSet>) {
        (
            self.data,
            self.time,
            self.sampling_rate,
            self.channel_mapping,
            self.artifacts,
            self.peaks,
        )
    }

    /// Check that every derived structure matches the shape of the data.
    pub fn check_consistency(&self) -> Result<()> {
        let (rows, cols) = self.data.dim();
        let mismatch = |what: String| Err(AnalysisError::ShapeMismatch(what));

        if self.time.len() != rows {
            return mismatch(format!("time has {} entries for {rows} samples", self.time.len()));
        }
        if self.channel_mapping.len() != cols {
            let ids = self.channel_mapping.len();
            return mismatch(format!("mapping has {ids} ids for {cols} channels"));
        }
        if let Some(mask) = &self.artifacts {
            if mask.dim() != (rows, cols) {
                let mask_dim = mask.dim();
                return mismatch(format!("artifact mask is {mask_dim:?}, data is ({rows}, {cols})"));
            }
        }
        if self.channel_statistics.len() != cols {
            let n = self.channel_statistics.len();
            return mismatch(format!("{n} channel statistics for {cols} channels"));
        }
        if let Some(set) = &self.peaks {
            if set.peaks.len() != cols || set.windows.len() != cols || set.averages.len() != cols {
                return mismatch(format!(
                    "peak set covers {}/{}/{} channels, data has {cols}",
                    set.peaks.len(),
                    set.windows.len(),
                    set.averages.len()
                ));
            }
            for (ch, (peaks, windows)) in set.peaks.iter().zip(&set.windows).enumerate() {
                if windows.nrows() != peaks.len() || windows.ncols() != set.window_size {
                    return mismatch(format!(
                        "channel {ch}: {} windows of width {} for {} peaks",
                        windows.nrows(),
                        windows.ncols(),
                        peaks.len()
                    ));
                }
                if peaks.iter().any(|&p| p >= rows) || peaks.windows(2).any(|w| w[0] >= w[1]) {
                    return mismatch(format!("channel {ch}: peaks not sorted inside [0, {rows})"));
                }
            }
            match &self.peak_statistics {
                Some(stats) if stats.len() == cols => {}
                _ => return mismatch("peak statistics do not cover every channel".into()),
            }
        } else if self.peak_statistics.is_some() {
            return mismatch("peak statistics present without peaks".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: usize, cols: usize) -> RawRecording {
        let data = Array2::from_shape_fn((rows, cols), |(i, c)| (i * (c + 1)) as f64);
        RawRecording::from_samples(data, 100.0).unwrap()
    }

    #[test]
    fn new_recording_maps_channels_in_order() {
        let rec = Recording::new(raw(50, 4)).unwrap();
        let expected: Vec<ChannelId> = (0..4).map(ChannelId).collect();
        assert_eq!(rec.channel_mapping(), expected.as_slice());
        assert_eq!(rec.channel_statistics().len(), 4);
        assert!(rec.peaks().is_none());
        assert!(rec.artifacts().is_none());
        assert!((rec.duration() - 0.49).abs() < 1e-12);
        rec.check_consistency().unwrap();
    }

    #[test]
    fn rejects_inconsistent_inputs() {
        let mut bad = raw(10, 2);
        bad.time = Array1::zeros(9);
        assert!(matches!(Recording::new(bad), Err(AnalysisError::ShapeMismatch(_))));

        let mut backwards = raw(10, 2);
        backwards.time[5] = -1.0;
        assert!(matches!(Recording::new(backwards), Err(AnalysisError::InvalidParameter(_))));

        assert!(RawRecording::from_samples(Array2::zeros((10, 1)), 0.0).is_err());
        assert!(Recording::new(raw(0, 3)).is_err());
    }

    #[test]
    fn peaks_bring_windows_and_statistics() {
        let rec = Recording::new(raw(100, 2)).unwrap();
        let rec = rec.with_peaks(vec![vec![10, 50], vec![]], 10).unwrap();
        let set = rec.peak_set().unwrap();
        assert_eq!(set.windows()[0].dim(), (2, 10));
        assert_eq!(set.windows()[1].dim(), (0, 10));
        assert!(set.averages()[1].is_none());
        assert_eq!(rec.peak_statistics().unwrap()[0].num_peaks, 2);
        rec.check_consistency().unwrap();
    }

    #[test]
    fn unsorted_or_out_of_range_peaks_are_rejected() {
        let rec = Recording::new(raw(100, 1)).unwrap();
        assert!(rec.with_peaks(vec![vec![50, 10]], 10).is_err());
        assert!(rec.with_peaks(vec![vec![100]], 10).is_err());
        assert!(rec.with_peaks(vec![vec![1], vec![2]], 10).is_err());
    }

    #[test]
    fn replacing_data_recuts_windows() {
        let rec = Recording::new(raw(100, 1)).unwrap();
        let rec = rec.with_peaks(vec![vec![50]], 4).unwrap();
        let rec = rec.with_data(Array2::from_elem((100, 1), 7.0)).unwrap();
        assert!(rec.peak_windows().unwrap()[0].iter().all(|&v| v == 7.0));
        assert_eq!(rec.channel_statistics()[0].mean, 7.0);
        assert!(rec.with_data(Array2::zeros((99, 1))).is_err());
    }
}
