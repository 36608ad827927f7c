use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::model::ChannelId;

/// Mean and standard deviation of a whole channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatistics {
    pub channel: ChannelId,
    pub mean: f64,
    pub std: f64,
}

/// Event statistics of a channel. Inter-peak spacing is reported both in
/// samples (`*_distance`) and in seconds (`*_time`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakStatistics {
    pub channel: ChannelId,
    pub num_peaks: usize,
    /// Peaks per second over the full recording duration.
    pub frequency: f64,
    pub avg_amplitude: f64,
    pub std_amplitude: f64,
    pub mean_inter_peak_distance: f64,
    pub std_inter_peak_distance: f64,
    pub mean_inter_peak_time: f64,
    pub std_inter_peak_time: f64,
}

/// Population mean and standard deviation; `(0, 0)` for an empty input.
pub fn mean_std<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let iter = values.into_iter();
    let (count, sum) = iter.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = iter.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

pub fn compute_channel_statistics(
    data: &Array2<f64>,
    mapping: &[ChannelId],
) -> Vec<ChannelStatistics> {
    mapping
        .iter()
        .enumerate()
        .map(|(idx, &channel)| {
            let (mean, std) = mean_std(data.column(idx).iter().copied());
            ChannelStatistics { channel, mean, std }
        })
        .collect()
}

/// Statistics for one channel's peaks.
///
/// With fewer than two peaks the spread and spacing statistics are defined as
/// zero; a single peak still reports its own amplitude.
pub fn channel_peak_statistics(
    channel: ChannelId,
    samples: ndarray::ArrayView1<'_, f64>,
    peaks: &[usize],
    time: &Array1<f64>,
) -> PeakStatistics {
    let num_peaks = peaks.len();
    let total_duration = match (time.first(), time.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    let frequency = if total_duration > 0.0 {
        num_peaks as f64 / total_duration
    } else {
        0.0
    };

    let mut stats = PeakStatistics {
        channel,
        num_peaks,
        frequency,
        avg_amplitude: 0.0,
        std_amplitude: 0.0,
        mean_inter_peak_distance: 0.0,
        std_inter_peak_distance: 0.0,
        mean_inter_peak_time: 0.0,
        std_inter_peak_time: 0.0,
    };

    match peaks {
        [] => {}
        [single] => stats.avg_amplitude = samples[*single],
        _ => {
            let (avg, std) = mean_std(peaks.iter().map(|&p| samples[p]));
            stats.avg_amplitude = avg;
            stats.std_amplitude = std;

            let (mean_d, std_d) = mean_std(peaks.windows(2).map(|w| (w[1] - w[0]) as f64));
            stats.mean_inter_peak_distance = mean_d;
            stats.std_inter_peak_distance = std_d;

            let (mean_t, std_t) = mean_std(peaks.windows(2).map(|w| time[w[1]] - time[w[0]]));
            stats.mean_inter_peak_time = mean_t;
            stats.std_inter_peak_time = std_t;
        }
    }
    stats
}

pub fn compute_peak_statistics(
    data: &Array2<f64>,
    peaks: &[Vec<usize>],
    time: &Array1<f64>,
    mapping: &[ChannelId],
) -> Vec<PeakStatistics> {
    mapping
        .iter()
        .zip(peaks)
        .enumerate()
        .map(|(idx, (&channel, channel_peaks))| {
            channel_peak_statistics(channel, data.column(idx), channel_peaks, time)
        })
        .collect()
}
