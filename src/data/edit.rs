use ndarray::{Axis, s};

use super::model::{ChannelId, PeakSet, Recording};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Structural edits
// ---------------------------------------------------------------------------
//
// Each edit reads the current recording and builds a complete replacement.
// Derived state is re-cut or recomputed in the same step, never patched in
// place, so a failed edit leaves the original untouched.

/// Resolve original ids to current columns, sorted ascending and deduplicated.
pub fn resolve_indices(recording: &Recording, ids: &[ChannelId]) -> Result<Vec<usize>> {
    let mut indices = ids
        .iter()
        .map(|&id| recording.index_of(id).ok_or(AnalysisError::UnknownChannel(id)))
        .collect::<Result<Vec<usize>>>()?;
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// Remove the channels with the given original ids from the data and from
/// every derived structure.
pub fn delete_channels(recording: &Recording, ids: &[ChannelId]) -> Result<Recording> {
    let remove = resolve_indices(recording, ids)?;
    let keep: Vec<usize> = (0..recording.n_channels())
        .filter(|i| remove.binary_search(i).is_err())
        .collect();

    let data = recording.data().select(Axis(1), &keep);
    let artifacts = recording.artifacts().map(|mask| mask.select(Axis(1), &keep));

    let mut mapping = recording.channel_mapping().to_vec();
    let mut peak_set = recording.peak_set().cloned().map(PeakSet::into_parts);

    // Highest index first so earlier positions stay valid.
    for &idx in remove.iter().rev() {
        mapping.remove(idx);
        if let Some((_, peaks, windows)) = peak_set.as_mut() {
            peaks.remove(idx);
            windows.remove(idx);
        }
    }
    let peaks = peak_set
        .map(|(window_size, peaks, windows)| PeakSet::from_windows(window_size, peaks, windows));

    log::info!(
        "Deleted {} channel(s), {} remaining",
        remove.len(),
        mapping.len()
    );
    Ok(Recording::from_parts(
        data,
        recording.time().clone(),
        recording.sampling_rate(),
        mapping,
        artifacts,
        peaks,
    ))
}

/// Original ids of every current channel not listed in `ids`.
pub fn complement(recording: &Recording, ids: &[ChannelId]) -> Result<Vec<ChannelId>> {
    resolve_indices(recording, ids)?;
    Ok(recording
        .channel_mapping()
        .iter()
        .copied()
        .filter(|id| !ids.contains(id))
        .collect())
}

/// Keep only the listed channels; defined as deleting the complement.
pub fn keep_channels(recording: &Recording, ids: &[ChannelId]) -> Result<Recording> {
    let to_delete = complement(recording, ids)?;
    delete_channels(recording, &to_delete)
}

/// Restrict the recording to samples `[start, end)`.
///
/// Peaks outside the range are dropped together with their windows and the
/// remaining ones are shifted so that `start` becomes index 0.
pub fn trim(recording: &Recording, start: usize, end: usize) -> Result<Recording> {
    let rows = recording.n_samples();
    if start >= end || end > rows {
        return Err(AnalysisError::InvalidParameter(format!(
            "trim range [{start}, {end}) must be non-empty and within [0, {rows})"
        )));
    }

    let data = recording.data().slice(s![start..end, ..]).to_owned();
    let time = recording.time().slice(s![start..end]).to_owned();
    let artifacts = recording
        .artifacts()
        .map(|mask| mask.slice(s![start..end, ..]).to_owned());

    let peaks = recording.peak_set().map(|set| {
        let mut peaks = Vec::with_capacity(set.peaks().len());
        let mut windows = Vec::with_capacity(set.windows().len());
        for (channel_peaks, channel_windows) in set.peaks().iter().zip(set.windows()) {
            let retained: Vec<usize> = channel_peaks
                .iter()
                .enumerate()
                .filter(|(_, &p)| p >= start && p < end)
                .map(|(row, _)| row)
                .collect();
            peaks.push(retained.iter().map(|&row| channel_peaks[row] - start).collect());
            windows.push(channel_windows.select(Axis(0), &retained));
        }
        PeakSet::from_windows(set.window_size(), peaks, windows)
    });

    log::info!("Trimmed recording to samples [{start}, {end}) of {rows}");
    Ok(Recording::from_parts(
        data,
        time,
        recording.sampling_rate(),
        recording.channel_mapping().to_vec(),
        artifacts,
        peaks,
    ))
}

/// Sample range covering `[start_s, end_s)` on the time axis. Each bound is the
/// first sample whose time is not below it.
pub fn time_range_to_indices(
    recording: &Recording,
    start_s: f64,
    end_s: f64,
) -> Result<(usize, usize)> {
    if !start_s.is_finite() || !end_s.is_finite() || start_s >= end_s {
        return Err(AnalysisError::InvalidParameter(format!(
            "time range [{start_s}, {end_s}) is not a valid interval"
        )));
    }
    let time = recording
        .time()
        .as_slice()
        .ok_or_else(|| AnalysisError::ShapeMismatch("time vector is not contiguous".into()))?;
    let start = time.partition_point(|&t| t < start_s);
    let end = time.partition_point(|&t| t < end_s);
    Ok((start, end))
}
