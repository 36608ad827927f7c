use ndarray::{Array1, Array2, ArrayView1, Axis};

// ---------------------------------------------------------------------------
// Waveform windows around peaks
// ---------------------------------------------------------------------------
//
// Boundary policy: windows that would run past either end of the recording are
// clamped to the data and zero-padded back to `window_size`, with the peak
// kept at offset `window_size / 2`. Windows are never dropped, so the window
// count of a channel always equals its peak count. Peak detection already
// excludes peaks closer than `window_size / 2` to an edge, which means padding
// only happens for peak lists that did not come from the detector.

/// Cut `[peak - window_size/2, peak + window_size/2)` out of `channel`.
pub fn extract_window(
    channel: ArrayView1<'_, f64>,
    peak: usize,
    window_size: usize,
) -> Array1<f64> {
    let half = window_size / 2;
    let n = channel.len();
    Array1::from_shape_fn(window_size, |k| {
        let idx = peak + k;
        if idx < half || idx - half >= n {
            0.0
        } else {
            channel[idx - half]
        }
    })
}

/// One row per peak, `window_size` columns.
pub fn extract_windows(
    channel: ArrayView1<'_, f64>,
    peaks: &[usize],
    window_size: usize,
) -> Array2<f64> {
    let mut windows = Array2::<f64>::zeros((peaks.len(), window_size));
    for (row, &peak) in peaks.iter().enumerate() {
        windows
            .row_mut(row)
            .assign(&extract_window(channel, peak, window_size));
    }
    windows
}

/// Sample-wise mean of the windows, or `None` if there are none.
pub fn average_window(windows: &Array2<f64>) -> Option<Array1<f64>> {
    if windows.nrows() == 0 {
        return None;
    }
    windows.mean_axis(Axis(0))
}

/// Sample-wise population standard deviation, for the envelope around the average.
pub fn window_std(windows: &Array2<f64>) -> Option<Array1<f64>> {
    if windows.nrows() == 0 {
        return None;
    }
    Some(windows.std_axis(Axis(0), 0.0))
}
