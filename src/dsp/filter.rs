use ndarray::{Array1, Array2};
use rayon::prelude::*;
use sci_rs::signal::filter::{design::*, sosfiltfilt_dyn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result, ensure_positive};

pub const DEFAULT_ORDER: usize = 5;
pub const DEFAULT_NOTCH_Q: f64 = 30.0;

// ---------------------------------------------------------------------------
// Filter description
// ---------------------------------------------------------------------------

/// One zero-phase IIR operator with its parameters. Frequencies are in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    BandPass { low_hz: f64, high_hz: f64, order: usize },
    Notch { center_hz: f64, quality: f64 },
    LowPass { cutoff_hz: f64, order: usize },
    HighPass { cutoff_hz: f64, order: usize },
}

impl FilterSpec {
    pub fn band_pass(low_hz: f64, high_hz: f64) -> Self {
        FilterSpec::BandPass { low_hz, high_hz, order: DEFAULT_ORDER }
    }

    pub fn notch(center_hz: f64) -> Self {
        FilterSpec::Notch { center_hz, quality: DEFAULT_NOTCH_Q }
    }

    pub fn low_pass(cutoff_hz: f64) -> Self {
        FilterSpec::LowPass { cutoff_hz, order: DEFAULT_ORDER }
    }

    pub fn high_pass(cutoff_hz: f64) -> Self {
        FilterSpec::HighPass { cutoff_hz, order: DEFAULT_ORDER }
    }

    /// Short human-readable description for logs and status lines.
    pub fn label(&self) -> String {
        match self {
            FilterSpec::BandPass { low_hz, high_hz, order } => {
                format!("band-pass {low_hz}-{high_hz} Hz (order {order})")
            }
            FilterSpec::Notch { center_hz, quality } => {
                format!("notch {center_hz} Hz (Q {quality})")
            }
            FilterSpec::LowPass { cutoff_hz, order } => {
                format!("low-pass {cutoff_hz} Hz (order {order})")
            }
            FilterSpec::HighPass { cutoff_hz, order } => {
                format!("high-pass {cutoff_hz} Hz (order {order})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coefficient design
// ---------------------------------------------------------------------------

/// Express `freq_hz` as a fraction of the Nyquist frequency. The result must
/// lie strictly inside (0, 1) for a digital design to exist.
pub fn nyquist_normalize(freq_hz: f64, sampling_rate: f64) -> Result<f64> {
    ensure_positive("sampling rate", sampling_rate)?;
    let nyquist = 0.5 * sampling_rate;
    let normalized = freq_hz / nyquist;
    if !normalized.is_finite() || normalized <= 0.0 || normalized >= 1.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "frequency {freq_hz} Hz must lie between 0 and the Nyquist frequency ({nyquist} Hz)"
        )));
    }
    Ok(normalized)
}

fn ensure_order(order: usize) -> Result<()> {
    if order == 0 {
        return Err(AnalysisError::InvalidParameter(
            "filter order must be at least 1".into(),
        ));
    }
    Ok(())
}

fn design_butter(
    order: usize,
    cutoffs: Vec<f64>,
    band: FilterBandType,
    fs: f64,
) -> Result<Vec<Sos<f64>>> {
    let filter = butter_dyn(
        order,
        cutoffs,
        Some(band),
        Some(false),
        Some(FilterOutputType::Sos),
        Some(fs),
    );
    let DigitalFilter::Sos(SosFormatFilter { sos }) = filter else {
        return Err(AnalysisError::InvalidParameter(
            "Butterworth design did not produce second-order sections".into(),
        ));
    };
    Ok(sos)
}

/// Second-order notch section, same coefficients as scipy's `iirnotch`.
fn design_notch(center_hz: f64, quality: f64, fs: f64) -> Result<Vec<Sos<f64>>> {
    ensure_positive("notch quality factor", quality)?;
    let w0 = nyquist_normalize(center_hz, fs)?;

    let bw = (w0 / quality) * std::f64::consts::PI;
    let w0 = w0 * std::f64::consts::PI;
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);

    let b = [gain, -2.0 * gain * w0.cos(), gain];
    let a = [1.0, -2.0 * gain * w0.cos(), 2.0 * gain - 1.0];
    Ok(vec![Sos::new(b, a)])
}

/// Validate `spec` against `sampling_rate` and build its second-order sections.
pub fn design(spec: &FilterSpec, sampling_rate: f64) -> Result<Vec<Sos<f64>>> {
    match *spec {
        FilterSpec::BandPass { low_hz, high_hz, order } => {
            ensure_order(order)?;
            let low = nyquist_normalize(low_hz, sampling_rate)?;
            let high = nyquist_normalize(high_hz, sampling_rate)?;
            if low >= high {
                return Err(AnalysisError::InvalidParameter(format!(
                    "band-pass low cut ({low_hz} Hz) must be below high cut ({high_hz} Hz)"
                )));
            }
            design_butter(order, vec![low_hz, high_hz], FilterBandType::Bandpass, sampling_rate)
        }
        FilterSpec::Notch { center_hz, quality } => design_notch(center_hz, quality, sampling_rate),
        FilterSpec::LowPass { cutoff_hz, order } => {
            ensure_order(order)?;
            nyquist_normalize(cutoff_hz, sampling_rate)?;
            design_butter(order, vec![cutoff_hz], FilterBandType::Lowpass, sampling_rate)
        }
        FilterSpec::HighPass { cutoff_hz, order } => {
            ensure_order(order)?;
            nyquist_normalize(cutoff_hz, sampling_rate)?;
            design_butter(order, vec![cutoff_hz], FilterBandType::Highpass, sampling_rate)
        }
    }
}

/// Samples needed for the odd-extension padding of forward-backward filtering.
pub fn min_samples_for(sos: &[Sos<f64>]) -> usize {
    3 * (2 * sos.len() + 1) + 1
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Filter every channel (column) of `data` forward and backward.
///
/// Returns a new matrix of the same shape; `data` is left untouched. Channels
/// are independent, so they are processed in parallel.
pub fn apply_filter(
    data: &Array2<f64>,
    sampling_rate: f64,
    spec: &FilterSpec,
) -> Result<Array2<f64>> {
    let sos = design(spec, sampling_rate)?;
    let (n_samples, n_channels) = data.dim();
    let required = min_samples_for(&sos);
    if n_samples < required {
        return Err(AnalysisError::InvalidParameter(format!(
            "{} needs at least {required} samples per channel, recording has {n_samples}",
            spec.label()
        )));
    }

    let columns: Vec<Vec<f64>> = (0..n_channels)
        .into_par_iter()
        .map(|ch| sosfiltfilt_dyn(data.column(ch).iter().copied(), &sos))
        .collect();

    let mut filtered = Array2::<f64>::zeros((n_samples, n_channels));
    for (ch, column) in columns.into_iter().enumerate() {
        if column.len() != n_samples {
            return Err(AnalysisError::ShapeMismatch(format!(
                "channel {ch}: filter returned {} samples, expected {n_samples}",
                column.len()
            )));
        }
        filtered.column_mut(ch).assign(&Array1::from(column));
    }

    log::debug!("Applied {} to {n_channels} channels", spec.label());
    Ok(filtered)
}

pub fn bandpass(
    data: &Array2<f64>,
    sampling_rate: f64,
    low_hz: f64,
    high_hz: f64,
    order: usize,
) -> Result<Array2<f64>> {
    apply_filter(data, sampling_rate, &FilterSpec::BandPass { low_hz, high_hz, order })
}

pub fn notch(
    data: &Array2<f64>,
    sampling_rate: f64,
    center_hz: f64,
    quality: f64,
) -> Result<Array2<f64>> {
    apply_filter(data, sampling_rate, &FilterSpec::Notch { center_hz, quality })
}

pub fn lowpass(
    data: &Array2<f64>,
    sampling_rate: f64,
    cutoff_hz: f64,
    order: usize,
) -> Result<Array2<f64>> {
    apply_filter(data, sampling_rate, &FilterSpec::LowPass { cutoff_hz, order })
}

pub fn highpass(
    data: &Array2<f64>,
    sampling_rate: f64,
    cutoff_hz: f64,
    order: usize,
) -> Result<Array2<f64>> {
    apply_filter(data, sampling_rate, &FilterSpec::HighPass { cutoff_hz, order })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn rms(values: &[f64]) -> f64 {
        (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
    }

    #[test]
    fn impulse_response_is_symmetric_about_the_impulse() {
        let n = 4001;
        let center = 2000;
        let mut data = Array2::<f64>::zeros((n, 1));
        data[[center, 0]] = 1.0;

        let out = lowpass(&data, 1000.0, 100.0, 4).unwrap();
        let col = out.column(0);

        let argmax = (0..n)
            .max_by(|&a, &b| col[a].total_cmp(&col[b]))
            .unwrap();
        assert_eq!(argmax, center);
        for k in 1..300 {
            assert!(
                (col[center - k] - col[center + k]).abs() < 1e-9,
                "asymmetry at offset {k}"
            );
        }
    }

    #[test]
    fn notch_removes_line_noise() {
        let fs = 1000.0;
        let n = 4000;
        let data = Array2::from_shape_fn((n, 2), |(i, _)| (2.0 * PI * 50.0 * i as f64 / fs).sin());

        let out = notch(&data, fs, 50.0, DEFAULT_NOTCH_Q).unwrap();
        assert_eq!(out.dim(), data.dim());

        let middle: Vec<f64> = out.column(1).iter().skip(1000).take(2000).copied().collect();
        let original: Vec<f64> = data.column(1).iter().skip(1000).take(2000).copied().collect();
        assert!(rms(&middle) < 0.05 * rms(&original));
    }

    #[test]
    fn highpass_removes_offset_and_lowpass_keeps_it() {
        let fs = 1000.0;
        let data = Array2::from_shape_fn((3000, 1), |(i, _)| {
            10.0 + (2.0 * PI * 20.0 * i as f64 / fs).sin()
        });

        let hp = highpass(&data, fs, 5.0, DEFAULT_ORDER).unwrap();
        let hp_mean = hp.column(0).iter().skip(1000).take(1000).sum::<f64>() / 1000.0;
        assert!(hp_mean.abs() < 0.1, "offset survived high-pass: {hp_mean}");

        let lp = lowpass(&data, fs, 5.0, DEFAULT_ORDER).unwrap();
        let lp_mean = lp.column(0).iter().skip(1000).take(1000).sum::<f64>() / 1000.0;
        assert!((lp_mean - 10.0).abs() < 0.1, "offset lost in low-pass: {lp_mean}");
    }

    #[test]
    fn bandpass_preserves_shape() {
        let data = Array2::from_shape_fn((2000, 3), |(i, c)| ((i * (c + 1)) as f64 * 0.01).sin());
        let out = bandpass(&data, 1000.0, 0.5, 50.0, DEFAULT_ORDER).unwrap();
        assert_eq!(out.dim(), (2000, 3));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_frequencies_outside_nyquist() {
        let data = Array2::<f64>::zeros((2000, 1));
        assert!(matches!(
            lowpass(&data, 1000.0, 500.0, 5),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            highpass(&data, 1000.0, -1.0, 5),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            bandpass(&data, 1000.0, 60.0, 40.0, 5),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            notch(&data, 1000.0, 50.0, 0.0),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            lowpass(&data, 1000.0, 100.0, 0),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rejects_recordings_shorter_than_padding() {
        let data = Array2::<f64>::zeros((10, 1));
        assert!(matches!(
            lowpass(&data, 1000.0, 100.0, 5),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn normalizes_against_nyquist() {
        assert!((nyquist_normalize(250.0, 1000.0).unwrap() - 0.5).abs() < 1e-12);
    }
}
