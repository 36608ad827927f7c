use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Segment-averaged z-score artifact detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactParams {
    /// Flag a segment when its adjusted |z| exceeds this value.
    pub threshold: f64,
    /// Samples per averaged segment.
    pub segment_size: usize,
    /// Multiplier applied to positive z-scores. Positive-going excursions are
    /// more often artifactual in these recordings than negative ones.
    pub positive_penalty: f64,
}

impl Default for ArtifactParams {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            segment_size: 1000,
            positive_penalty: 1.5,
        }
    }
}

impl ArtifactParams {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "artifact threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        if self.segment_size == 0 {
            return Err(AnalysisError::InvalidParameter(
                "artifact segment size must be at least 1 sample".into(),
            ));
        }
        if !self.positive_penalty.is_finite() || self.positive_penalty <= 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "positive penalty must be a positive number, got {}",
                self.positive_penalty
            )));
        }
        Ok(())
    }
}

/// Flag artifact samples in a single channel.
///
/// The trailing partial segment is not scored and comes back unflagged. With
/// fewer than two full segments, or when every segment has the same mean, the
/// z-score is undefined and nothing is flagged.
pub fn detect_artifacts(channel: ArrayView1<'_, f64>, params: &ArtifactParams) -> Array1<bool> {
    let n = channel.len();
    let mut flags = Array1::from_elem(n, false);
    let n_segments = n / params.segment_size;
    if n_segments < 2 {
        return flags;
    }

    let segment_means: Vec<f64> = (0..n_segments)
        .map(|s| {
            let start = s * params.segment_size;
            let segment = channel.slice(ndarray::s![start..start + params.segment_size]);
            segment.sum() / params.segment_size as f64
        })
        .collect();

    let mean = segment_means.iter().sum::<f64>() / n_segments as f64;
    let variance =
        segment_means.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n_segments as f64;
    let std = variance.sqrt();
    if !std.is_finite() || std == 0.0 {
        return flags;
    }

    for (s, segment_mean) in segment_means.iter().enumerate() {
        let mut z = (segment_mean - mean) / std;
        if z > 0.0 {
            z *= params.positive_penalty;
        }
        if z.abs() > params.threshold {
            let start = s * params.segment_size;
            flags
                .slice_mut(ndarray::s![start..start + params.segment_size])
                .fill(true);
        }
    }
    flags
}

/// Run [`detect_artifacts`] on every channel (column) of `data`.
pub fn detect_artifacts_all_channels(
    data: &Array2<f64>,
    params: &ArtifactParams,
) -> Result<Array2<bool>> {
    params.validate()?;

    let columns: Vec<Array1<bool>> = (0..data.ncols())
        .into_par_iter()
        .map(|ch| detect_artifacts(data.column(ch), params))
        .collect();

    let mut mask = Array2::from_elem(data.raw_dim(), false);
    for (ch, column) in columns.into_iter().enumerate() {
        mask.column_mut(ch).assign(&column);
    }

    let flagged = mask.iter().filter(|&&f| f).count();
    log::info!(
        "Artifact detection flagged {flagged} of {} samples (threshold {})",
        mask.len(),
        params.threshold
    );
    Ok(mask)
}

/// Number of flagged samples per channel.
pub fn flagged_per_channel(mask: &Array2<bool>) -> Vec<usize> {
    mask.axis_iter(Axis(1))
        .map(|col| col.iter().filter(|&&f| f).count())
        .collect()
}
