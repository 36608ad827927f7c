use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::model::{ChannelId, Recording};
use crate::dsp::stats::{ChannelStatistics, PeakStatistics};
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Statistics workbook: one CSV file per sheet
// ---------------------------------------------------------------------------

pub const CHANNEL_SHEET_SUFFIX: &str = "channel_statistics.csv";
pub const PEAK_SHEET_SUFFIX: &str = "peak_statistics.csv";

#[derive(Debug, Serialize, Deserialize)]
struct ChannelRow {
    #[serde(rename = "Original Channel")]
    channel: ChannelId,
    mean: f64,
    std: f64,
}

#[derive(Debug, Serialize)]
struct PeakRow {
    #[serde(rename = "Original Channel")]
    channel: ChannelId,
    num_peaks: usize,
    frequency: f64,
    avg_amplitude: f64,
    std_amplitude: f64,
    mean_inter_peak_distance: f64,
    std_inter_peak_distance: f64,
    mean_inter_peak_time_ms: f64,
    std_inter_peak_time_ms: f64,
}

impl From<&PeakStatistics> for PeakRow {
    fn from(s: &PeakStatistics) -> Self {
        Self {
            channel: s.channel,
            num_peaks: s.num_peaks,
            frequency: s.frequency,
            avg_amplitude: s.avg_amplitude,
            std_amplitude: s.std_amplitude,
            mean_inter_peak_distance: s.mean_inter_peak_distance,
            std_inter_peak_distance: s.std_inter_peak_distance,
            mean_inter_peak_time_ms: s.mean_inter_peak_time * 1000.0,
            std_inter_peak_time_ms: s.std_inter_peak_time * 1000.0,
        }
    }
}

/// Files written by [`export_statistics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookPaths {
    pub channel_statistics: PathBuf,
    /// `None` when no peaks had been detected.
    pub peak_statistics: Option<PathBuf>,
}

/// Sheet file names derived from `target`: `dir/name.xlsx` (or `dir/name`)
/// becomes `dir/name.channel_statistics.csv` and `dir/name.peak_statistics.csv`.
pub fn workbook_paths(target: &Path) -> (PathBuf, PathBuf) {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("statistics");
    let dir = target.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}.{CHANNEL_SHEET_SUFFIX}")),
        dir.join(format!("{stem}.{PEAK_SHEET_SUFFIX}")),
    )
}

/// Write the channel sheet and, when peaks exist, the peak sheet.
pub fn export_statistics(recording: &Recording, target: &Path) -> Result<WorkbookPaths> {
    let (channel_path, peak_path) = workbook_paths(target);

    let mut writer = csv::Writer::from_path(&channel_path)
        .with_context(|| format!("creating {}", channel_path.display()))?;
    for s in recording.channel_statistics() {
        writer.serialize(ChannelRow { channel: s.channel, mean: s.mean, std: s.std })?;
    }
    writer.flush()?;

    let peak_statistics = match recording.peak_statistics() {
        Some(stats) => {
            let mut writer = csv::Writer::from_path(&peak_path)
                .with_context(|| format!("creating {}", peak_path.display()))?;
            for s in stats {
                writer.serialize(PeakRow::from(s))?;
            }
            writer.flush()?;
            Some(peak_path)
        }
        None => {
            log::warn!("No peak statistics available; only channel statistics were saved");
            None
        }
    };

    log::info!("Statistics saved to {}", channel_path.display());
    Ok(WorkbookPaths { channel_statistics: channel_path, peak_statistics })
}

/// Read a channel sheet written by [`export_statistics`].
pub fn import_channel_statistics(path: &Path) -> Result<Vec<ChannelStatistics>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize::<ChannelRow>()
        .enumerate()
        .map(|(row_no, row)| {
            let row = row.with_context(|| format!("channel sheet row {row_no}"))?;
            Ok(ChannelStatistics { channel: row.channel, mean: row.mean, std: row.std })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-peak exports
// ---------------------------------------------------------------------------

/// One row per peak: channel, time (s), amplitude, distance in samples from
/// the previous peak of the same channel (blank for the first). Returns the
/// number of rows written.
pub fn export_peak_events(recording: &Recording, path: &Path) -> Result<usize> {
    let set = recording
        .peak_set()
        .ok_or(AnalysisError::MissingDerivedState("peaks"))?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["Channel", "Time (s)", "Amplitude", "Inter-peak Distance (samples)"])?;

    let mut rows = 0;
    let channels = recording.channel_mapping().iter().zip(set.peaks());
    for (idx, (&channel, peaks)) in channels.enumerate() {
        let mut previous: Option<usize> = None;
        for &p in peaks {
            let distance = previous.map(|prev| (p - prev).to_string()).unwrap_or_default();
            writer.write_record([
                channel.to_string(),
                format!("{:.6}", recording.time()[p]),
                format!("{:.6}", recording.data()[[p, idx]]),
                distance,
            ])?;
            previous = Some(p);
            rows += 1;
        }
    }
    writer.flush()?;
    log::info!("Wrote {rows} peak events to {}", path.display());
    Ok(rows)
}

/// One row per retained window: channel, 1-based peak number, then the
/// `window_size` samples `V0..`. Returns the number of rows written.
pub fn export_peak_windows(recording: &Recording, path: &Path) -> Result<usize> {
    let set = recording
        .peak_set()
        .ok_or(AnalysisError::MissingDerivedState("peak windows"))?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["Channel".to_string(), "Peak Number".to_string()];
    header.extend((0..set.window_size()).map(|k| format!("V{k}")));
    writer.write_record(&header)?;

    let mut rows = 0;
    for (&channel, windows) in recording.channel_mapping().iter().zip(set.windows()) {
        for (n, window) in windows.rows().into_iter().enumerate() {
            let mut record = vec![channel.to_string(), (n + 1).to_string()];
            record.extend(window.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
            rows += 1;
        }
    }
    writer.flush()?;
    log::info!("Wrote {rows} peak windows to {}", path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RawRecording;
    use ndarray::Array2;

    fn recording_with_peaks() -> Recording {
        let data =
            Array2::from_shape_fn((100, 2), |(i, c)| if c == 0 { i as f64 } else { -(i as f64) });
        Recording::new(RawRecording::from_samples(data, 10.0).unwrap())
            .unwrap()
            .with_peaks(vec![vec![10, 25, 60], vec![]], 4)
            .unwrap()
    }

    #[test]
    fn sheet_paths_follow_the_stem() {
        let (c, p) = workbook_paths(Path::new("/tmp/out/run1.xlsx"));
        assert_eq!(c, Path::new("/tmp/out/run1.channel_statistics.csv"));
        assert_eq!(p, Path::new("/tmp/out/run1.peak_statistics.csv"));
    }

    #[test]
    fn peak_events_have_blank_first_distance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let rows = export_peak_events(&recording_with_peaks(), &path).unwrap();
        assert_eq!(rows, 3);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Channel,Time (s),Amplitude,Inter-peak Distance (samples)");
        assert_eq!(lines[1], "0,1.000000,10.000000,");
        assert_eq!(lines[2], "0,2.500000,25.000000,15");
        assert_eq!(lines[3], "0,6.000000,60.000000,35");
    }

    #[test]
    fn peak_windows_one_row_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windows.csv");
        let rows = export_peak_windows(&recording_with_peaks(), &path).unwrap();
        assert_eq!(rows, 3);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "Channel,Peak Number,V0,V1,V2,V3");
        assert_eq!(lines.next().unwrap(), "0,1,8,9,10,11");
    }

    #[test]
    fn exports_need_peaks() {
        let raw = RawRecording::from_samples(Array2::zeros((10, 1)), 10.0).unwrap();
        let rec = Recording::new(raw).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = export_peak_events(&rec, &dir.path().join("e.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::MissingDerivedState(_))
        ));

        let paths = export_statistics(&rec, &dir.path().join("stats.xlsx")).unwrap();
        assert!(paths.peak_statistics.is_none());
        assert!(paths.channel_statistics.exists());
    }

    #[test]
    fn peak_sheet_reports_times_in_ms() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_statistics(&recording_with_peaks(), &dir.path().join("s")).unwrap();
        let mut reader = csv::Reader::from_path(paths.peak_statistics.unwrap()).unwrap();
        let headers = reader.headers().unwrap().clone();
        let col = headers.iter().position(|h| h == "mean_inter_peak_time_ms").unwrap();
        let first = reader.records().next().unwrap().unwrap();
        let mean_ms: f64 = first[col].parse().unwrap();
        assert!((mean_ms - 2500.0).abs() < 1e-6);
    }
}
