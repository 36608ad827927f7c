use ndarray::{Array1, Array2};

use ephys_panda::dsp::artifact::ArtifactParams;
use ephys_panda::dsp::filter::FilterSpec;
use ephys_panda::dsp::peaks::{PeakParams, Polarity};
use ephys_panda::{AnalysisError, ChannelId, Command, CommandOutcome, RawRecording, Session};

const RATE: f64 = 1000.0;

/// Positive spikes of height 100 on a flat baseline; one list of spike
/// positions per channel.
fn spiky(rows: usize, spikes: &[&[usize]]) -> RawRecording {
    let mut data = Array2::<f64>::zeros((rows, spikes.len()));
    for (ch, positions) in spikes.iter().enumerate() {
        for &p in positions.iter() {
            data[[p, ch]] = 100.0;
        }
    }
    RawRecording::from_samples(data, RATE).unwrap()
}

fn positive_peaks(window_size: usize) -> PeakParams {
    PeakParams {
        polarity: Polarity::Positive,
        min_distance_s: 0.5,
        height: Some(50.0),
        prominence: None,
        window_size,
    }
}

fn session_with(raw: RawRecording) -> Session {
    let mut session = Session::new();
    session.apply(Command::Load(raw)).unwrap();
    session
}

#[test]
fn every_command_preserves_the_shape_invariant() {
    let mut session = session_with(spiky(
        21_000,
        &[&[1200, 3000, 9000], &[2000, 15_000], &[], &[700, 20_100]],
    ));
    let steps = vec![
        Command::DetectArtifacts(ArtifactParams::default()),
        Command::DetectPeaks(positive_peaks(100)),
        Command::ApplyFilter(FilterSpec::high_pass(1.0)),
        Command::DeleteChannels(vec![ChannelId(2)]),
        Command::Trim { start: 500, end: 18_000 },
        Command::KeepChannels(vec![ChannelId(0), ChannelId(3)]),
        Command::TrimTime { start_s: 1.0, end_s: 10.0 },
    ];
    for step in steps {
        let name = step.name();
        session.apply(step).unwrap();
        let rec = session.recording().unwrap();
        rec.check_consistency()
            .unwrap_or_else(|e| panic!("after {name}: {e}"));
    }
    let rec = session.recording().unwrap();
    assert_eq!(rec.channel_mapping(), &[ChannelId(0), ChannelId(3)]);
    assert!(rec.artifacts().is_some());
    assert!(rec.peak_statistics().is_some());
}

#[test]
fn artifact_burst_segment_is_the_only_one_flagged() {
    let noise = |i: usize| ((i * 919) % 1000) as f64 / 500.0 - 1.0;
    let data = Array2::from_shape_fn((21_000, 1), |(i, _)| {
        if (7000..8000).contains(&i) { 50.0 + noise(i) } else { noise(i) }
    });
    let mut session = session_with(RawRecording::from_samples(data, RATE).unwrap());
    let outcome = session
        .apply(Command::DetectArtifacts(ArtifactParams::default()))
        .unwrap();
    assert_eq!(outcome, CommandOutcome::ArtifactsDetected { flagged_samples: 1000 });

    let mask = session.recording().unwrap().artifacts().unwrap();
    for (i, &flag) in mask.column(0).iter().enumerate() {
        assert_eq!(flag, (7000..8000).contains(&i), "sample {i}");
    }
}

#[test]
fn detected_peaks_respect_edge_exclusion() {
    let rows = 5000;
    let mut session = session_with(spiky(rows, &[&[10, 49, 50, 2500, 4949, 4950, 4990]]));
    // No spacing constraint, so only edge exclusion removes candidates.
    let params = PeakParams { min_distance_s: 0.0, ..positive_peaks(100) };
    session.apply(Command::DetectPeaks(params)).unwrap();

    let peaks = &session.recording().unwrap().peaks().unwrap()[0];
    assert!(!peaks.is_empty());
    assert!(peaks.iter().all(|&p| p >= 50 && p < rows - 50), "{peaks:?}");
    assert!(peaks.contains(&2500));
}

#[test]
fn single_peak_statistics_are_zero_not_nan() {
    let mut session = session_with(spiky(3000, &[&[1500], &[]]));
    session.apply(Command::DetectPeaks(positive_peaks(100))).unwrap();

    let stats = session.recording().unwrap().peak_statistics().unwrap();
    let one = stats[0];
    assert_eq!(one.num_peaks, 1);
    assert_eq!(one.avg_amplitude, 100.0);
    for v in [
        one.std_amplitude,
        one.mean_inter_peak_distance,
        one.std_inter_peak_distance,
        one.mean_inter_peak_time,
        one.std_inter_peak_time,
    ] {
        assert_eq!(v, 0.0);
    }
    let none = stats[1];
    assert_eq!(none.num_peaks, 0);
    assert!(!none.frequency.is_nan() && !none.avg_amplitude.is_nan());
}

#[test]
fn keep_and_delete_are_complementary() {
    let raw = spiky(6000, &[&[1000], &[2000, 4000], &[3000], &[1500, 5000]]);
    let prepare = |raw: RawRecording| {
        let mut s = session_with(raw);
        let artifacts = ArtifactParams { segment_size: 100, ..Default::default() };
        s.apply(Command::DetectArtifacts(artifacts)).unwrap();
        s.apply(Command::DetectPeaks(positive_peaks(100))).unwrap();
        s
    };

    let mut kept = prepare(raw.clone());
    kept.apply(Command::KeepChannels(vec![ChannelId(3), ChannelId(1)])).unwrap();
    let mut deleted = prepare(raw);
    deleted.apply(Command::DeleteChannels(vec![ChannelId(0), ChannelId(2)])).unwrap();

    let (a, b) = (kept.recording().unwrap(), deleted.recording().unwrap());
    assert_eq!(a.channel_mapping(), &[ChannelId(1), ChannelId(3)]);
    assert_eq!(a.channel_mapping(), b.channel_mapping());
    assert_eq!(a.data(), b.data());
    assert_eq!(a.artifacts(), b.artifacts());
    assert_eq!(a.peak_set(), b.peak_set());
    assert_eq!(a.channel_statistics(), b.channel_statistics());
    assert_eq!(a.peak_statistics(), b.peak_statistics());
    assert_eq!(a.peaks().unwrap(), &[vec![2000, 4000], vec![1500, 5000]]);
}

#[test]
fn trim_rebases_detected_peaks() {
    let mut session = session_with(spiky(7000, &[&[1200, 3000, 4800, 6000]]));
    session.apply(Command::DetectPeaks(positive_peaks(100))).unwrap();
    assert_eq!(session.recording().unwrap().peaks().unwrap(), &[vec![1200, 3000, 4800, 6000]]);

    session.apply(Command::Trim { start: 1000, end: 5000 }).unwrap();
    let rec = session.recording().unwrap();
    assert_eq!(rec.peaks().unwrap(), &[vec![200, 2000, 3800]]);
    assert_eq!(rec.peak_windows().unwrap()[0].nrows(), 3);
    assert_eq!(rec.n_samples(), 4000);
    // The window still has the spike at its centre column.
    assert_eq!(rec.peak_windows().unwrap()[0][[0, 50]], 100.0);
    assert_eq!(rec.data()[[200, 0]], 100.0);
}

#[test]
fn filtering_recuts_windows_from_new_data() {
    let mut session = session_with(spiky(4000, &[&[1000, 2000, 3000]]));
    session.apply(Command::DetectPeaks(positive_peaks(100))).unwrap();
    let before = session.recording().unwrap().average_peak_windows().unwrap()[0].clone();

    session.apply(Command::ApplyFilter(FilterSpec::low_pass(50.0))).unwrap();
    let rec = session.recording().unwrap();
    let after = rec.average_peak_windows().unwrap()[0].clone();
    assert_eq!(rec.peaks().unwrap(), &[vec![1000, 2000, 3000]]);
    assert_ne!(before, after);
    let expected: Array1<f64> = rec.peak_windows().unwrap()[0].row(0).to_owned();
    assert_eq!(expected[50], rec.data()[[1000, 0]]);
}

#[test]
fn failed_commands_change_nothing() {
    let mut session = session_with(spiky(3000, &[&[1500], &[]]));
    session.apply(Command::DetectPeaks(positive_peaks(100))).unwrap();
    let snapshot = session.recording().unwrap().clone();

    let failures = vec![
        Command::DeleteChannels(vec![ChannelId(0), ChannelId(42)]),
        Command::Trim { start: 10, end: 10 },
        Command::Trim { start: 0, end: 3001 },
        Command::ApplyFilter(FilterSpec::band_pass(100.0, 10.0)),
        Command::DetectPeaks(PeakParams { window_size: 99, ..positive_peaks(100) }),
        Command::DetectArtifacts(ArtifactParams { segment_size: 0, ..Default::default() }),
    ];
    for cmd in failures {
        let name = cmd.name();
        assert!(session.apply(cmd).is_err(), "{name} should fail");
        let rec = session.recording().unwrap();
        assert_eq!(rec.data(), snapshot.data(), "{name}");
        assert_eq!(rec.channel_mapping(), snapshot.channel_mapping(), "{name}");
        assert_eq!(rec.peak_set(), snapshot.peak_set(), "{name}");
    }

    let err = session
        .apply(Command::KeepChannels(vec![ChannelId(5)]))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownChannel(ChannelId(5))));
}
