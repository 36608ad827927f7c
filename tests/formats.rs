use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int16Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use ephys_panda::data::export::{export_peak_events, export_statistics, import_channel_statistics};
use ephys_panda::data::loader::{ContainerReader, Loader, load_file};
use ephys_panda::dsp::peaks::{PeakParams, Polarity};
use ephys_panda::{AnalysisError, Command, Recording, Session};

fn write_npy_f8(path: &Path, shape: &str, fortran: bool, values: &[f64]) {
    let order = if fortran { "True" } else { "False" };
    let mut header = format!("{{'descr': '<f8', 'fortran_order': {order}, 'shape': {shape}, }}");
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut f = File::create(path).unwrap();
    f.write_all(b"\x93NUMPY\x01\x00").unwrap();
    f.write_u16::<LittleEndian>(header.len() as u16).unwrap();
    f.write_all(header.as_bytes()).unwrap();
    for &v in values {
        f.write_f64::<LittleEndian>(v).unwrap();
    }
}

fn unsupported_extension(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::UnsupportedFormat { extension, .. }) => Some(extension.clone()),
        _ => None,
    }
}

#[test]
fn npy_c_and_fortran_order_load_identically() {
    let dir = TempDir::new().unwrap();
    let c_path = dir.path().join("c.npy");
    let f_path = dir.path().join("f.npy");
    // 3 samples × 2 channels: [[0, 10], [1, 11], [2, 12]]
    write_npy_f8(&c_path, "(3, 2)", false, &[0.0, 10.0, 1.0, 11.0, 2.0, 12.0]);
    write_npy_f8(&f_path, "(3, 2)", true, &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);

    let c = load_file(&c_path).unwrap();
    let f = load_file(&f_path).unwrap();
    assert_eq!(c.data.dim(), (3, 2));
    assert_eq!(c.data, f.data);
    assert_eq!(c.data[[2, 1]], 12.0);
    assert!(c.time.is_none() && c.sampling_rate.is_none());
}

#[test]
fn one_dimensional_npy_is_a_single_channel() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mono.NPY");
    write_npy_f8(&path, "(4,)", false, &[1.0, 2.0, 3.0, 4.0]);

    let raw = load_file(&path).unwrap().into_raw(2.0).unwrap();
    assert_eq!(raw.data.dim(), (4, 1));
    assert_eq!(raw.time.to_vec(), vec![0.0, 0.5, 1.0, 1.5]);
}

#[test]
fn truncated_npy_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.npy");
    write_npy_f8(&path, "(10, 2)", false, &[1.0, 2.0, 3.0]);
    assert!(load_file(&path).is_err());
}

#[test]
fn npy_shape_larger_than_the_file_is_an_error() {
    let dir = TempDir::new().unwrap();

    let overflowing = dir.path().join("overflow.npy");
    write_npy_f8(&overflowing, "(4294967296, 4294967296)", false, &[1.0]);
    let err = load_file(&overflowing).unwrap_err();
    assert!(format!("{err:#}").contains("overflows"), "{err:#}");

    let oversized = dir.path().join("oversized.npy");
    write_npy_f8(&oversized, "(100000000, 64)", false, &[1.0, 2.0]);
    let err = load_file(&oversized).unwrap_err();
    assert!(format!("{err:#}").contains("file holds 16"), "{err:#}");
}

#[test]
fn csv_time_column_becomes_the_time_axis() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.csv");
    std::fs::write(&path, "a,Time,b\n1.0,0.00,-1\n2.0,0.25,-2\n3.0,0.50,-3\n").unwrap();

    let loaded = load_file(&path).unwrap();
    assert_eq!(loaded.data.dim(), (3, 2));
    assert_eq!(loaded.data.column(1).to_vec(), vec![-1.0, -2.0, -3.0]);
    assert_eq!(loaded.time.as_ref().unwrap().to_vec(), vec![0.0, 0.25, 0.5]);

    let raw = loaded.into_raw(4.0).unwrap();
    assert_eq!(raw.time[2], 0.5);
}

#[test]
fn csv_with_text_cells_reports_the_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "a,b\n1,2\n3,oops\n").unwrap();
    let err = load_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("'b'"), "{err:#}");
}

#[test]
fn parquet_columns_are_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Float64, false),
        Field::new("ch0", DataType::Float64, false),
        Field::new("ch1", DataType::Int16, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(vec![0.0, 0.001, 0.002])),
        Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
        Arc::new(Int16Array::from(vec![-3i16, 0, 7])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let loaded = load_file(&path).unwrap();
    assert_eq!(loaded.data.dim(), (3, 2));
    assert_eq!(loaded.data.column(0).to_vec(), vec![0.5, 1.5, 2.5]);
    assert_eq!(loaded.data.column(1).to_vec(), vec![-3.0, 0.0, 7.0]);
    assert_eq!(loaded.time.unwrap().to_vec(), vec![0.0, 0.001, 0.002]);
}

#[test]
fn parquet_nulls_are_rejected_by_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gappy.parquet");
    let schema = Arc::new(Schema::new(vec![Field::new("ch0", DataType::Float64, true)]));
    let column: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![column]).unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let err = load_file(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("'ch0'") && message.contains("null"), "{message}");
}

#[test]
fn non_finite_samples_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nan.csv");
    std::fs::write(&path, "a,b\n1,2\nNaN,4\n").unwrap();

    let err = load_file(&path).unwrap().into_raw(100.0).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidParameter(_)), "{err}");
}

#[test]
fn missing_and_unknown_files_are_typed_errors() {
    let dir = TempDir::new().unwrap();

    let err = load_file(&dir.path().join("absent.npy")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AnalysisError>(),
        Some(AnalysisError::FileNotFound(_))
    ));

    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();
    let err = load_file(&path).unwrap_err();
    assert_eq!(unsupported_extension(&err).as_deref(), Some("txt"));
}

struct FakeRhs;

impl ContainerReader for FakeRhs {
    fn extensions(&self) -> &[&str] {
        &["rhs"]
    }

    fn read(&self, _path: &Path) -> anyhow::Result<(Array2<f64>, f64)> {
        // 3 channels × 4 samples
        Ok((Array2::from_shape_fn((3, 4), |(c, i)| (100 * c + i) as f64), 2.0))
    }
}

#[test]
fn containers_need_a_registered_reader() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("session.rhs");
    std::fs::write(&path, [0u8; 16]).unwrap();

    let err = Loader::new().load(&path).unwrap_err();
    assert_eq!(unsupported_extension(&err).as_deref(), Some("rhs"));

    let mut loader = Loader::new();
    loader.register(Box::new(FakeRhs));
    let raw = loader.load(&path).unwrap().into_raw(30_000.0).unwrap();
    assert_eq!(raw.sampling_rate, 2.0);
    assert_eq!(raw.data.dim(), (4, 3));
    assert_eq!(raw.data[[3, 2]], 203.0);
    assert_eq!(raw.time[0], 0.0);
    assert!((raw.time[3] - 2.0).abs() < 1e-12);
}

fn analysed_recording() -> Recording {
    let mut data = Array2::<f64>::zeros((4000, 2));
    for &p in &[800, 1900, 3100] {
        data[[p, 0]] = 80.0;
    }
    data[[2000, 1]] = -5.0;
    let raw = ephys_panda::RawRecording::from_samples(data, 1000.0).unwrap();

    let mut session = Session::new();
    session.apply(Command::Load(raw)).unwrap();
    session
        .apply(Command::DetectPeaks(PeakParams {
            polarity: Polarity::Positive,
            min_distance_s: 0.2,
            height: Some(40.0),
            prominence: None,
            window_size: 100,
        }))
        .unwrap();
    session.recording().unwrap().clone()
}

#[test]
fn statistics_workbook_round_trips_channel_sheet() {
    let dir = TempDir::new().unwrap();
    let rec = analysed_recording();

    let paths = export_statistics(&rec, &dir.path().join("summary.xlsx")).unwrap();
    assert!(paths.channel_statistics.ends_with("summary.channel_statistics.csv"));
    let peak_sheet = paths.peak_statistics.unwrap();
    assert!(peak_sheet.exists());

    let imported = import_channel_statistics(&paths.channel_statistics).unwrap();
    assert_eq!(imported, rec.channel_statistics());

    let sheet = std::fs::read_to_string(peak_sheet).unwrap();
    let mut lines = sheet.lines();
    assert!(lines.next().unwrap().starts_with("Original Channel,num_peaks"));
    assert!(lines.next().unwrap().starts_with("0,3,"));
}

#[test]
fn peak_events_list_every_peak() {
    let dir = TempDir::new().unwrap();
    let rec = analysed_recording();
    let path = dir.path().join("events.csv");

    let rows = export_peak_events(&rec, &path).unwrap();
    assert_eq!(rows, 3);
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Channel,Time (s),Amplitude,Inter-peak Distance (samples)");
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[2], "0,1.900000,80.000000,1100");
}
