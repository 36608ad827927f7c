use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use ndarray::{Array1, Array2, ShapeBuilder};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::RawRecording;
use crate::error::AnalysisError;

/// Name of the optional time column in tabular formats (case-insensitive).
pub const TIME_COLUMN: &str = "time";

// ---------------------------------------------------------------------------
// Loaded file contents
// ---------------------------------------------------------------------------

/// Samples × channels matrix as read from disk, before a sampling rate is
/// attached.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub data: Array2<f64>,
    /// Time axis in seconds when the file carries one.
    pub time: Option<Array1<f64>>,
    /// Sampling rate stored in the file, if the format has one.
    pub sampling_rate: Option<f64>,
}

impl LoadedRecording {
    /// Attach a sampling rate. The embedded rate wins over `fallback_rate`;
    /// without a time column the axis is `sample_index / rate`.
    pub fn into_raw(self, fallback_rate: f64) -> crate::error::Result<RawRecording> {
        let sampling_rate = self.sampling_rate.unwrap_or(fallback_rate);
        let raw = match self.time {
            Some(time) => RawRecording { data: self.data, time, sampling_rate },
            None => RawRecording::from_samples(self.data, sampling_rate)?,
        };
        raw.validate()?;
        Ok(raw)
    }
}

// ---------------------------------------------------------------------------
// Vendor containers
// ---------------------------------------------------------------------------

/// Reader for an acquisition-hardware container format such as `.rhd`/`.rhs`.
pub trait ContainerReader: Send + Sync {
    /// Lower-case extensions (without the dot) this reader handles.
    fn extensions(&self) -> &[&str];

    /// Channels × samples matrix and the sampling rate stored in the file.
    fn read(&self, path: &Path) -> Result<(Array2<f64>, f64)>;
}

/// Extensions that are recognised as vendor containers even when no reader
/// for them is registered.
pub const CONTAINER_EXTENSIONS: &[&str] = &["rhd", "rhs"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Extension dispatcher with optional container readers.
#[derive(Default)]
pub struct Loader {
    readers: Vec<Box<dyn ContainerReader>>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reader: Box<dyn ContainerReader>) {
        self.readers.push(reader);
    }

    /// Load a recording from a file.  Dispatch by extension.
    ///
    /// Supported formats:
    /// * `.npy`             – 2-D samples × channels array (1-D is one channel)
    /// * `.csv`             – one numeric column per channel, optional `time`
    /// * `.parquet` / `.pq` – one numeric column per channel, optional `time`
    /// * registered containers (`.rhd`, `.rhs`, ...)
    pub fn load(&self, path: &Path) -> Result<LoadedRecording> {
        if !path.exists() {
            return Err(AnalysisError::FileNotFound(path.to_path_buf()).into());
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let loaded = match ext.as_str() {
            "npy" => load_npy(path),
            "csv" => load_csv(path),
            "parquet" | "pq" => load_parquet(path),
            other => match self.readers.iter().find(|r| r.extensions().contains(&other)) {
                Some(reader) => load_container(reader.as_ref(), path),
                None => Err(AnalysisError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    extension: other.to_string(),
                }
                .into()),
            },
        }
        .with_context(|| format!("loading {}", path.display()))?;

        log::info!(
            "Loaded {} ({} samples × {} channels)",
            path.display(),
            loaded.data.nrows(),
            loaded.data.ncols()
        );
        Ok(loaded)
    }
}

/// Load with the built-in formats only.
pub fn load_file(path: &Path) -> Result<LoadedRecording> {
    Loader::new().load(path)
}

fn load_container(reader: &dyn ContainerReader, path: &Path) -> Result<LoadedRecording> {
    let (channels_by_samples, rate) = reader.read(path)?;
    if !(rate.is_finite() && rate > 0.0) {
        bail!("container reports an invalid sampling rate {rate}");
    }
    let data = channels_by_samples.reversed_axes().as_standard_layout().into_owned();
    let samples = data.nrows();
    let time = Array1::linspace(0.0, samples as f64 / rate, samples);
    Ok(LoadedRecording { data, time: Some(time), sampling_rate: Some(rate) })
}

// ---------------------------------------------------------------------------
// NumPy .npy loader
// ---------------------------------------------------------------------------

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NpyKind {
    F4,
    F8,
    I2,
    I4,
    I8,
}

impl NpyKind {
    fn item_size(self) -> usize {
        match self {
            NpyKind::I2 => 2,
            NpyKind::F4 | NpyKind::I4 => 4,
            NpyKind::F8 | NpyKind::I8 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NpyHeader {
    kind: NpyKind,
    big_endian: bool,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// `.npy` layout: magic, version, header length, then a Python dict literal
/// such as `{'descr': '<f8', 'fortran_order': False, 'shape': (1000, 4), }`
/// padded with spaces, followed by the raw array bytes.
fn load_npy(path: &Path) -> Result<LoadedRecording> {
    let file = File::open(path).context("opening npy file")?;
    let file_len = file.metadata().context("reading npy file size")?.len();
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic).context("reading npy magic")?;
    if &magic[..] != NPY_MAGIC {
        bail!("not a NumPy .npy file");
    }
    let major = reader.read_u8().context("reading npy version")?;
    let _minor = reader.read_u8().context("reading npy version")?;
    let (header_len, prefix_len) = match major {
        1 => (reader.read_u16::<LittleEndian>()? as usize, 10),
        2 | 3 => (reader.read_u32::<LittleEndian>()? as usize, 12),
        v => bail!("unsupported npy format version {v}"),
    };
    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header).context("reading npy header")?;
    let header = parse_npy_header(&String::from_utf8_lossy(&header))?;

    let (rows, cols) = match header.shape.as_slice() {
        [n] => (*n, 1),
        [r, c] => (*r, *c),
        other => bail!("expected a 1-D or 2-D array, got shape {other:?}"),
    };
    let payload = file_len.saturating_sub((prefix_len + header_len) as u64);
    let count = npy_element_count(rows, cols, header.kind, payload)?;
    let values = if header.big_endian {
        read_npy_values::<BigEndian, _>(&mut reader, header.kind, count)
    } else {
        read_npy_values::<LittleEndian, _>(&mut reader, header.kind, count)
    }
    .context("npy data is shorter than its header declares")?;

    let data = if header.fortran_order {
        Array2::from_shape_vec((rows, cols).f(), values)?
            .as_standard_layout()
            .into_owned()
    } else {
        Array2::from_shape_vec((rows, cols), values)?
    };
    Ok(LoadedRecording { data, time: None, sampling_rate: None })
}

/// Number of elements the header declares, checked against the `payload`
/// bytes actually present so a corrupt shape never drives an allocation.
fn npy_element_count(rows: usize, cols: usize, kind: NpyKind, payload: u64) -> Result<usize> {
    let count = rows
        .checked_mul(cols)
        .with_context(|| format!("npy shape ({rows}, {cols}) overflows"))?;
    let needed = count
        .checked_mul(kind.item_size())
        .with_context(|| format!("npy shape ({rows}, {cols}) overflows"))?;
    if needed as u64 > payload {
        bail!("npy header declares {needed} data bytes but the file holds {payload}");
    }
    Ok(count)
}

fn read_npy_values<B: ByteOrder, R: Read>(
    reader: &mut R,
    kind: NpyKind,
    count: usize,
) -> std::io::Result<Vec<f64>> {
    match kind {
        NpyKind::F8 => {
            let mut buf = vec![0f64; count];
            reader.read_f64_into::<B>(&mut buf)?;
            Ok(buf)
        }
        NpyKind::F4 => {
            let mut buf = vec![0f32; count];
            reader.read_f32_into::<B>(&mut buf)?;
            Ok(buf.into_iter().map(f64::from).collect())
        }
        NpyKind::I2 => {
            let mut buf = vec![0i16; count];
            reader.read_i16_into::<B>(&mut buf)?;
            Ok(buf.into_iter().map(f64::from).collect())
        }
        NpyKind::I4 => {
            let mut buf = vec![0i32; count];
            reader.read_i32_into::<B>(&mut buf)?;
            Ok(buf.into_iter().map(f64::from).collect())
        }
        NpyKind::I8 => {
            let mut buf = vec![0i64; count];
            reader.read_i64_into::<B>(&mut buf)?;
            Ok(buf.into_iter().map(|v| v as f64).collect())
        }
    }
}

/// Value following `'key':` in the header dict, up to the next top-level comma.
fn header_field<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let needle = format!("'{key}':");
    let start = header
        .find(&needle)
        .with_context(|| format!("npy header has no '{key}' entry"))?
        + needle.len();
    let rest = header[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find([',', '}'])
    }
    .with_context(|| format!("npy header entry '{key}' is not terminated"))?;
    Ok(rest[..end].trim())
}

fn parse_npy_header(header: &str) -> Result<NpyHeader> {
    let descr = header_field(header, "descr")?.trim_matches(|c: char| c == '\'' || c == '"');
    let (order_char, type_code) = descr.split_at(descr.len().min(1));
    let big_endian = match order_char {
        ">" => true,
        "<" | "=" | "|" => false,
        _ => bail!("unrecognised npy descr '{descr}'"),
    };
    let kind = match type_code {
        "f4" => NpyKind::F4,
        "f8" => NpyKind::F8,
        "i2" => NpyKind::I2,
        "i4" => NpyKind::I4,
        "i8" => NpyKind::I8,
        other => bail!("unsupported npy dtype '{other}' (expected f4, f8, i2, i4 or i8)"),
    };

    let fortran_order = match header_field(header, "fortran_order")? {
        "True" => true,
        "False" => false,
        other => bail!("invalid fortran_order value '{other}'"),
    };

    let shape = header_field(header, "shape")?
        .trim_matches(|c: char| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("invalid npy dimension '{s}'")))
        .collect::<Result<Vec<_>>>()?;

    Ok(NpyHeader { kind, big_endian, fortran_order, shape })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names, one row per sample.
/// A column named `time` is taken as the time axis in seconds; every other
/// column is a channel.
fn load_csv(path: &Path) -> Result<LoadedRecording> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let time_idx = headers.iter().position(|h| h.eq_ignore_ascii_case(TIME_COLUMN));
    let n_channels = headers.len() - usize::from(time_idx.is_some());
    if n_channels == 0 {
        bail!("CSV has no channel columns");
    }

    let mut values = Vec::new();
    let mut time = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!("CSV row {row_no}: {} fields, header has {}", record.len(), headers.len());
        }
        for (col_idx, field) in record.iter().enumerate() {
            let value = field.trim().parse::<f64>().with_context(|| {
                format!("Row {row_no}, column '{}': '{field}' is not a number", headers[col_idx])
            })?;
            if Some(col_idx) == time_idx {
                time.push(value);
            } else {
                values.push(value);
            }
        }
    }

    let rows = values.len() / n_channels;
    let data = Array2::from_shape_vec((rows, n_channels), values)?;
    Ok(LoadedRecording {
        data,
        time: time_idx.map(|_| Array1::from(time)),
        sampling_rate: None,
    })
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one numeric column per channel.
///
/// Float64, Float32, Int16, Int32 and Int64 columns are accepted; columns with
/// nulls are rejected. A column named `time` is the time axis in seconds.
fn load_parquet(path: &Path) -> Result<LoadedRecording> {
    let file = File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let time_idx = names.iter().position(|n| n.eq_ignore_ascii_case(TIME_COLUMN));
    let channel_cols: Vec<usize> = (0..names.len()).filter(|&i| Some(i) != time_idx).collect();
    if channel_cols.is_empty() {
        bail!("Parquet file has no channel columns");
    }

    let reader = builder.build().context("building parquet reader")?;
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            column.extend(
                extract_f64_column(array)
                    .with_context(|| format!("column '{}'", names[col_idx]))?,
            );
        }
    }

    let rows = columns[channel_cols[0]].len();
    let data = Array2::from_shape_fn((rows, channel_cols.len()), |(i, c)| {
        columns[channel_cols[c]][i]
    });
    let time = time_idx.map(|idx| Array1::from(std::mem::take(&mut columns[idx])));
    Ok(LoadedRecording { data, time, sampling_rate: None })
}

// -- Arrow helpers --

/// Read a numeric Arrow column as `f64`. Null cells are rejected.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        bail!("{} null cells; every sample must have a value", col.null_count());
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Ok(arr.values().to_vec())
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Ok(arr.values().iter().map(|&v| f64::from(v)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int16Array>() {
        Ok(arr.values().iter().map(|&v| f64::from(v)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(arr.values().iter().map(|&v| f64::from(v)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(arr.values().iter().map(|&v| v as f64).collect())
    } else {
        bail!("column type is {:?}, expected a numeric column", col.data_type())
    }
}
