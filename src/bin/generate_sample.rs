use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;
use parquet::arrow::ArrowWriter;

const SAMPLING_RATE: f64 = 20_000.0;
const DURATION_S: f64 = 10.0;
const N_CHANNELS: usize = 4;

/// Biphasic extracellular spike: a sharp negative trough followed by a
/// slower positive rebound. `t` is seconds from the trough.
fn spike_shape(t: f64, amplitude: f64) -> f64 {
    let trough = -amplitude * (-(t / 0.0003).powi(2)).exp();
    let rebound = 0.3 * amplitude * (-((t - 0.0008) / 0.0006).powi(2)).exp();
    trough + rebound
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Samples × channels recording: noise, mains hum, slow drift, a spike train
/// per channel and one positive artifact burst on channel 2.
fn generate_recording(rng: &mut SimpleRng) -> Array2<f64> {
    let n = (SAMPLING_RATE * DURATION_S) as usize;
    let mut data = Array2::<f64>::zeros((n, N_CHANNELS));

    for ch in 0..N_CHANNELS {
        let drift = rng.uniform(5.0, 15.0);
        let mut column = data.column_mut(ch);
        for (i, v) in column.iter_mut().enumerate() {
            let t = i as f64 / SAMPLING_RATE;
            *v = rng.gauss(0.0, 8.0)
                + 15.0 * (2.0 * std::f64::consts::PI * 50.0 * t).sin()
                + drift * t / DURATION_S;
        }

        // Roughly one spike per second, never closer than 0.6 s.
        let mut t_spike = rng.uniform(0.2, 0.8);
        while t_spike < DURATION_S - 0.1 {
            let amplitude = rng.uniform(90.0, 160.0);
            let center = (t_spike * SAMPLING_RATE) as i64;
            for k in -40i64..80 {
                let idx = center + k;
                if idx >= 0 && (idx as usize) < n {
                    column[idx as usize] += spike_shape(k as f64 / SAMPLING_RATE, amplitude);
                }
            }
            t_spike += rng.uniform(0.6, 1.4);
        }
    }

    let burst_start = (6.0 * SAMPLING_RATE) as usize;
    let burst_len = (0.2 * SAMPLING_RATE) as usize;
    for i in burst_start..(burst_start + burst_len).min(n) {
        data[[i, 2]] += 400.0;
    }
    data
}

/// Write a little-endian float64 `.npy` file (format version 1.0).
fn write_npy(path: &Path, data: &Array2<f64>) -> Result<()> {
    let (rows, cols) = data.dim();
    let mut header =
        format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    // magic (6) + version (2) + header length (2) + header must be a multiple of 64
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(b"\x93NUMPY")?;
    w.write_all(&[1, 0])?;
    w.write_u16::<LittleEndian>(header.len() as u16)?;
    w.write_all(header.as_bytes())?;
    for &v in data.iter() {
        w.write_f64::<LittleEndian>(v)?;
    }
    w.flush()?;
    Ok(())
}

/// Write one Float64 column per channel plus a `time` column.
fn write_parquet(path: &Path, data: &Array2<f64>) -> Result<()> {
    let mut fields = vec![Field::new("time", DataType::Float64, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Float64Array::from_iter_values(
        (0..data.nrows()).map(|i| i as f64 / SAMPLING_RATE),
    ))];
    for ch in 0..data.ncols() {
        fields.push(Field::new(format!("ch{ch}"), DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from_iter_values(data.column(ch).iter().copied())));
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut rng = SimpleRng::new(42);
    let data = generate_recording(&mut rng);

    let npy_path = out_dir.join("sample_recording.npy");
    write_npy(&npy_path, &data)?;
    let parquet_path = out_dir.join("sample_recording.parquet");
    write_parquet(&parquet_path, &data)?;

    log::info!(
        "Wrote {} samples × {} channels at {SAMPLING_RATE} Hz to {} and {}",
        data.nrows(),
        data.ncols(),
        npy_path.display(),
        parquet_path.display()
    );
    Ok(())
}
