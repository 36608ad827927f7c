/// Signal-processing operators. Every function here is pure: it reads a
/// matrix (samples × channels) and returns a new result without touching
/// session state.
///
/// ```text
///   data ──► filter ──► data'            (zero-phase IIR)
///   data ──► artifact ──► bool mask      (segment z-scores)
///   data ──► peaks ──► indices ──► window ──► waveforms, averages
///   data + peaks + time ──► stats
/// ```

pub mod artifact;
pub mod filter;
pub mod peaks;
pub mod stats;
pub mod window;
