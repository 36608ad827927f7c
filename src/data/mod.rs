/// Data layer: the recording store, loading, structural edits and export.
///
/// Architecture:
/// ```text
///  .npy / .csv / .parquet / container
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → LoadedRecording → RawRecording
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ Recording  │  data, time, channel ids, artifacts, peaks, statistics
///   └───────────┘
///        │                    │                     │
///        ▼                    ▼                     ▼
///   ┌──────────┐       ┌────────────┐        ┌──────────┐
///   │   edit    │       │ selection   │        │  export   │
///   └──────────┘       └────────────┘        └──────────┘
///  delete/keep/trim     plotted channel ids    statistics & peak CSVs
/// ```

pub mod edit;
pub mod export;
pub mod loader;
pub mod model;
pub mod selection;
