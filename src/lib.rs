#![warn(clippy::all, rust_2018_idioms)]

//! Analysis engine for multi-channel electrophysiology recordings.
//!
//! A [`session::Session`] owns the loaded [`data::model::Recording`] and
//! applies [`session::Command`]s to it; the `dsp` operators are pure
//! functions over samples × channels matrices.

pub mod config;
pub mod data;
pub mod dsp;
pub mod error;
pub mod session;

pub use config::AnalysisConfig;
pub use data::model::{ChannelId, PeakSet, RawRecording, Recording};
pub use error::{AnalysisError, Result};
pub use session::{Command, CommandOutcome, Session};
