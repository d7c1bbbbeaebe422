//! Single-track audio converter
//!
//! Picks the best audio stream of an input file, decodes it, resamples it to
//! what the target encoder accepts, re-encodes it and writes it to a new
//! container together with the source's (and the caller's) metadata.

pub mod codec;
pub mod config;
pub mod config_file;
pub mod converter;
pub mod diagnostics;
pub mod error;
pub mod ffmpeg;
pub mod progress;
pub mod transcode;

#[cfg(test)]
mod integration;

pub use codec::OutputCodec;
pub use config::ConverterConfig;
pub use converter::{Converter, ConverterState};
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use error::{ConvertError, FfmpegError, Result};
pub use progress::Progress;
pub use transcode::{ConversionReport, Metadata, SourceInfo};
