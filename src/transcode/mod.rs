//! Audio transcoding module
//!
//! This module handles single-track audio conversion:
//! - Best audio stream selection and decoding
//! - Resampling to the encoder's sample format and rate
//! - Re-chunking into encoder-sized frames through a sample FIFO
//! - Encoding with gap-free timestamps
//! - Muxing into the output container with merged metadata

pub mod decoder;
pub mod encoder;
pub mod fifo;
pub mod metadata;
pub mod muxer;
pub mod pipeline;
pub mod plan;
pub mod resampler;
pub mod source;

pub use metadata::Metadata;
pub use pipeline::{ConversionReport, ConversionRequest};
pub use source::{Source, SourceInfo};
