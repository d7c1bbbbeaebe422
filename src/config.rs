//! Converter configuration

use serde::{Deserialize, Serialize};

/// How the encoder's input sample format is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormatPolicy {
    /// The first format the encoder advertises
    #[default]
    First,
    /// The decoder's format when the encoder accepts it, else `First`
    PreferSource,
}

/// How the output sample rate is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleRatePolicy {
    /// Keep the source rate
    #[default]
    Source,
    /// Always resample to this rate
    Fixed(u32),
}

/// Encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Sample format selection
    pub sample_format: SampleFormatPolicy,

    /// Sample rate selection. Rates the encoder does not support are
    /// replaced by the nearest supported one.
    pub sample_rate: SampleRatePolicy,

    /// Bit rate in bps; `None` keeps the source bit rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,

    /// Samples per frame for encoders without a fixed frame size
    pub default_frame_size: usize,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            sample_format: SampleFormatPolicy::First,
            sample_rate: SampleRatePolicy::Source,
            bit_rate: None,
            default_frame_size: 10_000,
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Decoder threads; 0 keeps FFmpeg's default of one
    pub threads: usize,
}

/// Sample buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Longest input, in seconds, the sample FIFO may hold
    pub max_buffered_seconds: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_buffered_seconds: 6 * 60 * 60,
        }
    }
}

impl BufferConfig {
    /// FIFO capacity in samples at `sample_rate`
    pub fn capacity_samples(&self, sample_rate: u32) -> usize {
        let samples = self.max_buffered_seconds.saturating_mul(u64::from(sample_rate));
        usize::try_from(samples).unwrap_or(usize::MAX)
    }
}

/// Output file handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append the codec's extension when the output path lacks one
    pub append_extension: bool,

    /// Delete the output file when a conversion fails after creating it
    pub remove_partial_output: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            append_extension: true,
            remove_partial_output: true,
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Decoder configuration
    pub decoding: DecodingConfig,

    /// Encoder configuration
    pub encoding: EncodingConfig,

    /// Sample buffer configuration
    pub buffer: BufferConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            decoding: DecodingConfig::default(),
            encoding: EncodingConfig::default(),
            buffer: BufferConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ConverterConfig {
    /// Check values that would make every conversion fail
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.encoding.default_frame_size == 0 {
            return Err(crate::error::ConvertError::Config(
                "encoding.default_frame_size must be greater than zero".into(),
            ));
        }
        if self.buffer.max_buffered_seconds == 0 {
            return Err(crate::error::ConvertError::Config(
                "buffer.max_buffered_seconds must be greater than zero".into(),
            ));
        }
        if let SampleRatePolicy::Fixed(0) = self.encoding.sample_rate {
            return Err(crate::error::ConvertError::Config(
                "encoding.sample_rate must not be zero".into(),
            ));
        }
        Ok(())
    }
}
