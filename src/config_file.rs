//! Configuration file support
//!
//! Loads converter configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    BufferConfig, ConverterConfig, DecodingConfig, EncodingConfig, OutputConfig, SampleFormatPolicy,
    SampleRatePolicy,
};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Decoder settings
    pub decoding: Option<DecodingSettings>,
    /// Encoder settings
    pub encoding: Option<EncodingSettings>,
    /// Sample buffer settings
    pub buffer: Option<BufferSettings>,
    /// Output file settings
    pub output: Option<OutputSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodingSettings {
    /// Decoder threads (0 = FFmpeg default)
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Sample format policy ("first" or "prefer_source")
    pub sample_format: Option<SampleFormatPolicy>,
    /// Sample rate policy ("source" or { fixed = N })
    pub sample_rate: Option<SampleRatePolicy>,
    /// Bit rate in bps
    pub bit_rate: Option<u64>,
    /// Frame size for encoders without a fixed one
    pub default_frame_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSettings {
    /// Longest input the FIFO may hold, in seconds
    pub max_buffered_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Append the codec extension when missing
    pub append_extension: Option<bool>,
    /// Remove the output file after a failed conversion
    pub remove_partial_output: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ConverterConfig::default();
        Self {
            decoding: Some(DecodingSettings {
                threads: defaults.decoding.threads,
            }),
            encoding: Some(EncodingSettings {
                sample_format: Some(defaults.encoding.sample_format),
                sample_rate: Some(defaults.encoding.sample_rate),
                bit_rate: None,
                default_frame_size: Some(defaults.encoding.default_frame_size),
            }),
            buffer: Some(BufferSettings {
                max_buffered_seconds: defaults.buffer.max_buffered_seconds,
            }),
            output: Some(OutputSettings {
                append_extension: Some(defaults.output.append_extension),
                remove_partial_output: Some(defaults.output.remove_partial_output),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Requested log output format, if any
    pub fn log_format(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.format.as_deref())
    }

    /// Convert to ConverterConfig
    pub fn into_converter_config(self) -> ConverterConfig {
        let defaults = ConverterConfig::default();

        let encoding = match self.encoding {
            Some(e) => EncodingConfig {
                sample_format: e
                    .sample_format
                    .unwrap_or(defaults.encoding.sample_format),
                sample_rate: e.sample_rate.unwrap_or(defaults.encoding.sample_rate),
                bit_rate: e.bit_rate,
                default_frame_size: e
                    .default_frame_size
                    .unwrap_or(defaults.encoding.default_frame_size),
            },
            None => defaults.encoding,
        };

        let output = match self.output {
            Some(o) => OutputConfig {
                append_extension: o
                    .append_extension
                    .unwrap_or(defaults.output.append_extension),
                remove_partial_output: o
                    .remove_partial_output
                    .unwrap_or(defaults.output.remove_partial_output),
            },
            None => defaults.output,
        };

        ConverterConfig {
            decoding: self
                .decoding
                .map(|d| DecodingConfig { threads: d.threads })
                .unwrap_or(defaults.decoding),
            encoding,
            buffer: self
                .buffer
                .map(|b| BufferConfig {
                    max_buffered_seconds: b.max_buffered_seconds,
                })
                .unwrap_or(defaults.buffer),
            output,
            log_level: self
                .logging
                .map(|l| l.level)
                .unwrap_or(defaults.log_level),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
