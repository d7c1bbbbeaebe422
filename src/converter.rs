//! The converter: one input file, any number of conversions

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Level;

use crate::codec::OutputCodec;
use crate::config::ConverterConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{ConvertError, Result};
use crate::progress::Progress;
use crate::transcode::pipeline::{self, ConversionReport, ConversionRequest};
use crate::transcode::{Metadata, Source, SourceInfo};

/// Lifecycle of a [`Converter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    /// No source open
    Uninitialized,
    /// Source open and ready to convert
    Initialized,
    /// A conversion is running
    Converting,
    /// The last conversion finished; the next one reopens the source
    Done,
}

impl fmt::Display for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConverterState::Uninitialized => "uninitialized",
            ConverterState::Initialized => "initialized",
            ConverterState::Converting => "converting",
            ConverterState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Converts the audio of one input file.
///
/// ```no_run
/// use audio_converter::{Converter, Metadata, OutputCodec};
///
/// let mut converter = Converter::new("song.flac");
/// converter.initialize()?;
/// let mut tags = Metadata::new();
/// tags.insert("title".into(), "T".into());
/// converter.convert(OutputCodec::Opus, "song.ogg".as_ref(), &tags)?;
/// # Ok::<(), audio_converter::ConvertError>(())
/// ```
pub struct Converter {
    input: PathBuf,
    config: ConverterConfig,
    sink: Arc<dyn DiagnosticSink>,
    source: Option<Source>,
    state: ConverterState,
    progress: Progress,
}

impl Converter {
    /// Converter for `input` with the default configuration, logging through
    /// `tracing`. Nothing is opened until [`initialize`](Self::initialize).
    pub fn new(input: impl AsRef<Path>) -> Self {
        Self::with_config(input, ConverterConfig::default(), Arc::new(TracingSink))
    }

    pub fn with_config(
        input: impl AsRef<Path>,
        config: ConverterConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            config,
            sink,
            source: None,
            state: ConverterState::Uninitialized,
            progress: Progress::new(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Open the input, pick its best audio stream and open a decoder for it.
    ///
    /// Anything previously opened is released first. On failure the
    /// converter is left uninitialized.
    pub fn initialize(&mut self) -> Result<()> {
        self.reset();
        let result = self.open_source();
        match result {
            Ok(source) => {
                let info = source.info();
                self.sink.emit(
                    Level::INFO,
                    &format!(
                        "opened {}: stream {} {} {} Hz {} ch",
                        self.input.display(),
                        info.stream_index,
                        info.codec,
                        info.sample_rate,
                        info.channels
                    ),
                );
                self.source = Some(source);
                self.state = ConverterState::Initialized;
                Ok(())
            }
            Err(e) => {
                self.sink.emit(
                    Level::ERROR,
                    &format!("cannot open {}: {}", self.input.display(), e),
                );
                Err(e)
            }
        }
    }

    fn open_source(&self) -> Result<Source> {
        self.config.validate()?;
        crate::ffmpeg::init()?;
        Source::open_with_threads(&self.input, self.config.decoding.threads)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            ConverterState::Initialized | ConverterState::Done
        ) && self.source.is_some()
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    /// The selected audio stream, once initialized
    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.source.as_ref().map(Source::info)
    }

    /// Convert the selected stream into `output` with `codec`, tagging the
    /// result with the source's metadata overlaid by `metadata`.
    ///
    /// Calling this again after a conversion reopens the input first. On any
    /// failure, including a failed reopen, the converter is left initialized
    /// and no output file is left behind.
    pub fn convert(
        &mut self,
        codec: OutputCodec,
        output: &Path,
        metadata: &Metadata,
    ) -> Result<ConversionReport> {
        if !self.is_initialized() {
            return Err(ConvertError::NotInitialized);
        }
        if self.source.as_ref().map_or(true, Source::is_consumed) {
            tracing::debug!(input = %self.input.display(), "reopening consumed source");
            match self.open_source() {
                Ok(source) => self.source = Some(source),
                Err(e) => {
                    // keep the spent source so the next call retries
                    self.state = ConverterState::Initialized;
                    self.sink.emit(
                        Level::ERROR,
                        &format!("cannot reopen {}: {}", self.input.display(), e),
                    );
                    return Err(e);
                }
            }
        }
        let source = self.source.as_mut().ok_or(ConvertError::NotInitialized)?;

        self.state = ConverterState::Converting;
        self.progress.reset();
        let result = pipeline::run(
            source,
            ConversionRequest {
                codec,
                output,
                metadata,
            },
            &self.config,
            self.sink.as_ref(),
            &self.progress,
        );

        match result {
            Ok(report) => {
                self.state = ConverterState::Done;
                Ok(report)
            }
            Err(e) => {
                self.state = ConverterState::Initialized;
                self.sink.emit(
                    Level::ERROR,
                    &format!("conversion to {} failed: {}", output.display(), e),
                );
                Err(e)
            }
        }
    }

    /// Current progress of the running or last conversion, 0..=100
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Handle for polling progress from another thread
    pub fn progress_handle(&self) -> Progress {
        self.progress.clone()
    }

    /// Release the source and go back to uninitialized.
    pub fn reset(&mut self) {
        self.source = None;
        self.state = ConverterState::Uninitialized;
    }

    /// Release everything.
    pub fn release(mut self) {
        self.reset();
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("input", &self.input)
            .field("state", &self.state)
            .field("progress", &self.progress.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_converter_is_send() {
        assert_send::<Converter>();
    }

    #[test]
    fn test_new_converter_is_uninitialized() {
        let converter = Converter::new("/nonexistent.wav");
        assert_eq!(converter.state(), ConverterState::Uninitialized);
        assert!(!converter.is_initialized());
        assert!(converter.source_info().is_none());
        assert_eq!(converter.progress(), 0);
    }

    #[test]
    fn test_convert_before_initialize_fails() {
        let mut converter = Converter::new("/nonexistent.wav");
        let err = converter
            .convert(OutputCodec::Flac, Path::new("/tmp/never.flac"), &Metadata::new())
            .unwrap_err();
        assert!(matches!(err, ConvertError::NotInitialized));
    }

    #[test]
    fn test_failed_initialize_stays_uninitialized_and_reports() {
        let sink = Arc::new(MemorySink::new());
        let mut converter =
            Converter::with_config("/nonexistent.wav", ConverterConfig::default(), sink.clone());
        assert!(converter.initialize().is_err());
        assert_eq!(converter.state(), ConverterState::Uninitialized);
        assert!(sink.contains(Level::ERROR, "cannot open"));
    }

    #[test]
    fn test_invalid_config_fails_initialize() {
        let mut config = ConverterConfig::default();
        config.encoding.default_frame_size = 0;
        let mut converter =
            Converter::with_config("/nonexistent.wav", config, Arc::new(MemorySink::new()));
        assert!(matches!(
            converter.initialize().unwrap_err(),
            ConvertError::Config(_)
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConverterState::Converting.to_string(), "converting");
    }
}
