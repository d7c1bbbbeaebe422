use thiserror::Error;

/// Main error type for the audio converter
#[derive(Error, Debug)]
pub enum ConvertError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input container has no decodable audio stream
    #[error("No audio stream found in source file")]
    NoAudioStream,

    /// `convert` was called before a successful `initialize`
    #[error("Converter is not initialized")]
    NotInitialized,

    /// The sample FIFO would exceed its configured capacity
    #[error("Sample buffer overflow: {requested} samples requested, capacity {capacity}")]
    BufferOverflow { capacity: usize, requested: usize },

    /// An output codec name or identifier that is not supported
    #[error("Unknown output codec: {0}")]
    UnknownCodec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening or parsing an input container
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// Codec parameters of the input could not be determined
    #[error("Failed to find stream info: {0}")]
    FindStreamInfo(String),

    /// Failure creating or opening a decoder
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// No muxer could be inferred for the output path
    #[error("Failed to allocate output format: {0}")]
    OutputFormat(String),

    /// Failure opening the output I/O sink
    #[error("Failed to open output: {0}")]
    OpenOutput(String),

    /// No encoder registered for the requested codec
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure opening a configured encoder
    #[error("Failed to create encoder: {0}")]
    EncoderCreate(String),

    /// The encoder advertises no usable sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure converting a single frame
    #[error("Failed to resample frame: {0}")]
    Resample(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure decoding a packet into frames
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a frame into packets
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure configuring the output stream
    #[error("Stream configuration failed: {0}")]
    StreamConfig(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ConvertError>;
