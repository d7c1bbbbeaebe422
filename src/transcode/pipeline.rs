//! Conversion pipeline
//!
//! Runs one conversion in two phases. The whole source is first decoded,
//! resampled to the encoder's format and collected in a [`SampleFifo`]; the
//! FIFO is then drained in encoder-sized frames whose packets go straight to
//! the output file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::Level;

use super::encoder::AudioEncoder;
use super::fifo::SampleFifo;
use super::metadata::{merge_metadata, Metadata};
use super::muxer::{OutputWriter, PartialOutputGuard};
use super::plan::EncodePlan;
use super::resampler::AudioResampler;
use super::source::Source;
use crate::codec::OutputCodec;
use crate::config::ConverterConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::{ConvertError, FfmpegError, Result};
use crate::progress::Progress;

/// What a finished conversion produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub codec: OutputCodec,
    pub encoder: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
    pub bit_rate: u64,
    pub frame_size: usize,
    pub frames_decoded: u64,
    /// Frames released by the decoder's end-of-stream flush
    pub frames_flushed: u64,
    /// Frames the resampler could not convert
    pub frames_dropped: u64,
    pub samples_buffered: usize,
    pub samples_encoded: usize,
    pub packets_written: u64,
    pub duration_secs: f64,
}

/// One conversion request
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    pub codec: OutputCodec,
    pub output: &'a Path,
    pub metadata: &'a Metadata,
}

/// Convert the whole of `source` as described by `request`.
///
/// The output file is removed again if anything fails after it was created
/// (unless disabled in `config`). Progress runs from 0 to 100; 100 is only
/// published once the trailer is on disk.
pub fn run(
    source: &mut Source,
    request: ConversionRequest<'_>,
    config: &ConverterConfig,
    sink: &dyn DiagnosticSink,
    progress: &Progress,
) -> Result<ConversionReport> {
    progress.reset();

    let plan = EncodePlan::resolve(request.codec, source, &config.encoding)?;

    // ── 1. Output container, encoder, header ──────────────────────────────
    // Declared before the writer so it drops after the file is closed
    let guard: PartialOutputGuard;
    let mut writer = OutputWriter::create(request.output)?;
    guard = PartialOutputGuard::new(
        request.output,
        writer.opened_file() && config.output.remove_partial_output,
    );

    let mut encoder = AudioEncoder::open(
        &plan,
        writer.requires_global_header(),
        config.encoding.default_frame_size,
    )?;

    let tags = merge_metadata(
        source
            .info()
            .metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
        request.metadata,
    );
    writer.add_audio_stream(&encoder, &tags)?;
    writer.write_header()?;

    sink.emit(
        Level::INFO,
        &format!(
            "converting {} ({}, {} Hz, {} ch) to {} with {} at {} Hz",
            source.info().path.display(),
            source.info().codec,
            source.info().sample_rate,
            source.info().channels,
            request.output.display(),
            encoder.name(),
            plan.sample_rate,
        ),
    );

    // ── 2. Decode everything into the FIFO ────────────────────────────────
    let mut fifo = SampleFifo::new(
        plan.sample_format,
        plan.channels,
        config.buffer.capacity_samples(plan.sample_rate),
    );
    fifo.reserve(reserve_hint(source.info().duration_secs, plan.sample_rate));

    let mut resampler = AudioResampler::new(plan.resample_target());
    let mut frames_dropped = 0u64;

    let stats = source.decode_all(progress, |mut frame| {
        match resampler.convert(&mut frame) {
            Ok(out) => fifo.push_frame(&out),
            Err(ConvertError::Ffmpeg(FfmpegError::Resample(msg))) => {
                frames_dropped += 1;
                sink.emit(Level::WARN, &format!("dropping frame: {}", msg));
                Ok(())
            }
            Err(e) => Err(e),
        }
    })?;

    for frame in resampler.flush()? {
        fifo.push_frame(&frame)?;
    }

    let samples_buffered = fifo.len();
    tracing::debug!(
        samples = samples_buffered,
        frames = stats.frames_decoded,
        dropped = frames_dropped,
        "decode phase complete"
    );

    // ── 3. Drain the FIFO through the encoder ─────────────────────────────
    let frame_size = encoder.frame_size();
    let min_samples = if encoder.pads_last_frame() {
        frame_size
    } else {
        0
    };
    let time_base = encoder.time_base();

    while let Some(mut frame) =
        fifo.pop_frame(frame_size, min_samples, plan.channel_layout, plan.sample_rate)
    {
        for packet in encoder.encode_frame(&mut frame)? {
            writer.write_packet(packet, time_base)?;
        }
        progress.encode_position(fifo.total_read(), samples_buffered);
    }

    for packet in encoder.flush()? {
        writer.write_packet(packet, time_base)?;
    }

    // ── 4. Trailer ─────────────────────────────────────────────────────────
    writer.finish()?;
    guard.commit();
    progress.complete();

    let report = ConversionReport {
        output_path: request.output.to_path_buf(),
        codec: request.codec,
        encoder: encoder.name().to_string(),
        sample_rate: plan.sample_rate,
        channels: plan.channels,
        sample_format: plan.sample_format.name().to_string(),
        bit_rate: plan.bit_rate,
        frame_size,
        frames_decoded: stats.frames_decoded,
        frames_flushed: stats.frames_flushed,
        frames_dropped,
        samples_buffered,
        samples_encoded: fifo.total_read(),
        packets_written: writer.packets_written(),
        duration_secs: samples_to_secs(samples_buffered, plan.sample_rate),
    };

    sink.emit(
        Level::INFO,
        &format!(
            "wrote {} ({} packets, {:.2}s)",
            request.output.display(),
            report.packets_written,
            report.duration_secs
        ),
    );
    Ok(report)
}

/// Longest stretch of audio allocated up front; the FIFO grows past it
/// on demand
pub const MAX_RESERVED_SECS: u32 = 60;

/// Samples to reserve in the FIFO for a source of `duration_secs`.
///
/// Container durations can be wildly wrong, so the hint never exceeds
/// [`MAX_RESERVED_SECS`].
pub fn reserve_hint(duration_secs: Option<f64>, rate: u32) -> usize {
    let Some(duration) = duration_secs.filter(|d| d.is_finite() && *d > 0.0) else {
        return 0;
    };
    let cap = u64::from(MAX_RESERVED_SECS) * u64::from(rate);
    let wanted = (duration * f64::from(rate)).ceil();
    let samples = if wanted >= cap as f64 { cap } else { wanted as u64 };
    usize::try_from(samples).unwrap_or(usize::MAX)
}

/// Seconds `samples` samples last at `rate`
pub fn samples_to_secs(samples: usize, rate: u32) -> f64 {
    if rate == 0 {
        return 0.0;
    }
    samples as f64 / f64::from(rate)
}
