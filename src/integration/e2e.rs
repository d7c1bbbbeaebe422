//! End-to-end conversion tests
//!
//! Every test that needs an encoder skips itself when the linked FFmpeg
//! was built without it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ffmpeg_next as ffmpeg;
use tracing::Level;

use crate::codec::OutputCodec;
use crate::config::ConverterConfig;
use crate::converter::{Converter, ConverterState};
use crate::diagnostics::MemorySink;
use crate::error::{ConvertError, FfmpegError};
use crate::ffmpeg::{helpers, utils};
use crate::integration::fixtures;
use crate::progress::Progress;
use crate::transcode::{Metadata, Source};

fn encoder_available(codec: OutputCodec) -> bool {
    crate::ffmpeg::init().unwrap();
    codec.resolve_encoder().is_some()
}

fn converter_for(input: &Path) -> (Converter, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let converter = Converter::with_config(input, ConverterConfig::default(), sink.clone());
    (converter, sink)
}

fn tags(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Samples per channel the best audio stream of `path` decodes to
fn decoded_samples(path: &Path) -> usize {
    let mut source = Source::open(path).unwrap();
    let mut total = 0;
    source
        .decode_all(&Progress::new(), |frame| {
            total += frame.samples();
            Ok(())
        })
        .unwrap();
    total
}

/// Tag from the container, or from the first stream when the container
/// keeps its tags there (Ogg)
fn output_tag(path: &Path, key: &str) -> Option<String> {
    let input = helpers::open_input(path).unwrap();
    if let Some(value) = input.metadata().get(key) {
        return Some(value.to_string());
    }
    let stream = input.streams().next()?;
    let value = stream.metadata().get(key).map(str::to_string);
    value
}

fn audio_stream_count(path: &Path) -> usize {
    let input = helpers::open_input(path).unwrap();
    let count = input
        .streams()
        .filter(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
        .count();
    count
}

#[test]
fn test_stream_selection_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_two_stream_mka(dir.path(), "two.mka");

    let (mut first, _) = converter_for(&input);
    first.initialize().unwrap();
    let picked = first.source_info().unwrap().clone();

    first.initialize().unwrap();
    assert_eq!(first.source_info(), Some(&picked));

    let (mut second, _) = converter_for(&input);
    second.initialize().unwrap();
    assert_eq!(second.source_info(), Some(&picked));
}

#[test]
fn test_reset_then_initialize_matches_first_open() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 16000, 1, 0.5);

    let (mut converter, sink) = converter_for(&input);
    converter.initialize().unwrap();
    let info = converter.source_info().unwrap().clone();
    assert_eq!(info.sample_rate, 16000);
    assert_eq!(info.channels, 1);
    assert!(sink.contains(Level::INFO, "opened"));

    converter.reset();
    assert_eq!(converter.state(), ConverterState::Uninitialized);
    assert!(converter.source_info().is_none());

    converter.initialize().unwrap();
    assert_eq!(converter.state(), ConverterState::Initialized);
    assert_eq!(converter.source_info(), Some(&info));
}

#[test]
fn test_garbage_input_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_garbage(dir.path(), "noise.bin");

    let (mut converter, _) = converter_for(&input);
    let err = converter.initialize().unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Ffmpeg(FfmpegError::OpenInput(_))
            | ConvertError::Ffmpeg(FfmpegError::FindStreamInfo(_))
            | ConvertError::NoAudioStream
    ));
    assert_eq!(converter.state(), ConverterState::Uninitialized);
}

#[test]
fn test_opus_to_ogg_with_title() {
    if !encoder_available(OutputCodec::Opus) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 2, 2.0);
    let output = dir.path().join("out.ogg");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let report = converter
        .convert(OutputCodec::Opus, &output, &tags(&[("title", "T")]))
        .unwrap();

    assert_eq!(report.sample_rate, 48000);
    assert_eq!(converter.state(), ConverterState::Done);
    assert_eq!(audio_stream_count(&output), 1);
    assert_eq!(output_tag(&output, "title").as_deref(), Some("T"));

    let written = helpers::open_input(&output).unwrap();
    let duration = utils::input_duration_secs(&written).unwrap();
    let one_frame = report.frame_size as f64 / f64::from(report.sample_rate);
    assert!(
        (duration - 2.0).abs() <= one_frame + 0.005,
        "duration {} too far from 2.0 (frame {})",
        duration,
        one_frame
    );
}

#[test]
fn test_flac_conserves_samples() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 22050, 1, 1.5);
    let output = dir.path().join("out.flac");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let report = converter
        .convert(OutputCodec::Flac, &output, &Metadata::new())
        .unwrap();

    let expected = fixtures::sample_count(22050, 1.5);
    assert_eq!(report.samples_buffered, expected);
    assert_eq!(report.samples_encoded, expected);
    assert_eq!(decoded_samples(&output), expected);
}

#[test]
fn test_multi_stream_source_converts_selected_stream() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_two_stream_mka(dir.path(), "two.mka");
    let output = dir.path().join("out.flac");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let info = converter.source_info().unwrap().clone();
    let report = converter
        .convert(OutputCodec::Flac, &output, &Metadata::new())
        .unwrap();

    assert_eq!(report.sample_rate, info.sample_rate);
    assert_eq!(report.channels, info.channels);
    assert_eq!(audio_stream_count(&output), 1);
    assert_eq!(decoded_samples(&output), decoded_samples(&input));
}

#[test]
fn test_caller_metadata_overrides_source_tags() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_two_stream_mka(dir.path(), "two.mka");
    let output = dir.path().join("out.flac");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    converter
        .convert(OutputCodec::Flac, &output, &tags(&[("title", "T")]))
        .unwrap();

    assert_eq!(output_tag(&output, "title").as_deref(), Some("T"));
    assert_eq!(
        output_tag(&output, "artist").as_deref(),
        Some(fixtures::MKA_ARTIST)
    );
}

#[test]
fn test_container_rejecting_codec_leaves_no_file() {
    if !encoder_available(OutputCodec::Aac) || !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 2, 0.5);
    let bad = dir.path().join("aac.ogg");

    let (mut converter, sink) = converter_for(&input);
    converter.initialize().unwrap();
    let err = converter
        .convert(OutputCodec::Aac, &bad, &Metadata::new())
        .unwrap_err();

    assert!(matches!(err, ConvertError::Ffmpeg(_)));
    assert!(!bad.exists());
    assert_eq!(converter.state(), ConverterState::Initialized);
    assert!(sink.contains(Level::ERROR, "failed"));

    // The converter is still usable
    let good = dir.path().join("out.flac");
    converter
        .convert(OutputCodec::Flac, &good, &Metadata::new())
        .unwrap();
    assert!(good.exists());
    assert_eq!(converter.state(), ConverterState::Done);
}

#[test]
fn test_unknown_extension_fails_before_creating_file() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 8000, 1, 0.25);
    let output = dir.path().join("out.notaformat");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let err = converter
        .convert(OutputCodec::Flac, &output, &Metadata::new())
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Ffmpeg(FfmpegError::OutputFormat(_))
    ));
    assert!(!output.exists());
    assert_eq!(converter.state(), ConverterState::Initialized);
}

#[test]
fn test_second_convert_reopens_source() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 8000, 2, 0.75);

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();

    let first = dir.path().join("a.flac");
    let second = dir.path().join("b.flac");
    converter
        .convert(OutputCodec::Flac, &first, &Metadata::new())
        .unwrap();
    converter
        .convert(OutputCodec::Flac, &second, &Metadata::new())
        .unwrap();

    let expected = fixtures::sample_count(8000, 0.75);
    assert_eq!(decoded_samples(&first), expected);
    assert_eq!(decoded_samples(&second), expected);
}

#[test]
fn test_progress_is_monotonic_and_reaches_100() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 2, 3.0);
    let output = dir.path().join("out.flac");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let handle = converter.progress_handle();
    let finished = AtomicBool::new(false);

    let seen = std::thread::scope(|scope| {
        let poller = scope.spawn(|| {
            let mut seen = Vec::new();
            while !finished.load(Ordering::Acquire) {
                seen.push(handle.get());
                std::thread::yield_now();
            }
            seen.push(handle.get());
            seen
        });
        let result = converter.convert(OutputCodec::Flac, &output, &Metadata::new());
        finished.store(true, Ordering::Release);
        result.unwrap();
        poller.join().unwrap()
    });

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last().copied(), Some(100));
    assert_eq!(converter.progress(), 100);
}

#[test]
fn test_every_available_codec_writes_one_audio_stream() {
    crate::ffmpeg::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 2, 1.0);

    for codec in OutputCodec::ALL {
        if codec.resolve_encoder().is_none() {
            continue;
        }
        let output = dir
            .path()
            .join(format!("out_{}.{}", codec.name(), codec.extension()));

        let (mut converter, _) = converter_for(&input);
        converter.initialize().unwrap();
        let report = converter
            .convert(codec, &output, &Metadata::new())
            .unwrap_or_else(|e| panic!("{} failed: {}", codec, e));

        assert_eq!(report.frames_dropped, 0, "{}", codec);
        let written = helpers::open_input(&output).unwrap();
        let stream = written.streams().best(ffmpeg::media::Type::Audio).unwrap();
        assert_eq!(stream.parameters().id(), codec.codec_id(), "{}", codec);
        assert_eq!(written.nb_streams(), 1, "{}", codec);
    }
}

#[test]
fn test_input_without_audio_reports_no_audio_stream() {
    crate::ffmpeg::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_srt(dir.path(), "subs.srt");

    let (mut converter, sink) = converter_for(&input);
    let err = converter.initialize().unwrap_err();
    assert!(matches!(err, ConvertError::NoAudioStream), "got {:?}", err);
    assert_eq!(converter.state(), ConverterState::Uninitialized);
    assert!(!converter.is_initialized());
    assert!(sink.contains(Level::ERROR, "cannot open"));
}

#[test]
fn test_threaded_decode_flushes_held_frames() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 2, 2.0);
    let output = dir.path().join("out.flac");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    converter
        .convert(OutputCodec::Flac, &output, &Metadata::new())
        .unwrap();

    // frame threading keeps packets in flight until end of input
    let mut source = Source::open_with_threads(&output, 4).unwrap();
    let mut total = 0;
    let stats = source
        .decode_all(&Progress::new(), |frame| {
            total += frame.samples();
            Ok(())
        })
        .unwrap();

    assert!(stats.packets_read >= 4, "only {} packets", stats.packets_read);
    assert!(stats.frames_flushed > 0, "{:?}", stats);
    assert_eq!(total, fixtures::sample_count(44100, 2.0));
}

#[test]
fn test_resampled_lossy_output_keeps_every_sample() {
    if !encoder_available(OutputCodec::Opus) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 44100, 1, 2.0);
    let output = dir.path().join("out.ogg");

    let (mut converter, _) = converter_for(&input);
    converter.initialize().unwrap();
    let report = converter
        .convert(OutputCodec::Opus, &output, &Metadata::new())
        .unwrap();

    // the resampler tail is delivered: 2 s at 48 kHz, not short by its delay
    assert_eq!(report.sample_rate, 48000);
    let expected = fixtures::sample_count(48000, 2.0);
    assert!(
        report.samples_buffered.abs_diff(expected) <= 8,
        "buffered {} expected {}",
        report.samples_buffered,
        expected
    );
    assert_eq!(report.samples_encoded, report.samples_buffered);

    let decoded = decoded_samples(&output);
    assert!(
        decoded.abs_diff(expected) <= report.frame_size,
        "decoded {} expected {} (frame {})",
        decoded,
        expected,
        report.frame_size
    );
}

#[test]
fn test_failed_reopen_leaves_converter_initialized() {
    if !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 8000, 1, 0.5);

    let (mut converter, sink) = converter_for(&input);
    converter.initialize().unwrap();
    let info = converter.source_info().unwrap().clone();
    converter
        .convert(OutputCodec::Flac, &dir.path().join("a.flac"), &Metadata::new())
        .unwrap();
    assert_eq!(converter.state(), ConverterState::Done);

    std::fs::remove_file(&input).unwrap();
    let second = dir.path().join("b.flac");
    let err = converter
        .convert(OutputCodec::Flac, &second, &Metadata::new())
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Ffmpeg(FfmpegError::OpenInput(_))
    ));
    assert_eq!(converter.state(), ConverterState::Initialized);
    assert!(converter.is_initialized());
    assert_eq!(converter.source_info(), Some(&info));
    assert!(sink.contains(Level::ERROR, "cannot reopen"));
    assert!(!second.exists());

    // the input coming back makes the next attempt succeed
    fixtures::write_sine_wav(dir.path(), "in.wav", 8000, 1, 0.5);
    converter
        .convert(OutputCodec::Flac, &second, &Metadata::new())
        .unwrap();
    assert_eq!(converter.state(), ConverterState::Done);
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_failure_after_output_opened_removes_file() {
    let full = Path::new("/dev/full");
    if !full.exists() || !encoder_available(OutputCodec::Flac) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = fixtures::write_sine_wav(dir.path(), "in.wav", 8000, 1, 0.5);
    // every write through this path fails with ENOSPC
    let output = dir.path().join("out.flac");
    std::os::unix::fs::symlink(full, &output).unwrap();

    let (mut converter, sink) = converter_for(&input);
    converter.initialize().unwrap();
    let err = converter
        .convert(OutputCodec::Flac, &output, &Metadata::new())
        .unwrap_err();

    assert!(
        matches!(
            err,
            ConvertError::Ffmpeg(
                FfmpegError::WriteHeader(_)
                    | FfmpegError::WritePacket(_)
                    | FfmpegError::WriteTrailer(_)
            )
        ),
        "got {:?}",
        err
    );
    assert!(std::fs::symlink_metadata(&output).is_err());
    assert_eq!(converter.state(), ConverterState::Initialized);
    assert!(converter.progress() < 100);
    assert!(sink.contains(Level::ERROR, "failed"));
}
