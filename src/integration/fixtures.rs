//! Test fixtures for integration tests
//!
//! Generates small media files on the fly so the tests need nothing on disk.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::ffmpeg::helpers;

/// Tags the two-stream Matroska fixture carries at container level
pub const MKA_TITLE: &str = "Source Title";
pub const MKA_ARTIST: &str = "Source Artist";

/// Number of sample frames `secs` seconds last at `rate`
pub fn sample_count(rate: u32, secs: f64) -> usize {
    (f64::from(rate) * secs).round() as usize
}

/// Write a 16-bit PCM WAV holding a 440 Hz sine on every channel.
pub fn write_sine_wav(dir: &Path, name: &str, rate: u32, channels: u16, secs: f64) -> PathBuf {
    let frames = sample_count(rate, secs);
    let block_align = u32::from(channels) * 2;
    let data_len = frames as u32 * block_align;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&(rate * block_align).to_le_bytes());
    bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..frames {
        let t = i as f64 / f64::from(rate);
        let value = ((2.0 * PI * 440.0 * t).sin() * 0.3 * f64::from(i16::MAX)) as i16;
        for _ in 0..channels {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    let path = dir.join(name);
    fs::write(&path, bytes).expect("write wav fixture");
    path
}

/// Write a Matroska file with two PCM audio streams and container tags.
///
/// Stream 0 is 0.5 s of 8 kHz mono, stream 1 is 1 s of 44.1 kHz stereo.
pub fn write_two_stream_mka(dir: &Path, name: &str) -> PathBuf {
    crate::ffmpeg::init().expect("ffmpeg init");

    let parts = [
        write_sine_wav(dir, "mka_part_0.wav", 8000, 1, 0.5),
        write_sine_wav(dir, "mka_part_1.wav", 44100, 2, 1.0),
    ];
    let mut inputs: Vec<_> = parts
        .iter()
        .map(|p| helpers::open_input(p).expect("open fixture part"))
        .collect();

    let path = dir.join(name);
    let mut output = helpers::create_output(&path).expect("create mka").output;

    for input in &inputs {
        let in_stream = input.stream(0).expect("fixture part has a stream");
        let mut out_stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .expect("add stream");
        out_stream.set_parameters(in_stream.parameters());
        out_stream.set_time_base(in_stream.time_base());
        helpers::stream_reset_codec_tag(&mut out_stream);
    }

    let mut tags = ffmpeg::Dictionary::new();
    tags.set("title", MKA_TITLE);
    tags.set("artist", MKA_ARTIST);
    output.set_metadata(tags);
    output.write_header().expect("write mka header");

    for (index, input) in inputs.iter_mut().enumerate() {
        let in_tb = input.stream(0).expect("stream").time_base();
        let out_tb = output.stream(index).expect("stream").time_base();
        for (_, mut packet) in input.packets() {
            packet.set_stream(index);
            packet.rescale_ts(in_tb, out_tb);
            packet.set_position(-1);
            packet
                .write_interleaved(&mut output)
                .expect("write mka packet");
        }
    }
    output.write_trailer().expect("write mka trailer");
    path
}

/// Write a SubRip subtitle file: a valid container without any audio.
pub fn write_srt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let text = "1\n00:00:00,000 --> 00:00:01,500\nFirst line\n\n\
                2\n00:00:02,000 --> 00:00:03,000\nSecond line\n\n";
    fs::write(&path, text).expect("write srt fixture");
    path
}

/// Write a file that no demuxer recognizes.
pub fn write_garbage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let bytes: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    fs::write(&path, bytes).expect("write garbage fixture");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_wav_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sine_wav(dir.path(), "a.wav", 8000, 2, 0.25);
        let bytes = fs::read(&path).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 2000 * 4);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            8000
        );
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(44100, 0.5), 22050);
        assert_eq!(sample_count(8000, 0.0), 0);
    }

    #[test]
    fn test_srt_has_only_a_subtitle_stream() {
        crate::ffmpeg::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "subs.srt");

        let input = helpers::open_input(&path).unwrap();
        let media: Vec<_> = input.streams().map(|s| s.parameters().medium()).collect();
        assert_eq!(media, vec![ffmpeg::media::Type::Subtitle]);
    }

    #[test]
    fn test_two_stream_mka_has_two_audio_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_two_stream_mka(dir.path(), "two.mka");

        let input = helpers::open_input(&path).unwrap();
        let audio = input
            .streams()
            .filter(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
            .count();
        assert_eq!(audio, 2);
        assert_eq!(input.metadata().get("title"), Some(MKA_TITLE));
    }
}
