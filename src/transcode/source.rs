//! Input side of a conversion
//!
//! Opens the source container, picks the audio stream to convert, and feeds
//! its packets through an [`AudioDecoder`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use serde::Serialize;

use super::decoder::{self, AudioDecoder};
pub use super::decoder::DecodeStats;
use crate::error::{ConvertError, Result};
use crate::ffmpeg::{helpers, utils};
use crate::progress::{Progress, DECODE_PHASE_END};

/// Summary of the selected audio stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub stream_index: usize,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub channel_layout: String,
    pub sample_format: String,
    /// 0 when neither the stream nor the container reports one
    pub bit_rate: u64,
    pub duration_secs: Option<f64>,
    /// Container-level tags
    pub metadata: BTreeMap<String, String>,
}

/// Pick the stream to convert.
///
/// `best` is FFmpeg's preferred audio stream and `audio` lists every audio
/// stream as `(index, decodable)` in file order. The preferred stream wins
/// when it can be decoded, otherwise the first decodable one does. With no
/// decodable stream the preferred one is returned so opening it reports why.
pub fn pick_audio_stream(best: Option<usize>, audio: &[(usize, bool)]) -> Option<usize> {
    let decodable = |index: usize| audio.iter().any(|&(i, ok)| i == index && ok);
    best.filter(|&i| decodable(i))
        .or_else(|| audio.iter().find(|&&(_, ok)| ok).map(|&(i, _)| i))
        .or(best)
}

/// An opened input with its audio decoder
pub struct Source {
    input: ffmpeg::format::context::Input,
    decoder: AudioDecoder,
    info: SourceInfo,
    consumed: bool,
}

impl Source {
    /// Open `path` with FFmpeg's default decoder threading.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_threads(path, 0)
    }

    /// Open `path`, scan its streams and open a decoder for the audio stream
    /// [`pick_audio_stream`] selects.
    pub fn open_with_threads(path: &Path, threads: usize) -> Result<Self> {
        let input = helpers::open_input(path)?;

        let mut audio = Vec::new();
        for stream in input.streams() {
            utils::debug_stream_info(&stream);
            if stream.parameters().medium() == ffmpeg::media::Type::Audio {
                audio.push((stream.index(), decoder::can_decode(&stream)));
            }
        }
        let best = input
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .map(|s| s.index());
        let index = pick_audio_stream(best, &audio).ok_or(ConvertError::NoAudioStream)?;
        if best.is_some_and(|b| b != index) {
            tracing::debug!(
                best = ?best,
                selected = index,
                "no decoder for the preferred audio stream"
            );
        }
        let stream = input.stream(index).ok_or(ConvertError::NoAudioStream)?;
        let decoder = AudioDecoder::open(&stream, threads)?;

        let params = stream.parameters();
        let mut bit_rate = helpers::codec_params_bit_rate(&params);
        if bit_rate == 0 {
            bit_rate = input.bit_rate().max(0) as u64;
        }
        let channels = match decoder.channels() {
            0 => helpers::codec_params_channels(&params),
            n => n,
        };
        let sample_rate = match decoder.sample_rate() {
            0 => helpers::codec_params_sample_rate(&params),
            r => r,
        };

        let info = SourceInfo {
            path: path.to_path_buf(),
            stream_index: stream.index(),
            codec: utils::codec_name(params.id()).to_string(),
            sample_rate,
            channels,
            channel_layout: utils::channel_layout_name(decoder.channel_layout(), channels),
            sample_format: decoder.format().name().to_string(),
            bit_rate,
            duration_secs: utils::input_duration_secs(&input),
            metadata: input
                .metadata()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        tracing::debug!(
            path = %path.display(),
            stream_index = info.stream_index,
            codec = %info.codec,
            sample_rate = info.sample_rate,
            channels = info.channels,
            "selected audio stream"
        );

        Ok(Self {
            input,
            decoder,
            info,
            consumed: false,
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn decoder(&self) -> &AudioDecoder {
        &self.decoder
    }

    /// Whether packets have already been read; a consumed source must be
    /// reopened before it can be decoded again.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Decode the whole selected stream, handing every frame to `on_frame`.
    ///
    /// Packets of other streams are discarded. After the last packet the
    /// decoder is flushed and the frames it was holding are delivered too.
    /// Progress advances to the end of the decode phase.
    pub fn decode_all<F>(&mut self, progress: &Progress, mut on_frame: F) -> Result<DecodeStats>
    where
        F: FnMut(ffmpeg::util::frame::Audio) -> Result<()>,
    {
        self.consumed = true;
        let stream_index = self.info.stream_index;
        let duration = self.info.duration_secs;

        for (stream, packet) in self.input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            if let (Some(duration), Some(ts)) = (duration, packet.pts().or(packet.dts())) {
                progress.decode_position(utils::ts_to_secs(ts, stream.time_base()), duration);
            }
            self.decoder.decode(&packet, &mut on_frame)?;
        }
        self.decoder.finish(&mut on_frame)?;

        let stats = self.decoder.stats();
        progress.advance(DECODE_PHASE_END);
        tracing::debug!(
            packets = stats.packets_read,
            skipped = stats.packets_skipped,
            frames = stats.frames_decoded,
            flushed = stats.frames_flushed,
            "decode complete"
        );
        Ok(stats)
    }
}
