//! Encode planner - decides how the output stream is encoded
//!
//! Looks up the encoder for the requested codec and works out the sample
//! format, sample rate, channel layout and bit rate it will be opened with,
//! given what the source stream looks like and what the encoder accepts.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use super::resampler::ResampleTarget;
use super::source::Source;
use crate::codec::OutputCodec;
use crate::config::{EncodingConfig, SampleFormatPolicy, SampleRatePolicy};
use crate::error::{FfmpegError, Result};
use crate::ffmpeg::utils;

/// Rate assumed for sources that do not report one
const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Everything needed to open the encoder
#[derive(Clone)]
pub struct EncodePlan {
    pub codec: OutputCodec,
    pub encoder: ffmpeg::Codec,
    pub sample_format: Sample,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    pub channels: u16,
    pub bit_rate: u64,
    /// Encoder is marked experimental and needs relaxed compliance
    pub experimental: bool,
}

impl EncodePlan {
    /// Plan the encode of `source` into `codec`.
    pub fn resolve(codec: OutputCodec, source: &Source, config: &EncodingConfig) -> Result<Self> {
        let encoder = codec.resolve_encoder().ok_or_else(|| {
            FfmpegError::EncoderNotFound(format!(
                "no {} encoder in this FFmpeg build",
                codec.name()
            ))
        })?;
        let audio = encoder.audio().map_err(|e| {
            FfmpegError::EncoderNotFound(format!(
                "{} is not an audio encoder: {}",
                encoder.name(),
                e
            ))
        })?;

        let info = source.info();
        let decoder = source.decoder();

        let supported_formats: Option<Vec<Sample>> = audio.formats().map(|f| f.collect());
        let sample_format =
            choose_sample_format(supported_formats.as_deref(), decoder.format(), config.sample_format)
                .ok_or_else(|| {
                    FfmpegError::UnsupportedSampleFormat(format!(
                        "{} advertises no sample formats",
                        encoder.name()
                    ))
                })?;

        let wanted_rate = match config.sample_rate {
            SampleRatePolicy::Source if info.sample_rate > 0 => info.sample_rate,
            SampleRatePolicy::Source => FALLBACK_SAMPLE_RATE,
            SampleRatePolicy::Fixed(rate) => rate,
        };
        let supported_rates: Option<Vec<i32>> = audio.rates().map(|r| r.collect());
        let sample_rate = choose_sample_rate(supported_rates.as_deref(), wanted_rate);

        let channels = info.channels.max(1);
        let channel_layout = utils::effective_channel_layout(decoder.channel_layout(), channels);
        let bit_rate = choose_bit_rate(config.bit_rate, info.bit_rate, channels);

        let experimental = encoder
            .capabilities()
            .contains(ffmpeg::codec::Capabilities::EXPERIMENTAL);

        let plan = Self {
            codec,
            encoder,
            sample_format,
            sample_rate,
            channel_layout,
            channels,
            bit_rate,
            experimental,
        };

        tracing::debug!(
            codec = %codec,
            encoder = plan.encoder_name(),
            sample_format = sample_format.name(),
            sample_rate,
            wanted_rate,
            channels,
            bit_rate,
            "encode plan"
        );

        Ok(plan)
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Format the resampler has to produce for this encoder
    pub fn resample_target(&self) -> ResampleTarget {
        ResampleTarget {
            format: self.sample_format,
            rate: self.sample_rate,
            layout: self.channel_layout,
        }
    }
}

/// Pick the encoder's input sample format.
///
/// `None` for `supported` means the encoder takes any format, so the source
/// format is kept. An empty list means nothing is usable.
pub fn choose_sample_format(
    supported: Option<&[Sample]>,
    source: Sample,
    policy: SampleFormatPolicy,
) -> Option<Sample> {
    let Some(supported) = supported else {
        return Some(source);
    };
    match policy {
        SampleFormatPolicy::PreferSource if supported.contains(&source) => Some(source),
        _ => supported.first().copied(),
    }
}

/// Pick the output sample rate.
///
/// `wanted` is kept when the encoder accepts any rate or lists it; otherwise
/// the closest listed rate wins, the higher one on a tie.
pub fn choose_sample_rate(supported: Option<&[i32]>, wanted: u32) -> u32 {
    let Some(supported) = supported else {
        return wanted;
    };
    let wanted = i64::from(wanted);
    supported
        .iter()
        .filter(|r| **r > 0)
        .map(|r| i64::from(*r))
        .min_by_key(|r| ((r - wanted).abs(), -r))
        .map(|r| r as u32)
        .unwrap_or(wanted as u32)
}

/// Pick the output bit rate: explicit setting, then the source's, then a
/// default by channel count.
pub fn choose_bit_rate(configured: Option<u64>, source: u64, channels: u16) -> u64 {
    configured
        .filter(|b| *b > 0)
        .or(Some(source).filter(|b| *b > 0))
        .unwrap_or_else(|| get_recommended_bitrate(channels))
}

/// Recommended bit rate for a given channel count.
pub fn get_recommended_bitrate(channels: u16) -> u64 {
    match channels {
        1 => 64_000,
        2 => 128_000,
        6 => 384_000,
        8 => 512_000,
        _ => 128_000,
    }
}
