//! Audio encoder for the conversion pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` opened from an [`EncodePlan`], stamps
//! outgoing frames with a sample-accurate PTS and collects the packets the
//! encoder hands back.

use crate::error::{FfmpegError, Result};
use crate::ffmpeg::helpers;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use super::plan::EncodePlan;

/// Presentation timestamps for consecutive frames in encoder time-base ticks.
///
/// Each frame advances the clock by `round(samples / rate / time_base)`, so
/// timestamps never leave gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtsClock {
    next: i64,
    sample_rate: u32,
    time_base: ffmpeg::Rational,
}

impl PtsClock {
    pub fn new(sample_rate: u32, time_base: ffmpeg::Rational) -> Self {
        Self {
            next: 0,
            sample_rate,
            time_base,
        }
    }

    /// Ticks `samples` samples span
    pub fn ticks(&self, samples: usize) -> i64 {
        let num = i64::from(self.time_base.numerator());
        let den = i64::from(self.time_base.denominator());
        let rate = i64::from(self.sample_rate);
        if num <= 0 || den <= 0 || rate <= 0 {
            return samples as i64;
        }
        let divisor = rate * num;
        (samples as i64 * den + divisor / 2) / divisor
    }

    /// PTS for a frame of `samples` samples; advances the clock.
    pub fn stamp(&mut self, samples: usize) -> i64 {
        let pts = self.next;
        self.next += self.ticks(samples);
        pts
    }

    /// PTS the next frame will get
    pub fn peek(&self) -> i64 {
        self.next
    }
}

/// Audio encoder backed by a real FFmpeg codec context
pub struct AudioEncoder {
    encoder: ffmpeg::encoder::audio::Encoder,
    frame_size: usize,
    pad_last_frame: bool,
    time_base: ffmpeg::Rational,
    clock: PtsClock,
    name: String,
}

impl AudioEncoder {
    /// Open the planned encoder.
    ///
    /// `global_header` must be set when the output container stores codec
    /// headers out of band; it only takes effect before the encoder is
    /// opened. `default_frame_size` is used for encoders that take frames of
    /// any size.
    pub fn open(plan: &EncodePlan, global_header: bool, default_frame_size: usize) -> Result<Self> {
        let codec = plan.encoder;
        let time_base = ffmpeg::Rational::new(1, plan.sample_rate as i32);

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(time_base);
        if global_header {
            context.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        if plan.experimental {
            context.compliance(codec::Compliance::Experimental);
        }

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderCreate(format!(
                "Cannot get audio encoder handle for {}: {}",
                codec.name(),
                e
            ))
        })?;

        audio_enc.set_rate(plan.sample_rate as i32);
        audio_enc.set_format(plan.sample_format);
        audio_enc.set_channel_layout(plan.channel_layout);
        audio_enc.set_bit_rate(plan.bit_rate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            FfmpegError::EncoderCreate(format!(
                "Failed to open {} at {} Hz, {} channels, {:?}: {}",
                codec.name(),
                plan.sample_rate,
                plan.channels,
                plan.sample_format,
                e
            ))
        })?;

        let capabilities = codec.capabilities();
        let variable = capabilities.contains(codec::Capabilities::VARIABLE_FRAME_SIZE);
        let fixed = encoder.frame_size() as usize;
        let frame_size = if fixed == 0 || variable {
            default_frame_size.max(1)
        } else {
            fixed
        };
        let pad_last_frame = fixed != 0
            && !variable
            && !capabilities.contains(codec::Capabilities::SMALL_LAST_FRAME);

        tracing::debug!(
            encoder = codec.name(),
            frame_size,
            pad_last_frame,
            global_header,
            "encoder opened"
        );

        Ok(Self {
            encoder,
            frame_size,
            pad_last_frame,
            time_base,
            clock: PtsClock::new(plan.sample_rate, time_base),
            name: codec.name().to_string(),
        })
    }

    /// Stamp `frame` with the next PTS and encode it.
    ///
    /// When the encoder is busy its pending packets are drained and the same
    /// frame submitted again; the frame is never dropped.
    pub fn encode_frame(
        &mut self,
        frame: &mut ffmpeg::util::frame::Audio,
    ) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        frame.set_pts(Some(self.clock.stamp(frame.samples())));

        let mut packets = Vec::new();
        loop {
            match self.encoder.send_frame(frame) {
                Ok(()) => break,
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    let before = packets.len();
                    self.drain_into(&mut packets)?;
                    if packets.len() == before {
                        return Err(FfmpegError::EncodeFrame(format!(
                            "{} refused input without producing output",
                            self.name
                        ))
                        .into());
                    }
                }
                Err(e) => {
                    return Err(FfmpegError::EncodeFrame(format!(
                        "{} send_frame error: {}",
                        self.name, e
                    ))
                    .into())
                }
            }
        }

        self.drain_into(&mut packets)?;
        Ok(packets)
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::EncodeFrame(format!(
                "{} receive_packet error: {}",
                self.name, e
            ))
            .into()),
        }
    }

    fn drain_into(&mut self, packets: &mut Vec<ffmpeg::codec::packet::Packet>) -> Result<()> {
        while let Some(packet) = self.receive_packet()? {
            packets.push(packet);
        }
        Ok(())
    }

    /// Send EOF and collect every packet the encoder was still holding.
    pub fn flush(&mut self) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(e) => {
                return Err(FfmpegError::EncodeFrame(format!(
                    "{} send_eof error: {}",
                    self.name, e
                ))
                .into())
            }
        }
        let mut packets = Vec::new();
        self.drain_into(&mut packets)?;
        Ok(packets)
    }

    /// Samples per channel in every frame but the last.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Whether the last frame has to be padded to a full `frame_size`.
    pub fn pads_last_frame(&self) -> bool {
        self.pad_last_frame
    }

    /// The encoder time base (1 / sample_rate).
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Codec parameters for the output stream.
    pub fn codec_parameters(&self) -> Result<ffmpeg::codec::Parameters> {
        Ok(helpers::encoder_codec_parameters(&self.encoder)?)
    }
}
