//! Audio resampler for the conversion pipeline
//!
//! Converts decoded frames to the sample format, rate and channel layout the
//! encoder was opened with. The underlying `SwrContext` is configured from the
//! first frame it sees, since decoders only report their real output format
//! once they have produced something.

use crate::error::{FfmpegError, Result};
use crate::ffmpeg::utils;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

/// Extra output capacity on top of the rate ratio and the resampler delay
const OUTPUT_HEADROOM: usize = 32;

/// What the resampler converts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleTarget {
    pub format: Sample,
    pub rate: u32,
    pub layout: ChannelLayout,
}

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    target: ResampleTarget,
    context: Option<resampling::Context>,
    input_rate: u32,
}

impl AudioResampler {
    pub fn new(target: ResampleTarget) -> Self {
        Self {
            target,
            context: None,
            input_rate: 0,
        }
    }

    pub fn target(&self) -> ResampleTarget {
        self.target
    }

    /// Whether a frame has been seen and the context configured.
    pub fn is_configured(&self) -> bool {
        self.context.is_some()
    }

    fn configure(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        tracing::debug!(
            sample_rate = frame.rate(),
            channels = frame.channels(),
            format = ?frame.format(),
            target_rate = self.target.rate,
            target_format = ?self.target.format,
            "creating resampler from first frame"
        );

        let context = resampling::Context::get(
            frame.format(),
            frame.channel_layout(),
            frame.rate(),
            self.target.format,
            self.target.layout,
            self.target.rate,
        )
        .map_err(|e| {
            FfmpegError::ResamplerCreate(format!(
                "{:?} {} Hz -> {:?} {} Hz: {}",
                frame.format(),
                frame.rate(),
                self.target.format,
                self.target.rate,
                e
            ))
        })?;

        self.context = Some(context);
        self.input_rate = frame.rate();
        Ok(())
    }

    /// Output frame large enough for everything one call can produce.
    fn output_frame(&self, input_samples: usize) -> ffmpeg::util::frame::Audio {
        let delay = self
            .context
            .as_ref()
            .and_then(|c| c.delay())
            .map(|d| d.output.max(0) as usize)
            .unwrap_or(0);
        let scaled = if self.input_rate == 0 {
            input_samples
        } else {
            (input_samples as u64 * u64::from(self.target.rate))
                .div_ceil(u64::from(self.input_rate)) as usize
        };

        let mut out = ffmpeg::util::frame::Audio::new(
            self.target.format,
            scaled + delay + OUTPUT_HEADROOM,
            self.target.layout,
        );
        out.set_rate(self.target.rate);
        out
    }

    /// Convert one decoded frame.
    ///
    /// The first call configures the context from `frame`; a failure there is
    /// `ResamplerCreate`. Later failures on a single frame are `Resample`.
    /// The returned frame may hold zero samples while the resampler fills its
    /// delay line. The input PTS is carried over.
    pub fn convert(
        &mut self,
        frame: &mut ffmpeg::util::frame::Audio,
    ) -> Result<ffmpeg::util::frame::Audio> {
        if frame.channel_layout().bits() == 0 {
            frame.set_channel_layout(utils::default_channel_layout(frame.channels()));
        }
        if self.context.is_none() {
            self.configure(frame)?;
        }

        let mut out = self.output_frame(frame.samples());
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| FfmpegError::ResamplerCreate("resampler not configured".into()))?;

        context.run(frame, &mut out).map_err(|e| {
            FfmpegError::Resample(format!(
                "{} samples at {} Hz: {}",
                frame.samples(),
                frame.rate(),
                e
            ))
        })?;
        out.set_pts(frame.pts());
        Ok(out)
    }

    /// Drain the samples still held in the resampler's delay line.
    ///
    /// Returns every frame produced until the resampler reports nothing left.
    /// A resampler that never saw a frame has nothing to flush.
    pub fn flush(&mut self) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        let mut frames = Vec::new();
        if self.context.is_none() {
            return Ok(frames);
        }

        loop {
            let mut out = self.output_frame(0);
            let Some(context) = self.context.as_mut() else {
                break;
            };
            if let Err(e) = context.flush(&mut out) {
                tracing::debug!("resampler flush returned non-fatal error: {}", e);
                break;
            }
            if out.samples() == 0 {
                break;
            }
            frames.push(out);
        }

        Ok(frames)
    }
}
