//! Sample FIFO between the resampler and the encoder
//!
//! Decoded audio arrives in whatever chunk sizes the decoder and resampler
//! produce; encoders want fixed-size frames. The FIFO stores samples in the
//! encoder's sample format and hands them back out in any chunk size, in the
//! order they went in.

use crate::error::{ConvertError, Result};
use crate::ffmpeg::{helpers, utils};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

/// Planar or interleaved sample queue with a fixed upper bound.
#[derive(Debug)]
pub struct SampleFifo {
    format: Sample,
    channels: usize,
    /// One byte buffer per channel for planar formats, a single interleaved
    /// buffer otherwise
    planes: Vec<Vec<u8>>,
    /// Bytes one sample occupies in each plane
    stride: usize,
    /// Samples already handed out from the front of `planes`
    read_pos: usize,
    capacity: usize,
    total_written: usize,
    total_read: usize,
}

impl SampleFifo {
    /// Create an empty FIFO that refuses to hold more than `capacity`
    /// samples per channel.
    pub fn new(format: Sample, channels: u16, capacity: usize) -> Self {
        let channels = usize::from(channels.max(1));
        let plane_count = helpers::plane_count(format, channels);
        let stride = if format.is_planar() {
            utils::bytes_per_sample(format)
        } else {
            utils::bytes_per_sample(format) * channels
        };

        Self {
            format,
            channels,
            planes: vec![Vec::new(); plane_count],
            stride,
            read_pos: 0,
            capacity,
            total_written: 0,
            total_read: 0,
        }
    }

    /// Pre-allocate room for `samples` more samples, clamped to the capacity.
    pub fn reserve(&mut self, samples: usize) {
        let samples = samples.min(self.capacity.saturating_sub(self.len()));
        for plane in &mut self.planes {
            plane.reserve(samples.saturating_mul(self.stride));
        }
    }

    pub fn format(&self) -> Sample {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting to be read
    pub fn len(&self) -> usize {
        self.planes
            .first()
            .map(|p| p.len() / self.stride)
            .unwrap_or(0)
            - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_written(&self) -> usize {
        self.total_written
    }

    pub fn total_read(&self) -> usize {
        self.total_read
    }

    /// Append `samples` samples taken from the front of each plane.
    ///
    /// Fails with `BufferOverflow` when the FIFO would grow past its
    /// capacity; nothing is written in that case.
    pub fn write(&mut self, planes: &[&[u8]], samples: usize) -> Result<()> {
        if samples == 0 {
            return Ok(());
        }
        let requested = self.len() + samples;
        if requested > self.capacity {
            return Err(ConvertError::BufferOverflow {
                capacity: self.capacity,
                requested,
            });
        }

        let bytes = samples * self.stride;
        if planes.len() < self.planes.len() || planes.iter().any(|p| p.len() < bytes) {
            return Err(ConvertError::Ffmpeg(
                crate::error::FfmpegError::Resample(format!(
                    "frame holds fewer than {} samples in {} planes",
                    samples,
                    self.planes.len()
                )),
            ));
        }

        for (dst, src) in self.planes.iter_mut().zip(planes) {
            dst.extend_from_slice(&src[..bytes]);
        }
        self.total_written += samples;
        Ok(())
    }

    /// Move up to `samples` samples into the front of each output plane.
    ///
    /// Returns how many were moved: fewer than asked only when the FIFO runs
    /// dry, 0 when it is empty.
    pub fn read(&mut self, out: &mut [&mut [u8]], samples: usize) -> usize {
        let n = samples.min(self.len());
        if n == 0 {
            return 0;
        }

        let start = self.read_pos * self.stride;
        let bytes = n * self.stride;
        for (dst, src) in out.iter_mut().zip(&self.planes) {
            let len = bytes.min(dst.len());
            dst[..len].copy_from_slice(&src[start..start + len]);
        }

        self.consume(n);
        n
    }

    /// Append every sample of a frame in the FIFO's format.
    pub fn push_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        let planes: Vec<&[u8]> = (0..self.planes.len())
            .map(|i| helpers::audio_plane_data(frame, i))
            .collect();
        self.write(&planes, frame.samples())
    }

    /// Pop up to `samples` samples into a new frame.
    ///
    /// When fewer than `min_samples` are left the frame is still allocated
    /// `min_samples` long and the remainder filled with silence. Returns
    /// `None` when the FIFO is empty.
    pub fn pop_frame(
        &mut self,
        samples: usize,
        min_samples: usize,
        layout: ChannelLayout,
        rate: u32,
    ) -> Option<ffmpeg::util::frame::Audio> {
        let n = samples.min(self.len());
        if n == 0 {
            return None;
        }

        let frame_len = n.max(min_samples);
        let mut frame = ffmpeg::util::frame::Audio::new(self.format, frame_len, layout);
        frame.set_rate(rate);

        let start = self.read_pos * self.stride;
        let bytes = n * self.stride;
        let padded = frame_len * self.stride;
        let silence = silence_byte(self.format);
        for (i, src) in self.planes.iter().enumerate() {
            let dst = helpers::audio_plane_data_mut(&mut frame, i);
            let end = padded.min(dst.len());
            let copied = bytes.min(end);
            dst[..copied].copy_from_slice(&src[start..start + copied]);
            dst[copied..end].fill(silence);
        }

        self.consume(n);
        Some(frame)
    }

    fn consume(&mut self, samples: usize) {
        self.read_pos += samples;
        self.total_read += samples;
        if self.len() == 0 {
            self.clear();
        }
    }

    /// Drop everything still queued.
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.clear();
        }
        self.read_pos = 0;
    }
}

/// Byte value of digital silence for a sample format
fn silence_byte(format: Sample) -> u8 {
    match format {
        Sample::U8(_) => 0x80,
        _ => 0,
    }
}
