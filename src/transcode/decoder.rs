//! Packet to frame decoding
//!
//! [`AudioDecoder`] turns the packets of one stream into raw frames and keeps
//! count of what happened along the way. Packets the codec rejects as corrupt
//! are skipped. Frames still held inside the codec when input runs out are
//! collected by [`AudioDecoder::finish`].

use ffmpeg_next as ffmpeg;

use ffmpeg::codec::threading;
use ffmpeg::format::stream::Stream;
use ffmpeg::util::frame::Audio;

use crate::error::{FfmpegError, Result};

/// Counters from one pass over the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub packets_read: u64,
    pub packets_skipped: u64,
    pub frames_decoded: u64,
    /// Frames released by the end-of-stream flush
    pub frames_flushed: u64,
}

/// Whether FFmpeg can decode `stream`
pub fn can_decode(stream: &Stream) -> bool {
    ffmpeg::decoder::find(stream.parameters().id()).is_some()
}

/// Decoder for the selected audio stream
pub struct AudioDecoder {
    codec: ffmpeg::decoder::Audio,
    stream_index: usize,
    stats: DecodeStats,
}

impl AudioDecoder {
    /// Open a decoder configured from the stream's codec parameters.
    ///
    /// `threads > 1` enables frame threading for codecs that support it;
    /// 0 leaves FFmpeg's default.
    pub fn open(stream: &Stream, threads: usize) -> Result<Self> {
        let stream_index = stream.index();
        let create_failed = |e: ffmpeg::Error| {
            FfmpegError::DecoderCreate(format!("stream {}: {}", stream_index, e))
        };

        let mut context =
            ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(create_failed)?;
        if threads > 0 {
            context.set_threading(threading::Config {
                kind: threading::Type::Frame,
                count: threads,
                ..Default::default()
            });
        }
        let codec = context.decoder().audio().map_err(create_failed)?;

        Ok(Self {
            codec,
            stream_index,
            stats: DecodeStats::default(),
        })
    }

    /// Decode one packet, handing every frame it completes to `on_frame`.
    ///
    /// A packet the codec reports as invalid is counted and skipped.
    pub fn decode<F>(&mut self, packet: &ffmpeg::Packet, on_frame: &mut F) -> Result<()>
    where
        F: FnMut(Audio) -> Result<()>,
    {
        self.stats.packets_read += 1;
        match self.codec.send_packet(packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::InvalidData) => {
                self.skip(packet.pts());
                return Ok(());
            }
            Err(e) => return Err(self.failed("send_packet", e)),
        }
        self.drain(false, on_frame)
    }

    /// Signal end of input and deliver the frames the codec was holding.
    pub fn finish<F>(&mut self, on_frame: &mut F) -> Result<()>
    where
        F: FnMut(Audio) -> Result<()>,
    {
        match self.codec.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(e) => return Err(self.failed("send_eof", e)),
        }
        self.drain(true, on_frame)
    }

    fn drain<F>(&mut self, flushing: bool, on_frame: &mut F) -> Result<()>
    where
        F: FnMut(Audio) -> Result<()>,
    {
        loop {
            let mut frame = Audio::empty();
            match self.codec.receive_frame(&mut frame) {
                Ok(()) => {
                    self.stats.frames_decoded += 1;
                    if flushing {
                        self.stats.frames_flushed += 1;
                    }
                    on_frame(frame)?;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    return Ok(())
                }
                Err(ffmpeg::Error::Eof) => return Ok(()),
                // the codec dropped the packet it was working on
                Err(ffmpeg::Error::InvalidData) => self.skip(None),
                Err(e) => return Err(self.failed("receive_frame", e)),
            }
        }
    }

    fn skip(&mut self, pts: Option<i64>) {
        self.stats.packets_skipped += 1;
        tracing::debug!(
            stream_index = self.stream_index,
            pts = ?pts,
            skipped = self.stats.packets_skipped,
            "skipping undecodable packet"
        );
    }

    fn failed(&self, call: &str, e: ffmpeg::Error) -> crate::error::ConvertError {
        FfmpegError::DecodePacket(format!("{} on stream {}: {}", call, self.stream_index, e))
            .into()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn sample_rate(&self) -> u32 {
        self.codec.rate()
    }

    pub fn channels(&self) -> u16 {
        self.codec.channels()
    }

    pub fn format(&self) -> ffmpeg::util::format::sample::Sample {
        self.codec.format()
    }

    pub fn channel_layout(&self) -> ffmpeg::util::channel_layout::ChannelLayout {
        self.codec.channel_layout()
    }
}
