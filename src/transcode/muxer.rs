//! Output container writer

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use super::encoder::AudioEncoder;
use super::metadata::{to_dictionary, Metadata};
use crate::error::{FfmpegError, Result};
use crate::ffmpeg::helpers;

/// Muxer writing a single audio stream to a file
pub struct OutputWriter {
    output: ffmpeg::format::context::Output,
    path: PathBuf,
    opened_file: bool,
    stream_index: Option<usize>,
    stream_time_base: ffmpeg::Rational,
    header_written: bool,
    packets_written: u64,
}

impl OutputWriter {
    /// Create the output context, choosing the muxer from the path's
    /// extension, and open the file.
    pub fn create(path: &Path) -> Result<Self> {
        let ctx = helpers::create_output(path)?;
        tracing::debug!(
            path = %path.display(),
            muxer = ctx.output.format().name(),
            "output created"
        );
        Ok(Self {
            output: ctx.output,
            path: path.to_path_buf(),
            opened_file: ctx.opened_file,
            stream_index: None,
            stream_time_base: ffmpeg::Rational::new(1, 1),
            header_written: false,
            packets_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether creating the writer created a file at `path`
    pub fn opened_file(&self) -> bool {
        self.opened_file
    }

    /// Whether the container wants codec headers out of band. Encoders must
    /// be opened with the global-header flag in that case.
    pub fn requires_global_header(&self) -> bool {
        self.output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
    }

    /// Add the output stream from the opened encoder and attach `metadata`
    /// to both the stream and the container.
    pub fn add_audio_stream(&mut self, encoder: &AudioEncoder, metadata: &Metadata) -> Result<usize> {
        let params = encoder.codec_parameters()?;

        let mut out_stream = self
            .output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| FfmpegError::StreamConfig(format!("Failed to add audio stream: {}", e)))?;

        out_stream.set_parameters(params);
        // Let the muxer pick the tag for its own container
        helpers::stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(encoder.time_base());
        out_stream.set_metadata(to_dictionary(metadata));

        let index = out_stream.index();
        self.stream_index = Some(index);
        self.stream_time_base = encoder.time_base();
        self.output.set_metadata(to_dictionary(metadata));

        tracing::debug!(index, tags = metadata.len(), "added audio stream");
        Ok(index)
    }

    /// Write the container header. The muxer may change the stream time
    /// base here; packets are rescaled to whatever it settled on.
    pub fn write_header(&mut self) -> Result<()> {
        let index = self.stream_index.ok_or_else(|| {
            FfmpegError::WriteHeader("no stream added before the header".into())
        })?;
        self.output
            .write_header()
            .map_err(|e| FfmpegError::WriteHeader(format!("{}: {}", self.path.display(), e)))?;
        self.header_written = true;

        if let Some(stream) = self.output.stream(index) {
            self.stream_time_base = stream.time_base();
        }
        tracing::debug!(time_base = %self.stream_time_base, "header written");
        Ok(())
    }

    /// Write one encoded packet whose timestamps are in `time_base`.
    pub fn write_packet(
        &mut self,
        mut packet: ffmpeg::codec::packet::Packet,
        time_base: ffmpeg::Rational,
    ) -> Result<()> {
        let index = self
            .stream_index
            .filter(|_| self.header_written)
            .ok_or_else(|| FfmpegError::WritePacket("header not written".into()))?;

        packet.set_stream(index);
        packet.set_position(-1);
        packet.rescale_ts(time_base, self.stream_time_base);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| FfmpegError::WritePacket(format!("Failed to write packet: {}", e)))?;
        self.packets_written += 1;
        Ok(())
    }

    /// Flush interleaving buffers and write the trailer.
    pub fn finish(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(FfmpegError::WriteTrailer("header not written".into()).into());
        }
        helpers::flush_interleaved(&mut self.output)?;
        self.output
            .write_trailer()
            .map_err(|e| FfmpegError::WriteTrailer(format!("{}: {}", self.path.display(), e)))?;
        tracing::debug!(packets = self.packets_written, "trailer written");
        Ok(())
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }
}

/// Removes a partially written output file unless the conversion commits it.
#[derive(Debug)]
pub struct PartialOutputGuard {
    path: PathBuf,
    armed: bool,
}

impl PartialOutputGuard {
    /// Guard `path`; a disarmed guard never touches the file.
    pub fn new(path: &Path, armed: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            armed,
        }
    }

    /// Keep the file.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialOutputGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "failed to remove partial output: {}",
                e
            ),
        }
    }
}
