//! Output codec selection
//!
//! The set of codecs a conversion can target, how each one maps onto an
//! FFmpeg encoder, and which container extension it is written with.

use crate::error::ConvertError;
use ffmpeg_next as ffmpeg;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Codec of the converted audio track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    Flac,
    Opus,
    Mp3,
    Vorbis,
    Aac,
}

impl OutputCodec {
    /// Every supported output codec
    pub const ALL: [OutputCodec; 5] = [
        OutputCodec::Flac,
        OutputCodec::Opus,
        OutputCodec::Mp3,
        OutputCodec::Vorbis,
        OutputCodec::Aac,
    ];

    /// Short lowercase name, also accepted by `FromStr`
    pub fn name(self) -> &'static str {
        match self {
            OutputCodec::Flac => "flac",
            OutputCodec::Opus => "opus",
            OutputCodec::Mp3 => "mp3",
            OutputCodec::Vorbis => "vorbis",
            OutputCodec::Aac => "aac",
        }
    }

    /// The FFmpeg codec identifier
    pub fn codec_id(self) -> ffmpeg::codec::Id {
        match self {
            OutputCodec::Flac => ffmpeg::codec::Id::FLAC,
            OutputCodec::Opus => ffmpeg::codec::Id::OPUS,
            OutputCodec::Mp3 => ffmpeg::codec::Id::MP3,
            OutputCodec::Vorbis => ffmpeg::codec::Id::VORBIS,
            OutputCodec::Aac => ffmpeg::codec::Id::AAC,
        }
    }

    pub fn from_codec_id(id: ffmpeg::codec::Id) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.codec_id() == id)
    }

    /// Map the raw `AVCodecID` integers used by older callers
    /// (e.g. 86076 for Opus) onto an output codec.
    pub fn from_legacy_id(id: i32) -> Option<Self> {
        match id {
            86028 => Some(OutputCodec::Flac),
            86076 => Some(OutputCodec::Opus),
            86017 => Some(OutputCodec::Mp3),
            86021 => Some(OutputCodec::Vorbis),
            86018 => Some(OutputCodec::Aac),
            _ => None,
        }
    }

    /// Encoder names tried in order before falling back to a lookup by id.
    pub fn preferred_encoders(self) -> &'static [&'static str] {
        match self {
            OutputCodec::Flac => &["flac"],
            OutputCodec::Opus => &["libopus", "opus"],
            OutputCodec::Mp3 => &["libmp3lame"],
            OutputCodec::Vorbis => &["libvorbis", "vorbis"],
            OutputCodec::Aac => &["aac", "libfdk_aac"],
        }
    }

    /// Find the encoder this codec is written with in the linked FFmpeg build.
    pub fn resolve_encoder(self) -> Option<ffmpeg::Codec> {
        self.preferred_encoders()
            .iter()
            .find_map(|name| ffmpeg::encoder::find_by_name(name))
            .or_else(|| ffmpeg::encoder::find(self.codec_id()))
    }

    /// Container extensions accepted for this codec; the first is the default.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            OutputCodec::Flac => &["flac"],
            OutputCodec::Opus => &["ogg", "opus"],
            OutputCodec::Mp3 => &["mp3"],
            OutputCodec::Vorbis => &["ogg", "oga"],
            OutputCodec::Aac => &["m4a", "mp4", "aac"],
        }
    }

    /// Default container extension
    pub fn extension(self) -> &'static str {
        self.extensions()[0]
    }

    /// Append the default extension unless `path` already ends in one the
    /// codec can be muxed into.
    pub fn normalize_output_path(self, path: &Path) -> PathBuf {
        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false);

        if accepted {
            return path.to_path_buf();
        }

        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputCodec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        if let Some(codec) = Self::ALL.into_iter().find(|c| c.name() == lowered) {
            return Ok(codec);
        }
        match lowered.as_str() {
            "libopus" => Ok(OutputCodec::Opus),
            "libmp3lame" | "lame" => Ok(OutputCodec::Mp3),
            "libvorbis" | "ogg" => Ok(OutputCodec::Vorbis),
            "m4a" => Ok(OutputCodec::Aac),
            other => other
                .parse::<i32>()
                .ok()
                .and_then(Self::from_legacy_id)
                .ok_or_else(|| ConvertError::UnknownCodec(s.to_string())),
        }
    }
}
