//! FFmpeg utility functions

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

/// Get the codec name for a codec ID
pub fn codec_name(codec_id: ffmpeg::codec::Id) -> &'static str {
    codec_id.name()
}

/// Layout to use when a stream or frame does not declare one.
pub fn default_channel_layout(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        n => ChannelLayout::default(i32::from(n)),
    }
}

/// `layout` unless it is unset, in which case the default for `channels`.
pub fn effective_channel_layout(layout: ChannelLayout, channels: u16) -> ChannelLayout {
    if layout.bits() == 0 {
        default_channel_layout(channels)
    } else {
        layout
    }
}

/// Human-readable name of a channel layout
pub fn channel_layout_name(layout: ChannelLayout, channels: u16) -> String {
    let layout = effective_channel_layout(layout, channels);
    let known = [
        (ChannelLayout::MONO, "mono"),
        (ChannelLayout::STEREO, "stereo"),
        (ChannelLayout::_2POINT1, "2.1"),
        (ChannelLayout::SURROUND, "3.0"),
        (ChannelLayout::QUAD, "quad"),
        (ChannelLayout::_5POINT0, "5.0"),
        (ChannelLayout::_5POINT1, "5.1"),
        (ChannelLayout::_7POINT1, "7.1"),
    ];
    known
        .iter()
        .find(|(l, _)| *l == layout)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("{} channels", channels))
}

/// Bytes one channel of one sample occupies
pub fn bytes_per_sample(format: ffmpeg::util::format::sample::Sample) -> usize {
    format.bytes()
}

/// Convert a timestamp to seconds
pub fn ts_to_secs(ts: i64, timebase: ffmpeg::Rational) -> f64 {
    if timebase.denominator() == 0 {
        return 0.0;
    }
    ts as f64 * f64::from(timebase.numerator()) / f64::from(timebase.denominator())
}

/// Container duration in seconds, `None` when the demuxer does not know it.
pub fn input_duration_secs(input: &ffmpeg::format::context::Input) -> Option<f64> {
    let duration = input.duration();
    if duration <= 0 {
        return None;
    }
    Some(duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE))
}

/// Describe a stream for debug logs
pub fn debug_stream_info(stream: &ffmpeg::Stream) {
    let params = stream.parameters();
    tracing::debug!(
        index = stream.index(),
        medium = ?params.medium(),
        codec = codec_name(params.id()),
        time_base = %stream.time_base(),
        "input stream"
    );
}
