//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Forwarding FFmpeg's own log output into `tracing`
//! - Safe wrappers around the FFI calls `ffmpeg-next` does not expose
//! - Timebase conversion and other utilities

pub mod helpers;
pub mod utils;

pub use ffmpeg_next as ffmpeg;

/// Initialize the FFmpeg library.
///
/// Safe to call more than once; every `Converter` calls it before touching
/// FFmpeg state.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Route FFmpeg's log output into `tracing` under the `ffmpeg` target.
///
/// **Safety & Ordering:** the FFmpeg log callback is process-global. Install
/// it once from the program entry point, after `init()` and before any
/// conversion threads start. Library code never calls this.
pub fn install_log_forwarder(level: tracing::Level) {
    let av_level = match level {
        tracing::Level::ERROR => ffmpeg_next::ffi::AV_LOG_ERROR,
        tracing::Level::WARN => ffmpeg_next::ffi::AV_LOG_WARNING,
        tracing::Level::INFO => ffmpeg_next::ffi::AV_LOG_INFO,
        tracing::Level::DEBUG => ffmpeg_next::ffi::AV_LOG_VERBOSE,
        tracing::Level::TRACE => ffmpeg_next::ffi::AV_LOG_DEBUG,
    };
    // SAFETY: both functions modify global FFmpeg state. They are called
    // once at startup before any thread begins converting.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(av_level as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Benign messages that would otherwise show up on every conversion.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Estimating duration from bitrate",
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_INFO as std::ffi::c_int {
        tracing::info!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_DEBUG as std::ffi::c_int {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::trace!(target: "ffmpeg", "{}", msg);
    }
}

/// Version of the linked libavcodec, as `major.minor.micro`.
pub fn version_info() -> String {
    let v = ffmpeg::codec::version();
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}
