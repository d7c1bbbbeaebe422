//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call.  All `unsafe`
//! blocks are contained here with explicit safety arguments.  Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use crate::error::FfmpegError;
use ffmpeg_next as ffmpeg;
use std::ffi::CString;
use std::path::Path;
use std::ptr;

fn path_to_cstring(path: &Path) -> Option<CString> {
    CString::new(path.to_string_lossy().as_bytes()).ok()
}

// ── Input / output contexts ─────────────────────────────────────────────────

/// Open an input container and read its stream info.
///
/// `ffmpeg::format::input` folds both steps into one error; the converter
/// reports a container that cannot be parsed differently from one whose codec
/// parameters cannot be determined, so the two calls are made separately.
pub fn open_input(path: &Path) -> Result<ffmpeg::format::context::Input, FfmpegError> {
    let c_path = path_to_cstring(path).ok_or_else(|| {
        FfmpegError::OpenInput(format!("{}: path contains a NUL byte", path.display()))
    })?;

    // SAFETY: `ps` starts null so `avformat_open_input` allocates the context.
    // On failure `avformat_open_input` frees it itself; after a failed
    // `avformat_find_stream_info` we close it before returning.  On success
    // ownership moves into `Input`, whose Drop calls `avformat_close_input`.
    unsafe {
        let mut ps: *mut ffmpeg::ffi::AVFormatContext = ptr::null_mut();
        let ret = ffmpeg::ffi::avformat_open_input(
            &mut ps,
            c_path.as_ptr(),
            ptr::null_mut(),
            ptr::null_mut(),
        );
        if ret < 0 {
            return Err(FfmpegError::OpenInput(format!(
                "{}: {}",
                path.display(),
                ffmpeg::Error::from(ret)
            )));
        }

        let ret = ffmpeg::ffi::avformat_find_stream_info(ps, ptr::null_mut());
        if ret < 0 {
            ffmpeg::ffi::avformat_close_input(&mut ps);
            return Err(FfmpegError::FindStreamInfo(format!(
                "{}: {}",
                path.display(),
                ffmpeg::Error::from(ret)
            )));
        }

        Ok(ffmpeg::format::context::Input::wrap(ps))
    }
}

/// An output context together with whether it writes to a file.
pub struct OutputContext {
    pub output: ffmpeg::format::context::Output,
    /// `false` for `AVFMT_NOFILE` formats, which never touch the path
    pub opened_file: bool,
}

/// Allocate an output context for `path`, inferring the muxer from the
/// extension, and open the file unless the muxer is a no-file format.
pub fn create_output(path: &Path) -> Result<OutputContext, FfmpegError> {
    let c_path = path_to_cstring(path).ok_or_else(|| {
        FfmpegError::OutputFormat(format!("{}: path contains a NUL byte", path.display()))
    })?;

    // SAFETY: `avformat_alloc_output_context2` either fails leaving `ps` null
    // or hands us a context we own.  On avio_open failure we free it before
    // returning.  On success ownership moves into `Output`, whose Drop closes
    // `pb` (null-safe) and frees the context.
    unsafe {
        let mut ps: *mut ffmpeg::ffi::AVFormatContext = ptr::null_mut();
        let ret = ffmpeg::ffi::avformat_alloc_output_context2(
            &mut ps,
            ptr::null_mut(),
            ptr::null(),
            c_path.as_ptr(),
        );
        if ret < 0 || ps.is_null() {
            return Err(FfmpegError::OutputFormat(format!(
                "no muxer for {}: {}",
                path.display(),
                ffmpeg::Error::from(ret)
            )));
        }

        let no_file = ((*(*ps).oformat).flags & ffmpeg::ffi::AVFMT_NOFILE as i32) != 0;
        if !no_file {
            let ret = ffmpeg::ffi::avio_open(
                &mut (*ps).pb,
                c_path.as_ptr(),
                ffmpeg::ffi::AVIO_FLAG_WRITE as i32,
            );
            if ret < 0 {
                ffmpeg::ffi::avformat_free_context(ps);
                return Err(FfmpegError::OpenOutput(format!(
                    "{}: {}",
                    path.display(),
                    ffmpeg::Error::from(ret)
                )));
            }
        }

        Ok(OutputContext {
            output: ffmpeg::format::context::Output::wrap(ps),
            opened_file: !no_file,
        })
    }
}

/// Flush packets the muxer is holding for interleaving.
pub fn flush_interleaved(output: &mut ffmpeg::format::context::Output) -> Result<(), FfmpegError> {
    // SAFETY: `output.as_mut_ptr()` is a live context with a written header.
    // A null packet is the documented flush request.
    let ret =
        unsafe { ffmpeg::ffi::av_interleaved_write_frame(output.as_mut_ptr(), ptr::null_mut()) };
    if ret < 0 {
        return Err(FfmpegError::WritePacket(format!(
            "interleave flush: {}",
            ffmpeg::Error::from(ret)
        )));
    }
    Ok(())
}

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `sample_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor.
pub fn codec_params_sample_rate(params: &ffmpeg::codec::parameters::Parameters) -> u32 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`.  `sample_rate` is a plain i32 field with no
    // ownership semantics.
    unsafe { (*params.as_ptr()).sample_rate.max(0) as u32 }
}

/// Read `ch_layout.nb_channels` from an `AVCodecParameters` struct.
pub fn codec_params_channels(params: &ffmpeg::codec::parameters::Parameters) -> u16 {
    // SAFETY: same as `codec_params_sample_rate`.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels.max(0) as u16 }
}

/// Read `bit_rate` from an `AVCodecParameters` struct.
pub fn codec_params_bit_rate(params: &ffmpeg::codec::parameters::Parameters) -> u64 {
    unsafe { (*params.as_ptr()).bit_rate.max(0) as u64 }
}

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream.  `codecpar` is set by `set_parameters` and is non-null.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

/// Allocate a fresh `AVCodecParameters`, copy the opened encoder context into
/// it, and return it as a safe `ffmpeg::codec::Parameters`.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::encoder::audio::Encoder,
) -> Result<ffmpeg::codec::Parameters, FfmpegError> {
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder;
    // SAFETY: the allocation is null-checked before use.
    // `avcodec_parameters_from_context` copies fields from a live, open
    // encoder context.  On copy failure the parameters are freed here;
    // afterwards `Parameters` owns them.
    unsafe {
        let mut params = ffmpeg::ffi::avcodec_parameters_alloc();
        if params.is_null() {
            return Err(FfmpegError::StreamConfig(
                "avcodec_parameters_alloc failed".into(),
            ));
        }
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        if ret < 0 {
            ffmpeg::ffi::avcodec_parameters_free(&mut params);
            return Err(FfmpegError::StreamConfig(format!(
                "avcodec_parameters_from_context: {}",
                ffmpeg::Error::from(ret)
            )));
        }
        Ok(ffmpeg::codec::Parameters::wrap(
            params,
            None::<Rc<dyn std::any::Any>>,
        ))
    }
}

// ── Audio plane access ──────────────────────────────────────────────────────

/// Number of data planes an audio frame of this format carries.
pub fn plane_count(format: ffmpeg::util::format::sample::Sample, channels: usize) -> usize {
    if format.is_planar() {
        channels
    } else {
        1
    }
}

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around a bug in `ffmpeg-next`'s `Audio::data(index)` method where it
/// stops counting planes if `linesize[1] == 0`. In FFmpeg, planar audio frames
/// often only populate `linesize[0]` to represent the size of *every* plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels.max(0) as usize;

        if index >= plane_count(frame.format(), channels) {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0].max(0) as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of `audio_plane_data`.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels.max(0) as usize;

        if index >= plane_count(frame.format(), channels) {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0].max(0) as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}
