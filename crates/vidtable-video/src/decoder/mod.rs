//! Decoder interface and backend selection.
//!
//! A [`VideoDecoder`] is a feed/retrieve pipeline: the load worker pushes
//! access units in, decoded frames come out into caller-provided buffers.
//! Backends decode H.264 in software or on Nvidia/Intel hardware; the
//! factory picks one per `(device, decoder type, descriptor)`.
//!
//! State machine: **Idle** until the first feed, then **Streaming**. A
//! discontinuity (seek) moves the pipeline through **Resync**: buffered
//! output is dropped, reference-picture state is flushed, and the next fed
//! unit must begin at a keyframe. An unrecoverable backend failure lands in
//! **Errored**, where every operation except drop fails.

mod ffmpeg;

pub use ffmpeg::FfmpegDecoder;

use crate::error::{Result, VideoError};
use vidtable_commons::{DeviceHandle, DeviceType};
use vidtable_proto::{Codec, FrameKind, VideoDescriptor};

/// Which decode backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderType {
    /// Probe hardware first, fall back to software.
    Auto,
    Software,
    Nvidia,
    Intel,
}

/// Pipeline state, exposed for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Streaming,
    Resync,
    Errored,
}

/// Feed/retrieve decode pipeline over one encoded stream.
pub trait VideoDecoder: Send {
    /// Submit an access unit (or partial bitstream).
    ///
    /// `discontinuity = true` signals a seek: the backend flushes its
    /// reference-picture state, drops buffered output, and expects the fed
    /// bytes to begin at a keyframe. Feeding an empty buffer signals end of
    /// stream and flushes any frames still held back by the pipeline.
    fn feed(&mut self, encoded: &[u8], discontinuity: bool) -> Result<()>;

    /// Pop one decoded frame into `out`, which must be exactly the decoded
    /// frame size. Returns `Ok(false)` when no frame is ready; callers poll
    /// [`decoded_frames_buffered`](Self::decoded_frames_buffered) first.
    fn get_frame(&mut self, out: &mut [u8]) -> Result<bool>;

    /// Pop and drop one decoded frame without copying it out.
    fn discard_frame(&mut self) -> Result<bool>;

    /// Number of decoded frames ready for retrieval.
    fn decoded_frames_buffered(&self) -> usize;

    /// Fence: returns once all previously issued `get_frame` copies have
    /// completed on the device.
    fn wait_until_frames_copied(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn VideoDecoder + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn VideoDecoder").finish_non_exhaustive()
    }
}

/// Decoder types usable on this machine, hardware first.
pub fn supported_decoder_types() -> Vec<DecoderType> {
    let mut types = Vec::new();
    if ffmpeg::nvidia_available() {
        types.push(DecoderType::Nvidia);
    }
    if ffmpeg::intel_available() {
        types.push(DecoderType::Intel);
    }
    if ffmpeg::software_available() {
        types.push(DecoderType::Software);
    }
    types
}

pub fn has_decoder_type(decoder_type: DecoderType) -> bool {
    match decoder_type {
        DecoderType::Auto => !supported_decoder_types().is_empty(),
        ty => supported_decoder_types().contains(&ty),
    }
}

/// Build a decoder for the descriptor's stream.
///
/// Validates that the descriptor describes something the backends can
/// produce (H.264, u8 frames, 3 channels) and that the requested backend is
/// available. `Auto` prefers hardware that matches the device handle.
pub fn make_decoder(
    device: DeviceHandle,
    decoder_type: DecoderType,
    descriptor: &VideoDescriptor,
) -> Result<Box<dyn VideoDecoder>> {
    if descriptor.codec_type() != Codec::H264 {
        return Err(VideoError::Decoder(format!(
            "no decoder for codec {:?}; raw items are read directly",
            descriptor.codec_type()
        )));
    }
    if descriptor.frame_kind() != FrameKind::U8 || descriptor.channels != 3 {
        return Err(VideoError::Decoder(format!(
            "decoders produce u8 frames with 3 channels, descriptor declares {:?}/{}",
            descriptor.frame_kind(),
            descriptor.channels
        )));
    }
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(VideoError::Decoder(
            "descriptor declares a zero-sized frame".into(),
        ));
    }

    let resolved = resolve_decoder_type(device, decoder_type)?;
    let decoder = FfmpegDecoder::new(device, resolved, descriptor)?;
    Ok(Box::new(decoder))
}

fn resolve_decoder_type(device: DeviceHandle, requested: DecoderType) -> Result<DecoderType> {
    let available = supported_decoder_types();
    match requested {
        DecoderType::Auto => {
            let preference: &[DecoderType] = match device.device_type {
                DeviceType::Gpu => &[
                    DecoderType::Nvidia,
                    DecoderType::Intel,
                    DecoderType::Software,
                ],
                DeviceType::Cpu => &[
                    DecoderType::Software,
                    DecoderType::Nvidia,
                    DecoderType::Intel,
                ],
            };
            preference
                .iter()
                .copied()
                .find(|ty| available.contains(ty))
                .ok_or_else(|| {
                    VideoError::Decoder("no decoder backend available on this machine".into())
                })
        }
        ty if available.contains(&ty) => Ok(ty),
        ty => Err(VideoError::Decoder(format!(
            "decoder type {ty:?} is not available on this machine"
        ))),
    }
}
