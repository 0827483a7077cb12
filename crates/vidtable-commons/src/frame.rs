//! Typed frame buffers.
//!
//! A [`Frame`] is a fixed-rank-3 tensor `(height, width, channels)` over one
//! of three element kinds. The backing storage is a [`BytesMut`], which gives
//! us the block-allocation behavior the bulk decode path needs: allocating N
//! frames at once carves N disjoint views out of a single contiguous buffer,
//! and the underlying block is released when the last view is dropped.

use crate::device::DeviceHandle;
use crate::errors::{CommonError, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// Frames are always rank 3.
pub const FRAME_DIMS: usize = 3;

/// Element kind of a frame's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    U8,
    F32,
    F64,
}

impl FrameType {
    /// Size in bytes of one element of this kind.
    #[inline]
    pub fn size_of(&self) -> usize {
        match self {
            FrameType::U8 => std::mem::size_of::<u8>(),
            FrameType::F32 => std::mem::size_of::<f32>(),
            FrameType::F64 => std::mem::size_of::<f64>(),
        }
    }
}

/// Shape and element kind of a frame, without the pixels.
///
/// Dimension order is `(height, width, channels)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub shape: [usize; FRAME_DIMS],
    pub frame_type: FrameType,
}

impl FrameInfo {
    pub fn new(height: usize, width: usize, channels: usize, frame_type: FrameType) -> Self {
        Self {
            shape: [height, width, channels],
            frame_type,
        }
    }

    /// Build from a shape slice of at most three dimensions; missing
    /// trailing dimensions are implicitly zero.
    pub fn from_shape(shape: &[usize], frame_type: FrameType) -> Result<Self> {
        if shape.len() > FRAME_DIMS {
            return Err(CommonError::invalid_input(format!(
                "frame shape has {} dimensions, at most {} allowed",
                shape.len(),
                FRAME_DIMS
            )));
        }
        let mut dims = [0usize; FRAME_DIMS];
        dims[..shape.len()].copy_from_slice(shape);
        Ok(Self {
            shape: dims,
            frame_type,
        })
    }

    /// Total size in bytes of a frame with this descriptor.
    pub fn size(&self) -> usize {
        self.shape.iter().product::<usize>() * self.frame_type.size_of()
    }

    pub fn height(&self) -> usize {
        self.shape[0]
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    /// Only meaningful when the dimensions are (height, width, channels).
    pub fn channels(&self) -> usize {
        self.shape[2]
    }
}

/// A typed image frame: shape, element kind, owning device, and pixels.
///
/// The buffer length always equals `as_frame_info().size()`; constructors
/// enforce it. A frame produced by [`new_frames`] is a view into a shared
/// block; the block is freed when the last view is dropped.
#[derive(Debug, Clone)]
pub struct Frame {
    shape: [usize; FRAME_DIMS],
    frame_type: FrameType,
    device: DeviceHandle,
    data: BytesMut,
}

impl Frame {
    /// Wrap an existing buffer. Fails unless the buffer length matches the
    /// descriptor exactly.
    pub fn new(info: FrameInfo, device: DeviceHandle, data: BytesMut) -> Result<Self> {
        if data.len() != info.size() {
            return Err(CommonError::SizeMismatch {
                expected: info.size(),
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: info.shape,
            frame_type: info.frame_type,
            device,
            data,
        })
    }

    /// Reconstruct the descriptor for this frame.
    pub fn as_frame_info(&self) -> FrameInfo {
        FrameInfo {
            shape: self.shape,
            frame_type: self.frame_type,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn height(&self) -> usize {
        self.shape[0]
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    /// Only meaningful when the dimensions are (height, width, channels).
    pub fn channels(&self) -> usize {
        self.shape[2]
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame and return its buffer.
    pub fn into_data(self) -> BytesMut {
        self.data
    }

    pub(crate) fn replace_buffer(&mut self, device: DeviceHandle, data: BytesMut) -> Result<()> {
        if data.len() != self.data.len() {
            return Err(CommonError::SizeMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.device = device;
        self.data = data;
        Ok(())
    }
}

/// Allocate a single zero-filled frame on `device`.
pub fn new_frame(device: DeviceHandle, info: FrameInfo) -> Frame {
    let data = BytesMut::zeroed(info.size());
    Frame {
        shape: info.shape,
        frame_type: info.frame_type,
        device,
        data,
    }
}

/// Allocate `num` frames out of one contiguous block.
///
/// A single allocation of `num * info.size()` bytes is carved into `num`
/// disjoint views. This amortizes allocator round trips and guarantees the
/// frames are contiguous for bulk DMA. The block itself is reference counted
/// and freed exactly once, when the last surviving view is dropped.
pub fn new_frames(device: DeviceHandle, info: FrameInfo, num: usize) -> Vec<Frame> {
    let frame_size = info.size();
    let mut block = BytesMut::zeroed(frame_size * num);
    let mut frames = Vec::with_capacity(num);
    for _ in 0..num {
        let data = block.split_to(frame_size);
        frames.push(Frame {
            shape: info.shape,
            frame_type: info.frame_type,
            device,
            data,
        });
    }
    frames
}
