//! Elements and column types.
//!
//! An [`Element`] is the unit transported through columns: either an opaque
//! byte buffer or a typed [`Frame`]. A column batch is an ordered `Vec` of
//! elements that all match the column's declared [`ColumnType`].

use crate::device::DeviceHandle;
use crate::errors::Result;
use crate::frame::Frame;
use bytes::BytesMut;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Opaque byte buffers; the engine never interprets them.
    Bytes,
    /// Frames with a per-batch `FrameInfo`; eligible for H.264 encoding.
    Video,
}

/// The unit transported through a column.
#[derive(Debug, Clone)]
pub enum Element {
    Bytes(BytesMut),
    Frame(Frame),
}

impl Element {
    /// Byte length of the element's buffer.
    pub fn size(&self) -> usize {
        match self {
            Element::Bytes(b) => b.len(),
            Element::Frame(f) => f.size(),
        }
    }

    /// The element's raw bytes, regardless of variant.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Element::Bytes(b) => b,
            Element::Frame(f) => f.data(),
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Element::Frame(f) => Some(f),
            Element::Bytes(_) => None,
        }
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Element::Frame(f) => Some(f),
            Element::Bytes(_) => None,
        }
    }
}

impl From<Frame> for Element {
    fn from(f: Frame) -> Self {
        Element::Frame(f)
    }
}

impl From<BytesMut> for Element {
    fn from(b: BytesMut) -> Self {
        Element::Bytes(b)
    }
}

impl From<&[u8]> for Element {
    fn from(b: &[u8]) -> Self {
        Element::Bytes(BytesMut::from(b))
    }
}

/// Move a batch of elements between address spaces.
///
/// A no-op when source and destination share an address space. Otherwise
/// every element's buffer is copied into a fresh allocation owned by
/// `dst_device` and the element is updated in place; frames are retagged with
/// the destination handle. The save path uses this to force evaluator output
/// onto the CPU before serialization.
pub fn move_if_different_address_space(
    src_device: DeviceHandle,
    dst_device: DeviceHandle,
    elements: &mut [Element],
) -> Result<()> {
    if src_device.same_address_space(&dst_device) {
        return Ok(());
    }
    for element in elements.iter_mut() {
        match element {
            Element::Bytes(buf) => {
                let copied = BytesMut::from(&buf[..]);
                *buf = copied;
            }
            Element::Frame(frame) => {
                let copied = BytesMut::from(frame.data());
                frame.replace_buffer(dst_device, copied)?;
            }
        }
    }
    Ok(())
}
