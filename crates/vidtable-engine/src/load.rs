//! Load worker.
//!
//! Inverse of the save worker: opens the `(data, metadata, descriptor)`
//! files of a requested item and hands the bytes back out. Bytes and raw
//! video items go through the generic column reader; H.264 items become a
//! [`VideoStream`] that feeds indexed access units to a decoder, including
//! keyframe-aligned seeks.

use crate::columns::{element_offsets, read_column_index, read_element};
use crate::error::{EngineError, Result};
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};
use vidtable_commons::{
    paths, ColumnId, DeviceHandle, Frame, FrameInfo, FrameType, Profiler, TableId, TaskId,
};
use vidtable_proto::{Codec, FrameKind, VideoDescriptor};
use vidtable_store::{BlobStore, RandomReadHandle, StorageConfig, StoreError};
use vidtable_video::{make_decoder, DecoderType, VideoDecoder, VideoMetadata};

/// How long a frame read waits on the decode pipeline before giving up.
const DECODE_TIMEOUT: Duration = Duration::from_secs(10);
const DECODE_POLL: Duration = Duration::from_millis(1);

/// Construction arguments for a load worker.
pub struct LoadWorkerArgs {
    pub storage_config: StorageConfig,
    pub profiler: Profiler,
    pub node_id: i32,
    pub worker_id: i32,
}

/// Per-thread reader of table items.
pub struct LoadWorker {
    node_id: i32,
    worker_id: i32,
    storage: BlobStore,
    profiler: Profiler,
}

impl LoadWorker {
    pub fn new(args: LoadWorkerArgs) -> Result<Self> {
        let setup_start = Instant::now();
        let storage = BlobStore::from_config(&args.storage_config)?;
        args.profiler
            .add_interval("setup", setup_start, Instant::now());

        Ok(Self {
            node_id: args.node_id,
            worker_id: args.worker_id,
            storage,
            profiler: args.profiler,
        })
    }

    /// Read every element of a Bytes column item via the generic layout.
    pub fn read_item(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
    ) -> Result<Vec<Bytes>> {
        let io_start = Instant::now();

        let (data, sizes) = self.open_generic(table_id, column_id, task_id)?;
        let offsets = element_offsets(&sizes);
        let mut elements = Vec::with_capacity(sizes.len());
        let mut bytes_read = 0u64;
        for index in 0..sizes.len() {
            let element = read_element(&data, &offsets, &sizes, index)?;
            bytes_read += element.len() as u64;
            elements.push(element);
        }

        log::trace!(
            "load worker {}/{} read {} elements from table {} column {} item {}",
            self.node_id,
            self.worker_id,
            elements.len(),
            table_id,
            column_id,
            task_id
        );
        self.profiler.add_interval("io", io_start, Instant::now());
        self.profiler.increment("io_read", bytes_read);
        Ok(elements)
    }

    /// Ranged reads of selected rows only, for partial-item access.
    pub fn read_elements(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
        row_indices: &[u64],
    ) -> Result<Vec<Bytes>> {
        let io_start = Instant::now();

        let (data, sizes) = self.open_generic(table_id, column_id, task_id)?;
        let offsets = element_offsets(&sizes);
        let mut elements = Vec::with_capacity(row_indices.len());
        let mut bytes_read = 0u64;
        for &row in row_indices {
            let element = read_element(&data, &offsets, &sizes, row as usize)?;
            bytes_read += element.len() as u64;
            elements.push(element);
        }

        self.profiler.add_interval("io", io_start, Instant::now());
        self.profiler.increment("io_read", bytes_read);
        Ok(elements)
    }

    /// Read a raw (uncompressed) video item back as frames.
    ///
    /// The descriptor is the completeness marker: data without a descriptor
    /// means the writing worker died mid-item and the read fails as
    /// corrupted.
    pub fn read_raw_frames(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
        device: DeviceHandle,
    ) -> Result<Vec<Frame>> {
        let meta = self.read_descriptor(table_id, column_id, task_id)?;
        let descriptor = meta.descriptor();
        if descriptor.codec_type() != Codec::Raw {
            return Err(EngineError::InvalidEntry(format!(
                "item {}/{}/{} is {:?}, not raw",
                table_id,
                column_id,
                task_id,
                descriptor.codec_type()
            )));
        }

        let (data, sizes) = self.open_generic(table_id, column_id, task_id)?;
        if sizes.len() as u64 != descriptor.frames {
            return Err(EngineError::Corrupted(format!(
                "descriptor declares {} frames but the metadata file indexes {}",
                descriptor.frames,
                sizes.len()
            )));
        }

        let info = FrameInfo::new(
            descriptor.height as usize,
            descriptor.width as usize,
            descriptor.channels as usize,
            frame_type(descriptor.frame_kind()),
        );
        let offsets = element_offsets(&sizes);
        let mut frames = Vec::with_capacity(sizes.len());
        for index in 0..sizes.len() {
            let bytes = read_element(&data, &offsets, &sizes, index)?;
            if bytes.len() != info.size() {
                return Err(EngineError::Corrupted(format!(
                    "frame {} is {} bytes, geometry requires {}",
                    index,
                    bytes.len(),
                    info.size()
                )));
            }
            let frame = Frame::new(info, device, BytesMut::from(&bytes[..]))
                .map_err(EngineError::from)?;
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Open an H.264 video item as a seekable decoded stream.
    pub fn open_video(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
        device: DeviceHandle,
        decoder_type: DecoderType,
    ) -> Result<VideoStream> {
        let meta = self.read_descriptor(table_id, column_id, task_id)?;
        let decoder = make_decoder(device, decoder_type, meta.descriptor())?;
        self.open_video_with_decoder(table_id, column_id, task_id, meta, decoder)
    }

    /// Same as [`open_video`](Self::open_video) with a caller-supplied
    /// decoder, the seam hardware-less environments and tests use.
    pub fn open_video_with_decoder(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
        meta: VideoMetadata,
        decoder: Box<dyn VideoDecoder>,
    ) -> Result<VideoStream> {
        let descriptor = meta.descriptor().clone();
        if descriptor.codec_type() != Codec::H264 {
            return Err(EngineError::InvalidEntry(format!(
                "item {}/{}/{} is {:?}, not h264",
                table_id,
                column_id,
                task_id,
                descriptor.codec_type()
            )));
        }

        let data_path = paths::table_item_output_path(table_id, column_id, task_id);
        let data = self.storage.make_read_file(&data_path)?;

        // Declared sizes must match the data file that is actually there.
        let declared: u64 = descriptor.size_per_video.iter().sum();
        let actual = data.size().map_err(map_missing_data)?;
        if declared != actual {
            return Err(EngineError::Corrupted(format!(
                "descriptor declares {declared} stream bytes but {data_path} holds {actual}"
            )));
        }

        VideoStream::new(descriptor, data, decoder)
    }

    /// Load an item's descriptor, applying the recovery rule for items whose
    /// writer died before the descriptor rename.
    pub fn read_descriptor(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
    ) -> Result<VideoMetadata> {
        match VideoMetadata::read(&self.storage, table_id, column_id, task_id) {
            Ok(meta) => Ok(meta),
            Err(vidtable_video::VideoError::Store(StoreError::NotFound(_))) => {
                let data_path = paths::table_item_output_path(table_id, column_id, task_id);
                if self.storage.exists(&data_path)? {
                    Err(EngineError::Corrupted(format!(
                        "item {}/{}/{} has data but no descriptor; the item is \
                         incomplete and will be overwritten on re-run",
                        table_id, column_id, task_id
                    )))
                } else {
                    Err(EngineError::Store(StoreError::NotFound(data_path)))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_generic(
        &self,
        table_id: TableId,
        column_id: ColumnId,
        task_id: TaskId,
    ) -> Result<(RandomReadHandle, Vec<u64>)> {
        let data_path = paths::table_item_output_path(table_id, column_id, task_id);
        let metadata_path = paths::table_item_metadata_path(table_id, column_id, task_id);

        let metadata = self.storage.make_read_file(&metadata_path)?;
        let sizes = read_column_index(&metadata)?;

        let data = self.storage.make_read_file(&data_path)?;
        let total: u64 = sizes.iter().sum();
        let actual = data.size().map_err(map_missing_data)?;
        if total != actual {
            return Err(EngineError::Corrupted(format!(
                "{data_path}: element sizes sum to {total} but the data file holds {actual} bytes"
            )));
        }

        Ok((data, sizes))
    }
}

fn map_missing_data(err: StoreError) -> EngineError {
    match err {
        StoreError::NotFound(path) => {
            EngineError::Corrupted(format!("{path}: data file missing for a described item"))
        }
        other => EngineError::Store(other),
    }
}

fn frame_type(kind: FrameKind) -> FrameType {
    match kind {
        FrameKind::U8 => FrameType::U8,
        FrameKind::F32 => FrameType::F32,
        FrameKind::F64 => FrameType::F64,
    }
}

/// A decoded, seekable view of one H.264 video item.
///
/// Access units are fed to the decoder on demand from their
/// `sample_offsets`/`sample_sizes` ranges. Seeking re-enters the stream at
/// the nearest preceding keyframe and discards the frames between it and the
/// target.
pub struct VideoStream {
    descriptor: VideoDescriptor,
    data: RandomReadHandle,
    decoder: Box<dyn VideoDecoder>,
    /// Index of the next sample to feed.
    next_feed: u64,
    /// Frames to pop and drop before the next visible frame.
    pending_discards: u64,
    /// Index of the next frame a successful read returns.
    next_frame: u64,
    ended: bool,
}

impl std::fmt::Debug for VideoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStream")
            .field("descriptor", &self.descriptor)
            .field("next_feed", &self.next_feed)
            .field("pending_discards", &self.pending_discards)
            .field("next_frame", &self.next_frame)
            .field("ended", &self.ended)
            .finish()
    }
}

impl VideoStream {
    fn new(
        descriptor: VideoDescriptor,
        data: RandomReadHandle,
        mut decoder: Box<dyn VideoDecoder>,
    ) -> Result<Self> {
        // Parameter sets precede any sample so the decoder can configure
        // itself before the first access unit arrives.
        if !descriptor.metadata_packets.is_empty() {
            decoder.feed(&descriptor.metadata_packets, false)?;
        }
        Ok(Self {
            descriptor,
            data,
            decoder,
            next_feed: 0,
            pending_discards: 0,
            next_frame: 0,
            ended: false,
        })
    }

    pub fn descriptor(&self) -> &VideoDescriptor {
        &self.descriptor
    }

    /// Total frames in the item.
    pub fn frames(&self) -> u64 {
        self.descriptor.frames
    }

    /// Frame index the next read returns.
    pub fn position(&self) -> u64 {
        self.next_frame
    }

    /// Decoded frame size in bytes.
    pub fn frame_size(&self) -> usize {
        self.descriptor.width as usize
            * self.descriptor.height as usize
            * self.descriptor.channels as usize
    }

    /// Reposition to `frame`.
    ///
    /// Finds the greatest keyframe index at or before the target, feeds that
    /// access unit with a discontinuity so the decoder flushes reference
    /// state, and schedules the frames between keyframe and target for
    /// discarding.
    pub fn seek(&mut self, frame: u64) -> Result<()> {
        if frame >= self.descriptor.frames {
            return Err(EngineError::InvalidEntry(format!(
                "seek to frame {frame} beyond {} frames",
                self.descriptor.frames
            )));
        }

        let keyframe = match self
            .descriptor
            .keyframe_indices
            .iter()
            .rev()
            .find(|&&k| k <= frame)
        {
            Some(&k) => k,
            None => {
                return Err(EngineError::Corrupted(format!(
                    "no keyframe at or before frame {frame}"
                )))
            }
        };

        let unit = self.read_sample(keyframe)?;
        self.decoder.feed(&unit, true)?;

        self.pending_discards = frame - keyframe;
        self.next_feed = keyframe + 1;
        self.next_frame = frame;
        self.ended = false;
        Ok(())
    }

    /// Decode the next frame into `out` (must be [`frame_size`](Self::frame_size)
    /// bytes). Returns `Ok(false)` cleanly at end of stream.
    pub fn read_frame(&mut self, out: &mut [u8]) -> Result<bool> {
        if self.next_frame >= self.descriptor.frames {
            return Ok(false);
        }

        let deadline = Instant::now() + DECODE_TIMEOUT;
        loop {
            if self.decoder.decoded_frames_buffered() > 0 {
                if self.pending_discards > 0 {
                    if self.decoder.discard_frame()? {
                        self.pending_discards -= 1;
                    }
                    continue;
                }
                if self.decoder.get_frame(out)? {
                    self.decoder.wait_until_frames_copied()?;
                    self.next_frame += 1;
                    return Ok(true);
                }
                continue;
            }

            if self.next_feed < self.descriptor.frames {
                let unit = self.read_sample(self.next_feed)?;
                self.decoder.feed(&unit, false)?;
                self.next_feed += 1;
                continue;
            }

            if !self.ended {
                // All samples are in; an empty feed flushes frames the
                // pipeline is still holding back.
                self.decoder.feed(&[], false)?;
                self.ended = true;
            }

            if Instant::now() >= deadline {
                return Err(EngineError::Video(vidtable_video::VideoError::Decoder(
                    format!(
                        "timed out waiting for frame {} of {}",
                        self.next_frame, self.descriptor.frames
                    ),
                )));
            }
            std::thread::sleep(DECODE_POLL);
        }
    }

    /// Byte range of one access unit.
    fn read_sample(&self, index: u64) -> Result<Bytes> {
        let i = index as usize;
        let offset = self.descriptor.sample_offsets[i];
        let size = self.descriptor.sample_sizes[i];
        Ok(self.data.read_at(offset, size)?)
    }
}
