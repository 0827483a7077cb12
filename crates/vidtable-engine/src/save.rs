//! Save worker.
//!
//! Consumes evaluated column batches and routes them to the columnar layout:
//! video columns through the H.264 indexer or the raw frame path, everything
//! else through the generic writer. One save worker runs per I/O thread and
//! owns its own storage handles; `new_task` closes the previous item's
//! writers and persists its descriptors, which is the durability commit
//! point.

use crate::columns::write_generic_column;
use crate::error::{EngineError, Result};
use crate::work::WorkEntry;
use std::time::Instant;
use vidtable_commons::{
    move_if_different_address_space, paths, ColumnId, ColumnType, FrameType, Profiler, TableId,
    TaskId, CPU_DEVICE,
};
use vidtable_proto::{ChromaFormat, Codec, FrameKind};
use vidtable_store::{BlobStore, StorageConfig, WriteHandle};
use vidtable_video::{H264Indexer, VideoMetadata};

/// Construction arguments for a save worker.
pub struct SaveWorkerArgs {
    pub storage_config: StorageConfig,
    pub profiler: Profiler,
    pub node_id: i32,
    pub worker_id: i32,
}

/// Per-thread writer of evaluated batches into table items.
pub struct SaveWorker {
    node_id: i32,
    worker_id: i32,
    storage: BlobStore,
    profiler: Profiler,

    // Parallel per-column state for the item currently open.
    output: Vec<WriteHandle>,
    output_metadata: Vec<WriteHandle>,
    video_metadata: Vec<VideoMetadata>,
    column_types: Vec<ColumnType>,
}

impl SaveWorker {
    /// Each worker builds a distinct storage backend so no handle state is
    /// shared between I/O threads.
    pub fn new(args: SaveWorkerArgs) -> Result<Self> {
        let setup_start = Instant::now();
        let storage = BlobStore::from_config(&args.storage_config)?;
        args.profiler
            .add_interval("setup", setup_start, Instant::now());

        Ok(Self {
            node_id: args.node_id,
            worker_id: args.worker_id,
            storage,
            profiler: args.profiler,
            output: Vec::new(),
            output_metadata: Vec::new(),
            video_metadata: Vec::new(),
            column_types: Vec::new(),
        })
    }

    /// Commit the previous item and open writers for the next one.
    ///
    /// Flushing and closing all open writers, then persisting the pending
    /// descriptors, is what makes the previous item durable. With zero
    /// columns the new item produces no files and no descriptors.
    pub fn new_task(
        &mut self,
        table_id: TableId,
        task_id: TaskId,
        column_types: Vec<ColumnType>,
    ) -> Result<()> {
        let io_start = Instant::now();
        self.flush()?;
        self.profiler.add_interval("io", io_start, Instant::now());

        for (out_idx, column_type) in column_types.iter().enumerate() {
            let column_id = ColumnId::new(out_idx as i32);
            let output_path = paths::table_item_output_path(table_id, column_id, task_id);
            let metadata_path = paths::table_item_metadata_path(table_id, column_id, task_id);

            self.output.push(self.storage.make_write_file(&output_path)?);
            self.output_metadata
                .push(self.storage.make_write_file(&metadata_path)?);

            if *column_type == ColumnType::Video {
                self.video_metadata
                    .push(VideoMetadata::new(table_id, column_id, task_id));
            }
        }
        self.column_types = column_types;
        Ok(())
    }

    /// Write one batched payload to the open item.
    ///
    /// Elements are written in feed order within each column; no cross-column
    /// ordering is promised inside a single call. Element buffers are moved
    /// to the CPU first and released once their bytes are written.
    pub fn feed(&mut self, entry: &mut WorkEntry) -> Result<()> {
        entry.validate()?;
        if entry.columns.len() != self.output.len() {
            return Err(EngineError::InvalidEntry(format!(
                "entry has {} columns but the open item has {}",
                entry.columns.len(),
                self.output.len()
            )));
        }
        if entry.column_types != self.column_types {
            return Err(EngineError::InvalidEntry(
                "entry column types do not match the open item".into(),
            ));
        }

        let mut video_col_idx = 0usize;
        for out_idx in 0..entry.columns.len() {
            let io_start = Instant::now();
            let num_elements = entry.columns[out_idx].len();

            // Evaluator output may still live on an accelerator.
            move_if_different_address_space(
                entry.column_handles[out_idx],
                CPU_DEVICE,
                &mut entry.columns[out_idx],
            )?;
            entry.column_handles[out_idx] = CPU_DEVICE;

            let compressed = entry.compressed[out_idx];
            let size_written;

            if entry.column_types[out_idx] == ColumnType::Video {
                let frame_info = entry.frame_infos[video_col_idx];
                size_written = self.write_video_column(
                    out_idx,
                    video_col_idx,
                    compressed,
                    frame_info,
                    entry,
                )?;
                video_col_idx += 1;
            } else {
                size_written = write_generic_column(
                    &entry.columns[out_idx],
                    &mut self.output[out_idx],
                    &mut self.output_metadata[out_idx],
                )?;
            }

            // Buffers were copied into the writers; release them now.
            entry.columns[out_idx].clear();

            log::trace!(
                "save worker {}/{} wrote {} elements ({} bytes) to column {}",
                self.node_id,
                self.worker_id,
                num_elements,
                size_written,
                out_idx
            );
            self.profiler.add_interval("io", io_start, Instant::now());
            self.profiler.increment("io_write", size_written);
        }

        Ok(())
    }

    fn write_video_column(
        &mut self,
        out_idx: usize,
        video_col_idx: usize,
        compressed: bool,
        frame_info: vidtable_commons::FrameInfo,
        entry: &WorkEntry,
    ) -> Result<u64> {
        let elements = &entry.columns[out_idx];
        let meta = &mut self.video_metadata[video_col_idx];

        let descriptor = meta.descriptor_mut();
        descriptor.width = frame_info.width() as u32;
        descriptor.height = frame_info.height() as u32;
        descriptor.channels = frame_info.channels() as u32;
        descriptor.frame_type = frame_kind(frame_info.frame_type) as i32;
        // Default time base; recorded in the descriptor, never resampled.
        descriptor.time_base_num = 1;
        descriptor.time_base_denom = 25;
        descriptor.num_encoded_videos += 1;

        let table_id = TableId::new(descriptor.table_id);
        let column_id = ColumnId::new(descriptor.column_id);
        let item_id = TaskId::new(descriptor.item_id);

        let mut size_written = 0u64;
        if compressed && frame_info.frame_type == FrameType::U8 && frame_info.channels() == 3 {
            // Encoded packets: index the bytestream while writing it through.
            let mut indexer = H264Indexer::new(&mut self.output[out_idx]);
            for element in elements {
                indexer.feed_packet(element.as_bytes())?;
                size_written += element.size() as u64;
            }
            indexer.finish()?;

            let frames = indexer.frames();
            descriptor.codec = Codec::H264 as i32;
            descriptor.chroma_format = ChromaFormat::Yuv420 as i32;
            descriptor.frames += frames;
            descriptor.frames_per_video.push(frames);
            descriptor
                .keyframes_per_video
                .push(indexer.keyframe_indices().len() as u64);
            descriptor.size_per_video.push(indexer.bytestream_pos());
            descriptor.num_non_ref_frames += indexer.num_non_ref_frames();
            descriptor.metadata_packets = indexer.metadata_bytes().to_vec();
            descriptor
                .keyframe_indices
                .extend_from_slice(indexer.keyframe_indices());
            descriptor
                .sample_offsets
                .extend_from_slice(indexer.sample_offsets());
            descriptor
                .sample_sizes
                .extend_from_slice(indexer.sample_sizes());
            descriptor.data_path = paths::table_item_output_path(table_id, column_id, item_id);
            descriptor.inplace = false;
        } else {
            // Raw frame path: generic layout, descriptor records geometry.
            descriptor.codec = Codec::Raw as i32;
            // Required by the descriptor schema but unused for raw items.
            descriptor.chroma_format = ChromaFormat::Yuv420 as i32;
            descriptor.frames += elements.len() as u64;
            descriptor.frames_per_video.push(elements.len() as u64);
            descriptor.data_path = paths::table_item_output_path(table_id, column_id, item_id);

            for element in elements {
                let frame = element.as_frame().ok_or_else(|| {
                    EngineError::InvalidEntry(format!(
                        "raw video column {out_idx} holds a non-frame element"
                    ))
                })?;
                if frame.as_frame_info() != frame_info {
                    return Err(EngineError::InvalidEntry(format!(
                        "frame in column {out_idx} does not match the batch frame info"
                    )));
                }
            }

            size_written = write_generic_column(
                elements,
                &mut self.output[out_idx],
                &mut self.output_metadata[out_idx],
            )?;
        }

        Ok(size_written)
    }

    /// Commit the open item: equivalent to the flush half of `new_task`.
    pub fn finish(&mut self) -> Result<()> {
        let io_start = Instant::now();
        let result = self.flush();
        self.profiler.add_interval("io", io_start, Instant::now());
        result
    }

    fn flush(&mut self) -> Result<()> {
        for writer in &mut self.output {
            writer.save()?;
        }
        for writer in &mut self.output_metadata {
            writer.save()?;
        }
        for meta in &self.video_metadata {
            meta.write(&self.storage)?;
        }
        self.output.clear();
        self.output_metadata.clear();
        self.video_metadata.clear();
        self.column_types.clear();
        Ok(())
    }

    /// Best-effort flush for teardown: every handle is attempted even if an
    /// earlier one fails, and failures leave the item incomplete (no
    /// descriptor is written for a column whose files did not save).
    fn flush_on_drop(&mut self) {
        let mut failed = false;
        for writer in &mut self.output {
            if let Err(e) = writer.save() {
                failed = true;
                log::error!(
                    "save worker {}/{}: failed to save {}: {e}",
                    self.node_id,
                    self.worker_id,
                    writer.path()
                );
            }
        }
        for writer in &mut self.output_metadata {
            if let Err(e) = writer.save() {
                failed = true;
                log::error!(
                    "save worker {}/{}: failed to save {}: {e}",
                    self.node_id,
                    self.worker_id,
                    writer.path()
                );
            }
        }
        if failed {
            // Without its data files the item must stay invisible to
            // readers, so the descriptors are not written.
            log::error!(
                "save worker {}/{}: item left incomplete, descriptors withheld",
                self.node_id,
                self.worker_id
            );
        } else {
            for meta in &self.video_metadata {
                if let Err(e) = meta.write(&self.storage) {
                    log::error!(
                        "save worker {}/{}: failed to persist descriptor: {e}",
                        self.node_id,
                        self.worker_id
                    );
                }
            }
        }
        self.output.clear();
        self.output_metadata.clear();
        self.video_metadata.clear();
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        self.flush_on_drop();
    }
}

fn frame_kind(frame_type: FrameType) -> FrameKind {
    match frame_type {
        FrameType::U8 => FrameKind::U8,
        FrameType::F32 => FrameKind::F32,
        FrameType::F64 => FrameKind::F64,
    }
}
