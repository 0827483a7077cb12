//! Video metadata records.
//!
//! A [`VideoMetadata`] wraps the protobuf [`VideoDescriptor`] for one video
//! column item. The record is written length-prefixed to the item's
//! descriptor path via a temp file and an atomic rename; its presence is the
//! marker that the item is complete. Readers that find data without a
//! descriptor treat the item as incomplete.

use crate::error::{Result, VideoError};
use bytes::Bytes;
use vidtable_commons::paths;
use vidtable_commons::{ColumnId, TableId, TaskId};
use vidtable_proto::{decode_length_delimited, encode_length_delimited, Codec, VideoDescriptor};
use vidtable_store::BlobStore;

/// In-progress or loaded descriptor for one `(table, column, item)`.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    descriptor: VideoDescriptor,
}

impl VideoMetadata {
    /// Fresh descriptor bound to an item; everything else starts zeroed.
    pub fn new(table_id: TableId, column_id: ColumnId, item_id: TaskId) -> Self {
        Self {
            descriptor: VideoDescriptor {
                table_id: table_id.get(),
                column_id: column_id.get(),
                item_id: item_id.get(),
                ..Default::default()
            },
        }
    }

    pub fn from_descriptor(descriptor: VideoDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &VideoDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut VideoDescriptor {
        &mut self.descriptor
    }

    pub fn table_id(&self) -> TableId {
        TableId::new(self.descriptor.table_id)
    }

    pub fn column_id(&self) -> ColumnId {
        ColumnId::new(self.descriptor.column_id)
    }

    pub fn item_id(&self) -> TaskId {
        TaskId::new(self.descriptor.item_id)
    }

    /// Check the structural invariants tying the index arrays together.
    pub fn validate(&self) -> Result<()> {
        let d = &self.descriptor;

        let per_video: u64 = d.frames_per_video.iter().sum();
        if per_video != d.frames {
            return Err(corrupted(format!(
                "frames_per_video sums to {} but frames is {}",
                per_video, d.frames
            )));
        }

        if d.codec_type() == Codec::H264 {
            if d.sample_offsets.len() != d.sample_sizes.len()
                || d.sample_offsets.len() as u64 != d.frames
            {
                return Err(corrupted(format!(
                    "sample index has {} offsets / {} sizes for {} frames",
                    d.sample_offsets.len(),
                    d.sample_sizes.len(),
                    d.frames
                )));
            }
            if d.frame_kind() != vidtable_proto::FrameKind::U8 || d.channels != 3 {
                return Err(corrupted(format!(
                    "h264 items require u8 frames with 3 channels, got {:?}/{}",
                    d.frame_kind(),
                    d.channels
                )));
            }
        }

        if !strictly_increasing(&d.sample_offsets) {
            return Err(corrupted("sample_offsets are not strictly increasing".into()));
        }
        if !strictly_increasing(&d.keyframe_indices) {
            return Err(corrupted(
                "keyframe_indices are not strictly increasing".into(),
            ));
        }
        if let Some(&last) = d.keyframe_indices.last() {
            if last >= d.frames {
                return Err(corrupted(format!(
                    "keyframe index {} out of range for {} frames",
                    last, d.frames
                )));
            }
        }

        Ok(())
    }

    /// Persist the descriptor atomically: validate, write to the temp path,
    /// then rename into place. The rename is the point where the item
    /// becomes visible as complete.
    pub fn write(&self, store: &BlobStore) -> Result<()> {
        self.validate()?;

        let table = self.table_id();
        let column = self.column_id();
        let item = self.item_id();
        let temp_path = paths::table_item_descriptor_temp_path(table, column, item);
        let final_path = paths::table_item_descriptor_path(table, column, item);

        let encoded = Bytes::from(encode_length_delimited(&self.descriptor));
        store.put(&temp_path, encoded)?;
        store.rename(&temp_path, &final_path)?;
        Ok(())
    }

    /// Load and validate the descriptor for an item. A missing descriptor
    /// surfaces as [`StoreError::NotFound`](vidtable_store::StoreError) so
    /// callers can apply the incomplete-item recovery rule.
    pub fn read(
        store: &BlobStore,
        table_id: TableId,
        column_id: ColumnId,
        item_id: TaskId,
    ) -> Result<Self> {
        let path = paths::table_item_descriptor_path(table_id, column_id, item_id);
        let bytes = store.get(&path)?;
        let descriptor: VideoDescriptor = decode_length_delimited(&bytes)?;

        let loaded = Self { descriptor };
        loaded.validate()?;
        Ok(loaded)
    }
}

fn corrupted(msg: String) -> VideoError {
    VideoError::Corrupted(msg)
}

fn strictly_increasing(values: &[u64]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidtable_proto::{ChromaFormat, FrameKind};
    use vidtable_store::{StorageConfig, StoreError};

    fn ids() -> (TableId, ColumnId, TaskId) {
        (TableId::new(4), ColumnId::new(0), TaskId::new(2))
    }

    fn h264_metadata() -> VideoMetadata {
        let (table, column, item) = ids();
        let mut meta = VideoMetadata::new(table, column, item);
        let d = meta.descriptor_mut();
        d.codec = Codec::H264 as i32;
        d.chroma_format = ChromaFormat::Yuv420 as i32;
        d.frame_type = FrameKind::U8 as i32;
        d.width = 64;
        d.height = 48;
        d.channels = 3;
        d.num_encoded_videos = 1;
        d.frames = 3;
        d.frames_per_video = vec![3];
        d.keyframes_per_video = vec![1];
        d.size_per_video = vec![300];
        d.keyframe_indices = vec![0];
        d.sample_offsets = vec![0, 120, 200];
        d.sample_sizes = vec![120, 80, 100];
        d.time_base_num = 1;
        d.time_base_denom = 25;
        meta
    }

    fn test_store(name: &str) -> (BlobStore, std::path::PathBuf) {
        let temp_dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&temp_dir);
        let store = BlobStore::from_config(&StorageConfig::posix(&temp_dir)).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (store, temp_dir) = test_store("vidtable_test_meta_roundtrip");
        let (table, column, item) = ids();

        let meta = h264_metadata();
        meta.write(&store).unwrap();

        // Temp file must not survive the atomic promotion.
        let temp_path = paths::table_item_descriptor_temp_path(table, column, item);
        assert!(!store.exists(&temp_path).unwrap());

        let loaded = VideoMetadata::read(&store, table, column, item).unwrap();
        assert_eq!(loaded.descriptor(), meta.descriptor());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_missing_descriptor_is_not_found() {
        let (store, temp_dir) = test_store("vidtable_test_meta_missing");
        let (table, column, item) = ids();

        match VideoMetadata::read(&store, table, column, item) {
            Err(VideoError::Store(StoreError::NotFound(_))) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_validate_frame_count_mismatch() {
        let mut meta = h264_metadata();
        meta.descriptor_mut().frames_per_video = vec![2];
        assert!(matches!(
            meta.validate(),
            Err(VideoError::Corrupted(_))
        ));
    }

    #[test]
    fn test_validate_sample_index_length() {
        let mut meta = h264_metadata();
        meta.descriptor_mut().sample_sizes.pop();
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_validate_keyframe_bounds() {
        let mut meta = h264_metadata();
        meta.descriptor_mut().keyframe_indices = vec![0, 3];
        assert!(meta.validate().is_err());

        let mut meta = h264_metadata();
        meta.descriptor_mut().keyframe_indices = vec![0, 0];
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_validate_h264_requires_u8_rgb() {
        let mut meta = h264_metadata();
        meta.descriptor_mut().channels = 1;
        assert!(meta.validate().is_err());

        let mut meta = h264_metadata();
        meta.descriptor_mut().frame_type = FrameKind::F32 as i32;
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_validate_raw_without_sample_index() {
        let (table, column, item) = ids();
        let mut meta = VideoMetadata::new(table, column, item);
        let d = meta.descriptor_mut();
        d.codec = Codec::Raw as i32;
        d.frames = 10;
        d.frames_per_video = vec![10];
        d.frame_type = FrameKind::F32 as i32;
        d.width = 8;
        d.height = 8;
        d.channels = 1;
        meta.validate().unwrap();
    }
}
