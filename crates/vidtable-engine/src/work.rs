//! Batched columnar payloads handed to the save worker.

use crate::error::{EngineError, Result};
use vidtable_commons::{ColumnType, DeviceHandle, Element, FrameInfo};

/// One evaluated batch: parallel per-column vectors plus the per-video-column
/// frame geometry.
///
/// `frame_infos` is indexed by video column order: the i-th `Video` entry in
/// `column_types` uses `frame_infos[i]`.
#[derive(Debug, Default)]
pub struct WorkEntry {
    pub columns: Vec<Vec<Element>>,
    pub column_types: Vec<ColumnType>,
    pub column_handles: Vec<DeviceHandle>,
    pub compressed: Vec<bool>,
    pub frame_infos: Vec<FrameInfo>,
}

impl WorkEntry {
    /// Check the parallel vectors line up before any bytes move.
    pub fn validate(&self) -> Result<()> {
        let columns = self.columns.len();
        if self.column_types.len() != columns
            || self.column_handles.len() != columns
            || self.compressed.len() != columns
        {
            return Err(EngineError::InvalidEntry(format!(
                "parallel vectors disagree: {} columns, {} types, {} handles, {} compressed flags",
                columns,
                self.column_types.len(),
                self.column_handles.len(),
                self.compressed.len()
            )));
        }

        let video_columns = self
            .column_types
            .iter()
            .filter(|ty| **ty == ColumnType::Video)
            .count();
        if self.frame_infos.len() != video_columns {
            return Err(EngineError::InvalidEntry(format!(
                "{} video columns but {} frame infos",
                video_columns,
                self.frame_infos.len()
            )));
        }

        Ok(())
    }
}
