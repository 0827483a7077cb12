//! Canonical on-disk path scheme for columnar tables.
//!
//! Every `(table_id, column_id, task_id)` triple resolves to a data file and
//! a metadata file; video columns additionally get a descriptor file. Paths
//! are plain strings relative to the storage root so the same scheme works on
//! posix, S3, and GCS backends.

use crate::ids::{ColumnId, TableId, TaskId};

/// Column data file: `tables/{table_id}/{column_id}/{task_id}.bin`
pub fn table_item_output_path(table_id: TableId, column_id: ColumnId, task_id: TaskId) -> String {
    format!("tables/{}/{}/{}.bin", table_id, column_id, task_id)
}

/// Column metadata file: `tables/{table_id}/{column_id}/{task_id}_metadata.bin`
pub fn table_item_metadata_path(table_id: TableId, column_id: ColumnId, task_id: TaskId) -> String {
    format!("tables/{}/{}/{}_metadata.bin", table_id, column_id, task_id)
}

/// Video descriptor file: `tables/{table_id}/{column_id}/{task_id}_descriptor.bin`
pub fn table_item_descriptor_path(
    table_id: TableId,
    column_id: ColumnId,
    task_id: TaskId,
) -> String {
    format!("tables/{}/{}/{}_descriptor.bin", table_id, column_id, task_id)
}

/// Staging path the descriptor is written to before the atomic rename into
/// its final location.
pub fn table_item_descriptor_temp_path(
    table_id: TableId,
    column_id: ColumnId,
    task_id: TaskId,
) -> String {
    format!(
        "tables/{}/{}/{}_descriptor.bin.tmp",
        table_id, column_id, task_id
    )
}
