//! Files source: one input artifact per row.
//!
//! Mirror of the Files sink: each requested row is read from an explicit
//! per-stream path and handed to the evaluator as a bytes element.
//! Registered under the name `"Files"`.

use crate::error::Result;
use anyhow::{anyhow, Context};
use bytes::BytesMut;
use prost::Message;
use std::sync::Arc;
use std::time::Instant;
use vidtable_commons::{Element, Profiler, SourceConfig};
use vidtable_proto::FilesSinkStreamArgs;
use vidtable_registry::{source_registry, Source, SourceInfo};
use vidtable_store::{BlobStore, StorageConfig};

/// Source reading each element from its own blob-store path.
pub struct FilesSource {
    storage: BlobStore,
    paths: Vec<String>,
    profiler: Profiler,
}

impl FilesSource {
    /// Each source instance owns a distinct storage backend, one per I/O
    /// thread. Empty args select posix defaults.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let storage_config = StorageConfig::from_args(&config.args)?;
        Ok(Self {
            storage: BlobStore::from_config(&storage_config)?,
            paths: Vec::new(),
            profiler: Profiler::new(),
        })
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl Source for FilesSource {
    fn new_stream(&mut self, args: &[u8]) -> anyhow::Result<()> {
        self.paths.clear();
        if !args.is_empty() {
            let stream_args = FilesSinkStreamArgs::decode(args)
                .context("could not parse files source stream args")?;
            self.paths = stream_args.paths;
        }
        Ok(())
    }

    fn read(&mut self, row_indices: &[u64], output: &mut Vec<Element>) -> anyhow::Result<()> {
        let read_start = Instant::now();
        let mut bytes_read = 0u64;
        for &row in row_indices {
            let path = self
                .paths
                .get(row as usize)
                .ok_or_else(|| anyhow!("row {row} has no input path"))?;
            let bytes = self
                .storage
                .get(path)
                .with_context(|| format!("while trying to read {path}"))?;
            bytes_read += bytes.len() as u64;
            output.push(Element::Bytes(BytesMut::from(&bytes[..])));
        }
        self.profiler
            .add_interval("files_source:read", read_start, Instant::now());
        self.profiler.increment("io_read", bytes_read);
        Ok(())
    }
}

/// Register the built-in sources. Call once at process start.
pub fn register_builtin_sources() -> vidtable_registry::Result<()> {
    source_registry().add_source(SourceInfo {
        name: "Files".to_string(),
        output_columns: vec!["output".to_string()],
        factory: Arc::new(|config| Ok(Box::new(FilesSource::new(config)?) as Box<dyn Source>)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidtable_proto::StorageArgs;

    fn source_for(temp_dir: &std::path::Path) -> FilesSource {
        let args = StorageArgs {
            storage_type: "posix".to_string(),
            base_dir: temp_dir.to_string_lossy().into_owned(),
            ..Default::default()
        };
        let config = SourceConfig {
            args: args.encode_to_vec(),
            node_id: 0,
        };
        FilesSource::new(&config).unwrap()
    }

    #[test]
    fn test_reads_rows_from_their_paths() {
        let temp_dir = std::env::temp_dir().join("vidtable_test_files_source");
        let _ = std::fs::remove_dir_all(&temp_dir);
        std::fs::create_dir_all(temp_dir.join("in")).unwrap();
        std::fs::write(temp_dir.join("in/a.bin"), b"alpha").unwrap();
        std::fs::write(temp_dir.join("in/b.bin"), b"beta").unwrap();

        let mut source = source_for(&temp_dir);
        let stream_args = FilesSinkStreamArgs {
            paths: vec!["in/a.bin".to_string(), "in/b.bin".to_string()],
        };
        source.new_stream(&stream_args.encode_to_vec()).unwrap();

        // Rows can be requested out of order.
        let mut output = Vec::new();
        source.read(&[1, 0], &mut output).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].as_bytes(), b"beta");
        assert_eq!(output[1].as_bytes(), b"alpha");

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_row_without_path_is_an_error() {
        let temp_dir = std::env::temp_dir().join("vidtable_test_files_source_nopath");
        let _ = std::fs::remove_dir_all(&temp_dir);

        let mut source = source_for(&temp_dir);
        source.new_stream(&[]).unwrap();

        let mut output = Vec::new();
        assert!(source.read(&[0], &mut output).is_err());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
