//! Files sink: one output artifact per row.
//!
//! Unlike the columnar save path, this sink writes each incoming element to
//! an explicit path supplied per stream, e.g. dumping one JPEG per frame.
//! Registered under the name `"Files"`.

use crate::error::Result;
use anyhow::{anyhow, Context};
use prost::Message;
use std::sync::Arc;
use std::time::Instant;
use vidtable_commons::{Element, Profiler, SinkConfig};
use vidtable_proto::FilesSinkStreamArgs;
use vidtable_registry::{sink_registry, Sink, SinkInfo};
use vidtable_store::{BlobStore, StorageConfig};

/// Sink writing each element to its own blob-store path.
pub struct FilesSink {
    storage: BlobStore,
    paths: Vec<String>,
    profiler: Profiler,
}

impl FilesSink {
    /// Each sink instance owns a distinct storage backend, one per I/O
    /// thread. Empty args select posix defaults.
    pub fn new(config: &SinkConfig) -> Result<Self> {
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

impl Sink for FilesSink {
    fn new_stream(&mut self, args: &[u8]) -> anyhow::Result<()> {
        self.paths.clear();
        if !args.is_empty() {
            let stream_args = FilesSinkStreamArgs::decode(args)
                .context("could not parse files sink stream args")?;
            self.paths = stream_args.paths;
        }
        Ok(())
    }

    fn write(&mut self, elements: &[Element], row_indices: &[u64]) -> anyhow::Result<()> {
        let write_start = Instant::now();
        for (element, &row) in elements.iter().zip(row_indices) {
            let path = self
                .paths
                .get(row as usize)
                .ok_or_else(|| anyhow!("row {row} has no output path"))?;
            let mut file = self
                .storage
                .make_write_file(path)
                .with_context(|| format!("while trying to make write file for {path}"))?;
            file.append(element.as_bytes())?;
            file.save()?;
        }
        self.profiler
            .add_interval("files_sink:write", write_start, Instant::now());
        Ok(())
    }
}

/// Register the built-in sinks. Call once at process start; a second call
/// reports the usual registration conflict.
pub fn register_builtin_sinks() -> vidtable_registry::Result<()> {
    sink_registry().add_sink(SinkInfo {
        name: "Files".to_string(),
        input_columns: vec!["input".to_string()],
        per_element_output: true,
        factory: Arc::new(|config| Ok(Box::new(FilesSink::new(config)?) as Box<dyn Sink>)),
    })
}
