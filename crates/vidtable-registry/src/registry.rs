//! Process-wide registries for ops, sources, and sinks.
//!
//! Each registry is a singleton initialized lazily on first access and
//! treated as frozen once process startup completes: registration happens
//! before any task runs, lookups dominate afterwards. The name→info maps are
//! `DashMap`s so concurrent lookups need no external synchronization, and
//! `OnceLock` makes the lazy initialization race-free.

use crate::error::{RegistryError, Result};
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use vidtable_commons::{Element, SinkConfig, SourceConfig};

/// A computation kernel instantiated per task by the evaluator.
///
/// Kernels are external collaborators; the core only routes their batches.
pub trait Kernel: Send {
    /// Evaluate one batch: one element vector per input column in, one per
    /// output column out.
    fn execute(&mut self, inputs: &[Vec<Element>]) -> anyhow::Result<Vec<Vec<Element>>>;
}

/// A source instantiated per task to feed rows into the evaluator.
pub trait Source: Send {
    fn new_stream(&mut self, args: &[u8]) -> anyhow::Result<()>;
    fn read(&mut self, row_indices: &[u64], output: &mut Vec<Element>) -> anyhow::Result<()>;
}

/// A sink instantiated per task to consume evaluated rows.
pub trait Sink: Send {
    fn new_stream(&mut self, args: &[u8]) -> anyhow::Result<()>;
    fn write(&mut self, elements: &[Element], row_indices: &[u64]) -> anyhow::Result<()>;
}

pub type KernelFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Kernel>> + Send + Sync>;
pub type SourceFactory = Arc<dyn Fn(&SourceConfig) -> anyhow::Result<Box<dyn Source>> + Send + Sync>;
pub type SinkFactory = Arc<dyn Fn(&SinkConfig) -> anyhow::Result<Box<dyn Sink>> + Send + Sync>;

/// Registration record for an op: its I/O column signature and factory.
#[derive(Clone)]
pub struct OpInfo {
    pub name: String,
    pub input_columns: Vec<String>,
    pub output_columns: Vec<String>,
    /// Variadic ops accept any number of inputs; an empty declared input
    /// list is only legal together with this flag.
    pub variadic_inputs: bool,
    pub factory: KernelFactory,
}

/// Registration record for a source.
#[derive(Clone)]
pub struct SourceInfo {
    pub name: String,
    pub output_columns: Vec<String>,
    pub factory: SourceFactory,
}

/// Registration record for a sink.
#[derive(Clone)]
pub struct SinkInfo {
    pub name: String,
    pub input_columns: Vec<String>,
    /// True when the sink emits one external artifact per element rather
    /// than one item file per task.
    pub per_element_output: bool,
    pub factory: SinkFactory,
}

/// Registry of evaluator ops.
#[derive(Default)]
pub struct OpRegistry {
    ops: DashMap<String, Arc<OpInfo>>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_op(&self, info: OpInfo) -> Result<()> {
        if info.input_columns.is_empty() && !info.variadic_inputs {
            return Err(RegistryError::Conflict(format!(
                "op '{}' registered with empty input columns",
                info.name
            )));
        }
        if info.output_columns.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "op '{}' registered with empty output columns",
                info.name
            )));
        }
        let name = info.name.clone();
        insert_unique(&self.ops, &name, Arc::new(info), "op")
    }

    pub fn get_op_info(&self, name: &str) -> Result<Arc<OpInfo>> {
        self.ops
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(format!("op '{name}'")))
    }

    pub fn has_op(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }
}

/// Registry of sources.
#[derive(Default)]
pub struct SourceRegistry {
    sources: DashMap<String, Arc<SourceInfo>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&self, info: SourceInfo) -> Result<()> {
        if info.output_columns.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "source '{}' registered with empty output columns",
                info.name
            )));
        }
        let name = info.name.clone();
        insert_unique(&self.sources, &name, Arc::new(info), "source")
    }

    pub fn get_source_info(&self, name: &str) -> Result<Arc<SourceInfo>> {
        self.sources
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(format!("source '{name}'")))
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

/// Registry of sinks.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: DashMap<String, Arc<SinkInfo>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&self, info: SinkInfo) -> Result<()> {
        if info.input_columns.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "sink '{}' registered with empty input columns",
                info.name
            )));
        }
        let name = info.name.clone();
        insert_unique(&self.sinks, &name, Arc::new(info), "sink")
    }

    pub fn get_sink_info(&self, name: &str) -> Result<Arc<SinkInfo>> {
        self.sinks
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(format!("sink '{name}'")))
    }

    pub fn has_sink(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }
}

fn insert_unique<T>(
    map: &DashMap<String, Arc<T>>,
    name: &str,
    value: Arc<T>,
    kind: &str,
) -> Result<()> {
    use dashmap::mapref::entry::Entry;
    match map.entry(name.to_string()) {
        Entry::Occupied(_) => Err(RegistryError::Conflict(format!(
            "attempted to re-register {kind} '{name}'"
        ))),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

static OP_REGISTRY: OnceLock<OpRegistry> = OnceLock::new();
static SOURCE_REGISTRY: OnceLock<SourceRegistry> = OnceLock::new();
static SINK_REGISTRY: OnceLock<SinkRegistry> = OnceLock::new();

/// The process-wide op registry.
pub fn op_registry() -> &'static OpRegistry {
    OP_REGISTRY.get_or_init(OpRegistry::new)
}

/// The process-wide source registry.
pub fn source_registry() -> &'static SourceRegistry {
    SOURCE_REGISTRY.get_or_init(SourceRegistry::new)
}

/// The process-wide sink registry.
pub fn sink_registry() -> &'static SinkRegistry {
    SINK_REGISTRY.get_or_init(SinkRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopKernel;

    impl Kernel for NoopKernel {
        fn execute(&mut self, inputs: &[Vec<Element>]) -> anyhow::Result<Vec<Vec<Element>>> {
            Ok(inputs.to_vec())
        }
    }

    fn noop_factory() -> KernelFactory {
        Arc::new(|| Ok(Box::new(NoopKernel) as Box<dyn Kernel>))
    }

    fn op(name: &str) -> OpInfo {
        OpInfo {
            name: name.to_string(),
            input_columns: vec!["frame".to_string()],
            output_columns: vec!["features".to_string()],
            variadic_inputs: false,
            factory: noop_factory(),
        }
    }

    #[test]
    fn test_register_then_duplicate_conflicts() {
        let registry = OpRegistry::new();
        registry.add_op(op("Foo")).unwrap();
        assert!(registry.has_op("Foo"));

        let err = registry.add_op(op("Foo")).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[test]
    fn test_empty_signatures_are_rejected() {
        let registry = OpRegistry::new();

        let mut no_inputs = op("NoInputs");
        no_inputs.input_columns.clear();
        assert!(matches!(
            registry.add_op(no_inputs),
            Err(RegistryError::Conflict(_))
        ));

        let mut no_outputs = op("NoOutputs");
        no_outputs.output_columns.clear();
        assert!(matches!(
            registry.add_op(no_outputs),
            Err(RegistryError::Conflict(_))
        ));
    }

    #[test]
    fn test_variadic_op_may_omit_inputs() {
        let registry = OpRegistry::new();
        let mut variadic = op("Concat");
        variadic.input_columns.clear();
        variadic.variadic_inputs = true;
        registry.add_op(variadic).unwrap();
    }

    #[test]
    fn test_lookup() {
        let registry = OpRegistry::new();
        registry.add_op(op("Histogram")).unwrap();

        let info = registry.get_op_info("Histogram").unwrap();
        assert_eq!(info.input_columns, vec!["frame"]);

        let mut kernel = (info.factory)().unwrap();
        let out = kernel.execute(&[vec![]]).unwrap();
        assert_eq!(out.len(), 1);

        assert!(matches!(
            registry.get_op_info("Missing"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_singletons_are_stable() {
        let a = op_registry() as *const OpRegistry;
        let b = op_registry() as *const OpRegistry;
        assert_eq!(a, b);
    }
}
