//! Registration scenarios against the process-wide registries.

use std::sync::Arc;
use vidtable_commons::Element;
use vidtable_engine::{register_builtin_sinks, register_builtin_sources};
use vidtable_registry::{
    op_registry, sink_registry, source_registry, Kernel, KernelFactory, OpInfo, RegistryError,
};

struct PassthroughKernel;

impl Kernel for PassthroughKernel {
    fn execute(&mut self, inputs: &[Vec<Element>]) -> anyhow::Result<Vec<Vec<Element>>> {
        Ok(inputs.to_vec())
    }
}

fn passthrough_factory() -> KernelFactory {
    Arc::new(|| Ok(Box::new(PassthroughKernel) as Box<dyn Kernel>))
}

#[test]
fn test_builtins_register_once() {
    register_builtin_sinks().unwrap();
    register_builtin_sources().unwrap();

    assert!(sink_registry().has_sink("Files"));
    assert!(source_registry().has_source("Files"));

    let info = sink_registry().get_sink_info("Files").unwrap();
    assert!(info.per_element_output);
    assert_eq!(info.input_columns, vec!["input"]);

    // Process start runs registration exactly once; a second pass is the
    // usual conflict.
    assert!(matches!(
        register_builtin_sinks(),
        Err(RegistryError::Conflict(_))
    ));
    assert!(matches!(
        register_builtin_sources(),
        Err(RegistryError::Conflict(_))
    ));
}

#[test]
fn test_op_registration_conflict_on_duplicate() {
    let registry = op_registry();

    registry
        .add_op(OpInfo {
            name: "Foo".to_string(),
            input_columns: vec!["frame".to_string()],
            output_columns: vec!["bytes".to_string()],
            variadic_inputs: false,
            factory: passthrough_factory(),
        })
        .unwrap();
    assert!(registry.has_op("Foo"));

    let err = registry
        .add_op(OpInfo {
            name: "Foo".to_string(),
            input_columns: vec!["frame".to_string()],
            output_columns: vec!["bytes".to_string()],
            variadic_inputs: false,
            factory: passthrough_factory(),
        })
        .unwrap_err();
    assert!(matches!(err, RegistryError::Conflict(_)));
}
