//! Two-stage transform objects.
//!
//! [`PipelineBuilder`] is what a script receives for `transforms.resize`:
//! calling it resolves the module and binds the construction arguments,
//! producing a [`BoundPipeline`]. The bound pipeline is then applied to
//! tensors any number of times without rebinding or reloading.

use crate::binding::{self, BoundParameters};
use crate::error::Result;
use crate::host::{DispatchTable, HostCallable, HostFunction, HostObject, HostRef, HostValue};
use crate::module::{ModuleCache, ModuleHandle};
use crate::tensor::TensorHandle;
use once_cell::sync::Lazy;
use rhai::Dynamic;
use std::sync::Arc;

const FORWARD: &str = "forward";

static PIPELINE_TABLE: Lazy<DispatchTable> =
    Lazy::new(|| DispatchTable::new(&[], &[FORWARD]).expect("pipeline names are unique"));

/// Factory stage: turns construction arguments into a [`BoundPipeline`]
pub struct PipelineBuilder {
    name: &'static str,
    cache: Arc<ModuleCache>,
}

impl PipelineBuilder {
    pub fn new(name: &'static str, cache: Arc<ModuleCache>) -> Self {
        Self { name, cache }
    }

    /// Resolve the module and bind `args` against its parameter schema
    pub fn build(&self, args: &[Dynamic]) -> Result<BoundPipeline> {
        let module = self.cache.get_or_load(self.name)?;
        let params = binding::bind(module.schema(), args)?;
        tracing::debug!("Constructed {} pipeline", self.name);
        Ok(BoundPipeline {
            name: self.name,
            module,
            params,
        })
    }
}

impl HostCallable for PipelineBuilder {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        let pipeline = self.build(args)?;
        Ok(HostRef::new(PipelineObject::new(pipeline)).into_dynamic())
    }
}

/// Exec stage: a module together with its bound construction parameters
pub struct BoundPipeline {
    name: &'static str,
    module: ModuleHandle,
    params: BoundParameters,
}

impl BoundPipeline {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }

    pub fn parameters(&self) -> &BoundParameters {
        &self.params
    }

    /// Apply the transform: inputs first, then the bound parameters
    pub fn forward(&self, args: &[Dynamic]) -> Result<TensorHandle> {
        let mut inputs = binding::parse_inputs(self.module.schema(), args)?;
        inputs.extend(self.params.iter().cloned());
        tracing::trace!("Running {} with {} values", self.name, inputs.len());

        let output = self.module.forward(&inputs)?;
        Ok(TensorHandle::from_arc(output.into_tensor()?))
    }
}

impl HostCallable for BoundPipeline {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        self.forward(args).map(Dynamic::from)
    }
}

/// Host object wrapping a constructed pipeline.
///
/// Calling the object and calling its `forward` method reach the same
/// [`BoundPipeline`].
pub struct PipelineObject {
    exec: Arc<BoundPipeline>,
}

impl PipelineObject {
    pub fn new(pipeline: BoundPipeline) -> Self {
        Self {
            exec: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &BoundPipeline {
        &self.exec
    }

    fn exec_function(&self) -> HostFunction {
        HostFunction::from_arc(self.exec.clone())
    }
}

impl HostObject for PipelineObject {
    fn type_name(&self) -> &'static str {
        "Pipeline"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &PIPELINE_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        match name {
            FORWARD => HostValue::Function(self.exec_function()),
            _ => HostValue::Undefined,
        }
    }

    fn as_callable(&self) -> Option<HostFunction> {
        Some(self.exec_function())
    }
}
