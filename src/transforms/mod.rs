//! The `transforms` namespace exposed to scripts.
//!
//! Each method is a factory: `transforms.resize(256)` returns a pipeline
//! object that can be applied to tensors with `p.invoke(x)` or
//! `p.forward(x)`.
//!
//! ```rhai
//! let crop = transforms.centerCrop(224);
//! let out = crop.forward(input);
//! ```

mod pipeline;

pub use pipeline::{BoundPipeline, PipelineBuilder, PipelineObject};

use crate::host::{DispatchTable, HostFunction, HostObject, HostValue};
use crate::module::builtin::{CENTER_CROP, NORMALIZE, RESIZE};
use crate::module::ModuleCache;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Factory method names, in enumeration order
pub const METHODS: [&str; 3] = [CENTER_CROP, RESIZE, NORMALIZE];

static TRANSFORMS_TABLE: Lazy<DispatchTable> =
    Lazy::new(|| DispatchTable::new(&[], &METHODS).expect("transform names are unique"));

/// Vision transform namespace host object
pub struct TransformsHost {
    factories: Vec<HostFunction>,
}

impl TransformsHost {
    pub fn new(cache: Arc<ModuleCache>) -> Self {
        let factories = METHODS
            .iter()
            .map(|&name| HostFunction::new(PipelineBuilder::new(name, Arc::clone(&cache))))
            .collect();
        Self { factories }
    }
}

impl HostObject for TransformsHost {
    fn type_name(&self) -> &'static str {
        "Transforms"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &TRANSFORMS_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        METHODS
            .iter()
            .position(|&m| m == name)
            .map(|i| HostValue::Function(self.factories[i].clone()))
            .unwrap_or(HostValue::Undefined)
    }
}
