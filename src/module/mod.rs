//! Native compute modules and the process-wide module cache.
//!
//! A module is a compiled native operation identified by its logical name.
//! Modules are expensive to produce, so they are obtained through a
//! [`ModuleCache`], which loads each name at most once and then hands out the
//! same shared [`ModuleHandle`] to every caller. Loaded modules are read-only.
//!
//! Loading itself is delegated to a [`ModuleLoader`]; the crate ships a
//! [`BuiltinModuleLoader`] that provides the vision transform kernels.

pub mod builtin;
pub mod cache;
pub mod kernels;

pub use builtin::BuiltinModuleLoader;
pub use cache::ModuleCache;

use crate::binding::OperationSchema;
use crate::error::{BridgeError, Result};
use crate::tensor::Tensor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A value passed to or returned from a native module
#[derive(Debug, Clone, PartialEq)]
pub enum IValue {
    Tensor(Arc<Tensor>),
    Int(i64),
    Double(f64),
    Bool(bool),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
}

impl IValue {
    /// Short description of the variant, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            IValue::Tensor(_) => "tensor",
            IValue::Int(_) => "int",
            IValue::Double(_) => "double",
            IValue::Bool(_) => "bool",
            IValue::IntList(_) => "int list",
            IValue::DoubleList(_) => "double list",
        }
    }

    pub fn as_tensor(&self) -> Option<&Arc<Tensor>> {
        match self {
            IValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            IValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double_list(&self) -> Option<&[f64]> {
        match self {
            IValue::DoubleList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_tensor(self) -> Result<Arc<Tensor>> {
        match self {
            IValue::Tensor(t) => Ok(t),
            other => Err(BridgeError::Tensor(format!(
                "expected a tensor result but got {}",
                other.kind_name()
            ))),
        }
    }
}

/// A loaded native operation
pub trait NativeModule: Send + Sync {
    /// Logical module name
    fn name(&self) -> &str;

    /// Declared inputs and parameters, in the order `forward` expects them
    fn schema(&self) -> &OperationSchema;

    /// Run the operation on inputs followed by bound parameters
    fn forward(&self, inputs: &[IValue]) -> Result<IValue>;
}

/// Shared, read-only reference to a loaded module
pub type ModuleHandle = Arc<dyn NativeModule>;

/// Produces modules by name; called at most once per name by [`ModuleCache`]
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<ModuleHandle>;
}

/// Serializable description of a cached module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub input_count: usize,
    pub parameter_count: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Fetch positional input `index` of `module`, reporting a missing value
pub(crate) fn input<'a>(module: &str, inputs: &'a [IValue], index: usize) -> Result<&'a IValue> {
    inputs.get(index).ok_or_else(|| {
        BridgeError::Tensor(format!(
            "{} expects at least {} inputs but {} were given",
            module,
            index + 1,
            inputs.len()
        ))
    })
}
