//! The `torch` namespace: tensor constructors for scripts.
//!
//! | Method               | Result                                   |
//! |----------------------|------------------------------------------|
//! | `ones(shape)`        | tensor of `shape` filled with 1.0        |
//! | `zeros(shape)`       | tensor of `shape` filled with 0.0        |
//! | `tensor(data, shape)`| tensor of `shape` holding `data`         |

use crate::binding::{self, OperationSchema, ParamKind, ParamSpec};
use crate::error::{BridgeError, Result};
use crate::host::{DispatchTable, HostCallable, HostFunction, HostObject, HostValue};
use crate::module::IValue;
use crate::tensor::{Tensor, TensorHandle};
use once_cell::sync::Lazy;
use rhai::Dynamic;

const ONES: &str = "ones";
const TENSOR: &str = "tensor";
const ZEROS: &str = "zeros";

static TORCH_TABLE: Lazy<DispatchTable> =
    Lazy::new(|| DispatchTable::new(&[], &[ONES, TENSOR, ZEROS]).expect("torch names are unique"));

#[derive(Clone, Copy)]
enum Constructor {
    Ones,
    Tensor,
    Zeros,
}

struct TensorConstructor {
    kind: Constructor,
    schema: OperationSchema,
}

impl TensorConstructor {
    fn new(kind: Constructor) -> Self {
        let shape = ParamSpec::new("shape", ParamKind::Shape);
        let schema = match kind {
            Constructor::Ones => OperationSchema::new(ONES, vec![], vec![shape]),
            Constructor::Zeros => OperationSchema::new(ZEROS, vec![], vec![shape]),
            Constructor::Tensor => OperationSchema::new(
                TENSOR,
                vec![],
                vec![ParamSpec::new("data", ParamKind::DoubleList), shape],
            ),
        };
        Self { kind, schema }
    }

    fn construct(&self, args: &[Dynamic]) -> Result<Tensor> {
        let bound = binding::bind(&self.schema, args)?;
        let values = bound.values();
        let shape = |index: usize| -> Result<Vec<usize>> {
            match &values[index] {
                IValue::IntList(dims) => Ok(dims.iter().map(|&d| d as usize).collect()),
                other => Err(BridgeError::Tensor(format!(
                    "shape must be an int list, got {}",
                    other.kind_name()
                ))),
            }
        };

        match self.kind {
            Constructor::Ones => Tensor::ones(shape(0)?),
            Constructor::Zeros => Tensor::zeros(shape(0)?),
            Constructor::Tensor => {
                let data = values[0]
                    .as_double_list()
                    .ok_or_else(|| BridgeError::Tensor("tensor data must be numbers".to_string()))?
                    .iter()
                    .map(|&v| v as f32)
                    .collect();
                Tensor::new(shape(1)?, data)
            }
        }
    }
}

impl HostCallable for TensorConstructor {
    fn name(&self) -> &str {
        self.schema.name
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        self.construct(args)
            .map(|t| Dynamic::from(TensorHandle::new(t)))
    }
}

/// Tensor constructor namespace host object
pub struct TorchHost {
    ones: HostFunction,
    tensor: HostFunction,
    zeros: HostFunction,
}

impl TorchHost {
    pub fn new() -> Self {
        Self {
            ones: HostFunction::new(TensorConstructor::new(Constructor::Ones)),
            tensor: HostFunction::new(TensorConstructor::new(Constructor::Tensor)),
            zeros: HostFunction::new(TensorConstructor::new(Constructor::Zeros)),
        }
    }
}

impl Default for TorchHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostObject for TorchHost {
    fn type_name(&self) -> &'static str {
        "Torch"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &TORCH_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        match name {
            ONES => HostValue::Function(self.ones.clone()),
            TENSOR => HostValue::Function(self.tensor.clone()),
            ZEROS => HostValue::Function(self.zeros.clone()),
            _ => HostValue::Undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::call_named;
    use rhai::Array;

    fn dims(values: &[i64]) -> Dynamic {
        Dynamic::from(values.iter().map(|&v| Dynamic::from(v)).collect::<Array>())
    }

    #[test]
    fn test_ones_and_zeros() {
        let torch = TorchHost::new();
        let ones = call_named(&torch, "ones", &[dims(&[2, 3])]).unwrap();
        let ones = ones.cast::<TensorHandle>();
        assert_eq!(ones.tensor().shape(), &[2, 3]);
        assert!(ones.tensor().data().iter().all(|&v| v == 1.0));

        let zeros = call_named(&torch, "zeros", &[dims(&[4])]).unwrap();
        assert_eq!(zeros.cast::<TensorHandle>().tensor().data(), &[0.0; 4]);
    }

    #[test]
    fn test_tensor_from_data() {
        let torch = TorchHost::new();
        let data: Array = vec![Dynamic::from(1_i64), Dynamic::from(2.5_f64)];
        let t = call_named(&torch, "tensor", &[Dynamic::from(data), dims(&[1, 2])]).unwrap();
        assert_eq!(t.cast::<TensorHandle>().tensor().data(), &[1.0, 2.5]);
    }

    #[test]
    fn test_tensor_shape_mismatch() {
        let torch = TorchHost::new();
        let data: Array = vec![Dynamic::from(1_i64)];
        let err = call_named(&torch, "tensor", &[Dynamic::from(data), dims(&[2, 2])]).unwrap_err();
        assert!(err.to_string().contains("needs 4 elements"));
    }

    #[test]
    fn test_constructor_arity() {
        let err = call_named(&TorchHost::new(), "ones", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Factory function ones expects 1 argument but 0 are given."
        );
    }

    #[test]
    fn test_negative_dimension_rejected() {
        let err = call_named(&TorchHost::new(), "zeros", &[dims(&[2, -1])]).unwrap_err();
        assert!(matches!(err, BridgeError::ArgumentTypeError { index: 0, .. }));
    }
}
