//! Native tensor values and the handle that exposes them to scripts.
//!
//! [`Tensor`] is a dense, row-major `f32` array. Scripts never see it
//! directly: every tensor that crosses into the scripting runtime is wrapped
//! in a [`TensorHandle`], which is itself a host object with `shape`/`dtype`
//! properties and `size()`/`data()` methods. The underlying tensor is released
//! when the last handle referencing it is dropped.

use crate::error::{BridgeError, Result};
use crate::host::{DispatchTable, HostCallable, HostFunction, HostObject, HostValue};
use once_cell::sync::Lazy;
use rhai::{Array, Dynamic};
use std::fmt;
use std::sync::Arc;

/// Element type name reported for every tensor
pub const DTYPE_FLOAT32: &str = "float32";

const DTYPE: &str = "dtype";
const SHAPE: &str = "shape";
const DATA: &str = "data";
const SIZE: &str = "size";

static TENSOR_TABLE: Lazy<DispatchTable> = Lazy::new(|| {
    DispatchTable::new(&[DTYPE, SHAPE], &[DATA, SIZE]).expect("tensor names are unique")
});

/// Dense row-major tensor of `f32` values
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor from a shape and matching data
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let numel = element_count(&shape)?;
        if numel != data.len() {
            return Err(BridgeError::Tensor(format!(
                "shape {:?} needs {} elements but {} were given",
                shape,
                numel,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Create a tensor filled with `value`
    pub fn full(shape: Vec<usize>, value: f32) -> Result<Self> {
        let numel = element_count(&shape)?;
        let mut data = alloc_elements(numel)?;
        data.resize(numel, value);
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: Vec<usize>) -> Result<Self> {
        Self::full(shape, 1.0)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn dtype(&self) -> &'static str {
        DTYPE_FLOAT32
    }

    /// Split the shape into (number of planes, height, width), where the last
    /// two dimensions are treated as spatial.
    pub fn spatial_dims(&self) -> Result<(usize, usize, usize)> {
        if self.rank() < 2 {
            return Err(BridgeError::Tensor(format!(
                "expected a tensor with at least 2 dimensions, got shape {:?}",
                self.shape
            )));
        }
        let height = self.shape[self.rank() - 2];
        let width = self.shape[self.rank() - 1];
        let planes = element_count(&self.shape[..self.rank() - 2])?;
        Ok((planes, height, width))
    }

    /// Build a tensor with the same leading dimensions and new spatial size
    pub(crate) fn with_spatial(&self, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        let mut shape = self.shape[..self.rank() - 2].to_vec();
        shape.push(height);
        shape.push(width);
        Tensor::new(shape, data)
    }
}

/// Number of elements described by `dims`, failing when it does not fit in
/// `usize`. Any zero dimension gives zero.
pub fn element_count(dims: &[usize]) -> Result<usize> {
    if dims.contains(&0) {
        return Ok(0);
    }
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| BridgeError::Tensor(format!("shape {:?} has too many elements", dims)))
}

/// Empty buffer with room for `numel` elements, or `AllocationFailure`
pub(crate) fn alloc_elements(numel: usize) -> Result<Vec<f32>> {
    let size = numel.saturating_mul(std::mem::size_of::<f32>());
    let mut data = Vec::new();
    data.try_reserve_exact(numel)
        .map_err(|_| BridgeError::AllocationFailure { size })?;
    Ok(data)
}

/// Script-facing handle around a native tensor
#[derive(Clone)]
pub struct TensorHandle {
    tensor: Arc<Tensor>,
}

impl TensorHandle {
    pub fn new(tensor: Tensor) -> Self {
        Self {
            tensor: Arc::new(tensor),
        }
    }

    pub fn from_arc(tensor: Arc<Tensor>) -> Self {
        Self { tensor }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// Shared reference to the wrapped tensor
    pub fn shared(&self) -> Arc<Tensor> {
        Arc::clone(&self.tensor)
    }

    fn shape_array(&self) -> Array {
        self.tensor
            .shape()
            .iter()
            .map(|&d| Dynamic::from(d as rhai::INT))
            .collect()
    }
}

impl HostObject for TensorHandle {
    fn type_name(&self) -> &'static str {
        "Tensor"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &TENSOR_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        match name {
            DTYPE => HostValue::Data(Dynamic::from(self.tensor.dtype().to_string())),
            SHAPE => HostValue::Data(Dynamic::from(self.shape_array())),
            DATA | SIZE => HostValue::Function(HostFunction::new(TensorMethod {
                name: if name == DATA { DATA } else { SIZE },
                handle: self.clone(),
            })),
            _ => HostValue::Undefined,
        }
    }
}

impl fmt::Debug for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorHandle")
            .field("shape", &self.tensor.shape())
            .finish()
    }
}

impl fmt::Display for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={:?}, dtype={})",
            self.tensor.shape(),
            self.tensor.dtype()
        )
    }
}

/// Bound `size()` / `data()` method of a tensor handle
struct TensorMethod {
    name: &'static str,
    handle: TensorHandle,
}

impl HostCallable for TensorMethod {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        if !args.is_empty() {
            return Err(BridgeError::Script(format!(
                "Tensor.{}() takes no arguments but {} are given",
                self.name,
                args.len()
            )));
        }
        let value = if self.name == DATA {
            self.handle
                .tensor()
                .data()
                .iter()
                .map(|&v| Dynamic::from(v as rhai::FLOAT))
                .collect::<Array>()
        } else {
            self.handle.shape_array()
        };
        Ok(Dynamic::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(Tensor::new(vec![2, 2], vec![1.0; 4]).is_ok());
        let err = Tensor::new(vec![2, 3], vec![1.0; 4]).unwrap_err();
        assert!(err.to_string().contains("needs 6 elements"));
    }

    #[test]
    fn test_element_count_overflow() {
        let huge = 1usize << 32;
        assert!(element_count(&[huge, huge, huge]).is_err());
        assert_eq!(element_count(&[huge, huge, huge, 0]).unwrap(), 0);
        assert_eq!(element_count(&[]).unwrap(), 1);

        let err = Tensor::zeros(vec![huge, huge, huge]).unwrap_err();
        assert!(err.to_string().contains("too many elements"));
        assert!(Tensor::new(vec![huge, huge, huge], vec![]).is_err());
    }

    #[test]
    fn test_full_reports_allocation_failure() {
        let err = Tensor::full(vec![1usize << 31, 1usize << 31], 1.0).unwrap_err();
        assert!(matches!(err, BridgeError::AllocationFailure { .. }));
    }

    #[test]
    fn test_spatial_dims() {
        let t = Tensor::zeros(vec![2, 3, 4, 5]).unwrap();
        assert_eq!(t.spatial_dims().unwrap(), (6, 4, 5));
        assert!(Tensor::zeros(vec![5]).unwrap().spatial_dims().is_err());
    }

    #[test]
    fn test_handle_properties() {
        let handle = TensorHandle::new(Tensor::ones(vec![3, 2]).unwrap());
        let shape = handle.get("shape");
        let shape = match shape {
            HostValue::Data(d) => d.into_array().unwrap(),
            _ => panic!("shape should be a data property"),
        };
        assert_eq!(shape.len(), 2);
        assert_eq!(shape[0].as_int().unwrap(), 3);

        assert!(handle.get("missing").is_undefined());
        assert_eq!(handle.property_names(), vec!["dtype", "shape", "data", "size"]);
    }

    #[test]
    fn test_handle_data_method() {
        let handle = TensorHandle::new(Tensor::new(vec![2], vec![0.5, 1.5]).unwrap());
        let data = handle.get("data").as_function().unwrap().call(&[]).unwrap();
        let data = data.into_array().unwrap();
        assert_eq!(data[1].as_float().unwrap(), 1.5);
    }

    #[test]
    fn test_display() {
        let handle = TensorHandle::new(Tensor::zeros(vec![1, 2]).unwrap());
        assert_eq!(handle.to_string(), "Tensor(shape=[1, 2], dtype=float32)");
    }
}
