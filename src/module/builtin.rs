//! Built-in vision transform modules.
//!
//! | Module       | Inputs   | Parameters        |
//! |--------------|----------|-------------------|
//! | `centerCrop` | `input`  | `size`            |
//! | `resize`     | `input`  | `size`            |
//! | `normalize`  | `input`  | `mean`, `std`     |

use super::kernels;
use super::{input, IValue, ModuleHandle, ModuleLoader, NativeModule};
use crate::binding::{OperationSchema, ParamKind, ParamSpec};
use crate::error::{BridgeError, Result};
use std::sync::Arc;

pub const CENTER_CROP: &str = "centerCrop";
pub const RESIZE: &str = "resize";
pub const NORMALIZE: &str = "normalize";

/// Loader for the modules compiled into this crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinModuleLoader;

impl BuiltinModuleLoader {
    pub fn new() -> Self {
        Self
    }

    /// Names this loader can produce
    pub fn available() -> &'static [&'static str] {
        &[CENTER_CROP, RESIZE, NORMALIZE]
    }
}

impl ModuleLoader for BuiltinModuleLoader {
    fn load(&self, name: &str) -> Result<ModuleHandle> {
        let module: ModuleHandle = match name {
            CENTER_CROP => Arc::new(CenterCropModule::new()),
            RESIZE => Arc::new(ResizeModule::new()),
            NORMALIZE => Arc::new(NormalizeModule::new()),
            _ => {
                return Err(BridgeError::ModuleLoad {
                    module: name.to_string(),
                    reason: "no built-in module with this name".to_string(),
                })
            }
        };
        Ok(module)
    }
}

fn image_input() -> ParamSpec {
    ParamSpec::new("input", ParamKind::Tensor)
}

fn size_param<'a>(module: &str, inputs: &'a [IValue]) -> Result<&'a [i64]> {
    input(module, inputs, 1)?
        .as_int_list()
        .ok_or_else(|| BridgeError::Tensor(format!("{} size must be an int list", module)))
}

/// Crops the centre of the image to `size`
pub struct CenterCropModule {
    schema: OperationSchema,
}

impl CenterCropModule {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                CENTER_CROP,
                vec![image_input()],
                vec![ParamSpec::new("size", ParamKind::Size)],
            ),
        }
    }
}

impl Default for CenterCropModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for CenterCropModule {
    fn name(&self) -> &str {
        CENTER_CROP
    }

    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    fn forward(&self, inputs: &[IValue]) -> Result<IValue> {
        let tensor = input(CENTER_CROP, inputs, 0)?
            .as_tensor()
            .ok_or_else(|| BridgeError::Tensor("centerCrop input must be a tensor".to_string()))?;
        let (h, w) = match *size_param(CENTER_CROP, inputs)? {
            [s] => (s as usize, s as usize),
            [h, w] => (h as usize, w as usize),
            _ => return Err(BridgeError::Tensor("centerCrop size must have 1 or 2 elements".to_string())),
        };
        let cropped = kernels::center_crop(tensor, h, w)?;
        Ok(IValue::Tensor(Arc::new(cropped)))
    }
}

/// Resizes the image to `size` with bilinear interpolation
pub struct ResizeModule {
    schema: OperationSchema,
}

impl ResizeModule {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                RESIZE,
                vec![image_input()],
                vec![ParamSpec::new("size", ParamKind::Size)],
            ),
        }
    }
}

impl Default for ResizeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for ResizeModule {
    fn name(&self) -> &str {
        RESIZE
    }

    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    fn forward(&self, inputs: &[IValue]) -> Result<IValue> {
        let tensor = input(RESIZE, inputs, 0)?
            .as_tensor()
            .ok_or_else(|| BridgeError::Tensor("resize input must be a tensor".to_string()))?;
        let (_, height, width) = tensor.spatial_dims()?;
        let (out_h, out_w) = kernels::resize_target(height, width, size_param(RESIZE, inputs)?)?;
        let resized = kernels::resize_bilinear(tensor, out_h, out_w)?;
        Ok(IValue::Tensor(Arc::new(resized)))
    }
}

/// Normalizes each channel with a mean and standard deviation
pub struct NormalizeModule {
    schema: OperationSchema,
}

impl NormalizeModule {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                NORMALIZE,
                vec![image_input()],
                vec![
                    ParamSpec::new("mean", ParamKind::DoubleList),
                    ParamSpec::new("std", ParamKind::DoubleList),
                ],
            ),
        }
    }
}

impl Default for NormalizeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for NormalizeModule {
    fn name(&self) -> &str {
        NORMALIZE
    }

    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    fn forward(&self, inputs: &[IValue]) -> Result<IValue> {
        let tensor = input(NORMALIZE, inputs, 0)?
            .as_tensor()
            .ok_or_else(|| BridgeError::Tensor("normalize input must be a tensor".to_string()))?;
        let list = |index: usize| {
            input(NORMALIZE, inputs, index)?
                .as_double_list()
                .ok_or_else(|| BridgeError::Tensor("normalize mean/std must be number lists".to_string()))
        };
        let normalized = kernels::normalize(tensor, list(1)?, list(2)?)?;
        Ok(IValue::Tensor(Arc::new(normalized)))
    }
}
