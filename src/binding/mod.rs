//! Conversion of script arguments into native module values.
//!
//! Every native operation declares an [`OperationSchema`]: the data inputs it
//! takes when applied and the parameters it takes when constructed. The
//! binder checks the argument count against the schema and coerces each
//! argument to the declared [`ParamKind`], producing values in declaration
//! order, which is also the order the module expects after its inputs.
//!
//! | Kind         | Accepted script values                        | Native value  |
//! |--------------|-----------------------------------------------|---------------|
//! | `Tensor`     | a tensor handle                               | `Tensor`      |
//! | `Int`        | integer, or float with no fractional part     | `Int`         |
//! | `Double`     | integer or float                              | `Double`      |
//! | `Bool`       | boolean                                       | `Bool`        |
//! | `Size`       | positive int, or array of 1-2 positive ints   | `IntList`     |
//! | `Shape`      | array of non-negative ints                    | `IntList`     |
//! | `Pair`       | array of exactly two numbers                  | `DoubleList`  |
//! | `DoubleList` | non-empty array of numbers                    | `DoubleList`  |

use crate::error::{BridgeError, Result};
use crate::module::IValue;
use crate::tensor::TensorHandle;
use rhai::Dynamic;

/// Kind of value a schema entry accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Tensor,
    Int,
    Double,
    Bool,
    Size,
    Shape,
    Pair,
    DoubleList,
}

impl ParamKind {
    /// Human readable description used in type errors
    pub fn describe(self) -> &'static str {
        match self {
            ParamKind::Tensor => "a tensor",
            ParamKind::Int => "an integer",
            ParamKind::Double => "a number",
            ParamKind::Bool => "a boolean",
            ParamKind::Size => "a positive integer or an array of 1 or 2 positive integers",
            ParamKind::Shape => "an array of non-negative integers",
            ParamKind::Pair => "an array of two numbers",
            ParamKind::DoubleList => "a non-empty array of numbers",
        }
    }
}

/// One named entry of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind }
    }
}

/// Declared inputs and construction parameters of a native operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSchema {
    pub name: &'static str,
    pub inputs: Vec<ParamSpec>,
    pub params: Vec<ParamSpec>,
}

impl OperationSchema {
    pub fn new(name: &'static str, inputs: Vec<ParamSpec>, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            inputs,
            params,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }
}

/// Parameters bound once at construction time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundParameters(Vec<IValue>);

impl BoundParameters {
    pub fn values(&self) -> &[IValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IValue> {
        self.0.iter()
    }
}

/// Bind construction arguments against `schema.params`.
///
/// Fails with [`BridgeError::ArgumentCountMismatch`] on a count mismatch and
/// [`BridgeError::ArgumentTypeError`] on the first argument that does not
/// coerce. Nothing is returned unless every argument bound.
pub fn bind(schema: &OperationSchema, args: &[Dynamic]) -> Result<BoundParameters> {
    if args.len() != schema.parameter_count() {
        return Err(BridgeError::ArgumentCountMismatch {
            function: schema.name.to_string(),
            expected: schema.parameter_count(),
            actual: args.len(),
        });
    }
    let values = coerce_all(schema.name, &schema.params, args)?;
    tracing::debug!("Bound {} parameters for {}", values.len(), schema.name);
    Ok(BoundParameters(values))
}

/// Parse application-time arguments against `schema.inputs`
pub fn parse_inputs(schema: &OperationSchema, args: &[Dynamic]) -> Result<Vec<IValue>> {
    if args.len() != schema.input_count() {
        return Err(BridgeError::InputCountMismatch {
            function: schema.name.to_string(),
            expected: schema.input_count(),
            actual: args.len(),
        });
    }
    coerce_all(schema.name, &schema.inputs, args)
}

fn coerce_all(function: &str, specs: &[ParamSpec], args: &[Dynamic]) -> Result<Vec<IValue>> {
    specs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (spec, arg))| coerce(function, index, spec.kind, arg))
        .collect()
}

/// Coerce a single script value to `kind`
pub fn coerce(function: &str, index: usize, kind: ParamKind, value: &Dynamic) -> Result<IValue> {
    let type_error = || BridgeError::argument_type(function, index, kind.describe());

    match kind {
        ParamKind::Tensor => value
            .clone()
            .try_cast::<TensorHandle>()
            .map(|h| IValue::Tensor(h.shared()))
            .ok_or_else(type_error),
        ParamKind::Int => as_integer(value).map(IValue::Int).ok_or_else(type_error),
        ParamKind::Double => as_number(value).map(IValue::Double).ok_or_else(type_error),
        ParamKind::Bool => value.as_bool().map(IValue::Bool).map_err(|_| type_error()),
        ParamKind::Size => {
            let dims = match as_integer(value) {
                Some(n) => vec![n],
                None => integer_array(value).ok_or_else(type_error)?,
            };
            if dims.is_empty() || dims.len() > 2 || dims.iter().any(|&d| d <= 0) {
                return Err(type_error());
            }
            Ok(IValue::IntList(dims))
        }
        ParamKind::Shape => {
            let dims = integer_array(value).ok_or_else(type_error)?;
            if dims.iter().any(|&d| d < 0) {
                return Err(type_error());
            }
            Ok(IValue::IntList(dims))
        }
        ParamKind::Pair => match number_array(value) {
            Some(pair) if pair.len() == 2 => Ok(IValue::DoubleList(pair)),
            _ => Err(type_error()),
        },
        ParamKind::DoubleList => match number_array(value) {
            Some(list) if !list.is_empty() => Ok(IValue::DoubleList(list)),
            _ => Err(type_error()),
        },
    }
}

fn as_integer(value: &Dynamic) -> Option<i64> {
    if let Ok(i) = value.as_int() {
        return Some(i);
    }
    // i64::MAX is not representable as f64; 2^63 is the first value past it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    match value.as_float() {
        Ok(f) if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) => Some(f as i64),
        _ => None,
    }
}

fn as_number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f64))
}

fn integer_array(value: &Dynamic) -> Option<Vec<i64>> {
    let array = value.read_lock::<rhai::Array>()?;
    array.iter().map(as_integer).collect()
}

fn number_array(value: &Dynamic) -> Option<Vec<f64>> {
    let array = value.read_lock::<rhai::Array>()?;
    array.iter().map(as_number).collect()
}
