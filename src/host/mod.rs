//! Host objects: native values exposed to the scripting runtime by name.
//!
//! A host object answers two questions for the runtime:
//!
//! - **Which names do you have?** [`HostObject::property_names`] lists the data
//!   properties followed by the methods, in declaration order. The list comes
//!   from a [`DispatchTable`] that is fixed when the object is built.
//! - **What is `name`?** [`HostObject::get`] returns a [`HostValue`]: a data
//!   value, a callable [`HostFunction`], or [`HostValue::Undefined`] for names
//!   the object does not know. An unknown name is not an error.
//!
//! Objects that can be called directly (constructed pipelines) also return
//! their default callable from [`HostObject::as_callable`].
//!
//! ```ignore
//! let transforms = HostRef::new(TransformsHost::new(ModuleCache::global()));
//! let resize = transforms.call_method("resize", &[Dynamic::from(256_i64)])?;
//! ```

use crate::error::{BridgeError, Result};
use rhai::Dynamic;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A native operation callable from scripts
pub trait HostCallable: Send + Sync {
    /// Name the callable is exposed under
    fn name(&self) -> &str;

    /// Invoke with script arguments
    fn call(&self, args: &[Dynamic]) -> Result<Dynamic>;
}

/// Shared reference to a [`HostCallable`].
///
/// Cloning shares the callable; [`HostFunction::ptr_eq`] tells whether two
/// handles refer to the identical instance.
#[derive(Clone)]
pub struct HostFunction(Arc<dyn HostCallable>);

impl HostFunction {
    pub fn new(callable: impl HostCallable + 'static) -> Self {
        Self(Arc::new(callable))
    }

    pub fn from_arc(callable: Arc<dyn HostCallable>) -> Self {
        Self(callable)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        self.0.call(args)
    }

    /// True when both handles point at the same callable instance
    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.name())
    }
}

/// Result of looking up a name on a host object
#[derive(Debug, Clone)]
pub enum HostValue {
    /// The name is not known to this object
    Undefined,
    /// A data property
    Data(Dynamic),
    /// A method
    Function(HostFunction),
}

impl HostValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Convert into a script value; `Undefined` becomes `()`
    pub fn into_dynamic(self) -> Dynamic {
        match self {
            HostValue::Undefined => Dynamic::UNIT,
            HostValue::Data(value) => value,
            HostValue::Function(f) => Dynamic::from(f),
        }
    }
}

/// Property and method names of a host object.
///
/// Both lists keep their declaration order and are never modified after
/// construction. A name may appear only once across both lists.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    properties: Vec<&'static str>,
    methods: Vec<&'static str>,
}

impl DispatchTable {
    pub fn new(properties: &[&'static str], methods: &[&'static str]) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in properties.iter().chain(methods) {
            if !seen.insert(*name) {
                return Err(BridgeError::DuplicateName(name.to_string()));
            }
        }
        Ok(Self {
            properties: properties.to_vec(),
            methods: methods.to_vec(),
        })
    }

    pub fn properties(&self) -> &[&'static str] {
        &self.properties
    }

    pub fn methods(&self) -> &[&'static str] {
        &self.methods
    }

    /// Properties then methods
    pub fn names(&self) -> Vec<String> {
        self.properties
            .iter()
            .chain(&self.methods)
            .map(|n| n.to_string())
            .collect()
    }

    pub fn is_method(&self, name: &str) -> bool {
        self.methods.contains(&name)
    }
}

/// A native object the scripting runtime accesses by name
pub trait HostObject: Send + Sync {
    /// Name reported to scripts in error messages
    fn type_name(&self) -> &'static str;

    fn dispatch_table(&self) -> &DispatchTable;

    /// All names, properties first; identical on every call
    fn property_names(&self) -> Vec<String> {
        self.dispatch_table().names()
    }

    fn get(&self, name: &str) -> HostValue;

    /// Default-call form, for objects that are themselves callable
    fn as_callable(&self) -> Option<HostFunction> {
        None
    }
}

/// Cloneable, type-erased host object as stored in script values
#[derive(Clone)]
pub struct HostRef(Arc<dyn HostObject>);

impl HostRef {
    pub fn new(object: impl HostObject + 'static) -> Self {
        Self(Arc::new(object))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn get(&self, name: &str) -> HostValue {
        self.0.get(name)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.0.property_names()
    }

    pub fn as_callable(&self) -> Option<HostFunction> {
        self.0.as_callable()
    }

    /// Look up `name` and call it with `args`
    pub fn call_method(&self, name: &str, args: &[Dynamic]) -> Result<Dynamic> {
        call_named(self.0.as_ref(), name, args)
    }

    /// Call the object itself (the default-call form)
    pub fn invoke(&self, args: &[Dynamic]) -> Result<Dynamic> {
        match self.as_callable() {
            Some(f) => f.call(args),
            None => Err(BridgeError::Script(format!(
                "{} is not callable",
                self.type_name()
            ))),
        }
    }

    pub fn into_dynamic(self) -> Dynamic {
        Dynamic::from(self)
    }
}

impl HostObject for HostRef {
    fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    fn dispatch_table(&self) -> &DispatchTable {
        self.0.dispatch_table()
    }

    fn property_names(&self) -> Vec<String> {
        self.0.property_names()
    }

    fn get(&self, name: &str) -> HostValue {
        self.0.get(name)
    }

    fn as_callable(&self) -> Option<HostFunction> {
        self.0.as_callable()
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRef")
            .field("type", &self.type_name())
            .field("names", &self.property_names())
            .finish()
    }
}

/// Resolve `name` on `object` and call it, reporting non-callable names
pub fn call_named(object: &dyn HostObject, name: &str, args: &[Dynamic]) -> Result<Dynamic> {
    match object.get(name) {
        HostValue::Function(f) => f.call(args),
        HostValue::Data(_) => Err(BridgeError::Script(format!(
            "{}.{} is a property, not a method",
            object.type_name(),
            name
        ))),
        HostValue::Undefined => Err(BridgeError::Script(format!(
            "{} has no method '{}'",
            object.type_name(),
            name
        ))),
    }
}
