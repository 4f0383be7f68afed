//! Error handling for the torchlive bridge
//!
//! This module defines the bridge error type and a Result alias used
//! throughout the crate. Errors raised while a script is running are
//! converted into Rhai runtime errors with the same message text.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A factory function was called with the wrong number of arguments
    #[error("Factory function {function} expects {expected} argument but {actual} are given.")]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// An argument could not be converted to the kind the operation declares
    #[error("Argument {index} of {function} must be {expected}")]
    ArgumentTypeError {
        function: String,
        index: usize,
        expected: String,
    },

    /// A constructed transform was applied with the wrong number of inputs
    #[error("Transform {function} expects {expected} input but {actual} are given.")]
    InputCountMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// A native module could not be loaded
    #[error("Failed to load module '{module}': {reason}")]
    ModuleLoad { module: String, reason: String },

    /// A blob reference id did not resolve to a foreign byte region
    #[error("No blob found for reference id '{0}'")]
    ReferenceNotFound(String),

    /// The destination buffer for a blob copy could not be allocated
    #[error("Failed to allocate {size} bytes for blob copy")]
    AllocationFailure { size: usize },

    /// A dispatch table declared the same name twice
    #[error("Duplicate host object name: {0}")]
    DuplicateName(String),

    /// Errors raised by tensor kernels (shape mismatch, bad parameters)
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// Errors related to Rhai script compilation or execution
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        BridgeError::Script(err.to_string())
    }

    /// Create a type error for argument `index` of `function`
    pub fn argument_type(function: &str, index: usize, expected: impl Into<String>) -> Self {
        BridgeError::ArgumentTypeError {
            function: function.to_string(),
            index,
            expected: expected.into(),
        }
    }
}

impl From<BridgeError> for Box<rhai::EvalAltResult> {
    fn from(err: BridgeError) -> Self {
        rhai::EvalAltResult::ErrorRuntime(err.to_string().into(), rhai::Position::NONE).into()
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| BridgeError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| BridgeError::from_rhai_error(e).with_context(f()))
    }
}
