//! # torchlive-rs: native tensors and transforms for Rhai scripts
//!
//! A bridge that exposes native compute objects to an embedded Rhai runtime.
//! Scripts look up operations by name on host objects, construct transform
//! pipelines once and apply them many times, and copy foreign byte buffers
//! into blobs they own.
//!
//! ## Architecture
//!
//! - **Host objects** ([`host`]): name-based dispatch tables for properties and methods
//! - **Modules** ([`module`]): native operations, loaded once per name and cached
//! - **Binding** ([`binding`]): script arguments coerced to native parameters
//! - **Transforms** ([`transforms`]): two-stage factory/exec pipeline objects
//! - **Media** ([`media`]): foreign byte regions copied into owned blobs
//! - **Scripting** ([`scripting`]): the Rhai engine with everything installed
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `dev.torchlive.bridge`; see [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use torchlive_rs::{scripting::ScriptEngine, tensor::{Tensor, TensorHandle}};
//!
//! let engine = ScriptEngine::new();
//! let input = TensorHandle::new(Tensor::ones(vec![3, 480, 640])?);
//! let output = engine.run_with_input(
//!     "transforms.centerCrop(224).invoke(transforms.resize(256).invoke(input))",
//!     input,
//! )?;
//! println!("{}", output.cast::<TensorHandle>());
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod host;
pub mod media;
pub mod module;
pub mod scripting;
pub mod tensor;
pub mod torch;
pub mod transforms;

// Re-export commonly used types
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use host::{HostFunction, HostObject, HostRef, HostValue};
pub use media::{Blob, BufferBridge, Capability, InMemoryRefStore};
pub use module::ModuleCache;
pub use scripting::ScriptEngine;
pub use tensor::{Tensor, TensorHandle};
