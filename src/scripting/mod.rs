//! Rhai scripting surface for the bridge
//!
//! Scripts run with three namespaces in scope:
//!
//! - `transforms` - Vision transform factories (`centerCrop`, `resize`, `normalize`)
//! - `torch` - Tensor constructors (`ones`, `zeros`, `tensor`)
//! - `media` - Blob access (`toBlob`, `imageFromBlob`)
//!
//! When a script is run with an input tensor it is available as `input`.
//!
//! ## Host Objects
//!
//! Properties are read with dot syntax and unknown names evaluate to `()`.
//! Methods are called with dot syntax as well. Pipelines and other callable
//! values are called with `invoke(...)`:
//!
//! ```rhai
//! let resize = transforms.resize(256);
//! let a = resize.invoke(input);
//! let b = resize.forward(input);   // same as a
//! a.shape                          // [3, 256, 341]
//! ```
//!
//! `property_names()` lists the names an object exposes, properties first.
//!
//! ## Example Scripts
//!
//! ImageNet style preprocessing:
//! ```rhai
//! let x = transforms.resize(256).invoke(input);
//! let x = transforms.centerCrop(224).invoke(x);
//! transforms.normalize([0.485, 0.456, 0.406], [0.229, 0.224, 0.225]).invoke(x)
//! ```
//!
//! Copying a registered blob:
//! ```rhai
//! let blob = media.toBlob("camera-frame");
//! blob.size
//! ```

mod engine;

pub use engine::{ScriptEngine, HOST_METHODS, MAX_SCRIPT_ARGS};

use crate::error::{BridgeError, Result};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A compiled script that can be executed repeatedly
#[derive(Clone)]
pub struct CompiledScript {
    ast: AST,
    source: String,
    name: String,
}

impl CompiledScript {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

/// Cache for compiled scripts to avoid recompilation
#[derive(Default)]
pub struct ScriptCache {
    /// Map from script source to compiled script
    cache: HashMap<String, CompiledScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(
        &mut self,
        engine: &Engine,
        name: &str,
        source: &str,
    ) -> Result<CompiledScript> {
        if let Some(script) = self.cache.get(source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| BridgeError::Script(format!("Compilation error: {}", e)))?;

        let script = CompiledScript {
            ast,
            source: source.to_string(),
            name: name.to_string(),
        };

        self.cache.insert(source.to_string(), script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

pub fn create_shared_cache() -> SharedScriptCache {
    Arc::new(RwLock::new(ScriptCache::new()))
}

/// Built-in example scripts
pub mod builtins {
    /// Resize, crop and normalize `input` for ImageNet-trained models
    pub const IMAGENET_PREPROCESS: &str = r#"
let resize = transforms.resize(256);
let crop = transforms.centerCrop(224);
let normalize = transforms.normalize([0.485, 0.456, 0.406], [0.229, 0.224, 0.225]);
normalize.forward(crop.forward(resize.invoke(input)))
"#;

    /// Square center crop of `input` at half its smaller edge
    pub const HALF_CROP: &str = r#"
let shape = input.shape;
let h = shape[shape.len() - 2];
let w = shape[shape.len() - 1];
let edge = if h < w { h / 2 } else { w / 2 };
transforms.centerCrop(edge).invoke(input)
"#;

    /// Build a constant test image without an input
    pub const SYNTHETIC_IMAGE: &str = r#"
let image = torch.ones([3, 32, 48]);
transforms.resize([16, 24]).invoke(image)
"#;

    /// List of built-in scripts with names
    pub fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ImageNet Preprocess", IMAGENET_PREPROCESS),
            ("Half Crop", HALF_CROP),
            ("Synthetic Image", SYNTHETIC_IMAGE),
        ]
    }
}
