//! Rhai Script Engine Implementation
//!
//! Host objects are registered as Rhai custom types. Each type gets:
//! - a string indexer, which Rhai also uses for `obj.name` property access
//! - `property_names()`
//! - a method shim for every name in [`HOST_METHODS`], at every arity up to
//!   [`MAX_SCRIPT_ARGS`]
//!
//! Host objects and host functions additionally get `invoke(...)`, the
//! default-call form.

use crate::config::{EngineSettings, MediaSettings};
use crate::error::{BridgeError, Result};
use crate::host::{call_named, HostFunction, HostObject, HostRef};
use crate::media::{BlobHandle, BufferBridge, InMemoryRefStore, MediaHost, Unimplemented};
use crate::module::ModuleCache;
use crate::scripting::{create_shared_cache, CompiledScript, SharedScriptCache};
use crate::tensor::TensorHandle;
use crate::torch::TorchHost;
use crate::transforms::TransformsHost;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Scope};
use std::sync::Arc;

type RhaiResult = std::result::Result<Dynamic, Box<EvalAltResult>>;

/// Rhai names of the registered host types
const HOST_TYPE_NAMES: &[&str] = &["HostObject", "Tensor", "Blob", "HostFunction"];

/// Every method name exposed by a host object
pub const HOST_METHODS: &[&str] = &[
    // transforms
    "centerCrop",
    "resize",
    "normalize",
    // pipeline
    "forward",
    // torch
    "ones",
    "tensor",
    "zeros",
    // media
    "imageFromBlob",
    "toBlob",
    // tensor
    "data",
    "size",
    // blob
    "bytes",
];

/// Most arguments a script can pass to a host method or `invoke`. Rhai
/// accepts at most 20 parameters per registered function, one of which is
/// the receiver.
pub const MAX_SCRIPT_ARGS: usize = 19;

/// Register `name` for receivers of type `$ty` at every arity from 0 to
/// [`MAX_SCRIPT_ARGS`], forwarding the arguments as a slice to `$call`.
macro_rules! register_arities {
    ($engine:expr, $name:expr, $ty:ty, $call:expr) => {{
        let call = $call;
        register_arities!(@each $engine, $name, $ty, call;
            a0 a1 a2 a3 a4 a5 a6 a7 a8 a9 a10 a11 a12 a13 a14 a15 a16 a17 a18);
    }};
    (@each $engine:expr, $name:expr, $ty:ty, $call:ident; $($arg:ident)*) => {{
        let f = $call.clone();
        $engine.register_fn($name, move |obj: &mut $ty, $($arg: Dynamic),*| {
            f(obj, &[$($arg),*])
        });
        register_arities!(@next $engine, $name, $ty, $call; $($arg)*);
    }};
    (@next $engine:expr, $name:expr, $ty:ty, $call:ident; $head:ident $($rest:ident)*) => {
        register_arities!(@each $engine, $name, $ty, $call; $($rest)*);
    };
    (@next $engine:expr, $name:expr, $ty:ty, $call:ident;) => {};
}

/// Register a host object type: indexer, names and method shims
fn register_host_type<T>(engine: &mut Engine, type_name: &str)
where
    T: HostObject + Clone + 'static,
{
    engine.register_type_with_name::<T>(type_name);
    engine.register_indexer_get(|obj: &mut T, name: ImmutableString| -> Dynamic {
        obj.get(&name).into_dynamic()
    });
    engine.register_fn("property_names", |obj: &mut T| -> Array {
        obj.property_names().into_iter().map(Dynamic::from).collect()
    });

    for &name in HOST_METHODS {
        register_arities!(
            engine,
            name,
            T,
            move |obj: &mut T, args: &[Dynamic]| -> RhaiResult {
                Ok(call_named(&*obj, name, args)?)
            }
        );
    }
}

/// Script engine with the bridge namespaces installed
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Cache of compiled scripts
    cache: SharedScriptCache,
    transforms: HostRef,
    torch: HostRef,
    media: HostRef,
}

impl ScriptEngine {
    /// Engine with default limits, the global module cache and an empty
    /// reference store
    pub fn new() -> Self {
        let bridge = BufferBridge::new(
            Arc::new(InMemoryRefStore::new()),
            MediaSettings::default().max_blob_bytes,
        );
        Self::with_components(
            &EngineSettings::default(),
            ModuleCache::global(),
            Arc::new(bridge),
        )
    }

    /// Engine using the given limits, module cache and buffer bridge
    pub fn with_components(
        settings: &EngineSettings,
        modules: Arc<ModuleCache>,
        bridge: Arc<BufferBridge>,
    ) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, settings);

        Self {
            engine,
            cache: create_shared_cache(),
            transforms: HostRef::new(TransformsHost::new(modules)),
            torch: HostRef::new(TorchHost::new()),
            media: HostRef::new(MediaHost::new(bridge)),
        }
    }

    /// Configure the Rhai engine with host types and safety limits
    fn configure_engine(engine: &mut Engine, settings: &EngineSettings) {
        engine.set_max_expr_depths(settings.max_expr_depth, settings.max_expr_depth);
        engine.set_max_call_levels(settings.max_call_levels);
        engine.set_max_operations(settings.max_operations);
        engine.set_max_string_size(settings.max_string_size);
        engine.set_max_array_size(settings.max_array_size);
        engine.set_max_map_size(settings.max_map_size);

        engine.on_print(|text| tracing::info!(target: "torchlive_rs::script", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "torchlive_rs::script",
                "{} @ {:?} {}",
                text,
                source,
                pos
            )
        });

        register_host_type::<HostRef>(engine, "HostObject");
        register_host_type::<TensorHandle>(engine, "Tensor");
        register_host_type::<BlobHandle>(engine, "Blob");

        register_arities!(
            engine,
            "invoke",
            HostRef,
            |obj: &mut HostRef, args: &[Dynamic]| -> RhaiResult { Ok(obj.invoke(args)?) }
        );

        engine.register_type_with_name::<HostFunction>("HostFunction");
        register_arities!(
            engine,
            "invoke",
            HostFunction,
            |f: &mut HostFunction, args: &[Dynamic]| -> RhaiResult { Ok(f.call(args)?) }
        );
        engine.register_fn("to_string", |f: &mut HostFunction| {
            format!("HostFunction({})", f.name())
        });

        engine.register_fn("to_string", |t: &mut TensorHandle| t.to_string());
        engine.register_fn("to_debug", |t: &mut TensorHandle| t.to_string());
        engine.register_fn("to_string", |b: &mut BlobHandle| format!("{:?}", b));

        engine.register_type_with_name::<Unimplemented>("Unimplemented");
        engine.register_fn("to_string", |u: &mut Unimplemented| u.to_string());
        engine.register_get("capability", |u: &mut Unimplemented| u.capability.clone());
    }

    fn scope(&self, input: Option<TensorHandle>) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push("transforms", self.transforms.clone());
        scope.push("torch", self.torch.clone());
        scope.push("media", self.media.clone());
        if let Some(input) = input {
            scope.push("input", input);
        }
        scope
    }

    /// Compile a script and cache it
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledScript> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| BridgeError::Script(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, name, source)
    }

    /// Execute a compiled script, optionally with an `input` tensor
    pub fn execute(&self, script: &CompiledScript, input: Option<TensorHandle>) -> Result<Dynamic> {
        let mut scope = self.scope(input);
        tracing::debug!("Running script '{}'", script.name());
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, script.ast())
            .map_err(|e| {
                self.arity_error(&e)
                    .unwrap_or_else(|| BridgeError::Script(format!("Execution error: {}", e)))
            })
    }

    /// Translate a missing host method shim (more than [`MAX_SCRIPT_ARGS`]
    /// arguments) into the error the host call itself reports for that count.
    fn arity_error(&self, err: &EvalAltResult) -> Option<BridgeError> {
        let signature = match err {
            EvalAltResult::ErrorFunctionNotFound(signature, _) => signature,
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => return self.arity_error(inner),
            _ => return None,
        };
        let (name, types) = signature.split_once(" (")?;
        let types: Vec<&str> = types.trim_end_matches(')').split(", ").collect();
        let receiver = *types.first()?;
        if !(HOST_METHODS.contains(&name) || name == "invoke")
            || !HOST_TYPE_NAMES.contains(&receiver)
        {
            return None;
        }

        let count = types.len() - 1;
        let placeholders = vec![Dynamic::UNIT; count];
        if receiver == "HostObject" {
            for namespace in [&self.transforms, &self.torch, &self.media] {
                if namespace.dispatch_table().is_method(name) {
                    return namespace.call_method(name, &placeholders).err();
                }
            }
        }
        Some(BridgeError::Script(format!(
            "{}.{} was called with {} arguments; host calls take at most {}",
            receiver, name, count, MAX_SCRIPT_ARGS
        )))
    }

    /// Compile and run `source`
    pub fn run(&self, source: &str) -> Result<Dynamic> {
        let script = self.compile("inline", source)?;
        self.execute(&script, None)
    }

    /// Compile and run `source` with `input` in scope
    pub fn run_with_input(&self, source: &str, input: TensorHandle) -> Result<Dynamic> {
        let script = self.compile("inline", source)?;
        self.execute(&script, Some(input))
    }

    /// Validate a script without executing it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| BridgeError::Script(format!("Validation error: {}", e)))
    }

    pub fn transforms(&self) -> &HostRef {
        &self.transforms
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cache.read().map(|c| c.len()).ok())
            .finish()
    }
}
