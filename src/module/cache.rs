//! Initialize-once cache of loaded native modules.
//!
//! Each module name maps to a [`OnceCell`]. The first caller for a name runs
//! the loader inside the cell; concurrent callers for the same name block on
//! the cell until that load finishes and then observe the same handle. When a
//! load fails the cell stays empty, so the error is reported to every waiting
//! caller that attempted it and the next call retries the load.
//!
//! A process-wide cache backed by [`BuiltinModuleLoader`] is available from
//! [`ModuleCache::global`]. It is created on first use and lives until the
//! process exits; loaded modules are never evicted.

use super::{BuiltinModuleLoader, ModuleHandle, ModuleInfo, ModuleLoader};
use crate::error::{Result, ResultExt};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static GLOBAL_CACHE: OnceLock<Arc<ModuleCache>> = OnceLock::new();

struct LoadedModule {
    handle: ModuleHandle,
    loaded_at: DateTime<Utc>,
}

/// Cache of modules keyed by logical name
pub struct ModuleCache {
    loader: Arc<dyn ModuleLoader>,
    entries: Mutex<HashMap<String, Arc<OnceCell<LoadedModule>>>>,
}

impl ModuleCache {
    /// Create a cache that loads modules through `loader`
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    pub fn with_loader(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache, created with the built-in loader on first use
    pub fn global() -> Arc<ModuleCache> {
        GLOBAL_CACHE
            .get_or_init(|| {
                tracing::debug!("Initializing global module cache");
                Arc::new(ModuleCache::new(BuiltinModuleLoader::new()))
            })
            .clone()
    }

    fn cell(&self, name: &str) -> Arc<OnceCell<LoadedModule>> {
        let mut entries = self.entries.lock();
        entries.entry(name.to_string()).or_default().clone()
    }

    /// Return the cached module for `name`, loading it on first request
    pub fn get_or_load(&self, name: &str) -> Result<ModuleHandle> {
        // Loading runs outside the map lock.
        let cell = self.cell(name);
        let loaded = cell.get_or_try_init(|| {
            tracing::debug!("Loading module '{}'", name);
            let handle = self.loader.load(name)?;
            tracing::info!("Loaded module '{}'", name);
            Ok::<_, crate::error::BridgeError>(LoadedModule {
                handle,
                loaded_at: Utc::now(),
            })
        });

        match loaded {
            Ok(module) => Ok(Arc::clone(&module.handle)),
            Err(e) => {
                tracing::warn!("Failed to load module '{}': {}", name, e);
                Err(e)
            }
        }
    }

    /// Load every module in `names`, stopping at the first failure
    pub fn preload<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            self.get_or_load(name)
                .with_context(|| format!("Failed to preload module '{}'", name))?;
        }
        Ok(())
    }

    /// Whether `name` has been loaded successfully
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .lock()
            .get(name)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Descriptions of every loaded module, sorted by name
    pub fn loaded_modules(&self) -> Vec<ModuleInfo> {
        let entries = self.entries.lock();
        let mut infos: Vec<ModuleInfo> = entries
            .iter()
            .filter_map(|(name, cell)| {
                cell.get().map(|module| ModuleInfo {
                    name: name.clone(),
                    input_count: module.handle.schema().input_count(),
                    parameter_count: module.handle.schema().parameter_count(),
                    loaded_at: module.loaded_at,
                })
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new(BuiltinModuleLoader::new())
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::module::builtin::{CENTER_CROP, RESIZE};
    use crate::module::MockModuleLoader;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn builtin(name: &str) -> ModuleHandle {
        BuiltinModuleLoader::new().load(name).unwrap()
    }

    #[test]
    fn test_second_request_hits_cache() {
        let mut loader = MockModuleLoader::new();
        loader
            .expect_load()
            .with(eq(RESIZE))
            .times(1)
            .returning(|name| Ok(builtin(name)));

        let cache = ModuleCache::new(loader);
        let first = cache.get_or_load(RESIZE).unwrap();
        let second = cache.get_or_load(RESIZE).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_loaded(RESIZE));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let mut loader = MockModuleLoader::new();
        let mut seq = mockall::Sequence::new();
        loader
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| {
                Err(BridgeError::ModuleLoad {
                    module: name.to_string(),
                    reason: "artifact missing".to_string(),
                })
            });
        loader
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| Ok(builtin(name)));

        let cache = ModuleCache::new(loader);
        let err = cache.get_or_load(CENTER_CROP).err().unwrap();
        assert!(matches!(err, BridgeError::ModuleLoad { .. }));
        assert!(!cache.is_loaded(CENTER_CROP));

        assert!(cache.get_or_load(CENTER_CROP).is_ok());
        assert!(cache.is_loaded(CENTER_CROP));
    }

    struct SlowCountingLoader {
        loads: AtomicUsize,
    }

    impl ModuleLoader for SlowCountingLoader {
        fn load(&self, name: &str) -> Result<ModuleHandle> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            BuiltinModuleLoader::new().load(name)
        }
    }

    #[test]
    fn test_concurrent_first_requests_load_once() {
        let loader = Arc::new(SlowCountingLoader {
            loads: AtomicUsize::new(0),
        });
        let cache = Arc::new(ModuleCache::with_loader(loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_load(RESIZE).unwrap())
            })
            .collect();
        let modules: Vec<ModuleHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        for module in &modules[1..] {
            assert!(Arc::ptr_eq(&modules[0], module));
        }
    }

    #[test]
    fn test_preload_and_listing() {
        let cache = ModuleCache::default();
        cache.preload(&[RESIZE, CENTER_CROP]).unwrap();

        let infos = cache.loaded_modules();
        let names: Vec<_> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![CENTER_CROP, RESIZE]);
        assert_eq!(infos[0].parameter_count, 1);

        let err = cache.preload(&["missing"]).unwrap_err();
        assert!(err.to_string().contains("Failed to preload module 'missing'"));
    }

    #[test]
    fn test_module_info_serializes() {
        let cache = ModuleCache::default();
        cache.get_or_load(RESIZE).unwrap();
        let json = serde_json::to_string(&cache.loaded_modules()).unwrap();
        let back: Vec<ModuleInfo> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cache.loaded_modules());
    }
}
