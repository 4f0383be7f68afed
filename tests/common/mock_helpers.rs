//! Loader and store helpers shared by integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use torchlive_rs::module::{BuiltinModuleLoader, ModuleHandle, ModuleLoader};
use torchlive_rs::{ModuleCache, Result};

/// Delegates to the built-in loader and counts every load
#[derive(Default)]
pub struct CountingLoader {
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModuleLoader for CountingLoader {
    fn load(&self, name: &str) -> Result<ModuleHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        BuiltinModuleLoader::new().load(name)
    }
}

/// A fresh module cache together with the loader it counts loads through
pub fn counting_cache() -> (Arc<CountingLoader>, Arc<ModuleCache>) {
    let loader = Arc::new(CountingLoader::default());
    let cache = Arc::new(ModuleCache::with_loader(loader.clone()));
    (loader, cache)
}
