//! Test data builders for creating test objects

use std::sync::Arc;
use torchlive_rs::{
    config::EngineSettings, BufferBridge, InMemoryRefStore, ModuleCache, ScriptEngine, Tensor,
    TensorHandle,
};

/// Builder for creating test tensors
pub struct TensorBuilder {
    shape: Vec<usize>,
    fill: Fill,
}

enum Fill {
    Constant(f32),
    Ramp,
}

impl TensorBuilder {
    pub fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            fill: Fill::Constant(0.0),
        }
    }

    /// Image-like `[channels, height, width]` tensor
    pub fn image(channels: usize, height: usize, width: usize) -> Self {
        Self::new(&[channels, height, width])
    }

    pub fn constant(mut self, value: f32) -> Self {
        self.fill = Fill::Constant(value);
        self
    }

    /// Element `i` holds `i as f32`
    pub fn ramp(mut self) -> Self {
        self.fill = Fill::Ramp;
        self
    }

    pub fn build(self) -> Tensor {
        match self.fill {
            Fill::Constant(v) => Tensor::full(self.shape, v).expect("constant tensor fits in memory"),
            Fill::Ramp => {
                let n = self.shape.iter().product::<usize>();
                Tensor::new(self.shape, (0..n).map(|i| i as f32).collect())
                    .expect("ramp data matches shape")
            }
        }
    }

    pub fn handle(self) -> TensorHandle {
        TensorHandle::new(self.build())
    }
}

/// Builder for a script engine with its own module cache and blob store
pub struct EngineBuilder {
    settings: EngineSettings,
    cache: Arc<ModuleCache>,
    store: Arc<InMemoryRefStore>,
    max_blob_bytes: usize,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
            cache: Arc::new(ModuleCache::default()),
            store: Arc::new(InMemoryRefStore::new()),
            max_blob_bytes: 1 << 20,
        }
    }

    pub fn cache(mut self, cache: Arc<ModuleCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn blob(self, id: &str, bytes: &[u8]) -> Self {
        self.store.insert(id, bytes.to_vec());
        self
    }

    pub fn max_blob_bytes(mut self, max: usize) -> Self {
        self.max_blob_bytes = max;
        self
    }

    pub fn store(&self) -> Arc<InMemoryRefStore> {
        Arc::clone(&self.store)
    }

    pub fn build(self) -> ScriptEngine {
        let bridge = BufferBridge::new(self.store, self.max_blob_bytes);
        ScriptEngine::with_components(&self.settings, self.cache, Arc::new(bridge))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_builder() {
        let t = TensorBuilder::image(1, 2, 2).ramp().build();
        assert_eq!(t.shape(), &[1, 2, 2]);
        assert_eq!(t.data(), &[0.0, 1.0, 2.0, 3.0]);

        let t = TensorBuilder::new(&[3]).constant(0.5).build();
        assert!(t.data().iter().all(|&v| v == 0.5));
    }
}
