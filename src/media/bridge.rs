//! Copying foreign byte regions into natively owned blobs.
//!
//! A foreign region belongs to the other side of the boundary and is only
//! valid while the store lends it out. [`BufferBridge::resolve`] copies the
//! whole region into a freshly allocated [`Blob`] before the loan ends, so
//! later changes to the source are never visible through the blob.

use crate::error::{BridgeError, Result};
use std::fmt;
use std::sync::Arc;

/// Borrowed view of a foreign byte region
#[derive(Debug, Clone, Copy)]
pub struct ForeignRegion<'a> {
    bytes: &'a [u8],
}

impl<'a> ForeignRegion<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Lookup of foreign regions by opaque reference id
pub trait ForeignRefStore: Send + Sync {
    /// Lend the region for `ref_id` to `visit`. Returns false when the id
    /// does not resolve; `visit` is not called in that case.
    fn with_region(&self, ref_id: &str, visit: &mut dyn FnMut(ForeignRegion<'_>)) -> bool;
}

/// Natively owned copy of a foreign region
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    data: Box<[u8]>,
}

impl Blob {
    /// Copy `region` into a buffer of exactly its length, failing when the
    /// allocation is refused or exceeds `max_bytes`.
    fn copy_from(region: ForeignRegion<'_>, max_bytes: usize) -> Result<Self> {
        let size = region.len();
        if size > max_bytes {
            return Err(BridgeError::AllocationFailure { size });
        }
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| BridgeError::AllocationFailure { size })?;
        data.extend_from_slice(region.as_bytes());
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("size", &self.len()).finish()
    }
}

/// Outcome of an operation that may not be available on this build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T> {
    Ready(T),
    /// The named capability is declared but not implemented
    Unimplemented(&'static str),
}

/// Decoded image backed by a blob
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub width: u32,
    pub height: u32,
    pub pixels: Blob,
}

/// Copies foreign regions into blobs
pub struct BufferBridge {
    store: Arc<dyn ForeignRefStore>,
    max_blob_bytes: usize,
}

impl BufferBridge {
    pub fn new(store: Arc<dyn ForeignRefStore>, max_blob_bytes: usize) -> Self {
        Self {
            store,
            max_blob_bytes,
        }
    }

    pub fn max_blob_bytes(&self) -> usize {
        self.max_blob_bytes
    }

    /// Copy the region named by `ref_id` into a new blob
    pub fn resolve(&self, ref_id: &str) -> Result<Blob> {
        let mut copied = None;
        let found = self.store.with_region(ref_id, &mut |region| {
            copied = Some(Blob::copy_from(region, self.max_blob_bytes));
        });

        match copied {
            Some(blob) if found => {
                let blob = blob?;
                tracing::debug!("Copied {} bytes for reference '{}'", blob.len(), ref_id);
                Ok(blob)
            }
            _ => {
                tracing::debug!("Reference '{}' did not resolve", ref_id);
                Err(BridgeError::ReferenceNotFound(ref_id.to_string()))
            }
        }
    }

    /// Decode an image from `blob`. Image decoding is not available, so this
    /// always reports the capability as unimplemented.
    pub fn image_from_blob(
        &self,
        blob: &Blob,
        width: u32,
        height: u32,
    ) -> Result<Capability<ImageHandle>> {
        tracing::debug!(
            "imageFromBlob requested for {} bytes at {}x{}",
            blob.len(),
            width,
            height
        );
        Ok(Capability::Unimplemented("imageFromBlob"))
    }
}

impl fmt::Debug for BufferBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferBridge")
            .field("max_blob_bytes", &self.max_blob_bytes)
            .finish()
    }
}
