//! The `media` namespace and the buffer bridge behind it.
//!
//! `media.toBlob(refId)` copies the foreign region registered under `refId`
//! into a blob owned by the script. `media.imageFromBlob(blob, w, h)` is
//! declared but returns an [`Unimplemented`] marker.

mod bridge;
mod ref_store;

pub use bridge::{
    Blob, BufferBridge, Capability, ForeignRefStore, ForeignRegion, ImageHandle,
};
pub use ref_store::InMemoryRefStore;

use crate::error::{BridgeError, Result};
use crate::host::{DispatchTable, HostCallable, HostFunction, HostObject, HostValue};
use once_cell::sync::Lazy;
use rhai::Dynamic;
use std::fmt;
use std::sync::Arc;

const IMAGE_FROM_BLOB: &str = "imageFromBlob";
const TO_BLOB: &str = "toBlob";
const SIZE: &str = "size";
const BYTES: &str = "bytes";

static MEDIA_TABLE: Lazy<DispatchTable> = Lazy::new(|| {
    DispatchTable::new(&[], &[IMAGE_FROM_BLOB, TO_BLOB]).expect("media names are unique")
});

static BLOB_TABLE: Lazy<DispatchTable> =
    Lazy::new(|| DispatchTable::new(&[SIZE], &[BYTES]).expect("blob names are unique"));

/// Value returned to scripts for declared but unimplemented operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unimplemented {
    pub capability: String,
}

impl fmt::Display for Unimplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unimplemented({})", self.capability)
    }
}

/// Script-facing handle around a copied blob
#[derive(Clone)]
pub struct BlobHandle {
    blob: Arc<Blob>,
}

impl BlobHandle {
    pub fn new(blob: Blob) -> Self {
        Self {
            blob: Arc::new(blob),
        }
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobHandle(size={})", self.blob.len())
    }
}

impl HostObject for BlobHandle {
    fn type_name(&self) -> &'static str {
        "Blob"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &BLOB_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        match name {
            SIZE => HostValue::Data(Dynamic::from(self.blob.len() as rhai::INT)),
            BYTES => HostValue::Function(HostFunction::new(BlobBytes(self.clone()))),
            _ => HostValue::Undefined,
        }
    }
}

struct BlobBytes(BlobHandle);

impl HostCallable for BlobBytes {
    fn name(&self) -> &str {
        BYTES
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        expect_args(BYTES, args, 0)?;
        Ok(Dynamic::from_blob(self.0.blob().as_bytes().to_vec()))
    }
}

fn expect_args(function: &str, args: &[Dynamic], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(BridgeError::ArgumentCountMismatch {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

struct ToBlob(Arc<BufferBridge>);

impl HostCallable for ToBlob {
    fn name(&self) -> &str {
        TO_BLOB
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        expect_args(TO_BLOB, args, 1)?;
        let ref_id = args[0]
            .clone()
            .into_string()
            .map_err(|_| BridgeError::argument_type(TO_BLOB, 0, "a reference id string"))?;
        let blob = self.0.resolve(&ref_id)?;
        Ok(Dynamic::from(BlobHandle::new(blob)))
    }
}

struct ImageFromBlob(Arc<BufferBridge>);

impl HostCallable for ImageFromBlob {
    fn name(&self) -> &str {
        IMAGE_FROM_BLOB
    }

    fn call(&self, args: &[Dynamic]) -> Result<Dynamic> {
        expect_args(IMAGE_FROM_BLOB, args, 3)?;
        let blob = args[0]
            .clone()
            .try_cast::<BlobHandle>()
            .ok_or_else(|| BridgeError::argument_type(IMAGE_FROM_BLOB, 0, "a blob"))?;
        let dimension = |index: usize| {
            args[index]
                .as_int()
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    BridgeError::argument_type(IMAGE_FROM_BLOB, index, "a non-negative integer")
                })
        };
        let (width, height) = (dimension(1)?, dimension(2)?);

        image_to_script(self.0.image_from_blob(blob.blob(), width, height)?)
    }
}

/// Script value for an `imageFromBlob` result. Decoded images have no
/// script type, so a ready image is an error rather than a stand-in value.
fn image_to_script(result: Capability<ImageHandle>) -> Result<Dynamic> {
    match result {
        Capability::Ready(_) => Err(BridgeError::Script(
            "image values are not exposed to scripts".to_string(),
        )),
        Capability::Unimplemented(capability) => Ok(Dynamic::from(Unimplemented {
            capability: capability.to_string(),
        })),
    }
}

/// Media namespace host object
pub struct MediaHost {
    image_from_blob: HostFunction,
    to_blob: HostFunction,
}

impl MediaHost {
    pub fn new(bridge: Arc<BufferBridge>) -> Self {
        Self {
            image_from_blob: HostFunction::new(ImageFromBlob(Arc::clone(&bridge))),
            to_blob: HostFunction::new(ToBlob(bridge)),
        }
    }
}

impl HostObject for MediaHost {
    fn type_name(&self) -> &'static str {
        "Media"
    }

    fn dispatch_table(&self) -> &DispatchTable {
        &MEDIA_TABLE
    }

    fn get(&self, name: &str) -> HostValue {
        match name {
            IMAGE_FROM_BLOB => HostValue::Function(self.image_from_blob.clone()),
            TO_BLOB => HostValue::Function(self.to_blob.clone()),
            _ => HostValue::Undefined,
        }
    }
}
