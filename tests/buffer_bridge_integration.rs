//! Integration tests for copying foreign regions into blobs

use proptest::prelude::*;
use std::sync::Arc;
use torchlive_rs::media::{BlobHandle, MediaHost, Unimplemented};
use torchlive_rs::{BridgeError, BufferBridge, Capability, HostRef, InMemoryRefStore};

fn bridge(store: &Arc<InMemoryRefStore>, max: usize) -> BufferBridge {
    BufferBridge::new(store.clone(), max)
}

#[test]
fn test_blob_is_independent_of_source() {
    let store = Arc::new(InMemoryRefStore::new());
    store.insert("frame", vec![1, 2, 3]);
    let blob = bridge(&store, 64).resolve("frame").unwrap();

    assert!(store.mutate("frame", |bytes| bytes.iter_mut().for_each(|b| *b = 0)));
    store.remove("frame");

    assert_eq!(blob.len(), 3);
    assert_eq!(blob.as_bytes(), &[1, 2, 3]);
}

#[test]
fn test_unknown_reference() {
    let store = Arc::new(InMemoryRefStore::new());
    let err = bridge(&store, 64).resolve("nonexistent").unwrap_err();
    assert!(matches!(err, BridgeError::ReferenceNotFound(ref id) if id == "nonexistent"));
    assert_eq!(
        err.to_string(),
        "No blob found for reference id 'nonexistent'"
    );
}

#[test]
fn test_cap_exceeded() {
    let store = Arc::new(InMemoryRefStore::new());
    store.insert("big", vec![0; 65]);
    let err = bridge(&store, 64).resolve("big").unwrap_err();
    assert!(matches!(err, BridgeError::AllocationFailure { size: 65 }));
}

#[test]
fn test_image_from_blob_is_unimplemented() {
    let store = Arc::new(InMemoryRefStore::new());
    store.insert("frame", vec![0; 12]);
    let bridge = bridge(&store, 64);
    let blob = bridge.resolve("frame").unwrap();
    match bridge.image_from_blob(&blob, 2, 2).unwrap() {
        Capability::Unimplemented(name) => assert_eq!(name, "imageFromBlob"),
        Capability::Ready(_) => panic!("image decoding should be unimplemented"),
    }
}

#[test]
fn test_media_namespace_to_blob_and_marker() {
    let store = Arc::new(InMemoryRefStore::new());
    store.insert("frame", vec![4, 5]);
    let media = HostRef::new(MediaHost::new(Arc::new(bridge(&store, 64))));

    let blob = media
        .call_method("toBlob", &[rhai::Dynamic::from("frame")])
        .unwrap();
    assert_eq!(blob.clone().cast::<BlobHandle>().blob().as_bytes(), &[4, 5]);

    let marker = media
        .call_method(
            "imageFromBlob",
            &[blob, rhai::Dynamic::from(1_i64), rhai::Dynamic::from(2_i64)],
        )
        .unwrap();
    assert_eq!(marker.cast::<Unimplemented>().capability, "imageFromBlob");
}

proptest! {
    #[test]
    fn test_copy_is_a_snapshot(
        bytes in prop::collection::vec(any::<u8>(), 1..256),
        flip in any::<u8>(),
    ) {
        let store = Arc::new(InMemoryRefStore::new());
        store.insert("r", bytes.clone());
        let blob = bridge(&store, 256).resolve("r").unwrap();
        store.mutate("r", |b| b[0] ^= flip | 1);

        prop_assert_eq!(blob.len(), bytes.len());
        prop_assert_eq!(blob.as_bytes(), bytes.as_slice());
    }
}
