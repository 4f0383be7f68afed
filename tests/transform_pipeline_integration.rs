//! Integration tests for transform factories and constructed pipelines

mod common;

use common::assert_all_close;
use common::builders::TensorBuilder;
use common::mock_helpers::counting_cache;
use rhai::{Array, Dynamic};
use std::sync::Arc;
use torchlive_rs::transforms::{TransformsHost, METHODS};
use torchlive_rs::{BridgeError, HostRef, ModuleCache, TensorHandle};

fn transforms() -> HostRef {
    HostRef::new(TransformsHost::new(Arc::new(ModuleCache::default())))
}

fn numbers(values: &[f64]) -> Dynamic {
    Dynamic::from(values.iter().map(|&v| Dynamic::from(v)).collect::<Array>())
}

fn apply(pipeline: &HostRef, input: TensorHandle) -> TensorHandle {
    pipeline
        .invoke(&[Dynamic::from(input)])
        .unwrap()
        .cast::<TensorHandle>()
}

#[test]
fn test_every_enumerated_name_is_callable() {
    let host = transforms();
    let names = host.property_names();
    assert_eq!(names, METHODS.to_vec());
    for name in &names {
        assert!(host.get(name).as_function().is_some(), "{} is not callable", name);
    }
    assert!(host.get("rotate").is_undefined());
}

#[test]
fn test_center_crop_count_errors() {
    let host = transforms();
    let err = host.call_method("centerCrop", &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Factory function centerCrop expects 1 argument but 0 are given."
    );
    let err = host
        .call_method("centerCrop", &[Dynamic::from(1_i64), Dynamic::from(1_i64)])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Factory function centerCrop expects 1 argument but 2 are given."
    );
}

#[test]
fn test_default_call_matches_forward() {
    let host = transforms();
    let pipeline = host
        .call_method("normalize", &[numbers(&[0.1, 0.2, 0.3]), numbers(&[0.5, 0.5, 0.5])])
        .unwrap()
        .cast::<HostRef>();
    let input = TensorBuilder::image(3, 4, 4).ramp().handle();

    let via_call = apply(&pipeline, input.clone());
    let via_forward = pipeline
        .call_method("forward", &[Dynamic::from(input)])
        .unwrap()
        .cast::<TensorHandle>();

    let a: Vec<u32> = via_call.tensor().data().iter().map(|v| v.to_bits()).collect();
    let b: Vec<u32> = via_forward.tensor().data().iter().map(|v| v.to_bits()).collect();
    assert_eq!(a, b);
}

#[test]
fn test_module_loaded_once_across_pipelines() {
    let (loader, cache) = counting_cache();
    let host = HostRef::new(TransformsHost::new(cache.clone()));

    let first = host.call_method("resize", &[Dynamic::from(8_i64)]).unwrap().cast::<HostRef>();
    let second = host.call_method("resize", &[Dynamic::from(4_i64)]).unwrap().cast::<HostRef>();
    for _ in 0..3 {
        apply(&first, TensorBuilder::image(1, 16, 16).handle());
        apply(&second, TensorBuilder::image(1, 16, 16).handle());
    }

    assert_eq!(loader.loads(), 1);
    let a = cache.get_or_load("resize").unwrap();
    let b = cache.get_or_load("resize").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(loader.loads(), 1);
}

#[test]
fn test_bound_size_reused_for_each_input() {
    let host = transforms();
    let resize = host
        .call_method("resize", &[Dynamic::from(10_i64)])
        .unwrap()
        .cast::<HostRef>();

    let landscape = apply(&resize, TensorBuilder::image(3, 20, 40).constant(1.0).handle());
    let portrait = apply(&resize, TensorBuilder::image(3, 50, 25).constant(1.0).handle());
    assert_eq!(landscape.tensor().shape(), &[3, 10, 20]);
    assert_eq!(portrait.tensor().shape(), &[3, 20, 10]);
}

#[test]
fn test_preprocess_chain() {
    let host = transforms();
    let resize = host.call_method("resize", &[Dynamic::from(8_i64)]).unwrap().cast::<HostRef>();
    let crop = host.call_method("centerCrop", &[Dynamic::from(6_i64)]).unwrap().cast::<HostRef>();
    let normalize = host
        .call_method("normalize", &[numbers(&[0.5]), numbers(&[0.5])])
        .unwrap()
        .cast::<HostRef>();

    let input = TensorBuilder::image(2, 16, 24).constant(1.0).handle();
    let out = apply(&normalize, apply(&crop, apply(&resize, input)));
    assert_eq!(out.tensor().shape(), &[2, 6, 6]);
    assert_all_close(out.tensor().data(), &[1.0; 72], 1e-6);
}

#[test]
fn test_invalid_construction_builds_nothing() {
    let (loader, cache) = counting_cache();
    let host = HostRef::new(TransformsHost::new(cache));
    let err = host
        .call_method("resize", &[Dynamic::from("large")])
        .unwrap_err();
    assert!(matches!(err, BridgeError::ArgumentTypeError { index: 0, .. }));
    // The module is still resolved before arguments are bound
    assert_eq!(loader.loads(), 1);
}

#[test]
fn test_forward_rejects_wrong_input_count() {
    let host = transforms();
    let crop = host.call_method("centerCrop", &[Dynamic::from(2_i64)]).unwrap().cast::<HostRef>();
    let err = crop.invoke(&[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Transform centerCrop expects 1 input but 0 are given."
    );
}
