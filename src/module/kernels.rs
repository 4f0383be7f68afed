//! Reference implementations of the vision transform kernels.
//!
//! All kernels treat the last two dimensions of a tensor as (height, width)
//! and apply the same operation to every leading plane.

use crate::error::{BridgeError, Result};
use crate::tensor::{alloc_elements, element_count, Tensor};

/// Crop the centre `out_h` x `out_w` region, zero padding where the crop
/// extends past the image.
pub fn center_crop(input: &Tensor, out_h: usize, out_w: usize) -> Result<Tensor> {
    let (planes, height, width) = input.spatial_dims()?;
    let top = crop_offset(height, out_h);
    let left = crop_offset(width, out_w);

    let total = element_count(&[planes, out_h, out_w])?;
    let mut out = alloc_elements(total)?;
    out.resize(total, 0.0);
    if total == 0 {
        return input.with_spatial(out_h, out_w, out);
    }

    let src = input.data();
    for p in 0..planes {
        let plane = &src[p * height * width..(p + 1) * height * width];
        let dst = &mut out[p * out_h * out_w..(p + 1) * out_h * out_w];
        for y in 0..out_h {
            let sy = y as i64 + top;
            if sy < 0 || sy >= height as i64 {
                continue;
            }
            for x in 0..out_w {
                let sx = x as i64 + left;
                if sx < 0 || sx >= width as i64 {
                    continue;
                }
                dst[y * out_w + x] = plane[sy as usize * width + sx as usize];
            }
        }
    }
    input.with_spatial(out_h, out_w, out)
}

/// Offset of the crop window into the source along one axis. Negative when
/// the crop is larger than the source and the source is padded.
fn crop_offset(size: usize, crop: usize) -> i64 {
    if crop > size {
        -(((crop - size) / 2) as i64)
    } else {
        ((size - crop) as f64 / 2.0).round_ties_even() as i64
    }
}

/// Output (height, width) for a resize request.
///
/// A single size matches the smaller edge and keeps the aspect ratio; two
/// sizes are used as-is.
pub fn resize_target(height: usize, width: usize, size: &[i64]) -> Result<(usize, usize)> {
    let edge = |v: i64| {
        usize::try_from(v)
            .map_err(|_| BridgeError::Tensor(format!("resize size must be non-negative, got {}", v)))
    };
    let scaled = |s: usize, long: usize, short: usize| {
        s.checked_mul(long)
            .map(|v| (v / short.max(1)).max(1))
            .ok_or_else(|| {
                BridgeError::Tensor(format!(
                    "resize to {} from {}x{} overflows the output size",
                    s, height, width
                ))
            })
    };
    match *size {
        [s] => {
            let s = edge(s)?;
            if height <= width {
                Ok((s, scaled(s, width, height)?))
            } else {
                Ok((scaled(s, height, width)?, s))
            }
        }
        [h, w] => Ok((edge(h)?, edge(w)?)),
        _ => Err(BridgeError::Tensor(format!(
            "resize size must have 1 or 2 elements, got {}",
            size.len()
        ))),
    }
}

/// Bilinear resize with half-pixel centres
pub fn resize_bilinear(input: &Tensor, out_h: usize, out_w: usize) -> Result<Tensor> {
    let (planes, height, width) = input.spatial_dims()?;
    if height == 0 || width == 0 {
        return Err(BridgeError::Tensor("cannot resize an empty image".to_string()));
    }

    let total = element_count(&[planes, out_h, out_w])?;
    let mut out = alloc_elements(total)?;
    if total == 0 {
        return input.with_spatial(out_h, out_w, out);
    }

    let ys = axis_weights(height, out_h);
    let xs = axis_weights(width, out_w);
    let src = input.data();
    for p in 0..planes {
        let plane = &src[p * height * width..(p + 1) * height * width];
        for &(y0, y1, wy) in &ys {
            for &(x0, x1, wx) in &xs {
                let top = plane[y0 * width + x0] * (1.0 - wx) + plane[y0 * width + x1] * wx;
                let bottom = plane[y1 * width + x0] * (1.0 - wx) + plane[y1 * width + x1] * wx;
                out.push(top * (1.0 - wy) + bottom * wy);
            }
        }
    }
    input.with_spatial(out_h, out_w, out)
}

/// Source indices and interpolation weight for every output position
fn axis_weights(in_size: usize, out_size: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_size as f32 / out_size as f32;
    (0..out_size)
        .map(|i| {
            let src = ((i as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(in_size - 1);
            let i1 = (i0 + 1).min(in_size - 1);
            (i0, i1, src - i0 as f32)
        })
        .collect()
}

/// Per-channel `(x - mean) / std` over dimension -3.
///
/// `mean` and `std` have one entry per channel, or a single entry applied
/// to all channels.
pub fn normalize(input: &Tensor, mean: &[f64], std: &[f64]) -> Result<Tensor> {
    if input.rank() < 3 {
        return Err(BridgeError::Tensor(format!(
            "normalize expects a tensor of shape (..., C, H, W), got {:?}",
            input.shape()
        )));
    }
    let channels = input.shape()[input.rank() - 3];
    for (label, values) in [("mean", mean), ("std", std)] {
        if values.len() != channels && values.len() != 1 {
            return Err(BridgeError::Tensor(format!(
                "{} has {} values but the tensor has {} channels",
                label,
                values.len(),
                channels
            )));
        }
    }
    if std.iter().any(|&s| s == 0.0) {
        return Err(BridgeError::Tensor(
            "std evaluated to zero, leading to division by zero".to_string(),
        ));
    }

    let (_, height, width) = input.spatial_dims()?;
    let plane = element_count(&[height, width])?;
    let pick = |values: &[f64], c: usize| values[if values.len() == 1 { 0 } else { c }];
    let data = input
        .data()
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = (i / plane.max(1)) % channels.max(1);
            ((v as f64 - pick(mean, c)) / pick(std, c)) as f32
        })
        .collect();
    Tensor::new(input.shape().to_vec(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: Vec<usize>) -> Tensor {
        let n = shape.iter().product::<usize>();
        Tensor::new(shape, (0..n).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn test_center_crop_odd() {
        // 1x4x4 ramp, crop 2x2 from the middle
        let out = center_crop(&ramp(vec![1, 4, 4]), 2, 2).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2]);
        assert_eq!(out.data(), &[5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_center_crop_pads() {
        let out = center_crop(&Tensor::ones(vec![2, 2]).unwrap(), 4, 4).unwrap();
        assert_eq!(out.shape(), &[4, 4]);
        let ones = out.data().iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, 4);
        assert_eq!(out.data()[5], 1.0);
        assert_eq!(out.data()[0], 0.0);
    }

    #[test]
    fn test_resize_target_smaller_edge() {
        assert_eq!(resize_target(300, 400, &[256]).unwrap(), (256, 341));
        assert_eq!(resize_target(400, 300, &[256]).unwrap(), (341, 256));
        assert_eq!(resize_target(10, 10, &[3, 7]).unwrap(), (3, 7));
    }

    #[test]
    fn test_resize_target_overflow() {
        let err = resize_target(2, 4, &[i64::MAX]).unwrap_err();
        assert!(err.to_string().contains("overflows"));
        assert!(resize_target(2, 4, &[-3]).is_err());
    }

    #[test]
    fn test_oversized_outputs_are_errors() {
        let input = Tensor::ones(vec![1, 2, 2]).unwrap();
        let huge = 1usize << 32;
        assert!(center_crop(&input, huge, huge).is_err());
        assert!(resize_bilinear(&input, huge, huge).is_err());
        let err = center_crop(&input, 1 << 31, 1 << 31).unwrap_err();
        assert!(matches!(err, BridgeError::AllocationFailure { .. }));
    }

    #[test]
    fn test_resize_constant_stays_constant() {
        let out = resize_bilinear(&Tensor::full(vec![3, 5, 7], 2.5).unwrap(), 11, 4).unwrap();
        assert_eq!(out.shape(), &[3, 11, 4]);
        assert!(out.data().iter().all(|&v| (v - 2.5).abs() < 1e-6));
    }

    #[test]
    fn test_resize_identity() {
        let input = ramp(vec![1, 3, 3]);
        let out = resize_bilinear(&input, 3, 3).unwrap();
        assert_eq!(out.data(), input.data());
    }

    #[test]
    fn test_normalize_per_channel() {
        let input = Tensor::new(vec![2, 1, 2], vec![1.0, 3.0, 10.0, 20.0]).unwrap();
        let out = normalize(&input, &[1.0, 10.0], &[2.0, 5.0]).unwrap();
        assert_eq!(out.data(), &[0.0, 1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_normalize_rejects_bad_params() {
        let input = Tensor::zeros(vec![3, 2, 2]).unwrap();
        assert!(normalize(&input, &[0.0, 0.0], &[1.0]).is_err());
        assert!(normalize(&input, &[0.0], &[0.0]).is_err());
        assert!(normalize(&Tensor::zeros(vec![2, 2]).unwrap(), &[0.0], &[1.0]).is_err());
    }
}
