// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arithmetic fusions: fold a layer's effect into its predecessor's
//! weights.
//!
//! The five affine kinds share one batchnorm-folding core and one
//! activation-folding core through [`model_ir::AffineMut`]; the public
//! per-kind passes exist so the pipeline applies them in its fixed order
//! and so each audit line names the pass that fired.
//!
//! Every fusion examines each candidate predecessor once per pass. After a
//! successful fold the predecessor's first top is rewired to the absorbed
//! layer's output and the absorbed layer becomes the inert sentinel.

use crate::matcher::{find_consumer, rewire_fused};
use crate::RewriteError;
use model_ir::{Graph, LayerKind};
use tensor_core::{Shape, Tensor};

/// BatchNorm + Scale → BatchNorm.
///
/// `y = ((x - mean) / sqrt(var + eps) * slope + bias) * s + b`
/// `  =  (x - mean) / sqrt(var + eps) * (slope * s) + (bias * s + b)`
pub fn fuse_batchnorm_scale(g: &mut Graph) -> Result<usize, RewriteError> {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        if !matches!(g.layers[i].kind, LayerKind::BatchNorm(_)) {
            continue;
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Scale(_))) else {
            continue;
        };

        let (bias_term, scale_data, scale_bias) = match &g.layers[j].kind {
            LayerKind::Scale(op) => (
                op.bias_term,
                op.scale_data.clone(),
                op.bias_data.clone(),
            ),
            _ => continue,
        };

        tracing::info!(
            "fuse_batchnorm_scale {} {}",
            g.layers[i].name,
            g.layers[j].name
        );

        let scale_name = g.layers[j].name.clone();
        if let LayerKind::BatchNorm(bn) = &mut g.layers[i].kind {
            let channels = bn.channels as usize;
            if scale_data.total() != channels {
                return Err(RewriteError::LengthMismatch {
                    layer: scale_name,
                    expected: channels,
                    found: scale_data.total(),
                });
            }
            if bias_term != 0 && scale_bias.total() != channels {
                return Err(RewriteError::LengthMismatch {
                    layer: scale_name,
                    expected: channels,
                    found: scale_bias.total(),
                });
            }
            for q in 0..channels {
                bn.slope_data[q] *= scale_data[q];
                bn.bias_data[q] = if bias_term != 0 {
                    bn.bias_data[q] * scale_data[q] + scale_bias[q]
                } else {
                    bn.bias_data[q] * scale_data[q]
                };
            }
        }

        rewire_fused(g, i, j);
        applied += 1;
    }
    Ok(applied)
}

/// Shared core of the five affine + BatchNorm fusions.
///
/// With `σ = sqrt(var + eps)`, folding `y = (x - mean) / σ * slope + bias`
/// into the preceding affine layer multiplies each output channel's weight
/// slice by `b = slope / σ` and offsets its bias by
/// `a = bias - slope * mean / σ`. A missing bias is instantiated as zeros
/// first.
fn fuse_batchnorm_into(
    g: &mut Graph,
    pass: &str,
    is_kind: fn(&LayerKind) -> bool,
) -> Result<usize, RewriteError> {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        if !is_kind(&g.layers[i].kind) {
            continue;
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::BatchNorm(_))) else {
            continue;
        };

        let (channels, a, b) = match &g.layers[j].kind {
            LayerKind::BatchNorm(bn) => {
                let channels = bn.channels as usize;
                for t in [&bn.slope_data, &bn.mean_data, &bn.var_data, &bn.bias_data] {
                    if t.total() != channels {
                        return Err(RewriteError::LengthMismatch {
                            layer: g.layers[j].name.clone(),
                            expected: channels,
                            found: t.total(),
                        });
                    }
                }
                let mut a = vec![0.0f32; channels];
                let mut b = vec![0.0f32; channels];
                for q in 0..channels {
                    let sqrt_var = (bn.var_data[q] + bn.eps).sqrt();
                    a[q] = bn.bias_data[q] - bn.slope_data[q] * bn.mean_data[q] / sqrt_var;
                    b[q] = bn.slope_data[q] / sqrt_var;
                }
                (channels, a, b)
            }
            _ => continue,
        };

        tracing::info!("{pass} {} {}", g.layers[i].name, g.layers[j].name);

        let pred_name = g.layers[i].name.clone();
        if let Some(affine) = g.layers[i].kind.affine_mut() {
            let weight_total = affine.weight_data_size as usize;
            if channels == 0 || weight_total % channels != 0 {
                return Err(RewriteError::ChannelMismatch {
                    layer: pred_name,
                    channels: channels as i32,
                    weight_data_size: affine.weight_data_size,
                });
            }
            if *affine.bias_term == 0 {
                *affine.bias_term = 1;
                *affine.bias_data = Tensor::zeros(Shape::vector(channels));
            } else if affine.bias_data.total() != channels {
                return Err(RewriteError::LengthMismatch {
                    layer: pred_name,
                    expected: channels,
                    found: affine.bias_data.total(),
                });
            }

            let weight_per_outch = weight_total / channels;
            let weight = affine.weight_data.as_mut_slice();
            for q in 0..channels {
                let slice = &mut weight[q * weight_per_outch..(q + 1) * weight_per_outch];
                for w in slice {
                    *w *= b[q];
                }
            }
            let bias = affine.bias_data.as_mut_slice();
            for q in 0..channels {
                bias[q] += a[q];
            }
        }

        rewire_fused(g, i, j);
        applied += 1;
    }
    Ok(applied)
}

pub fn fuse_convolution_batchnorm(g: &mut Graph) -> Result<usize, RewriteError> {
    fuse_batchnorm_into(g, "fuse_convolution_batchnorm", |k| {
        matches!(k, LayerKind::Convolution(_))
    })
}

pub fn fuse_convolutiondepthwise_batchnorm(g: &mut Graph) -> Result<usize, RewriteError> {
    fuse_batchnorm_into(g, "fuse_convolutiondepthwise_batchnorm", |k| {
        matches!(k, LayerKind::ConvolutionDepthWise(_))
    })
}

pub fn fuse_deconvolution_batchnorm(g: &mut Graph) -> Result<usize, RewriteError> {
    fuse_batchnorm_into(g, "fuse_deconvolution_batchnorm", |k| {
        matches!(k, LayerKind::Deconvolution(_))
    })
}

pub fn fuse_deconvolutiondepthwise_batchnorm(g: &mut Graph) -> Result<usize, RewriteError> {
    fuse_batchnorm_into(g, "fuse_deconvolutiondepthwise_batchnorm", |k| {
        matches!(k, LayerKind::DeconvolutionDepthWise(_))
    })
}

pub fn fuse_innerproduct_batchnorm(g: &mut Graph) -> Result<usize, RewriteError> {
    fuse_batchnorm_into(g, "fuse_innerproduct_batchnorm", |k| {
        matches!(k, LayerKind::InnerProduct(_))
    })
}

/// InnerProduct + Dropout → InnerProduct.
///
/// Inference dropout multiplies by `scale`; folding multiplies the weights
/// (and bias, when present) instead. A scale of one needs no arithmetic at
/// all, only the rewiring.
pub fn fuse_innerproduct_dropout(g: &mut Graph) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        if !matches!(g.layers[i].kind, LayerKind::InnerProduct(_)) {
            continue;
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Dropout(_))) else {
            continue;
        };

        let scale = match &g.layers[j].kind {
            LayerKind::Dropout(op) => op.scale,
            _ => continue,
        };

        tracing::info!(
            "fuse_innerproduct_dropout {} {}",
            g.layers[i].name,
            g.layers[j].name
        );

        if scale != 1.0 {
            if let LayerKind::InnerProduct(op) = &mut g.layers[i].kind {
                for w in op.weight_data.as_mut_slice() {
                    *w *= scale;
                }
                if op.bias_term != 0 {
                    for b in op.bias_data.as_mut_slice() {
                        *b *= scale;
                    }
                }
            }
        }

        rewire_fused(g, i, j);
        applied += 1;
    }
    applied
}

/// Shared core of the five affine + activation fusions.
///
/// The trailing nonlinearity becomes two fields on the affine layer:
/// ReLU → type 1, LeakyReLU → type 2 with `[slope]`, Clip → type 3 with
/// `[min, max]`, Sigmoid → type 4.
fn fuse_activation_into(g: &mut Graph, pass: &str, is_kind: fn(&LayerKind) -> bool) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        if !is_kind(&g.layers[i].kind) {
            continue;
        }
        let Some(j) = find_consumer(g, i, |k| {
            matches!(
                k,
                LayerKind::ReLU(_) | LayerKind::Clip(_) | LayerKind::Sigmoid(_)
            )
        }) else {
            continue;
        };

        let (activation_type, params) = match &g.layers[j].kind {
            LayerKind::ReLU(op) if op.slope == 0.0 => (1, None),
            LayerKind::ReLU(op) => (2, Some(vec![op.slope])),
            LayerKind::Clip(op) => (3, Some(vec![op.min, op.max])),
            LayerKind::Sigmoid(_) => (4, None),
            _ => continue,
        };

        tracing::info!("{pass} {} {}", g.layers[i].name, g.layers[j].name);

        if let Some(affine) = g.layers[i].kind.affine_mut() {
            *affine.activation_type = activation_type;
            if let Some(params) = params {
                *affine.activation_params = params;
            }
        }

        rewire_fused(g, i, j);
        applied += 1;
    }
    applied
}

pub fn fuse_convolution_activation(g: &mut Graph) -> usize {
    fuse_activation_into(g, "fuse_convolution_activation", |k| {
        matches!(k, LayerKind::Convolution(_))
    })
}

pub fn fuse_convolutiondepthwise_activation(g: &mut Graph) -> usize {
    fuse_activation_into(g, "fuse_convolutiondepthwise_activation", |k| {
        matches!(k, LayerKind::ConvolutionDepthWise(_))
    })
}

pub fn fuse_deconvolution_activation(g: &mut Graph) -> usize {
    fuse_activation_into(g, "fuse_deconvolution_activation", |k| {
        matches!(k, LayerKind::Deconvolution(_))
    })
}

pub fn fuse_deconvolutiondepthwise_activation(g: &mut Graph) -> usize {
    fuse_activation_into(g, "fuse_deconvolutiondepthwise_activation", |k| {
        matches!(k, LayerKind::DeconvolutionDepthWise(_))
    })
}

pub fn fuse_innerproduct_activation(g: &mut Graph) -> usize {
    fuse_activation_into(g, "fuse_innerproduct_activation", |k| {
        matches!(k, LayerKind::InnerProduct(_))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chain, ip_layer};
    use model_ir::{BatchNorm, LayerKind, Scale};
    use tensor_core::Tensor;

    fn bn_kind(channels: i32, eps: f32, slope: &[f32], mean: &[f32], var: &[f32], bias: &[f32]) -> LayerKind {
        LayerKind::BatchNorm(BatchNorm {
            channels,
            eps,
            slope_data: Tensor::from_values(slope.to_vec()),
            mean_data: Tensor::from_values(mean.to_vec()),
            var_data: Tensor::from_values(var.to_vec()),
            bias_data: Tensor::from_values(bias.to_vec()),
        })
    }

    #[test]
    fn test_batchnorm_scale_folds_per_channel() {
        let bn = bn_kind(3, 1e-5, &[1.0, 2.0, 3.0], &[0.0; 3], &[1.0; 3], &[0.5, 0.5, 0.5]);
        let scale = LayerKind::Scale(Scale {
            scale_data_size: 3,
            bias_term: 1,
            scale_data: Tensor::from_values(vec![2.0, 2.0, 2.0]),
            bias_data: Tensor::from_values(vec![1.0, 1.0, 1.0]),
        });
        let mut g = chain(&[("bn", bn), ("scale", scale)]);

        assert_eq!(fuse_batchnorm_scale(&mut g).unwrap(), 1);
        assert!(g.layers[2].is_fused());
        match &g.layers[1].kind {
            LayerKind::BatchNorm(bn) => {
                assert_eq!(bn.slope_data.as_slice(), &[2.0, 4.0, 6.0]);
                assert_eq!(bn.bias_data.as_slice(), &[2.0, 2.0, 2.0]);
            }
            other => panic!("expected BatchNorm, got {}", other.type_name()),
        }
        g.validate().unwrap();
    }

    #[test]
    fn test_batchnorm_scale_length_mismatch_is_fatal() {
        let bn = bn_kind(3, 1e-5, &[1.0; 3], &[0.0; 3], &[1.0; 3], &[0.0; 3]);
        let scale = LayerKind::Scale(Scale {
            scale_data_size: 2,
            bias_term: 0,
            scale_data: Tensor::from_values(vec![2.0, 2.0]),
            bias_data: Tensor::default(),
        });
        let mut g = chain(&[("bn", bn), ("scale", scale)]);
        assert!(matches!(
            fuse_batchnorm_scale(&mut g),
            Err(RewriteError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_innerproduct_batchnorm_instantiates_zero_bias() {
        let ip = ip_layer(2, 0, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0], &[]);
        let bn = bn_kind(2, 0.0, &[1.0, 1.0], &[0.0, 0.0], &[1.0, 1.0], &[0.25, 0.75]);
        let mut g = chain(&[("fc", ip), ("bn", bn)]);

        assert_eq!(fuse_innerproduct_batchnorm(&mut g).unwrap(), 1);
        match &g.layers[1].kind {
            LayerKind::InnerProduct(op) => {
                assert_eq!(op.bias_term, 1);
                assert_eq!(op.bias_data.as_slice(), &[0.25, 0.75]);
                // slope 1, var 1, eps 0, mean 0: weights are unchanged.
                assert_eq!(op.weight_data.as_slice(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
            }
            other => panic!("expected InnerProduct, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_batchnorm_channel_mismatch_is_fatal() {
        // 7 weight elements cannot be split into 2 channel slices.
        let ip = ip_layer(2, 0, &[1.0; 7], &[]);
        let bn = bn_kind(2, 0.0, &[1.0; 2], &[0.0; 2], &[1.0; 2], &[0.0; 2]);
        let mut g = chain(&[("fc", ip), ("bn", bn)]);
        assert!(matches!(
            fuse_innerproduct_batchnorm(&mut g),
            Err(RewriteError::ChannelMismatch { .. })
        ));
    }

    #[test]
    fn test_innerproduct_dropout_scales_weights_and_bias() {
        let ip = ip_layer(2, 1, &[2.0, 4.0, 6.0, 8.0], &[1.0, 3.0]);
        let dropout = LayerKind::Dropout(model_ir::Dropout { scale: 0.5 });
        let mut g = chain(&[("fc", ip), ("drop", dropout)]);

        assert_eq!(fuse_innerproduct_dropout(&mut g), 1);
        match &g.layers[1].kind {
            LayerKind::InnerProduct(op) => {
                assert_eq!(op.weight_data.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
                assert_eq!(op.bias_data.as_slice(), &[0.5, 1.5]);
            }
            other => panic!("expected InnerProduct, got {}", other.type_name()),
        }
        assert!(g.layers[2].is_fused());
    }

    #[test]
    fn test_activation_variants() {
        for (kind, expected_type, expected_params) in [
            (LayerKind::ReLU(model_ir::ReLU { slope: 0.0 }), 1, vec![]),
            (LayerKind::ReLU(model_ir::ReLU { slope: 0.1 }), 2, vec![0.1]),
            (
                LayerKind::Clip(model_ir::Clip { min: -1.0, max: 6.0 }),
                3,
                vec![-1.0, 6.0],
            ),
            (LayerKind::Sigmoid(model_ir::Sigmoid), 4, vec![]),
        ] {
            let ip = ip_layer(1, 0, &[1.0], &[]);
            let mut g = chain(&[("fc", ip), ("act", kind)]);
            assert_eq!(fuse_innerproduct_activation(&mut g), 1);
            match &g.layers[1].kind {
                LayerKind::InnerProduct(op) => {
                    assert_eq!(op.activation_type, expected_type);
                    assert_eq!(op.activation_params, expected_params);
                }
                other => panic!("expected InnerProduct, got {}", other.type_name()),
            }
        }
    }

    #[test]
    fn test_no_fusion_across_multi_input_consumer() {
        // A two-bottom Scale never matches the chain pattern.
        let bn = bn_kind(1, 0.0, &[1.0], &[0.0], &[1.0], &[0.0]);
        let mut g = chain(&[("bn", bn), ("side", LayerKind::Sigmoid(model_ir::Sigmoid))]);
        // Rewrite the sigmoid into a Scale that also consumes the input blob.
        g.layers[2].kind = LayerKind::Scale(Scale::default());
        g.layers[2].bottoms = vec![1, 0];
        assert_eq!(fuse_batchnorm_scale(&mut g).unwrap(), 0);
    }
}
