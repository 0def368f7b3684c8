// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kind substitutions: rewrite a layer in place as a cheaper kind.
//!
//! A convolution applied to a 1×1 spatial tensor is mathematically an
//! inner product over the channel vector. Both passes here detect the two
//! situations that guarantee a 1×1 input — a global pooling, or another
//! inner product — and rebuild the convolution as an [`InnerProduct`] in
//! the same slot. The layer header (name, bottoms, tops) is untouched;
//! only the kind body is replaced, and the weight and bias tensors move
//! into the new body rather than being copied.

use crate::matcher::find_consumer;
use model_ir::{Graph, InnerProduct, LayerKind};

/// Swaps the kind body at `j` from Convolution to InnerProduct, moving the
/// tensors across. Non-convolution bodies are put back untouched.
fn convolution_to_innerproduct(g: &mut Graph, j: usize) -> bool {
    let old = std::mem::replace(&mut g.layers[j].kind, LayerKind::Fused);
    match old {
        LayerKind::Convolution(conv) => {
            g.layers[j].kind = LayerKind::InnerProduct(InnerProduct {
                num_output: conv.num_output,
                bias_term: conv.bias_term,
                weight_data_size: conv.weight_data_size,
                int8_scale_term: conv.int8_scale_term,
                activation_type: conv.activation_type,
                activation_params: conv.activation_params,
                weight_data: conv.weight_data,
                bias_data: conv.bias_data,
            });
            true
        }
        other => {
            g.layers[j].kind = other;
            false
        }
    }
}

/// Pooling(global) → Convolution becomes Pooling(global) → InnerProduct.
pub fn replace_convolution_with_innerproduct_after_global_pooling(g: &mut Graph) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        match &g.layers[i].kind {
            LayerKind::Pooling(op) if op.global_pooling != 0 => {}
            _ => continue,
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Convolution(_))) else {
            continue;
        };

        tracing::info!(
            "replace_convolution_with_innerproduct_after_global_pooling {} {}",
            g.layers[i].name,
            g.layers[j].name
        );
        if convolution_to_innerproduct(g, j) {
            applied += 1;
        }
    }
    applied
}

/// InnerProduct → Convolution becomes InnerProduct → InnerProduct,
/// iterated to a fixed point: each replacement creates a new InnerProduct
/// whose own convolution consumers become candidates on the next sweep.
pub fn replace_convolution_with_innerproduct_after_innerproduct(g: &mut Graph) -> usize {
    let mut applied = 0;
    loop {
        let mut replaced = false;

        for i in 0..g.layers.len() {
            if !matches!(g.layers[i].kind, LayerKind::InnerProduct(_)) {
                continue;
            }
            let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Convolution(_)))
            else {
                continue;
            };

            tracing::info!(
                "replace_convolution_with_innerproduct_after_innerproduct {} {}",
                g.layers[i].name,
                g.layers[j].name
            );
            if convolution_to_innerproduct(g, j) {
                applied += 1;
                replaced = true;
            }
        }

        if !replaced {
            break;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chain, conv1x1_layer, ip_layer};
    use model_ir::Pooling;

    #[test]
    fn test_replacement_after_global_pooling_moves_weights() {
        let pool = Pooling {
            global_pooling: 1,
            ..Pooling::default()
        };
        let mut g = chain(&[
            ("pool", LayerKind::Pooling(pool)),
            ("conv", conv1x1_layer(2, 1, &[1.0, 2.0, 3.0, 4.0], &[0.5, 0.5])),
        ]);

        assert_eq!(replace_convolution_with_innerproduct_after_global_pooling(&mut g), 1);
        let layer = &g.layers[2];
        assert_eq!(layer.name, "conv");
        assert_eq!(layer.bottoms, vec![1]);
        assert_eq!(layer.tops, vec![2]);
        match &layer.kind {
            LayerKind::InnerProduct(op) => {
                assert_eq!(op.num_output, 2);
                assert_eq!(op.bias_term, 1);
                assert_eq!(op.weight_data_size, 4);
                assert_eq!(op.weight_data.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
                assert_eq!(op.bias_data.as_slice(), &[0.5, 0.5]);
            }
            other => panic!("expected InnerProduct, got {}", other.type_name()),
        }
        g.validate().unwrap();
    }

    #[test]
    fn test_replacement_after_innerproduct_reaches_fixed_point() {
        // fc → conv_a → conv_b: the first sweep rewrites conv_a, the second
        // rewrites conv_b behind the freshly created InnerProduct.
        let mut g = chain(&[
            ("fc", ip_layer(2, 0, &[1.0, 2.0], &[])),
            ("conv_a", conv1x1_layer(2, 0, &[1.0, 0.0, 0.0, 1.0], &[])),
            ("conv_b", conv1x1_layer(2, 0, &[2.0, 0.0, 0.0, 2.0], &[])),
        ]);

        assert_eq!(replace_convolution_with_innerproduct_after_innerproduct(&mut g), 2);
        assert!(matches!(g.layers[2].kind, LayerKind::InnerProduct(_)));
        assert!(matches!(g.layers[3].kind, LayerKind::InnerProduct(_)));
        g.validate().unwrap();
    }

    #[test]
    fn test_windowed_pooling_does_not_trigger_replacement() {
        let pool = Pooling {
            kernel_w: 3,
            kernel_h: 3,
            ..Pooling::default()
        };
        let mut g = chain(&[
            ("pool", LayerKind::Pooling(pool)),
            ("conv", conv1x1_layer(1, 0, &[1.0], &[])),
        ]);
        assert_eq!(replace_convolution_with_innerproduct_after_global_pooling(&mut g), 0);
        assert!(matches!(g.layers[2].kind, LayerKind::Convolution(_)));
    }
}
