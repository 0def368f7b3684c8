// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-rewrite
//!
//! The rewrite engine of the graph optimizer: a fixed pipeline of
//! arithmetic fusions, structural eliminations, and kind substitutions
//! over a loaded [`model_ir::Graph`], every one preserving the model's
//! observable outputs up to floating-point rewriting tolerance.
//!
//! The engine is single-threaded and purely local: each pass scans the
//! layer list once (one pass iterates to a fixed point) and performs
//! in-place edits. Passes never insert or remove layers — an absorbed
//! layer becomes the `Fused` sentinel that serialisation skips.
//!
//! Entry point: [`optimize`]. Individual passes are exported for targeted
//! use and testing. [`find_fastest_fp32_conv`] is the optional
//! hardware-gated impl selection, generic over the external execution
//! engine via [`ConvBench`].

mod conv_impl;
mod eliminate;
mod error;
mod fuse;
mod matcher;
mod pipeline;
mod replace;

pub use conv_impl::{find_fastest_fp32_conv, supports_fp32_impl, ConvBench, CONV_IMPL_NAMES};
pub use eliminate::{
    eliminate_dropout, eliminate_flatten_after_global_pooling,
    eliminate_flatten_after_innerproduct,
};
pub use error::RewriteError;
pub use fuse::{
    fuse_batchnorm_scale, fuse_convolution_activation, fuse_convolution_batchnorm,
    fuse_convolutiondepthwise_activation, fuse_convolutiondepthwise_batchnorm,
    fuse_deconvolution_activation, fuse_deconvolution_batchnorm,
    fuse_deconvolutiondepthwise_activation, fuse_deconvolutiondepthwise_batchnorm,
    fuse_innerproduct_activation, fuse_innerproduct_batchnorm, fuse_innerproduct_dropout,
};
pub use pipeline::{optimize, PipelineReport};
pub use replace::{
    replace_convolution_with_innerproduct_after_global_pooling,
    replace_convolution_with_innerproduct_after_innerproduct,
};

/// Graph-building helpers shared by the unit tests of the pass modules.
#[cfg(test)]
pub(crate) mod testutil {
    use model_ir::{Blob, Convolution, Graph, InnerProduct, Layer, LayerKind};
    use tensor_core::Tensor;

    /// Builds `Input → kinds[0] → kinds[1] → …` as a straight chain with
    /// one blob between consecutive layers.
    pub fn chain(kinds: &[(&str, LayerKind)]) -> Graph {
        let mut g = Graph {
            layers: vec![Layer {
                name: "data".into(),
                bottoms: vec![],
                tops: vec![0],
                kind: LayerKind::from_type_name("Input").unwrap(),
            }],
            blobs: vec![Blob {
                name: "data".into(),
                producer: 0,
            }],
        };
        for (name, kind) in kinds {
            let bottom = g.blobs.len() - 1;
            let top = g.blobs.len();
            let index = g.layers.len();
            g.blobs.push(Blob {
                name: (*name).to_string(),
                producer: index,
            });
            g.layers.push(Layer {
                name: (*name).to_string(),
                bottoms: vec![bottom],
                tops: vec![top],
                kind: kind.clone(),
            });
        }
        g
    }

    /// An InnerProduct kind with the given weights and optional bias.
    pub fn ip_layer(num_output: i32, bias_term: i32, weights: &[f32], bias: &[f32]) -> LayerKind {
        LayerKind::InnerProduct(InnerProduct {
            num_output,
            bias_term,
            weight_data_size: weights.len() as i32,
            weight_data: Tensor::from_values(weights.to_vec()),
            bias_data: Tensor::from_values(bias.to_vec()),
            ..InnerProduct::default()
        })
    }

    /// A 1×1 Convolution kind with the given weights and optional bias.
    pub fn conv1x1_layer(
        num_output: i32,
        bias_term: i32,
        weights: &[f32],
        bias: &[f32],
    ) -> LayerKind {
        LayerKind::Convolution(Convolution {
            num_output,
            kernel_w: 1,
            kernel_h: 1,
            bias_term,
            weight_data_size: weights.len() as i32,
            weight_data: Tensor::from_values(weights.to_vec()),
            bias_data: Tensor::from_values(bias.to_vec()),
            ..Convolution::default()
        })
    }
}
