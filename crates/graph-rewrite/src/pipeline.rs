// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The fixed rewrite pipeline.
//!
//! Pass order is significant and must not be reordered:
//!
//! 1. BatchNorm+Scale first, so the merged statistics feed the affine+BN
//!    fusions.
//! 2. Affine+BN fusions before the activation fusions, so an activation
//!    lands on the layer that survives.
//! 3. `eliminate_flatten_after_global_pooling` runs *before* the
//!    Conv→InnerProduct substitutions but
//!    `eliminate_flatten_after_innerproduct` runs *after* them: the
//!    substitutions create the InnerProduct producers the second Flatten
//!    elimination keys on, and swapping the two changes outcomes.

use crate::{eliminate, fuse, replace, RewriteError};
use model_ir::Graph;

/// Counts of rewrites applied by one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub fused: usize,
    pub eliminated: usize,
    pub replaced: usize,
}

impl PipelineReport {
    pub fn total(&self) -> usize {
        self.fused + self.eliminated + self.replaced
    }
}

/// Runs every pass in the fixed order and reports what was applied.
///
/// The chain matchers do not verify that a fused intermediate blob has a
/// single consumer; fusing a producer whose output fans out would silently
/// redirect one consumer. Callers must hand the optimizer a graph where
/// fused intermediates are single-consumer — the standard output of the
/// model converters this format comes from.
pub fn optimize(g: &mut Graph) -> Result<PipelineReport, RewriteError> {
    let mut report = PipelineReport::default();

    report.fused += fuse::fuse_batchnorm_scale(g)?;
    report.fused += fuse::fuse_convolution_batchnorm(g)?;
    report.fused += fuse::fuse_convolutiondepthwise_batchnorm(g)?;
    report.fused += fuse::fuse_deconvolution_batchnorm(g)?;
    report.fused += fuse::fuse_deconvolutiondepthwise_batchnorm(g)?;
    report.fused += fuse::fuse_innerproduct_batchnorm(g)?;
    report.fused += fuse::fuse_innerproduct_dropout(g);
    report.fused += fuse::fuse_convolution_activation(g);
    report.fused += fuse::fuse_convolutiondepthwise_activation(g);
    report.fused += fuse::fuse_deconvolution_activation(g);
    report.fused += fuse::fuse_deconvolutiondepthwise_activation(g);
    report.fused += fuse::fuse_innerproduct_activation(g);

    report.eliminated += eliminate::eliminate_dropout(g);
    report.eliminated += eliminate::eliminate_flatten_after_global_pooling(g);

    report.replaced += replace::replace_convolution_with_innerproduct_after_global_pooling(g);
    report.replaced += replace::replace_convolution_with_innerproduct_after_innerproduct(g);

    report.eliminated += eliminate::eliminate_flatten_after_innerproduct(g);

    tracing::debug!(
        fused = report.fused,
        eliminated = report.eliminated,
        replaced = report.replaced,
        "rewrite pipeline finished",
    );
    Ok(report)
}
