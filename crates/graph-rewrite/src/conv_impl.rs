// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-convolution kernel implementation selection.
//!
//! The only mark this leaves on the IR is each convolution's `impl_type`.
//! Timing requires executing the graph, which is the job of an external
//! engine abstracted behind [`ConvBench`]: resolve what shape a blob takes
//! for a probe input, and time one candidate implementation. The engine is
//! expected to pin itself to a single thread so measurements are stable.
//! What lives here is the capability query — which implementations a given
//! convolution geometry admits at all — and the selection sweep.

use model_ir::{Convolution, Graph, LayerKind};

/// Implementation names indexed by `impl_type`.
pub const CONV_IMPL_NAMES: [&str; 6] = [
    "baseline",
    "winograd",
    "pointwise",
    "im2col",
    "direct",
    "conv3x3s2",
];

/// Kernel×stride admission table for the direct implementation
/// (kernel 1..=7 down the rows, stride 1..=4 across).
const DIRECT_SUPPORT: [[bool; 4]; 7] = [
    [true, true, false, false],
    [true, false, false, false],
    [true, true, false, false],
    [false, false, false, true],
    [true, true, false, false],
    [false, false, false, false],
    [true, true, false, false],
];

/// Whether `impl_type` can run the given convolution on an fp32 input of
/// shape `bottom = (w, h, c)`.
///
/// Every specialised implementation requires square kernel and stride and
/// no dilation; `baseline` (type 0) always works and is never queried.
pub fn supports_fp32_impl(conv: &Convolution, bottom: (i32, i32, i32), impl_type: i32) -> bool {
    if conv.kernel_w != conv.kernel_h
        || conv.stride_w != conv.stride_h
        || conv.dilation_w != conv.dilation_h
        || conv.dilation_h != 1
    {
        return false;
    }

    let kernel = conv.kernel_h;
    let stride = conv.stride_h;
    match impl_type {
        1 => kernel == 3 && stride == 1,
        2 => bottom.0 == 1 && bottom.1 == 1 && stride == 1,
        3 => true,
        4 => {
            (1..=7).contains(&kernel)
                && (1..=4).contains(&stride)
                && DIRECT_SUPPORT[kernel as usize - 1][stride as usize - 1]
        }
        5 => kernel == 3 && stride == 2,
        _ => false,
    }
}

/// Contract of the external execution engine used for timing.
pub trait ConvBench {
    /// Shape `(w, h, c)` the named blob takes under the probe input, or
    /// `None` when the blob cannot be resolved.
    fn blob_shape(&mut self, blob_name: &str) -> Option<(i32, i32, i32)>;

    /// Average forward time in microseconds for one candidate, or `None`
    /// when the engine cannot run it.
    fn measure(
        &mut self,
        conv: &Convolution,
        bottom: (i32, i32, i32),
        impl_type: i32,
    ) -> Option<f64>;
}

/// Benchmarks every admissible implementation per convolution and records
/// the fastest in `impl_type`. Returns the number of convolutions updated.
pub fn find_fastest_fp32_conv(g: &mut Graph, bench: &mut dyn ConvBench) -> usize {
    let mut assigned = 0;
    for i in 0..g.layers.len() {
        let (conv, bottom_name, top_name) = match &g.layers[i].kind {
            LayerKind::Convolution(op) => {
                let (Some(&b), Some(&t)) = (g.layers[i].bottoms.first(), g.layers[i].tops.first())
                else {
                    continue;
                };
                (
                    op.clone(),
                    g.blobs[b].name.clone(),
                    g.blobs[t].name.clone(),
                )
            }
            _ => continue,
        };

        let Some(bottom) = bench.blob_shape(&bottom_name) else {
            continue;
        };
        if bench.blob_shape(&top_name).is_none() {
            continue;
        }

        let mut best_type = 0;
        let mut min_cost = f64::MAX;
        for impl_type in 1..=5 {
            if !supports_fp32_impl(&conv, bottom, impl_type) {
                continue;
            }
            let Some(cost) = bench.measure(&conv, bottom, impl_type) else {
                continue;
            };
            if cost < min_cost {
                min_cost = cost;
                best_type = impl_type;
            }
        }

        if let LayerKind::Convolution(op) = &mut g.layers[i].kind {
            op.impl_type = best_type;
        }
        tracing::info!(
            "{i}: {} uses {}",
            g.layers[i].name,
            CONV_IMPL_NAMES[best_type as usize]
        );
        assigned += 1;
    }
    assigned
}
