// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Structural eliminations: drop layers whose effect is the identity in
//! context.

use crate::matcher::{find_consumer, find_producer, rewire_fused};
use model_ir::{Graph, LayerKind};

/// Removes identity dropouts (`scale == 1`) by letting whichever live
/// layer produces their input take over their output.
pub fn eliminate_dropout(g: &mut Graph) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        match &g.layers[i].kind {
            LayerKind::Dropout(op) if op.scale == 1.0 => {}
            _ => continue,
        }
        let Some(j) = find_producer(g, i) else {
            continue;
        };

        tracing::info!("eliminate_dropout {} {}", g.layers[j].name, g.layers[i].name);
        rewire_fused(g, j, i);
        applied += 1;
    }
    applied
}

/// A global pooling already leaves a flat 1×1 spatial tensor; a following
/// Flatten is a no-op.
pub fn eliminate_flatten_after_global_pooling(g: &mut Graph) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        match &g.layers[i].kind {
            LayerKind::Pooling(op) if op.global_pooling != 0 => {}
            _ => continue,
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Flatten(_))) else {
            continue;
        };

        tracing::info!(
            "eliminate_flatten_after_global_pooling {} {}",
            g.layers[i].name,
            g.layers[j].name
        );
        rewire_fused(g, i, j);
        applied += 1;
    }
    applied
}

/// An InnerProduct's output is already flat; a following Flatten is a
/// no-op.
pub fn eliminate_flatten_after_innerproduct(g: &mut Graph) -> usize {
    let mut applied = 0;
    for i in 0..g.layers.len() {
        if !matches!(g.layers[i].kind, LayerKind::InnerProduct(_)) {
            continue;
        }
        let Some(j) = find_consumer(g, i, |k| matches!(k, LayerKind::Flatten(_))) else {
            continue;
        };

        tracing::info!(
            "eliminate_flatten_after_innerproduct {} {}",
            g.layers[i].name,
            g.layers[j].name
        );
        rewire_fused(g, i, j);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chain, ip_layer};
    use model_ir::{Dropout, Flatten, Pooling, Softmax};

    #[test]
    fn test_identity_dropout_is_absorbed_by_producer() {
        let mut g = chain(&[
            ("drop", LayerKind::Dropout(Dropout { scale: 1.0 })),
            ("prob", LayerKind::Softmax(Softmax::default())),
        ]);
        assert_eq!(eliminate_dropout(&mut g), 1);
        // The Input producer takes over the dropout's output blob.
        assert!(g.layers[1].is_fused());
        assert_eq!(g.layers[0].tops, vec![1]);
        assert_eq!(g.blobs[1].producer, 0);
        // The softmax still reads blob 1, now produced by the input.
        assert_eq!(g.layers[2].bottoms, vec![1]);
        g.validate().unwrap();
    }

    #[test]
    fn test_scaling_dropout_is_kept() {
        let mut g = chain(&[("drop", LayerKind::Dropout(Dropout { scale: 0.5 }))]);
        assert_eq!(eliminate_dropout(&mut g), 0);
        assert!(!g.layers[1].is_fused());
    }

    #[test]
    fn test_flatten_after_global_pooling() {
        let pool = Pooling {
            global_pooling: 1,
            ..Pooling::default()
        };
        let mut g = chain(&[
            ("pool", LayerKind::Pooling(pool)),
            ("flat", LayerKind::Flatten(Flatten)),
        ]);
        assert_eq!(eliminate_flatten_after_global_pooling(&mut g), 1);
        assert!(g.layers[2].is_fused());
        assert_eq!(g.layers[1].tops, vec![2]);
        g.validate().unwrap();
    }

    #[test]
    fn test_flatten_after_windowed_pooling_is_kept() {
        let pool = Pooling {
            kernel_w: 2,
            kernel_h: 2,
            ..Pooling::default()
        };
        let mut g = chain(&[
            ("pool", LayerKind::Pooling(pool)),
            ("flat", LayerKind::Flatten(Flatten)),
        ]);
        assert_eq!(eliminate_flatten_after_global_pooling(&mut g), 0);
    }

    #[test]
    fn test_flatten_after_innerproduct() {
        let mut g = chain(&[
            ("fc", ip_layer(2, 0, &[1.0, 2.0], &[])),
            ("flat", LayerKind::Flatten(Flatten)),
        ]);
        assert_eq!(eliminate_flatten_after_innerproduct(&mut g), 1);
        assert!(g.layers[2].is_fused());
        g.validate().unwrap();
    }
}
