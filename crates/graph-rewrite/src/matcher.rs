// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Chain-match primitives shared by every pass.
//!
//! Both matchers skip fused layers implicitly: a fused layer's kind never
//! satisfies a kind predicate, and the backward walk skips them outright.
//! Neither matcher verifies that the intermediate blob has a single
//! consumer — the optimizer trusts the caller's graph (see the pipeline
//! docs for the multi-consumer caveat).

use model_ir::{Graph, LayerKind};

/// Finds the nearest following layer that satisfies `pred`, consumes
/// exactly one blob, and that blob is `layers[i]`'s first top.
pub(crate) fn find_consumer(
    g: &Graph,
    i: usize,
    pred: impl Fn(&LayerKind) -> bool,
) -> Option<usize> {
    let top = *g.layers[i].tops.first()?;
    (i + 1..g.layers.len()).find(|&j| {
        let layer = &g.layers[j];
        pred(&layer.kind) && layer.bottoms.len() == 1 && layer.bottoms[0] == top
    })
}

/// Walks backward from `layers[i]` to the live layer producing its first
/// bottom through a single top.
pub(crate) fn find_producer(g: &Graph, i: usize) -> Option<usize> {
    let bottom = *g.layers[i].bottoms.first()?;
    (0..i).rev().find(|&j| {
        let layer = &g.layers[j];
        !layer.is_fused() && layer.tops.len() == 1 && layer.tops[0] == bottom
    })
}

/// Applies the fusion rewiring rule: `absorbed`'s output becomes
/// `survivor`'s output, and `absorbed` turns into the inert sentinel.
pub(crate) fn rewire_fused(g: &mut Graph, survivor: usize, absorbed: usize) {
    let top = g.layers[absorbed].tops[0];
    g.layers[survivor].tops[0] = top;
    g.blobs[top].producer = survivor;
    g.layers[absorbed].kind = LayerKind::Fused;
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{Blob, Layer};

    /// data → relu → softmax, with an unrelated layer in between.
    fn chain_graph() -> Graph {
        let mk = |name: &str, kind: &str, bottoms: Vec<usize>, tops: Vec<usize>| Layer {
            name: name.into(),
            bottoms,
            tops,
            kind: LayerKind::from_type_name(kind).unwrap(),
        };
        Graph {
            layers: vec![
                mk("data", "Input", vec![], vec![0]),
                mk("relu", "ReLU", vec![0], vec![1]),
                mk("side", "Sigmoid", vec![0], vec![2]),
                mk("prob", "Softmax", vec![1], vec![3]),
            ],
            blobs: vec![
                Blob { name: "data".into(), producer: 0 },
                Blob { name: "relu".into(), producer: 1 },
                Blob { name: "side".into(), producer: 2 },
                Blob { name: "prob".into(), producer: 3 },
            ],
        }
    }

    #[test]
    fn test_find_consumer_matches_kind_and_wiring() {
        let g = chain_graph();
        // relu's output is consumed by the softmax, not the sigmoid.
        let j = find_consumer(&g, 1, |k| matches!(k, LayerKind::Softmax(_)));
        assert_eq!(j, Some(3));
        // No Softmax consumes data's output directly.
        assert_eq!(
            find_consumer(&g, 0, |k| matches!(k, LayerKind::Softmax(_))),
            None
        );
    }

    #[test]
    fn test_find_producer_skips_fused() {
        let mut g = chain_graph();
        assert_eq!(find_producer(&g, 1), Some(0));
        g.layers[0].kind = LayerKind::Fused;
        assert_eq!(find_producer(&g, 1), None);
    }

    #[test]
    fn test_rewire_fused() {
        let mut g = chain_graph();
        rewire_fused(&mut g, 1, 3); // Fold the softmax into the relu.
        assert_eq!(g.layers[1].tops, vec![3]);
        assert_eq!(g.blobs[3].producer, 1);
        assert!(g.layers[3].is_fused());
        g.validate().unwrap();
    }
}
