// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The model graph: parallel layer and blob arenas.
//!
//! Layers and blobs live in two flat vectors and refer to each other by
//! index — `bottoms`/`tops` index into `blobs`, `producer` indexes into
//! `layers`. The layer list is a topological order of the model, so the
//! graph is a DAG by construction and no pointer cycles are possible.
//!
//! Rewrite passes never insert or remove entries. A fusion marks the
//! absorbed layer [`LayerKind::Fused`] and re-points the surviving
//! producer's first top; the absorbed layer's old output blob simply goes
//! unreferenced. Serialisation skips fused layers and recounts blobs from
//! the live ones.

use crate::{LayerKind, ModelError};
use std::collections::HashSet;

/// A named edge: the output tensor slot of exactly one layer.
#[derive(Debug, Clone)]
pub struct Blob {
    pub name: String,
    /// Index of the producing layer in `Graph::layers`.
    pub producer: usize,
}

/// One node of the graph: identification, wiring, and the kind body.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    /// Blob indices this layer consumes.
    pub bottoms: Vec<usize>,
    /// Blob indices this layer produces.
    pub tops: Vec<usize>,
    pub kind: LayerKind,
}

impl Layer {
    pub fn is_fused(&self) -> bool {
        self.kind.is_fused()
    }

    /// The kind name as written in topology files.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// The complete model as an ordered layer list plus the blob table.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub layers: Vec<Layer>,
    pub blobs: Vec<Blob>,
}

impl Graph {
    /// Looks up a blob index by name.
    pub fn blob_index(&self, name: &str) -> Option<usize> {
        self.blobs.iter().position(|b| b.name == name)
    }

    /// Number of layers that have not been fused away.
    pub fn live_layer_count(&self) -> usize {
        self.layers.iter().filter(|l| !l.is_fused()).count()
    }

    /// Checks the structural invariants that every rewrite pass preserves.
    ///
    /// - Blob names are unique.
    /// - Every live layer's top blob records that layer as its producer.
    /// - Every live layer's bottom blob is produced by a live layer earlier
    ///   in the list (topological order).
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut names = HashSet::new();
        for blob in &self.blobs {
            if !names.insert(blob.name.as_str()) {
                return Err(ModelError::InvalidGraph(format!(
                    "duplicate blob name '{}'",
                    blob.name
                )));
            }
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if layer.is_fused() {
                continue;
            }
            for &t in &layer.tops {
                let blob = self.blobs.get(t).ok_or_else(|| {
                    ModelError::InvalidGraph(format!(
                        "layer '{}' tops out-of-range blob {t}",
                        layer.name
                    ))
                })?;
                if blob.producer != i {
                    return Err(ModelError::InvalidGraph(format!(
                        "blob '{}' records producer {} but layer '{}' (index {i}) tops it",
                        blob.name, blob.producer, layer.name
                    )));
                }
            }
            for &b in &layer.bottoms {
                let blob = self.blobs.get(b).ok_or_else(|| {
                    ModelError::InvalidGraph(format!(
                        "layer '{}' consumes out-of-range blob {b}",
                        layer.name
                    ))
                })?;
                let p = blob.producer;
                if p >= i {
                    return Err(ModelError::InvalidGraph(format!(
                        "blob '{}' consumed by layer '{}' (index {i}) is produced at index {p}",
                        blob.name, layer.name
                    )));
                }
                if self.layers[p].is_fused() {
                    return Err(ModelError::InvalidGraph(format!(
                        "blob '{}' consumed by layer '{}' is produced by a fused layer",
                        blob.name, layer.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_graph() -> Graph {
        Graph {
            layers: vec![
                Layer {
                    name: "data".into(),
                    bottoms: vec![],
                    tops: vec![0],
                    kind: LayerKind::from_type_name("Input").unwrap(),
                },
                Layer {
                    name: "act".into(),
                    bottoms: vec![0],
                    tops: vec![1],
                    kind: LayerKind::from_type_name("ReLU").unwrap(),
                },
            ],
            blobs: vec![
                Blob {
                    name: "data".into(),
                    producer: 0,
                },
                Blob {
                    name: "act".into(),
                    producer: 1,
                },
            ],
        }
    }

    #[test]
    fn test_validate_ok() {
        two_layer_graph().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_producer() {
        let mut g = two_layer_graph();
        g.blobs[1].producer = 0;
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let mut g = two_layer_graph();
        g.layers[0].bottoms = vec![1]; // Consumes its successor's output.
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_blob_names() {
        let mut g = two_layer_graph();
        g.blobs[1].name = "data".into();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_fused_layers_are_exempt() {
        let mut g = two_layer_graph();
        // Absorb the ReLU: its wiring may dangle afterwards.
        g.layers[1].kind = LayerKind::Fused;
        g.blobs[1].producer = 0;
        g.layers[0].tops = vec![1];
        // Blob 0 is now unreferenced; invariants still hold.
        g.validate().unwrap();
        assert_eq!(g.live_layer_count(), 1);
    }

    #[test]
    fn test_blob_index() {
        let g = two_layer_graph();
        assert_eq!(g.blob_index("act"), Some(1));
        assert_eq!(g.blob_index("missing"), None);
    }
}
