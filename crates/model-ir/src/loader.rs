// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading: topology text plus weight stream into a [`Graph`].
//!
//! The topology file is line oriented:
//!
//! ```text
//! 7767517
//! <layer_count> <blob_count>
//! <kind> <name> <nb> <nt> <bottom…> <top…> [key=value]…
//! ```
//!
//! Layers appear in topological order, so every bottom name must have been
//! produced by an earlier line — the loader treats a violation as an error
//! rather than repairing it, since every downstream rewrite relies on the
//! single-producer invariant. Weight records are consumed from the binary
//! stream in the same layer order, each kind reading its declared tensors.

use crate::param::ParamDict;
use crate::weights::WeightReader;
use crate::{Blob, Graph, Layer, LayerKind, ModelError};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// First line of every topology file.
pub const PARAM_MAGIC: &str = "7767517";

impl Graph {
    /// Loads a model from its topology and weights files.
    pub fn load_files(param_path: &Path, bin_path: &Path) -> Result<Self, ModelError> {
        let param = BufReader::new(File::open(param_path)?);
        let bin = BufReader::new(File::open(bin_path)?);
        let graph = Self::read_from(param, bin)?;
        tracing::debug!(
            layers = graph.layers.len(),
            blobs = graph.blobs.len(),
            "loaded model from {}",
            param_path.display(),
        );
        Ok(graph)
    }

    /// Reads a model from an in-memory or on-disk pair of streams.
    pub fn read_from(param: impl BufRead, bin: impl Read) -> Result<Self, ModelError> {
        let mut lines = param.lines().enumerate();

        let magic = next_content_line(&mut lines)?
            .ok_or_else(|| ModelError::BadMagic { found: String::new() })?;
        if magic.1.trim() != PARAM_MAGIC {
            return Err(ModelError::BadMagic {
                found: magic.1.trim().to_string(),
            });
        }

        let (counts_lineno, counts) = next_content_line(&mut lines)?.ok_or(ModelError::Parse {
            line: 2,
            detail: "missing layer/blob count line".into(),
        })?;
        let mut fields = counts.split_whitespace();
        let layer_count: usize = parse_count(fields.next(), counts_lineno)?;
        let _blob_count: usize = parse_count(fields.next(), counts_lineno)?;

        let mut reader = WeightReader::new(bin);
        let mut graph = Graph {
            layers: Vec::with_capacity(layer_count),
            blobs: Vec::new(),
        };
        let mut blob_names: HashMap<String, usize> = HashMap::new();

        while graph.layers.len() < layer_count {
            let (lineno, line) = next_content_line(&mut lines)?.ok_or(ModelError::Parse {
                line: 0,
                detail: format!(
                    "topology ended after {} of {layer_count} layers",
                    graph.layers.len()
                ),
            })?;
            let layer = parse_layer_line(
                &line,
                lineno,
                graph.layers.len(),
                &mut graph.blobs,
                &mut blob_names,
                &mut reader,
            )?;
            graph.layers.push(layer);
        }

        Ok(graph)
    }
}

/// Advances to the next non-blank line, yielding its 1-based number.
fn next_content_line(
    lines: &mut impl Iterator<Item = (usize, std::io::Result<String>)>,
) -> Result<Option<(usize, String)>, ModelError> {
    for (idx, line) in lines {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok(Some((idx + 1, line)));
        }
    }
    Ok(None)
}

fn parse_count(field: Option<&str>, line: usize) -> Result<usize, ModelError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ModelError::Parse {
            line,
            detail: "expected '<layer_count> <blob_count>'".into(),
        })
}

fn parse_layer_line<R: Read>(
    line: &str,
    lineno: usize,
    layer_index: usize,
    blobs: &mut Vec<Blob>,
    blob_names: &mut HashMap<String, usize>,
    reader: &mut WeightReader<R>,
) -> Result<Layer, ModelError> {
    let mut tokens = line.split_whitespace();

    let missing = |what: &str| ModelError::Parse {
        line: lineno,
        detail: format!("missing {what}"),
    };

    let kind_name = tokens.next().ok_or_else(|| missing("layer kind"))?;
    let name = tokens.next().ok_or_else(|| missing("layer name"))?.to_string();
    let bottom_count: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| missing("bottom count"))?;
    let top_count: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| missing("top count"))?;

    let mut kind = LayerKind::from_type_name(kind_name).ok_or_else(|| {
        ModelError::UnknownLayerKind {
            name: kind_name.to_string(),
            line: lineno,
        }
    })?;

    let mut bottoms = Vec::with_capacity(bottom_count);
    for _ in 0..bottom_count {
        let blob = tokens.next().ok_or_else(|| missing("bottom blob name"))?;
        let index = *blob_names
            .get(blob)
            .ok_or_else(|| ModelError::UnknownBlob {
                layer: name.clone(),
                blob: blob.to_string(),
            })?;
        bottoms.push(index);
    }

    let mut tops = Vec::with_capacity(top_count);
    for _ in 0..top_count {
        let blob = tokens.next().ok_or_else(|| missing("top blob name"))?;
        if blob_names.contains_key(blob) {
            return Err(ModelError::DuplicateBlob {
                layer: name.clone(),
                blob: blob.to_string(),
            });
        }
        let index = blobs.len();
        blobs.push(Blob {
            name: blob.to_string(),
            producer: layer_index,
        });
        blob_names.insert(blob.to_string(), index);
        tops.push(index);
    }

    let mut pd = ParamDict::new();
    for token in tokens {
        pd.parse_token(token, lineno)?;
    }
    kind.load_param(&pd);
    kind.load_model(reader)?;

    Ok(Layer {
        name,
        bottoms,
        tops,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayerKind;

    fn load(param: &str, bin: &[u8]) -> Result<Graph, ModelError> {
        Graph::read_from(param.as_bytes(), bin)
    }

    #[test]
    fn test_minimal_topology() {
        let param = "7767517\n2 2\n\
                     Input            data             0 1 data 0=4\n\
                     ReLU             relu             1 1 data relu\n";
        let g = load(param, &[]).unwrap();
        assert_eq!(g.layers.len(), 2);
        assert_eq!(g.blobs.len(), 2);
        assert_eq!(g.blobs[1].producer, 1);
        match &g.layers[0].kind {
            LayerKind::Input(op) => assert_eq!(op.w, 4),
            other => panic!("expected Input, got {}", other.type_name()),
        }
        g.validate().unwrap();
    }

    #[test]
    fn test_bad_magic() {
        let err = load("42\n1 1\n", &[]).unwrap_err();
        assert!(matches!(err, ModelError::BadMagic { .. }));
    }

    #[test]
    fn test_unknown_kind() {
        let param = "7767517\n1 1\nFrobnicate f 0 1 out\n";
        let err = load(param, &[]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownLayerKind { line: 3, .. }));
    }

    #[test]
    fn test_unknown_bottom_blob() {
        let param = "7767517\n1 1\nReLU relu 1 1 ghost out\n";
        let err = load(param, &[]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownBlob { .. }));
    }

    #[test]
    fn test_duplicate_top_blob() {
        let param = "7767517\n2 2\n\
                     Input data 0 1 x\n\
                     ReLU  relu 1 1 x x\n";
        let err = load(param, &[]).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateBlob { .. }));
    }

    #[test]
    fn test_truncated_layer_list() {
        let param = "7767517\n3 3\nInput data 0 1 x\n";
        let err = load(param, &[]).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn test_weights_consumed_in_layer_order() {
        use crate::weights::WeightWriter;
        use tensor_core::{DType, Tensor};

        let mut bin = Vec::new();
        {
            let mut ww = WeightWriter::new(&mut bin, DType::F32);
            // InnerProduct: tagged weight then raw bias.
            ww.write_tagged(&Tensor::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
                .unwrap();
            ww.write_raw(&Tensor::from_values(vec![0.1, 0.2])).unwrap();
        }
        let param = "7767517\n2 2\n\
                     Input        data 0 1 data\n\
                     InnerProduct fc   1 1 data fc 0=2 1=1 2=6\n";
        let g = load(param, &bin).unwrap();
        match &g.layers[1].kind {
            LayerKind::InnerProduct(op) => {
                assert_eq!(op.weight_data.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
                assert_eq!(op.bias_data.as_slice(), &[0.1, 0.2]);
            }
            other => panic!("expected InnerProduct, got {}", other.type_name()),
        }
    }
}
